use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Treat an explicit JSON `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One titled section of a blog post, as produced by the upstream HTML parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostComponent {
    /// Section heading, e.g. `"STRENGTH"` or `"METCON"`. May be empty.
    #[serde(rename = "component", alias = "heading", default, deserialize_with = "null_as_default")]
    pub heading: String,
    /// Free text under the heading, newline separated.
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: String,
}

impl PostComponent {
    pub fn new(heading: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            details: details.into(),
        }
    }
}

/// A post as delivered by the source fetcher.
///
/// Every field is optional on the wire; missing values are recovered with
/// empty defaults by the canonical builder rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPost {
    /// Numeric WordPress post id.
    #[serde(default)]
    pub id: Option<i64>,
    /// ISO publish date (`YYYY-MM-DD`, possibly with a time suffix).
    #[serde(default)]
    pub post_date: Option<String>,
    /// Intended workout date, when the fetcher already derived it.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Pre-parsed sections of the post body.
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: Vec<PostComponent>,
    /// Training-cycle markers such as `(WK4/8)`.
    #[serde(default)]
    pub cycle_info: Option<Vec<String>>,
    /// Comment count fetched alongside the post, if any.
    #[serde(default)]
    pub comment_count: Option<u32>,
}

// ── Format ────────────────────────────────────────────────────────────────────

/// Workout format detected from the movement text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "amrap")]
    Amrap,
    #[serde(rename = "for time")]
    ForTime,
    #[serde(rename = "emom")]
    Emom,
    #[serde(rename = "interval")]
    Interval,
    #[default]
    #[serde(rename = "")]
    None,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Amrap => "amrap",
            Format::ForTime => "for time",
            Format::Emom => "emom",
            Format::Interval => "interval",
            Format::None => "",
        }
    }

    /// Map a free-form format label onto the closed set.
    ///
    /// Unknown labels collapse to [`Format::None`].
    pub fn from_alias(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "amrap" => Format::Amrap,
            "for time" | "fortime" | "for_time" => Format::ForTime,
            "emom" => Format::Emom,
            "interval" | "intervals" | "tabata" => Format::Interval,
            _ => Format::None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ComponentTag ──────────────────────────────────────────────────────────────

/// Coarse category of a post section, derived from its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTag {
    Strength,
    Conditioning,
    Assistance,
    Partner,
    FloaterStrength,
}

impl ComponentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentTag::Strength => "strength",
            ComponentTag::Conditioning => "conditioning",
            ComponentTag::Assistance => "assistance",
            ComponentTag::Partner => "partner",
            ComponentTag::FloaterStrength => "floater_strength",
        }
    }

    /// Parse one of the five allowed tag strings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "strength" => Some(ComponentTag::Strength),
            "conditioning" => Some(ComponentTag::Conditioning),
            "assistance" => Some(ComponentTag::Assistance),
            "partner" => Some(ComponentTag::Partner),
            "floater_strength" => Some(ComponentTag::FloaterStrength),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── CanonicalRecord ───────────────────────────────────────────────────────────

/// The canonical, immutable representation of one blog post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: Option<i64>,
    /// Intended workout date (`YYYY-MM-DD`), empty when unknown.
    pub date: String,
    /// Publish date, which may be a day after `date`.
    #[serde(default)]
    pub post_date: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub cycle_info: Vec<String>,
    pub components: Vec<PostComponent>,
    pub is_rest_day: bool,
    /// De-duplicated canonical movement labels, in pattern-library order.
    pub movements: Vec<String>,
    pub format: Format,
    pub component_tags: Vec<ComponentTag>,
    pub comment_count: u32,
    /// 1-based rank over all records by `(date, id)`.
    pub seq_no: usize,
    /// 1-based rank over non-rest-day records; `None` for rest days.
    pub workout_no: Option<usize>,
    #[serde(default)]
    pub milestones: Vec<String>,
}
