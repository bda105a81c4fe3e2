//! Oracle reply validation and normalization.
//!
//! Replies are coerced onto the canonical vocabulary rather than rejected:
//! unknown tags are dropped, formats and movement aliases are mapped, and
//! movements outside the pattern library move to `unmapped_movements` with
//! a note. Only a missing key or a malformed component list is an error.

use std::collections::{BTreeSet, HashSet};

use serde_json::{Map, Value};
use wod_core::classifiers::tag_movements;
use wod_core::error::{EtlError, Result};
use wod_core::models::{ComponentTag, Format, PostComponent};
use wod_core::patterns::PatternLibrary;

use crate::classifier::TaggingResult;

pub const REQUIRED_KEYS: [&str; 11] = [
    "id",
    "date",
    "title",
    "link",
    "is_rest_day",
    "components",
    "component_tags",
    "format",
    "movements",
    "unmapped_movements",
    "notes",
];

/// Common oracle spellings of canonical labels.
pub fn canonical_alias(name: &str) -> Option<&'static str> {
    let label = match name.trim().to_lowercase().as_str() {
        "row" | "rowing" | "rower" | "erg" => "row (erg)",
        "power snatch" | "hang power snatch" => "snatch",
        "power clean" | "hang power clean" => "clean",
        "shoulder press" => "strict press",
        "db bench" | "db bench press" | "dumbbell bench" | "dumbbell bench press" => "bench press",
        "renegade row" | "renegade rows" => "row (weighted)",
        _ => return None,
    };
    Some(label)
}

/// Validate a decoded oracle reply against the schema and `library`.
pub fn validate_oracle_result(value: Value, library: &PatternLibrary) -> Result<TaggingResult> {
    let Value::Object(obj) = value else {
        return Err(EtlError::Validation("reply is not a JSON object".to_string()));
    };
    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(EtlError::MissingKey(key.to_string()));
        }
    }

    let components = parse_components(&obj["components"])?;
    let component_tags = dedupe(
        strings(&obj["component_tags"])
            .filter_map(|t| ComponentTag::parse(t.trim()))
            .collect(),
    );
    let format = Format::from_alias(obj["format"].as_str().unwrap_or_default());
    let mut notes = obj["notes"].as_str().unwrap_or_default().trim().to_string();

    let mut movements: Vec<String> = strings(&obj["movements"])
        .map(|m| canonical_alias(m).map(str::to_string).unwrap_or_else(|| m.to_string()))
        .collect();

    let mut unmapped = Vec::new();
    for m in strings(&obj["unmapped_movements"]) {
        match canonical_alias(m) {
            Some(label) if library.contains(label) => movements.push(label.to_string()),
            _ => unmapped.push(m.to_string()),
        }
    }

    let unknown: BTreeSet<String> = movements
        .iter()
        .filter(|m| !library.contains(m))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        unmapped.extend(movements.iter().filter(|m| !library.contains(m)).cloned());
        movements.retain(|m| library.contains(m));
        let listed = unknown.into_iter().collect::<Vec<_>>().join(", ");
        append_note(&mut notes, &format!("(Coerced unknown movements to unmapped: {listed})"));
    }

    let mut movements = dedupe(movements);
    let unmapped = dedupe(unmapped.into_iter().filter(|m| !m.is_empty()).collect());

    let floater_only = floater_only_movements(&components, library);
    if !floater_only.is_empty() {
        let removed: BTreeSet<String> = movements
            .iter()
            .filter(|m| floater_only.contains(m.as_str()))
            .cloned()
            .collect();
        if !removed.is_empty() {
            movements.retain(|m| !removed.contains(m));
            let listed = removed.into_iter().collect::<Vec<_>>().join(", ");
            append_note(&mut notes, &format!("(Removed floater-only movements: {listed})"));
        }
    }

    Ok(TaggingResult {
        id: obj["id"].as_i64(),
        date: obj["date"].as_str().map(str::to_string),
        title: text_field(&obj, "title"),
        link: text_field(&obj, "link"),
        is_rest_day: obj["is_rest_day"].as_bool().unwrap_or(false),
        components,
        component_tags,
        format,
        movements,
        unmapped_movements: unmapped,
        notes,
    })
}

/// Run an already-typed result through the same checks again.
pub fn revalidate(result: &TaggingResult, library: &PatternLibrary) -> Result<TaggingResult> {
    validate_oracle_result(serde_json::to_value(result)?, library)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_components(value: &Value) -> Result<Vec<PostComponent>> {
    let Value::Array(items) = value else {
        return Err(EtlError::Validation("components must be a list".to_string()));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(c) if c.contains_key("component") && c.contains_key("details") => {
                Ok(PostComponent::new(scalar_text(&c["component"]), scalar_text(&c["details"])))
            }
            _ => Err(EtlError::Validation(
                "components entries must be objects with component and details".to_string(),
            )),
        })
        .collect()
}

/// Movements the rule-based tagger finds only inside floater strength sections.
fn floater_only_movements(components: &[PostComponent], library: &PatternLibrary) -> HashSet<String> {
    let (floater, other): (Vec<&PostComponent>, Vec<&PostComponent>) =
        components.iter().partition(|c| is_floater_heading(&c.heading));
    if floater.is_empty() {
        return HashSet::new();
    }
    let join = |parts: &[&PostComponent]| {
        parts
            .iter()
            .map(|c| c.details.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    };
    let elsewhere: HashSet<String> = tag_movements(&join(&other), library).into_iter().collect();
    tag_movements(&join(&floater), library)
        .into_iter()
        .filter(|m| !elsewhere.contains(m))
        .collect()
}

fn is_floater_heading(heading: &str) -> bool {
    let h = heading.to_lowercase();
    h.contains("floater") && h.contains("strength")
}

fn strings(value: &Value) -> impl Iterator<Item = &str> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(scalar_text).unwrap_or_default()
}

fn append_note(notes: &mut String, extra: &str) {
    if !notes.is_empty() {
        notes.push(' ');
    }
    notes.push_str(extra);
}

/// Drop repeats, keeping first occurrences in order.
fn dedupe<T: Clone + Eq + std::hash::Hash>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}
