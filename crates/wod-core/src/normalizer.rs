//! Movement-text extraction.
//!
//! Turns the sections of a post into one lowercase blob suitable for the
//! movement tagger, dropping future-schedule lines, promotional copy, trivia
//! and recap references along the way.

use regex::Regex;
use tracing::{debug, warn};

use crate::classifiers::{component_tag, looks_like_workout};
use crate::models::PostComponent;
use crate::registries::TextRules;

/// Filters post components into movement text.
///
/// Build once with [`TextNormalizer::new`] and reuse across posts; the
/// compiled regexes and phrase lists are never mutated.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    rules: TextRules,
    promo_patterns: Vec<Regex>,
    underscore_rule: Regex,
    hyphen_rule: Regex,
    post_results_boilerplate: Regex,
    post_comments_boilerplate: Regex,
    exposure_boilerplate: Regex,
    post_to_comments_tail: Regex,
    divider_only: Regex,
    numbered_question: Regex,
    weeks_one_two: Regex,
    heading_punctuation: Regex,
    heading_vocabulary: Regex,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(TextRules::builtin())
    }
}

impl TextNormalizer {
    pub fn new(rules: TextRules) -> Self {
        let promo_patterns = rules
            .promo_markers
            .iter()
            .filter(|marker| !marker.trim().is_empty())
            .filter_map(|marker| match marker_regex(marker) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("TextNormalizer: skipping promo marker {:?}: {}", marker, e);
                    None
                }
            })
            .collect();
        Self {
            rules,
            promo_patterns,
            underscore_rule: Regex::new(r"\s*_{3,}\s*").expect("regex is valid"),
            hyphen_rule: Regex::new(r"\s*-{3,}\s*").expect("regex is valid"),
            post_results_boilerplate: Regex::new(r"(?i)\bpost\s+(?:loads?|work)\s+to\s+comments\.?")
                .expect("regex is valid"),
            post_comments_boilerplate: Regex::new(r"(?i)\bpost\s+to\s+comments\.?")
                .expect("regex is valid"),
            exposure_boilerplate: Regex::new(r"(?i)\bexposure\s+\d+\s+of\s+\d+\b")
                .expect("regex is valid"),
            post_to_comments_tail: Regex::new(r"(?i)post\s+.*comments").expect("regex is valid"),
            divider_only: Regex::new(r"^[_\-\s]+$").expect("regex is valid"),
            numbered_question: Regex::new(r"^\d+\.").expect("regex is valid"),
            weeks_one_two: Regex::new(r"weeks\s+1-2").expect("regex is valid"),
            heading_punctuation: Regex::new(r"[^\w\s]").expect("regex is valid"),
            heading_vocabulary: Regex::new(
                r"(press|squat|deadlift|clean|snatch|row|run|bike|burpee|swing|pull[- ]?up|push[- ]?up)",
            )
            .expect("regex is valid"),
        }
    }

    pub fn rules(&self) -> &TextRules {
        &self.rules
    }

    /// Normalized lowercase blob: the title followed by the filtered text.
    pub fn normalize(&self, title: &str, components: &[PostComponent]) -> String {
        let text = self.movement_text(components);
        format!("{} {}", title, text).trim().to_lowercase()
    }

    /// `true` when a heading names workout programming.
    ///
    /// Administrative headings (weekday schedules, news, recaps, upcoming
    /// cycles) never qualify, whatever else they contain.
    pub fn is_workout_heading(&self, heading: &str) -> bool {
        let normalized = self.normalize_heading(heading);
        !self.is_ignored_heading(&normalized) && self.names_workout(heading, &normalized)
    }

    /// `true` when a component should feed movement detection.
    pub fn is_workout_component(&self, component: &PostComponent) -> bool {
        let normalized = self.normalize_heading(&component.heading);
        if self.is_ignored_heading(&normalized) {
            return false;
        }
        self.names_workout(&component.heading, &normalized) || looks_like_workout(&component.details)
    }

    /// Filtered movement text, original casing, lines joined with spaces.
    ///
    /// Falls back to every component when none qualifies as workout content.
    /// Lines dropped by the filters stay dropped, so a post whose text is all
    /// schedule or promotion yields an empty string.
    pub fn movement_text(&self, components: &[PostComponent]) -> String {
        let selected: Vec<&PostComponent> = components
            .iter()
            .filter(|c| self.is_workout_component(c))
            .collect();
        let source: Vec<&PostComponent> = if selected.is_empty() {
            components.iter().collect()
        } else {
            selected
        };

        let mut lines: Vec<String> = Vec::new();
        for comp in &source {
            self.collect_lines(&comp.details, &mut lines);
        }
        if lines.is_empty() && !source.is_empty() {
            debug!("TextNormalizer: every line filtered out");
        }
        lines.join(" ")
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn normalize_heading(&self, heading: &str) -> String {
        let lower = heading.to_lowercase();
        self.heading_punctuation.replace_all(&lower, " ").into_owned()
    }

    /// Workout vocabulary in a heading, ignore list not consulted.
    fn names_workout(&self, heading: &str, normalized: &str) -> bool {
        component_tag(heading).is_some()
            || self.heading_vocabulary.is_match(normalized)
            || self
                .rules
                .workout_heading_keywords
                .iter()
                .any(|k| normalized.contains(k.as_str()))
    }

    /// Byte offset of the earliest promo marker in a raw line.
    fn promo_start(&self, line: &str) -> Option<usize> {
        self.promo_patterns
            .iter()
            .filter_map(|re| re.find(line))
            .map(|m| m.start())
            .min()
    }

    fn is_ignored_heading(&self, normalized_heading: &str) -> bool {
        self.rules
            .ignored_headings
            .iter()
            .any(|k| normalized_heading.contains(k.as_str()))
    }

    /// Split collapsed sections into lines at dividers and result-posting
    /// boilerplate.
    fn split_sections(&self, details: &str) -> String {
        let d = self.underscore_rule.replace_all(details, "\n");
        let d = self.hyphen_rule.replace_all(&d, "\n");
        let d = self.post_results_boilerplate.replace_all(&d, "\n");
        let d = self.post_comments_boilerplate.replace_all(&d, "\n");
        self.exposure_boilerplate.replace_all(&d, "\n").into_owned()
    }

    fn collect_lines(&self, details: &str, out: &mut Vec<String>) {
        let details = self.split_sections(details);

        for line in details.split('\n') {
            if line.trim().is_empty() {
                continue;
            }
            let lc = line.to_lowercase();
            let lc_norm = normalize_whitespace(&lc);

            if self.divider_only.is_match(&lc_norm) {
                continue;
            }
            if self.rules.future_markers.iter().any(|m| lc.contains(m.as_str())) {
                continue;
            }
            if lc.contains("trivia")
                || (self.numbered_question.is_match(lc.trim()) && line.contains('?'))
            {
                continue;
            }
            if let Some(idx) = self.promo_start(line) {
                // Everything after a promo marker belongs to the promotion.
                push_prefix(out, &line[..idx]);
                break;
            }
            if let Some(m) = self.post_to_comments_tail.find(line) {
                push_prefix(out, &line[..m.start()]);
                continue;
            }
            if lc_norm.contains("post") && lc_norm.contains("comments") {
                if let Some(idx) = find_ascii_ci(line, "post") {
                    push_prefix(out, &line[..idx]);
                }
                continue;
            }
            if self.weeks_one_two.is_match(&lc_norm) {
                break;
            }
            if lc_norm.contains("exposure") {
                if let Some(idx) = find_ascii_ci(line, "exposure") {
                    push_prefix(out, &line[..idx]);
                }
                continue;
            }
            if lc_norm.contains("whiteboard") && lc_norm.contains("yesterday") {
                continue;
            }
            out.push(line.trim().to_string());
        }
    }
}

fn push_prefix(out: &mut Vec<String>, prefix: &str) {
    let prefix = prefix.trim();
    if !prefix.is_empty() {
        out.push(prefix.to_string());
    }
}

/// Collapse whitespace runs, map non-breaking spaces and curly apostrophes.
fn normalize_whitespace(s: &str) -> String {
    s.replace('\u{a0}', " ")
        .replace(['\u{2019}', '\u{2018}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive pattern for a phrase that tolerates any whitespace run
/// between words and either apostrophe style.
fn marker_regex(marker: &str) -> Result<Regex, regex::Error> {
    let words: Vec<String> = marker
        .split_whitespace()
        .map(|w| regex::escape(w).replace('\'', "['\u{2018}\u{2019}]"))
        .collect();
    Regex::new(&format!(r"(?i){}", words.join(r"\s+")))
}

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let n = needle.len();
    haystack.char_indices().map(|(i, _)| i).find(|&i| {
        haystack
            .get(i..i + n)
            .is_some_and(|slice| slice.eq_ignore_ascii_case(needle))
    })
}
