//! Pure rule-based classifiers over post text.
//!
//! Every function here is deterministic: identical input always yields
//! identical output, and nothing touches shared state.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ComponentTag, Format, PostComponent};
use crate::patterns::PatternLibrary;

static STANDALONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("regex is valid"));

static CALORIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcal(?:ories)?\b").expect("regex is valid"));

static WORKOUT_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(row|run|bike|burpee|squat|deadlift|snatch|clean|press|pull[- ]?up|push[- ]?up|thruster|swing)",
    )
    .expect("regex is valid")
});

/// Keywords that mark a prescribed work block.
const SCHEME_KEYWORDS: &[&str] = &["amrap", "for time", "emom", "every", "interval", "tabata"];

/// Keywords that make a detail line part of the rep-scheme summary.
const SUMMARY_KEYWORDS: &[&str] = &[
    "amrap", "for time", "emom", "every", "round", "rounds", "minutes", "minute",
];

const SUMMARY_MAX_CHARS: usize = 400;
const SUMMARY_FALLBACK_CHARS: usize = 200;

// ── Movement tagger ───────────────────────────────────────────────────────────

/// Tag `text` with every canonical movement whose patterns match.
///
/// `text` is expected to be the normalized, lowercase blob. Two suppression
/// rules apply before matching:
/// * "set up like a clean" together with "deadlift the bar up" is coaching
///   language, so neither `clean` nor `deadlift` is tagged.
/// * "clean deadlift" / "snatch deadlift" are accessory variants, so plain
///   `deadlift` is not tagged.
pub fn tag_movements(text: &str, library: &PatternLibrary) -> Vec<String> {
    let text = text.to_lowercase();
    let instructional_cue =
        text.contains("set up like a clean") && text.contains("deadlift the bar up");
    let accessory_deadlift = text.contains("clean deadlift") || text.contains("snatch deadlift");

    let mut found: Vec<String> = Vec::new();
    for movement in library.iter() {
        let label = movement.label.as_str();
        if instructional_cue && (label == "clean" || label == "deadlift") {
            continue;
        }
        if accessory_deadlift && label == "deadlift" {
            continue;
        }
        if movement.is_match(&text) && !found.iter().any(|f| f == label) {
            found.push(label.to_string());
        }
    }
    found
}

// ── Workout heuristics ────────────────────────────────────────────────────────

/// `true` when free text reads like a workout prescription.
///
/// Matches a scheme keyword (AMRAP, EMOM, "for time", "every", intervals,
/// Tabata), calorie work on a bike or rower, or a standalone number next to
/// common movement vocabulary.
pub fn looks_like_workout(details: &str) -> bool {
    if details.is_empty() {
        return false;
    }
    let d = details.to_lowercase();
    if SCHEME_KEYWORDS.iter().any(|k| d.contains(k)) {
        return true;
    }
    if CALORIES.is_match(&d) && (d.contains("bike") || d.contains("row")) {
        return true;
    }
    STANDALONE_NUMBER.is_match(&d) && WORKOUT_VOCABULARY.is_match(&d)
}

// ── Rest-day detector ─────────────────────────────────────────────────────────

/// Decide whether a post prescribes no workout.
///
/// The title wins outright. Otherwise only the first two components are
/// inspected, because later sections routinely recap "Yesterday's
/// Whiteboard: Rest Day".
pub fn is_rest_day(title: &str, components: &[PostComponent]) -> bool {
    if title.to_lowercase().contains("rest day") {
        return true;
    }

    let intro = components
        .iter()
        .take(2)
        .map(|c| format!("{} {}", c.heading, c.details).trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if !intro.contains("rest day") {
        return false;
    }
    !looks_like_workout(&intro)
}

// ── Component tagger ──────────────────────────────────────────────────────────

/// Classify a component heading by fixed keyword priority.
///
/// "floater strength" is checked before "strength" since one contains the other.
pub fn component_tag(heading: &str) -> Option<ComponentTag> {
    let h = heading.to_lowercase();
    if h.contains("floater strength") {
        Some(ComponentTag::FloaterStrength)
    } else if h.contains("strength") {
        Some(ComponentTag::Strength)
    } else if h.contains("assistance") || h.contains("accessory") || h.contains("bodybuilding") {
        Some(ComponentTag::Assistance)
    } else if h.contains("metcon") || h.contains("conditioning") || h.contains("workout") {
        Some(ComponentTag::Conditioning)
    } else if h.contains("partner") || h.contains("team") {
        Some(ComponentTag::Partner)
    } else {
        None
    }
}

/// Union of the non-empty tags of every component, in tag order.
pub fn component_tags(components: &[PostComponent]) -> Vec<ComponentTag> {
    components
        .iter()
        .filter_map(|c| component_tag(&c.heading))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── Format detector ───────────────────────────────────────────────────────────

/// First matching format in priority order: AMRAP, for time, EMOM, interval.
pub fn detect_format(text: &str) -> Format {
    let t = text.to_lowercase();
    if t.contains("amrap") {
        Format::Amrap
    } else if t.contains("for time") {
        Format::ForTime
    } else if t.contains("emom") || t.contains("every minute") {
        Format::Emom
    } else if t.contains("interval") || t.contains("tabata") {
        Format::Interval
    } else {
        Format::None
    }
}

// ── Rep-scheme summary ────────────────────────────────────────────────────────

/// Short human-readable summary of a post's prescription.
///
/// Collects every detail line that carries a digit or a scheme keyword as
/// `"heading: line"`, joined with `" | "` and capped at 400 characters. When
/// no line qualifies, falls back to the first component's `"heading: details"`
/// capped at 200 characters.
pub fn rep_scheme_summary(components: &[PostComponent]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for comp in components {
        for line in comp.details.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let lc = line.to_lowercase();
            if SUMMARY_KEYWORDS.iter().any(|k| lc.contains(k))
                || line.chars().any(|c| c.is_ascii_digit())
            {
                let joined = format!("{}: {}", comp.heading, line);
                lines.push(joined.trim_matches(|c| c == ':' || c == ' ').to_string());
            }
        }
    }

    if !lines.is_empty() {
        return truncate_chars(&lines.join(" | "), SUMMARY_MAX_CHARS);
    }
    match components.first() {
        Some(first) => truncate_chars(
            &format!("{}: {}", first.heading, first.details),
            SUMMARY_FALLBACK_CHARS,
        ),
        None => String::new(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> PatternLibrary {
        PatternLibrary::from_pairs(vec![
            ("clean", vec![r"\bcleans?\b"]),
            ("deadlift", vec![r"\bdeadlifts?\b"]),
            ("bench press", vec![r"\bbench\s+press(?:es)?\b"]),
            ("burpee", vec![r"\bburpees?\b", r"\bbar[- ]facing\s+burpees?\b"]),
        ])
        .unwrap()
    }

    fn comp(h: &str, d: &str) -> PostComponent {
        PostComponent::new(h, d)
    }

    // ── tag_movements ─────────────────────────────────────────────────────────

    #[test]
    fn test_tag_movements_basic() {
        let tags = tag_movements("5x3 deadlift then 50 burpees", &library());
        assert_eq!(tags, vec!["deadlift", "burpee"]);
    }

    #[test]
    fn test_tag_movements_instructional_cue_suppresses_clean_and_deadlift() {
        let text = "bench press superset. set up like a clean and deadlift the bar up.";
        let tags = tag_movements(text, &library());
        assert_eq!(tags, vec!["bench press"]);
    }

    #[test]
    fn test_tag_movements_clean_deadlift_keeps_clean_only() {
        let tags = tag_movements("clean deadlift 3x3 then power cleans", &library());
        assert_eq!(tags, vec!["clean"]);
        let tags = tag_movements("snatch deadlift 3x3", &library());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_tag_movements_is_idempotent_and_deduplicated() {
        let text = "burpees, bar-facing burpees and more burpees";
        let first = tag_movements(text, &library());
        let second = tag_movements(text, &library());
        assert_eq!(first, second);
        assert_eq!(first, vec!["burpee"]);
    }

    #[test]
    fn test_tag_movements_empty_text() {
        assert!(tag_movements("", &library()).is_empty());
    }

    // ── looks_like_workout ────────────────────────────────────────────────────

    #[test]
    fn test_looks_like_workout() {
        assert!(looks_like_workout("AMRAP in 12 minutes"));
        assert!(looks_like_workout("Max cal bike"));
        assert!(looks_like_workout("5 rounds: 10 thrusters"));
        assert!(!looks_like_workout("Come hang out at the barbecue"));
        assert!(!looks_like_workout("Clean | Deadlifts, Burpees"));
        assert!(!looks_like_workout(""));
    }

    // ── is_rest_day ───────────────────────────────────────────────────────────

    #[test]
    fn test_rest_day_title_always_wins() {
        let comps = vec![comp("METCON", "AMRAP 20: 5 pull-ups, 10 push-ups")];
        assert!(is_rest_day("Rest Day", &comps));
        assert!(is_rest_day("Sunday REST DAY 6.1.14", &[]));
    }

    #[test]
    fn test_rest_day_intro_without_workout() {
        let comps = vec![comp("", "Today is a rest day. Go for a walk.")];
        assert!(is_rest_day("Sunday 6.1.14", &comps));
    }

    #[test]
    fn test_rest_day_mention_inside_amrap_is_not_rest() {
        let comps = vec![comp(
            "METCON",
            "AMRAP 15: 10 burpees, 15 kb swings. Yesterday was a rest day.",
        )];
        assert!(!is_rest_day("Monday 6.2.14", &comps));
    }

    #[test]
    fn test_rest_day_mention_after_second_component_ignored() {
        let comps = vec![
            comp("STRENGTH", "Back squat 5x5"),
            comp("METCON", "21-15-9 thrusters and pull-ups"),
            comp("Yesterday's Whiteboard", "Rest Day"),
        ];
        assert!(!is_rest_day("Tuesday 6.3.14", &comps));
    }

    // ── component_tag ─────────────────────────────────────────────────────────

    #[test]
    fn test_component_tag_priority() {
        assert_eq!(component_tag("FLOATER STRENGTH"), Some(ComponentTag::FloaterStrength));
        assert_eq!(component_tag("Strength"), Some(ComponentTag::Strength));
        assert_eq!(component_tag("Accessory work"), Some(ComponentTag::Assistance));
        assert_eq!(component_tag("Team Workout"), Some(ComponentTag::Conditioning));
        assert_eq!(component_tag("Partner WOD"), Some(ComponentTag::Partner));
        assert_eq!(component_tag("News and Notes"), None);
    }

    #[test]
    fn test_component_tags_union_is_sorted_and_unique() {
        let comps = vec![
            comp("METCON", ""),
            comp("Strength", ""),
            comp("Conditioning", ""),
            comp("Announcements", ""),
        ];
        assert_eq!(
            component_tags(&comps),
            vec![ComponentTag::Strength, ComponentTag::Conditioning]
        );
    }

    // ── detect_format ─────────────────────────────────────────────────────────

    #[test]
    fn test_detect_format_priority() {
        assert_eq!(detect_format("AMRAP 10 then 3 rounds for time"), Format::Amrap);
        assert_eq!(detect_format("3 Rounds For Time"), Format::ForTime);
        assert_eq!(detect_format("Every minute on the minute"), Format::Emom);
        assert_eq!(detect_format("Tabata squats"), Format::Interval);
        assert_eq!(detect_format("Back squat 5x5"), Format::None);
    }

    // ── rep_scheme_summary ────────────────────────────────────────────────────

    #[test]
    fn test_rep_scheme_summary_prefers_scheme_lines() {
        let comps = vec![
            comp("Metcon", "For Time:\n30 Snatches\nNotes etc."),
            comp("Strength", "3x5 Back Squat"),
        ];
        let summary = rep_scheme_summary(&comps);
        assert_eq!(
            summary,
            "Metcon: For Time | Metcon: 30 Snatches | Strength: 3x5 Back Squat"
        );
    }

    #[test]
    fn test_rep_scheme_summary_strips_empty_heading() {
        let comps = vec![comp("", "10 burpees")];
        assert_eq!(rep_scheme_summary(&comps), "10 burpees");
    }

    #[test]
    fn test_rep_scheme_summary_fallback_and_truncation() {
        let long = "x".repeat(500);
        let comps = vec![comp("Notes", &long)];
        let summary = rep_scheme_summary(&comps);
        assert_eq!(summary.chars().count(), 200);
        assert!(summary.starts_with("Notes: x"));

        let many: Vec<PostComponent> = (0..100).map(|i| comp("Metcon", &format!("{i} reps"))).collect();
        assert_eq!(rep_scheme_summary(&many).chars().count(), 400);
        assert_eq!(rep_scheme_summary(&[]), "");
    }
}
