//! Workout-date helpers.
//!
//! Posts are usually published the evening before the workout they describe,
//! so the intended date is recovered from the title, slug or permalink.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

static TITLE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})[./-](\d{1,2})[./-](\d{2,4})").expect("regex is valid")
});

static LINK_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(20\d{2})/(\d{2})/(\d{2})/").expect("regex is valid"));

static CYCLE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((?:wk|week)\s*\d+\s*/\s*\d+\)").expect("regex is valid")
});

/// Earliest plausible year for a date typed into a title.
const EARLIEST_TITLE_YEAR: i32 = 2007;
/// How far past the publish year a title date may lie before it is a typo.
const MAX_YEARS_AHEAD: i32 = 2;

/// Parse the leading `YYYY-MM-DD` of an ISO date or datetime string.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Recover the intended workout date of a post.
///
/// Tries the first `M.D.Y` style date in the title, then in the slug, then
/// the `/YYYY/MM/DD/` segment of the permalink, and finally falls back to
/// `publish_date` unchanged.
pub fn derive_workout_date(title: &str, slug: &str, link: &str, publish_date: &str) -> String {
    let publish_year = parse_iso_date(publish_date).map(|d| d.year());

    let from_title = parse_month_day_year(title).or_else(|| parse_month_day_year(slug));
    if let Some(date) = from_title {
        let plausible = match publish_year {
            Some(py) => date.year() - py <= MAX_YEARS_AHEAD && date.year() >= EARLIEST_TITLE_YEAR,
            None => true,
        };
        if plausible {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    if let Some(caps) = LINK_DATE.captures(link) {
        let (y, m, d) = (&caps[1], &caps[2], &caps[3]);
        let ymd = format!("{y}-{m}-{d}");
        if parse_iso_date(&ymd).is_some() {
            return ymd;
        }
    }

    publish_date.get(..10).unwrap_or(publish_date).to_string()
}

/// Unique `(WK4/8)` style training-cycle markers, in order of appearance.
pub fn extract_cycle_info(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for m in CYCLE_MARKER.find_iter(text) {
        let marker = m.as_str().trim().to_string();
        if !seen.contains(&marker) {
            seen.push(marker);
        }
    }
    seen
}

fn parse_month_day_year(text: &str) -> Option<NaiveDate> {
    let caps = TITLE_DATE.captures(text)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let raw_year = &caps[3];
    let mut year: i32 = raw_year.parse().ok()?;
    if raw_year.len() == 2 {
        year += if year < 70 { 2000 } else { 1900 };
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_iso_date ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_iso_date_accepts_datetime_suffix() {
        assert_eq!(
            parse_iso_date("2025-11-06T12:00:00"),
            NaiveDate::from_ymd_opt(2025, 11, 6)
        );
        assert_eq!(parse_iso_date("2016-02-29"), NaiveDate::from_ymd_opt(2016, 2, 29));
    }

    #[test]
    fn test_parse_iso_date_rejects_garbage() {
        assert_eq!(parse_iso_date(""), None);
        assert_eq!(parse_iso_date("2015-13-01"), None);
        assert_eq!(parse_iso_date("not a date"), None);
    }

    // ── derive_workout_date ───────────────────────────────────────────────────

    #[test]
    fn test_title_date_preferred() {
        let d = derive_workout_date(
            "Friday 11-7-25",
            "friday-11-7-25",
            "https://example.com/workout-of-the-day/2025/11/06/friday-11-7-25.html/",
            "2025-11-06",
        );
        assert_eq!(d, "2025-11-07");
    }

    #[test]
    fn test_slug_used_when_title_has_no_date() {
        let d = derive_workout_date("Fran", "fran-wod-3.4.16", "", "2016-03-03");
        assert_eq!(d, "2016-03-04");
    }

    #[test]
    fn test_implausible_title_year_falls_back_to_link() {
        // 2.1.99 parses as 1999, before the blog existed.
        let d = derive_workout_date(
            "WOD 2.1.99",
            "",
            "https://example.com/2014/02/01/wod/",
            "2014-01-31",
        );
        assert_eq!(d, "2014-02-01");
    }

    #[test]
    fn test_far_future_title_year_falls_back_to_publish_date() {
        let d = derive_workout_date("WOD 5.5.2030", "", "", "2015-05-04T20:00:00");
        assert_eq!(d, "2015-05-04");
    }

    #[test]
    fn test_invalid_calendar_date_ignored() {
        let d = derive_workout_date("WOD 13.45.15", "", "", "2015-01-01");
        assert_eq!(d, "2015-01-01");
    }

    // ── extract_cycle_info ────────────────────────────────────────────────────

    #[test]
    fn test_extract_cycle_info_unique_in_order() {
        let text = "Back Squat (WK4/8) then Deadlift (Week 2 / 6) and again (WK4/8)";
        assert_eq!(extract_cycle_info(text), vec!["(WK4/8)", "(Week 2 / 6)"]);
        assert!(extract_cycle_info("no markers").is_empty());
    }
}
