//! Benchmark ("Hero" and "Girl") workout recognition.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wod_core::classifiers::rep_scheme_summary;
use wod_core::error::{EtlError, Result};
use wod_core::models::CanonicalRecord;
use wod_core::registries::BenchmarkNames;

/// One dated appearance of a benchmark workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub date: String,
    pub title: String,
    pub link: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedWorkoutEntry {
    pub name: String,
    pub count: usize,
    pub latest_date: String,
    pub latest_link: String,
    /// Newest first.
    pub occurrences: Vec<Occurrence>,
}

/// The two benchmark registries, each sorted by `(-count, name)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedWorkouts {
    pub heroes: Vec<NamedWorkoutEntry>,
    pub girls: Vec<NamedWorkoutEntry>,
}

struct NamePattern {
    display: String,
    normalized: String,
    title_re: Regex,
}

/// Matches records against the curated benchmark names.
pub struct NamedWorkoutMatcher {
    heroes: Vec<NamePattern>,
    girls: Vec<NamePattern>,
    administrative: Vec<String>,
    non_alnum: Regex,
}

impl NamedWorkoutMatcher {
    pub fn new(names: &BenchmarkNames) -> Result<Self> {
        Ok(Self {
            heroes: compile_names(&names.heroes)?,
            girls: compile_names(&names.girls)?,
            administrative: names.administrative_headings.clone(),
            non_alnum: Regex::new(r"[^a-z0-9]+").expect("regex is valid"),
        })
    }

    /// Scan every record and group hits per benchmark name.
    pub fn build(&self, records: &[CanonicalRecord]) -> NamedWorkouts {
        let mut hero_hits: BTreeMap<&str, Vec<Occurrence>> = BTreeMap::new();
        let mut girl_hits: BTreeMap<&str, Vec<Occurrence>> = BTreeMap::new();

        for record in records {
            let title = record.title.to_lowercase();
            let headings = self.workout_headings(record);
            let summary = rep_scheme_summary(&record.components);

            for name in &self.heroes {
                let title_hit = name.title_re.is_match(&title);
                let heading_hit = headings.iter().any(|h| *h == name.normalized);
                if !(title_hit || heading_hit) {
                    continue;
                }
                if name.normalized == "murph" && !title_hit && !has_murph_signature(&summary) {
                    debug!(
                        "NamedWorkoutMatcher: heading-only murph without signature in {:?}",
                        record.title
                    );
                    continue;
                }
                hero_hits
                    .entry(name.display.as_str())
                    .or_default()
                    .push(occurrence(record, &summary));
            }

            for name in &self.girls {
                if name.title_re.is_match(&title) || headings.iter().any(|h| *h == name.normalized) {
                    girl_hits
                        .entry(name.display.as_str())
                        .or_default()
                        .push(occurrence(record, &summary));
                }
            }
        }

        NamedWorkouts {
            heroes: into_entries(hero_hits),
            girls: into_entries(girl_hits),
        }
    }

    /// Normalized headings of the record, administrative sections dropped.
    fn workout_headings(&self, record: &CanonicalRecord) -> Vec<String> {
        record
            .components
            .iter()
            .map(|c| c.heading.to_lowercase())
            .filter(|h| !h.is_empty())
            .filter(|h| !self.administrative.iter().any(|a| h.contains(a.as_str())))
            .map(|h| self.normalize(&h))
            .collect()
    }

    fn normalize(&self, text: &str) -> String {
        self.non_alnum
            .replace_all(&text.to_lowercase(), " ")
            .trim()
            .to_string()
    }
}

fn compile_names(names: &[String]) -> Result<Vec<NamePattern>> {
    let non_alnum = Regex::new(r"[^a-z0-9]+").expect("regex is valid");
    names
        .iter()
        .map(|name| {
            let escaped = regex::escape(name).replace(' ', r"\s+");
            let title_re = RegexBuilder::new(&format!(r"\b{escaped}\b"))
                .case_insensitive(true)
                .build()
                .map_err(|source| EtlError::PatternCompile {
                    label: name.clone(),
                    pattern: escaped.clone(),
                    source,
                })?;
            Ok(NamePattern {
                display: title_case(name),
                normalized: non_alnum
                    .replace_all(&name.to_lowercase(), " ")
                    .trim()
                    .to_string(),
                title_re,
            })
        })
        .collect()
}

/// Pull-up, push-up and squat triad, or the one-mile run bookends.
fn has_murph_signature(summary: &str) -> bool {
    let s = summary.to_lowercase();
    (s.contains("pull") && s.contains("push") && s.contains("squat"))
        || s.contains("1 mile")
        || s.contains("1-mile")
}

fn occurrence(record: &CanonicalRecord, summary: &str) -> Occurrence {
    Occurrence {
        date: record.date.clone(),
        title: record.title.clone(),
        link: record.link.clone(),
        summary: summary.to_string(),
    }
}

fn into_entries(hits: BTreeMap<&str, Vec<Occurrence>>) -> Vec<NamedWorkoutEntry> {
    let mut entries: Vec<NamedWorkoutEntry> = hits
        .into_iter()
        .filter_map(|(name, mut occurrences)| {
            occurrences.sort_by(|a, b| b.date.cmp(&a.date));
            let latest = occurrences.first()?.clone();
            Some(NamedWorkoutEntry {
                name: name.to_string(),
                count: occurrences.len(),
                latest_date: latest.date,
                latest_link: latest.link,
                occurrences,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries
}

/// `"tommy v"` → `"Tommy V"`.
fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wod_core::models::PostComponent;

    fn matcher() -> NamedWorkoutMatcher {
        NamedWorkoutMatcher::new(&BenchmarkNames::builtin()).unwrap()
    }

    fn rec(date: &str, title: &str, comps: &[(&str, &str)]) -> CanonicalRecord {
        CanonicalRecord {
            date: date.to_string(),
            title: title.to_string(),
            link: format!("https://example.com/{date}"),
            components: comps
                .iter()
                .map(|(h, d)| PostComponent::new(*h, *d))
                .collect(),
            ..Default::default()
        }
    }

    fn find<'a>(list: &'a [NamedWorkoutEntry], name: &str) -> Option<&'a NamedWorkoutEntry> {
        list.iter().find(|e| e.name == name)
    }

    // ── title and heading hits ────────────────────────────────────────────────

    #[test]
    fn test_title_hit_whole_word_only() {
        let named = matcher().build(&[
            rec("2016-05-30", "\"Murph\" | WOD 5.30.16", &[("Workout", "For time")]),
            rec("2016-06-01", "Murphys Law", &[]),
            rec("2016-06-02", "Francesca's PR party", &[]),
        ]);
        let murph = find(&named.heroes, "Murph").unwrap();
        assert_eq!(murph.count, 1);
        assert!(find(&named.heroes, "Murphy").is_none());
        assert!(find(&named.girls, "Fran").is_none());
    }

    #[test]
    fn test_heading_equality_hit() {
        let named = matcher().build(&[rec(
            "2025-11-13",
            "Thursday 11.13.25",
            &[("GRACE", "30 Clean and Jerks for time 135/95")],
        )]);
        let grace = find(&named.girls, "Grace").unwrap();
        assert_eq!(grace.occurrences[0].date, "2025-11-13");
        assert_eq!(grace.latest_link, "https://example.com/2025-11-13");
    }

    #[test]
    fn test_heading_must_equal_name() {
        let named = matcher().build(&[rec("2016-01-01", "WOD", &[("Grace Under Pressure", "3 rounds")])]);
        assert!(named.girls.is_empty());
    }

    #[test]
    fn test_multi_word_name_in_title() {
        let named = matcher().build(&[rec("2016-01-01", "Hero WOD: Tommy  V", &[])]);
        assert!(find(&named.heroes, "Tommy V").is_some());
    }

    // ── murph signature ───────────────────────────────────────────────────────

    #[test]
    fn test_tomorrow_murph_heading_not_counted() {
        let named = matcher().build(&[rec(
            "2016-05-29",
            "Sunday 5.29.16",
            &[
                ("Tomorrow: Memorial Day 'Murph'", "Come early, bring water"),
                ("Metcon", "AMRAP 12: 10 Burpees"),
            ],
        )]);
        assert!(find(&named.heroes, "Murph").is_none());
    }

    #[test]
    fn test_murph_heading_requires_signature() {
        let without = matcher().build(&[rec("2016-05-30", "Monday", &[("Murph", "Partner it up")])]);
        assert!(find(&without.heroes, "Murph").is_none());

        let with = matcher().build(&[rec(
            "2016-05-30",
            "Monday",
            &[("Murph", "1 Mile Run\n100 Pull-Ups\n200 Push-Ups\n300 Squats\n1 Mile Run")],
        )]);
        assert_eq!(find(&with.heroes, "Murph").unwrap().count, 1);
    }

    // ── grouping ──────────────────────────────────────────────────────────────

    #[test]
    fn test_grouping_sorted_newest_first_and_by_count() {
        let named = matcher().build(&[
            rec("2015-03-01", "Fran", &[]),
            rec("2017-03-01", "Fran", &[]),
            rec("2016-03-01", "Fran", &[]),
            rec("2016-04-01", "Cindy", &[]),
            rec("2016-04-02", "Angie", &[]),
        ]);
        let names: Vec<_> = named.girls.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Fran", "Angie", "Cindy"]);
        let fran = &named.girls[0];
        assert_eq!(fran.count, 3);
        assert_eq!(fran.latest_date, "2017-03-01");
        let dates: Vec<_> = fran.occurrences.iter().map(|o| o.date.as_str()).collect();
        assert_eq!(dates, vec!["2017-03-01", "2016-03-01", "2015-03-01"]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("lumberjack 20"), "Lumberjack 20");
        assert_eq!(title_case("dt"), "Dt");
    }
}
