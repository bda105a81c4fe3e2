//! Canonical record assembly.
//!
//! One immutable [`CanonicalRecord`] per raw post, followed by a global
//! ordering pass that assigns sequence numbers, workout numbers and
//! milestone labels.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};
use wod_core::classifiers::{component_tags, detect_format, is_rest_day, tag_movements};
use wod_core::dates::{derive_workout_date, extract_cycle_info};
use wod_core::models::{CanonicalRecord, Format, RawPost};
use wod_core::normalizer::TextNormalizer;
use wod_core::patterns::PatternLibrary;

/// Fixed workout-number milestones; the batch total is added at build time.
pub const MILESTONE_THRESHOLDS: [usize; 3] = [1000, 2500, 5000];

// ── CanonicalBuilder ──────────────────────────────────────────────────────────

/// Turns raw posts into canonical records using shared read-only registries.
pub struct CanonicalBuilder<'a> {
    library: &'a PatternLibrary,
    normalizer: &'a TextNormalizer,
}

impl<'a> CanonicalBuilder<'a> {
    pub fn new(library: &'a PatternLibrary, normalizer: &'a TextNormalizer) -> Self {
        Self {
            library,
            normalizer,
        }
    }

    /// Build and order records for a whole batch.
    ///
    /// Never fails: missing ids, dates or titles degrade to empty values and
    /// sort first.
    pub fn build(
        &self,
        posts: &[RawPost],
        comment_counts: &HashMap<i64, u32>,
    ) -> Vec<CanonicalRecord> {
        let mut records: Vec<CanonicalRecord> = posts
            .iter()
            .map(|p| self.build_record(p, comment_counts))
            .collect();
        assign_sequence(&mut records);
        info!(
            "CanonicalBuilder: built {} records ({} rest days)",
            records.len(),
            records.iter().filter(|r| r.is_rest_day).count()
        );
        records
    }

    /// Build one unordered record; `seq_no`, `workout_no` and `milestones`
    /// are left for [`assign_sequence`].
    pub fn build_record(&self, post: &RawPost, comment_counts: &HashMap<i64, u32>) -> CanonicalRecord {
        let title = post.title.clone().unwrap_or_default();
        let link = post.link.clone().unwrap_or_default();
        let post_date = post.post_date.clone().unwrap_or_default();
        let date = match post.date.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => derive_workout_date(
                &title,
                post.slug.as_deref().unwrap_or_default(),
                &link,
                &post_date,
            ),
        };
        let cycle_info = post.cycle_info.clone().unwrap_or_else(|| {
            let blob = post
                .components
                .iter()
                .map(|c| format!("{} {}", c.heading, c.details))
                .collect::<Vec<_>>()
                .join(" ");
            extract_cycle_info(&format!("{title} {blob}"))
        });
        let comment_count = post
            .id
            .and_then(|id| comment_counts.get(&id).copied())
            .or(post.comment_count)
            .unwrap_or(0);

        let mut record = CanonicalRecord {
            id: post.id,
            date,
            post_date,
            title,
            link,
            cycle_info,
            components: post.components.clone(),
            comment_count,
            ..Default::default()
        };

        if is_rest_day(&record.title, &record.components) {
            debug!("CanonicalBuilder: post {:?} is a rest day", record.id);
            record.is_rest_day = true;
            record.format = Format::None;
            return record;
        }

        let blob = self.normalizer.normalize(&record.title, &record.components);
        record.movements = tag_movements(&blob, self.library);
        record.format = detect_format(&blob);
        record.component_tags = component_tags(&record.components);
        record
    }
}

// ── Ordering ──────────────────────────────────────────────────────────────────

/// Sort by `(date, id)` and assign `seq_no`, `workout_no` and milestones.
///
/// Empty dates and missing ids sort first. The sort is stable, so records
/// with identical keys keep their input order.
pub fn assign_sequence(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| (a.date.as_str(), a.id.unwrap_or(0)).cmp(&(b.date.as_str(), b.id.unwrap_or(0))));

    let mut workout_no = 0usize;
    for (idx, record) in records.iter_mut().enumerate() {
        record.seq_no = idx + 1;
        record.milestones.clear();
        if record.is_rest_day {
            record.workout_no = None;
        } else {
            workout_no += 1;
            record.workout_no = Some(workout_no);
        }
    }

    let targets: BTreeSet<usize> = MILESTONE_THRESHOLDS
        .iter()
        .copied()
        .chain(std::iter::once(workout_no))
        .collect();
    for record in records.iter_mut() {
        if let Some(n) = record.workout_no.filter(|n| targets.contains(n)) {
            record.milestones.push(format!("{n}th workout"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wod_core::models::PostComponent;

    fn library() -> PatternLibrary {
        PatternLibrary::from_pairs(vec![
            ("deadlift", vec![r"\bdeadlifts?\b"]),
            ("run", vec![r"\brun(?:s|ning)?\b"]),
            ("thruster", vec![r"\bthrusters?\b"]),
        ])
        .unwrap()
    }

    fn post(id: i64, date: &str, title: &str, details: &str) -> RawPost {
        RawPost {
            id: Some(id),
            date: Some(date.to_string()),
            title: Some(title.to_string()),
            components: vec![PostComponent::new("Metcon", details)],
            ..Default::default()
        }
    }

    fn record(id: i64, date: &str, rest: bool) -> CanonicalRecord {
        CanonicalRecord {
            id: Some(id),
            date: date.to_string(),
            is_rest_day: rest,
            ..Default::default()
        }
    }

    // ── build_record ──────────────────────────────────────────────────────────

    #[test]
    fn test_build_record_tags_workout() {
        let lib = library();
        let normalizer = TextNormalizer::default();
        let builder = CanonicalBuilder::new(&lib, &normalizer);
        let rec = builder.build_record(
            &post(7, "2016-03-04", "WOD 3.4.16", "21-15-9 for time: Thrusters, Run 200m"),
            &HashMap::new(),
        );
        assert!(!rec.is_rest_day);
        assert_eq!(rec.movements, vec!["run", "thruster"]);
        assert_eq!(rec.format, Format::ForTime);
        assert_eq!(rec.component_tags, vec![wod_core::models::ComponentTag::Conditioning]);
        assert_eq!(rec.comment_count, 0);
    }

    #[test]
    fn test_build_record_rest_day_is_empty() {
        let lib = library();
        let normalizer = TextNormalizer::default();
        let builder = CanonicalBuilder::new(&lib, &normalizer);
        let rec = builder.build_record(
            &post(8, "2016-03-05", "Rest Day", "AMRAP 20: 10 deadlifts"),
            &HashMap::from([(8, 12)]),
        );
        assert!(rec.is_rest_day);
        assert!(rec.movements.is_empty());
        assert!(rec.component_tags.is_empty());
        assert_eq!(rec.format, Format::None);
        assert_eq!(rec.comment_count, 12);
    }

    #[test]
    fn test_build_record_recovers_missing_fields() {
        let lib = library();
        let normalizer = TextNormalizer::default();
        let builder = CanonicalBuilder::new(&lib, &normalizer);
        let rec = builder.build_record(&RawPost::default(), &HashMap::new());
        assert_eq!(rec.id, None);
        assert_eq!(rec.date, "");
        assert_eq!(rec.title, "");
        assert!(rec.movements.is_empty());
    }

    #[test]
    fn test_build_record_derives_date_and_cycle_info() {
        let lib = library();
        let normalizer = TextNormalizer::default();
        let builder = CanonicalBuilder::new(&lib, &normalizer);
        let raw = RawPost {
            id: Some(3),
            post_date: Some("2025-11-06T18:00:00".to_string()),
            title: Some("Friday 11-7-25".to_string()),
            components: vec![PostComponent::new("Strength (WK4/8)", "Deadlift 5x3")],
            comment_count: Some(2),
            ..Default::default()
        };
        let rec = builder.build_record(&raw, &HashMap::new());
        assert_eq!(rec.date, "2025-11-07");
        assert_eq!(rec.cycle_info, vec!["(WK4/8)"]);
        assert_eq!(rec.comment_count, 2);
    }

    // ── assign_sequence ───────────────────────────────────────────────────────

    #[test]
    fn test_assign_sequence_orders_and_numbers() {
        let mut records = vec![
            record(3, "2016-01-03", false),
            record(2, "2016-01-02", true),
            record(9, "", false),
            record(1, "2016-01-02", false),
        ];
        assign_sequence(&mut records);

        let ids: Vec<_> = records.iter().map(|r| r.id.unwrap()).collect();
        assert_eq!(ids, vec![9, 1, 2, 3]);
        let seq: Vec<_> = records.iter().map(|r| r.seq_no).collect();
        assert_eq!(seq, vec![1, 2, 3, 4]);
        let workout: Vec<_> = records.iter().map(|r| r.workout_no).collect();
        assert_eq!(workout, vec![Some(1), Some(2), None, Some(3)]);
    }

    #[test]
    fn test_assign_sequence_total_milestone() {
        let mut records = vec![
            record(1, "2016-01-01", false),
            record(2, "2016-01-02", false),
            record(3, "2016-01-03", true),
        ];
        assign_sequence(&mut records);
        assert!(records[0].milestones.is_empty());
        assert_eq!(records[1].milestones, vec!["2th workout"]);
        assert!(records[2].milestones.is_empty());
    }

    #[test]
    fn test_assign_sequence_fixed_milestones() {
        let mut records: Vec<CanonicalRecord> = (1..=1200)
            .map(|i| record(i, &format!("2010-01-01-{i:05}"), false))
            .collect();
        assign_sequence(&mut records);
        let labelled: Vec<(usize, &Vec<String>)> = records
            .iter()
            .filter(|r| !r.milestones.is_empty())
            .map(|r| (r.workout_no.unwrap(), &r.milestones))
            .collect();
        assert_eq!(labelled.len(), 2);
        assert_eq!(labelled[0].0, 1000);
        assert_eq!(labelled[0].1, &vec!["1000th workout".to_string()]);
        assert_eq!(labelled[1].0, 1200);
    }

    #[test]
    fn test_assign_sequence_is_idempotent() {
        let mut records = vec![record(2, "2016-01-02", false), record(1, "2016-01-01", false)];
        assign_sequence(&mut records);
        let first = records.clone();
        assign_sequence(&mut records);
        assert_eq!(records, first);
    }
}
