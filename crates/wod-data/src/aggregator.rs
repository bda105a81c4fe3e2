//! Cross-record statistics over the canonical stream.
//!
//! One pass over the records feeds every summary; each summary is an
//! independently owned value inside [`AggregateReport`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use wod_core::classifiers::rep_scheme_summary;
use wod_core::dates::parse_iso_date;
use wod_core::models::CanonicalRecord;

pub const TOP_MOVEMENTS_LIMIT: usize = 100;
pub const TOP_PAIRS_LIMIT: usize = 200;

// ── Report types ──────────────────────────────────────────────────────────────

/// Number of distinct records tagged with a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDays {
    pub movement: String,
    pub days: usize,
}

/// Co-occurrence count for a lexicographically ordered movement pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    pub a: String,
    pub b: String,
    pub count: usize,
}

/// One calendar occurrence of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub day: u32,
    pub date: String,
    pub title: String,
    pub summary: String,
    pub link: String,
}

pub type YearMonthCounts = BTreeMap<i32, BTreeMap<u32, usize>>;
pub type YearMonthEntries = BTreeMap<i32, BTreeMap<u32, Vec<CalendarEntry>>>;

/// Read-only statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub top_movements: Vec<MovementDays>,
    pub top_pairs: Vec<PairCount>,
    /// Records per year (`"2016"`), dated records only.
    pub yearly_counts: BTreeMap<String, usize>,
    /// Records per weekday name (`"Monday"`), dated records only.
    pub weekday_counts: BTreeMap<String, usize>,
    pub movement_yearly: BTreeMap<String, BTreeMap<String, usize>>,
    pub movement_weekday: BTreeMap<String, BTreeMap<String, usize>>,
    pub movement_monthly: BTreeMap<String, YearMonthCounts>,
    pub movement_calendar: BTreeMap<String, YearMonthEntries>,
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// Build every summary in one pass.
///
/// Records without a parseable ISO date still count toward movement and pair
/// totals but are left out of the date-keyed summaries.
pub fn aggregate(records: &[CanonicalRecord]) -> AggregateReport {
    let mut report = AggregateReport::default();
    let mut movement_days: HashMap<&str, usize> = HashMap::new();
    let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();

    for record in records {
        let movements: BTreeSet<&str> = record.movements.iter().map(String::as_str).collect();
        let dated = parse_iso_date(&record.date);

        if let Some(date) = dated {
            *report.yearly_counts.entry(date.year().to_string()).or_default() += 1;
            *report
                .weekday_counts
                .entry(date.format("%A").to_string())
                .or_default() += 1;
        }

        let summary = match (dated, movements.is_empty()) {
            (Some(_), false) => rep_scheme_summary(&record.components),
            _ => String::new(),
        };

        for &m in &movements {
            *movement_days.entry(m).or_default() += 1;

            let Some(date) = dated else { continue };
            let (year, month) = (date.year(), date.month());
            *report
                .movement_yearly
                .entry(m.to_string())
                .or_default()
                .entry(year.to_string())
                .or_default() += 1;
            *report
                .movement_weekday
                .entry(m.to_string())
                .or_default()
                .entry(date.format("%A").to_string())
                .or_default() += 1;
            *report
                .movement_monthly
                .entry(m.to_string())
                .or_default()
                .entry(year)
                .or_default()
                .entry(month)
                .or_default() += 1;
            report
                .movement_calendar
                .entry(m.to_string())
                .or_default()
                .entry(year)
                .or_default()
                .entry(month)
                .or_default()
                .push(CalendarEntry {
                    day: date.day(),
                    date: record.date.clone(),
                    title: record.title.clone(),
                    summary: summary.clone(),
                    link: record.link.clone(),
                });
        }

        // BTreeSet iteration is sorted, so (a, b) is already ordered.
        let sorted: Vec<&str> = movements.into_iter().collect();
        for (i, &a) in sorted.iter().enumerate() {
            for &b in &sorted[i + 1..] {
                *pair_counts.entry((a, b)).or_default() += 1;
            }
        }
    }

    report.top_movements = top_movements(movement_days);
    report.top_pairs = top_pairs(pair_counts);
    report
}

/// Descending by count, then by name.
fn top_movements(counts: HashMap<&str, usize>) -> Vec<MovementDays> {
    let mut rows: Vec<MovementDays> = counts
        .into_iter()
        .map(|(m, days)| MovementDays {
            movement: m.to_string(),
            days,
        })
        .collect();
    rows.sort_by(|x, y| y.days.cmp(&x.days).then_with(|| x.movement.cmp(&y.movement)));
    rows.truncate(TOP_MOVEMENTS_LIMIT);
    rows
}

/// Descending by count, then by `(a, b)`.
fn top_pairs(counts: HashMap<(&str, &str), usize>) -> Vec<PairCount> {
    let mut rows: Vec<PairCount> = counts
        .into_iter()
        .map(|((a, b), count)| PairCount {
            a: a.to_string(),
            b: b.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|x, y| {
        y.count
            .cmp(&x.count)
            .then_with(|| (&x.a, &x.b).cmp(&(&y.a, &y.b)))
    });
    rows.truncate(TOP_PAIRS_LIMIT);
    rows
}
