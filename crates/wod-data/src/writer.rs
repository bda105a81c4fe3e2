//! Derived-artifact output.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use wod_core::classifiers::rep_scheme_summary;
use wod_core::error::Result;
use wod_core::models::{CanonicalRecord, ComponentTag, Format};

use crate::pipeline::BuildOutput;

pub const WORKOUTS_FILE: &str = "workouts.jsonl";
pub const SEARCH_INDEX_FILE: &str = "search_index.json";
pub const DATA_VERSION_FILE: &str = "data_version.json";
pub const NAMED_WORKOUTS_FILE: &str = "named_workouts.json";
pub const COMMENTS_ANALYSIS_FILE: &str = "comments_analysis.json";

/// Lightweight per-record row for client-side search.
#[derive(Debug, Serialize)]
pub struct SearchEntry<'a> {
    pub id: Option<i64>,
    pub seq_no: usize,
    pub workout_no: Option<usize>,
    pub milestones: &'a [String],
    pub date: &'a str,
    pub title: &'a str,
    pub link: &'a str,
    pub summary: String,
    pub movements: &'a [String],
    pub component_tags: &'a [ComponentTag],
    pub format: Format,
    pub cycle_info: &'a [String],
}

impl<'a> From<&'a CanonicalRecord> for SearchEntry<'a> {
    fn from(r: &'a CanonicalRecord) -> Self {
        SearchEntry {
            id: r.id,
            seq_no: r.seq_no,
            workout_no: r.workout_no,
            milestones: &r.milestones,
            date: &r.date,
            title: &r.title,
            link: &r.link,
            summary: rep_scheme_summary(&r.components),
            movements: &r.movements,
            component_tags: &r.component_tags,
            format: r.format,
            cycle_info: &r.cycle_info,
        }
    }
}

#[derive(Debug, Serialize)]
struct DataVersion {
    generated_at: String,
    total_workouts: usize,
    total_posts: usize,
}

/// Write every artifact of `output` into `derived_dir`, creating it if needed.
///
/// Returns the paths written, in write order.
pub fn write_artifacts(output: &BuildOutput, derived_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(derived_dir)?;
    let mut written = Vec::new();

    let workouts_path = derived_dir.join(WORKOUTS_FILE);
    let mut buf = Vec::new();
    for record in &output.records {
        serde_json::to_writer(&mut buf, record)?;
        buf.write_all(b"\n")?;
    }
    write_atomic(&workouts_path, &buf)?;
    written.push(workouts_path);

    let agg = &output.aggregates;
    let documents: [(&str, serde_json::Value); 8] = [
        ("top_movements", serde_json::to_value(&agg.top_movements)?),
        ("top_pairs", serde_json::to_value(&agg.top_pairs)?),
        ("yearly_counts", serde_json::to_value(&agg.yearly_counts)?),
        ("weekday_counts", serde_json::to_value(&agg.weekday_counts)?),
        ("movement_yearly", serde_json::to_value(&agg.movement_yearly)?),
        ("movement_weekday", serde_json::to_value(&agg.movement_weekday)?),
        ("movement_monthly", serde_json::to_value(&agg.movement_monthly)?),
        ("movement_calendar", serde_json::to_value(&agg.movement_calendar)?),
    ];
    for (name, value) in documents {
        written.push(write_json(derived_dir, &format!("{name}.json"), &value, true)?);
    }

    let search: Vec<SearchEntry<'_>> = output.records.iter().map(SearchEntry::from).collect();
    written.push(write_json(derived_dir, SEARCH_INDEX_FILE, &search, false)?);

    let version = DataVersion {
        generated_at: output
            .metadata
            .generated_at
            .format("%Y-%m-%dT%H:%M:%S%.6fZ")
            .to_string(),
        total_workouts: output.metadata.total_workouts,
        total_posts: output.metadata.total_posts,
    };
    written.push(write_json(derived_dir, DATA_VERSION_FILE, &version, true)?);

    written.push(write_json(derived_dir, NAMED_WORKOUTS_FILE, &output.named, true)?);

    if let Some(comments) = &output.comments {
        written.push(write_json(derived_dir, COMMENTS_ANALYSIS_FILE, comments, true)?);
    }

    info!(
        "Wrote {} artifacts ({} records) to {}",
        written.len(),
        output.records.len(),
        derived_dir.display()
    );
    Ok(written)
}

fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    name: &str,
    value: &T,
    pretty: bool,
) -> Result<PathBuf> {
    let path = dir.join(name);
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    write_atomic(&path, &bytes)?;
    Ok(path)
}

/// Write to a sibling temp file then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
