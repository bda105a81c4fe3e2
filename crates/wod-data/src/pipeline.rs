//! Build pipeline.
//!
//! Loads the pattern library and raw posts, then produces the canonical
//! record stream together with every derived report.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use tracing::info;
use wod_core::error::Result;
use wod_core::models::{CanonicalRecord, RawPost};
use wod_core::normalizer::TextNormalizer;
use wod_core::patterns::PatternLibrary;
use wod_core::registries::{BenchmarkNames, TextRules};

use crate::aggregator::{aggregate, AggregateReport};
use crate::canonical::CanonicalBuilder;
use crate::comments::{analyze_comments, CommentRecord, CommentsAnalysis};
use crate::named::{NamedWorkoutMatcher, NamedWorkouts};
use crate::reader::{load_comment_counts, load_raw_posts, read_jsonl};

// ── Public types ──────────────────────────────────────────────────────────────

/// Where the build reads its inputs from.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub raw_dir: PathBuf,
    pub config_dir: PathBuf,
    /// Optional id → comment-count JSON object.
    pub comment_counts: Option<PathBuf>,
    /// Optional JSONL of normalized comments.
    pub comments: Option<PathBuf>,
}

/// Metadata produced alongside the build output.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BuildMetadata {
    /// ISO-8601 timestamp when this output was generated.
    pub generated_at: chrono::DateTime<Utc>,
    pub total_posts: usize,
    /// Non-rest-day records.
    pub total_workouts: usize,
    pub rest_days: usize,
    /// Wall-clock seconds spent loading inputs.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent building records and reports.
    pub transform_time_seconds: f64,
}

/// The complete output of [`run_build`].
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub records: Vec<CanonicalRecord>,
    pub aggregates: AggregateReport,
    pub named: NamedWorkouts,
    pub comments: Option<CommentsAnalysis>,
    pub metadata: BuildMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full build from disk.
///
/// A missing or malformed pattern library, or a missing raw snapshot, aborts
/// before any post is processed.
pub fn run_build(options: &BuildOptions) -> Result<BuildOutput> {
    let load_start = std::time::Instant::now();

    let library = PatternLibrary::load_from_dir(&options.config_dir)?;
    let posts = load_raw_posts(&options.raw_dir)?;
    let counts = match &options.comment_counts {
        Some(path) => load_comment_counts(path)?,
        None => HashMap::new(),
    };
    let comments: Option<Vec<CommentRecord>> = match &options.comments {
        Some(path) => Some(read_jsonl(path)?),
        None => None,
    };
    let load_time = load_start.elapsed().as_secs_f64();

    info!(
        "Loaded {} raw posts, {} movements, {} comment counts",
        posts.len(),
        library.len(),
        counts.len()
    );

    let mut output = build_from_posts(&posts, &library, &counts, comments.as_deref())?;
    output.metadata.load_time_seconds = load_time;
    Ok(output)
}

/// Build everything from in-memory inputs.
pub fn build_from_posts(
    posts: &[RawPost],
    library: &PatternLibrary,
    comment_counts: &HashMap<i64, u32>,
    comments: Option<&[CommentRecord]>,
) -> Result<BuildOutput> {
    let transform_start = std::time::Instant::now();
    let generated_at = Utc::now();

    let normalizer = TextNormalizer::new(TextRules::builtin());
    let matcher = NamedWorkoutMatcher::new(&BenchmarkNames::builtin())?;

    let records = CanonicalBuilder::new(library, &normalizer).build(posts, comment_counts);
    let aggregates = aggregate(&records);
    let named = matcher.build(&records);
    let comments = comments.map(|c| analyze_comments(&records, c, generated_at));

    let rest_days = records.iter().filter(|r| r.is_rest_day).count();
    let metadata = BuildMetadata {
        generated_at,
        total_posts: records.len(),
        total_workouts: records.len() - rest_days,
        rest_days,
        load_time_seconds: 0.0,
        transform_time_seconds: transform_start.elapsed().as_secs_f64(),
    };

    info!(
        "Build complete: {} posts, {} workouts, {} heroes, {} girls",
        metadata.total_posts,
        metadata.total_workouts,
        named.heroes.len(),
        named.girls.len()
    );

    Ok(BuildOutput {
        records,
        aggregates,
        named,
        comments,
        metadata,
    })
}
