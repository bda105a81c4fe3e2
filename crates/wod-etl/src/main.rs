mod bootstrap;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use wod_core::models::CanonicalRecord;
use wod_core::normalizer::TextNormalizer;
use wod_core::patterns::PatternLibrary;
use wod_core::settings::Settings;
use wod_data::pipeline::{run_build, BuildOptions};
use wod_data::reader::read_jsonl;
use wod_data::writer::{write_artifacts, WORKOUTS_FILE};
use wod_runtime::classifier::{OracleClassifier, RuleBasedClassifier};
use wod_runtime::client::{OpenAiTransport, OracleConfig};
use wod_runtime::pool::{TagRunOptions, TaggingRun};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match Settings::try_parse() {
        Ok(parsed) => parsed.resolve()?,
        Err(e) => e.exit(),
    };

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("wod-etl v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Mode: {}, raw: {}, derived: {}",
        settings.mode,
        settings.raw_dir.display(),
        settings.derived_dir.display()
    );

    match settings.mode.as_str() {
        "build" => build(&settings),
        "tag" => tag(&settings).await,
        unknown => anyhow::bail!("Unknown mode: {unknown}"),
    }
}

fn build(settings: &Settings) -> Result<()> {
    bootstrap::ensure_directories(&[&settings.derived_dir])?;

    let output = run_build(&BuildOptions {
        raw_dir: settings.raw_dir.clone(),
        config_dir: settings.config_dir.clone(),
        comment_counts: settings.comment_counts.clone(),
        comments: settings.comments.clone(),
    })
    .context("build failed")?;

    let written = write_artifacts(&output, &settings.derived_dir)?;
    tracing::info!(
        "Build finished: {} posts, {} workouts, {} rest days, {} files (load {:.2}s, transform {:.2}s)",
        output.metadata.total_posts,
        output.metadata.total_workouts,
        output.metadata.rest_days,
        written.len(),
        output.metadata.load_time_seconds,
        output.metadata.transform_time_seconds
    );
    Ok(())
}

async fn tag(settings: &Settings) -> Result<()> {
    // Credentials are checked before any input is touched.
    let transport = OpenAiTransport::from_env()?;
    let library = Arc::new(PatternLibrary::load_from_dir(&settings.config_dir)?);

    let workouts = settings.derived_dir.join(WORKOUTS_FILE);
    if !workouts.is_file() {
        anyhow::bail!(
            "Missing {}; run with --mode build first",
            workouts.display()
        );
    }
    let records: Vec<CanonicalRecord> = read_jsonl(&workouts)?;
    bootstrap::ensure_directories(&[&settings.derived_dir, &settings.cache_dir])?;

    let oracle = OracleClassifier::new(
        transport,
        Arc::clone(&library),
        OracleConfig::from_settings(settings),
        OracleConfig::judge_from_settings(settings),
    );
    let rules = RuleBasedClassifier::new(library, TextNormalizer::default());
    let options = TagRunOptions::from_settings(settings)?;

    let summary = TaggingRun::new(oracle, rules, options).run(&records).await?;
    tracing::info!(
        "Tagging finished: {} candidates, {} tagged, {} judged, {} failed",
        summary.candidates,
        summary.tagged,
        summary.judged,
        summary.failed
    );
    Ok(())
}
