use chrono::NaiveDate;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::dates::parse_iso_date;
use crate::error::{EtlError, Result};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Canonicalize and tag the workout-blog archive
#[derive(Parser, Debug, Clone)]
#[command(
    name = "wod-etl",
    about = "Canonicalize and tag the workout-blog archive",
    version
)]
pub struct Settings {
    /// Pipeline to run
    #[arg(long, default_value = "build", value_parser = ["build", "tag"])]
    pub mode: String,

    /// Directory holding raw post JSONL files
    #[arg(long, default_value = "data/raw")]
    pub raw_dir: PathBuf,

    /// Directory receiving derived artifacts
    #[arg(long, default_value = "data/derived")]
    pub derived_dir: PathBuf,

    /// Directory holding movements.yml
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// JSON object mapping post id to comment count
    #[arg(long)]
    pub comment_counts: Option<PathBuf>,

    /// JSONL file of normalized comments for the comments analysis
    #[arg(long)]
    pub comments: Option<PathBuf>,

    /// Oracle model name
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// Oracle response token cap
    #[arg(long, default_value = "800")]
    pub max_tokens: u32,

    /// Oracle request timeout in seconds
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout_s: u64,

    /// Oracle attempts per post before giving up
    #[arg(long, default_value = "6", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Concurrent oracle workers
    #[arg(long, default_value = "6", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub workers: u32,

    /// First workout date to tag (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Last workout date to tag (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Stop after this many candidate posts
    #[arg(long)]
    pub max_posts: Option<usize>,

    /// Reconcile disagreements with a second oracle pass
    #[arg(long)]
    pub judge: bool,

    /// Run the judge on every post, not only disagreements
    #[arg(long)]
    pub judge_all: bool,

    /// Model for the judge pass (defaults to --model)
    #[arg(long)]
    pub judge_model: Option<String>,

    /// Skip posts already present in the tagging log
    #[arg(long)]
    pub resume: bool,

    /// Truncate existing tagging logs before the run
    #[arg(long, conflicts_with = "resume")]
    pub overwrite: bool,

    /// Directory for per-post oracle responses
    #[arg(long, default_value = "data/llm_cache")]
    pub cache_dir: PathBuf,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and validate them.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn load_from_args(args: Vec<OsString>) -> Result<Self> {
        let settings = Settings::try_parse_from(args).map_err(|e| EtlError::Config(e.to_string()))?;
        settings.resolve()
    }

    /// Apply `--debug` and check the tagging date window.
    pub fn resolve(mut self) -> Result<Self> {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        let (start, end) = self.date_window()?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(EtlError::Config(format!(
                    "--start-date {s} is after --end-date {e}"
                )));
            }
        }
        Ok(self)
    }

    /// Inclusive tagging window, parsed.
    pub fn date_window(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        Ok((
            parse_bound("--start-date", self.start_date.as_deref())?,
            parse_bound("--end-date", self.end_date.as_deref())?,
        ))
    }

    /// Judge pass requested, either on disagreements or for every post.
    pub fn judge_enabled(&self) -> bool {
        self.judge || self.judge_all
    }

    /// Model used for the judge pass.
    pub fn judge_model(&self) -> &str {
        self.judge_model.as_deref().unwrap_or(&self.model)
    }
}

fn parse_bound(flag: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(s) => parse_iso_date(s)
            .filter(|_| s.len() == 10)
            .map(Some)
            .ok_or_else(|| EtlError::Config(format!("{flag} must be YYYY-MM-DD, got {s:?}"))),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
