//! Bounded-concurrency tagging run.
//!
//! Every candidate post is classified (and optionally judged) by its own
//! task, with at most `workers` tasks in flight. Results are appended to
//! per-pass JSONL logs, each guarded by its own lock, and cached per post id
//! so an interrupted run can resume. Once the pool drains, the JSON arrays
//! consumed downstream are regenerated from the logs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wod_core::dates::parse_iso_date;
use wod_core::error::Result;
use wod_core::models::CanonicalRecord;
use wod_core::patterns::PatternLibrary;
use wod_core::settings::Settings;

use crate::classifier::{
    should_judge, OracleClassifier, PostPayload, RuleBasedClassifier, TaggingResult,
    WorkoutClassifier,
};
use crate::client::ChatTransport;
use crate::validate::{revalidate, validate_oracle_result};

pub const TAG_LOG_FILE: &str = "llm_tags.jsonl";
pub const TAG_JSON_FILE: &str = "llm_tags.json";
pub const JUDGE_LOG_FILE: &str = "llm_judged_tags.jsonl";
pub const JUDGE_JSON_FILE: &str = "llm_judged_tags.json";

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JudgeMode {
    #[default]
    Off,
    /// Judge only where the rule-based and oracle results disagree.
    Disagreements,
    All,
}

impl JudgeMode {
    pub fn from_flags(judge: bool, judge_all: bool) -> Self {
        match (judge, judge_all) {
            (_, true) => JudgeMode::All,
            (true, false) => JudgeMode::Disagreements,
            (false, false) => JudgeMode::Off,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagRunOptions {
    /// Directory receiving the logs and JSON arrays.
    pub out_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub workers: usize,
    pub resume: bool,
    pub overwrite: bool,
    pub judge: JudgeMode,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_posts: Option<usize>,
}

impl TagRunOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let (start_date, end_date) = settings.date_window()?;
        Ok(Self {
            out_dir: settings.derived_dir.clone(),
            cache_dir: settings.cache_dir.clone(),
            workers: settings.workers as usize,
            resume: settings.resume,
            overwrite: settings.overwrite,
            judge: JudgeMode::from_flags(settings.judge, settings.judge_all),
            start_date,
            end_date,
            max_posts: settings.max_posts,
        })
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub candidates: usize,
    /// Tagging results appended this run.
    pub tagged: usize,
    /// Judge results appended this run.
    pub judged: usize,
    /// Posts abandoned after exhausting retries.
    pub failed: usize,
    /// Entries in the regenerated tagging array.
    pub tag_entries: usize,
    /// Entries in the regenerated judge array.
    pub judge_entries: usize,
}

// ── Candidate selection ───────────────────────────────────────────────────────

/// Records with an id and an ISO workout date inside the inclusive window,
/// capped at `max_posts` (zero means no cap).
pub fn select_candidates(
    records: &[CanonicalRecord],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    max_posts: Option<usize>,
) -> Vec<PostPayload> {
    let cap = max_posts.filter(|n| *n > 0).unwrap_or(usize::MAX);
    records
        .iter()
        .filter(|r| r.id.is_some() && r.date.len() == 10)
        .filter(|r| match parse_iso_date(&r.date) {
            Some(d) => start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e),
            None => false,
        })
        .take(cap)
        .map(PostPayload::from_record)
        .collect()
}

// ── AppendLog ─────────────────────────────────────────────────────────────────

/// Append-only JSONL file shared by all workers.
pub struct AppendLog {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl AppendLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    pub fn truncate(&self) -> Result<()> {
        std::fs::write(&self.path, b"")?;
        Ok(())
    }
}

// ── TaggingRun ────────────────────────────────────────────────────────────────

struct RunContext<T: ChatTransport> {
    oracle: OracleClassifier<T>,
    rules: RuleBasedClassifier,
    tag_log: AppendLog,
    judge_log: AppendLog,
    cache_dir: PathBuf,
    resume: bool,
    judge: JudgeMode,
    seen: Mutex<HashSet<i64>>,
    seen_judged: Mutex<HashSet<i64>>,
}

#[derive(Debug, Default)]
struct PostOutcome {
    tagged: bool,
    judged: bool,
}

/// One batch of oracle tagging over canonical records.
pub struct TaggingRun<T: ChatTransport> {
    oracle: OracleClassifier<T>,
    rules: RuleBasedClassifier,
    options: TagRunOptions,
}

impl<T: ChatTransport + 'static> TaggingRun<T> {
    pub fn new(oracle: OracleClassifier<T>, rules: RuleBasedClassifier, options: TagRunOptions) -> Self {
        Self {
            oracle,
            rules,
            options,
        }
    }

    /// Tag every candidate among `records`.
    ///
    /// A post that still fails after its retries is logged and counted in
    /// [`RunSummary::failed`]; the rest of the batch carries on. Only setup
    /// and regeneration I/O errors fail the run as a whole.
    pub async fn run(self, records: &[CanonicalRecord]) -> Result<RunSummary> {
        let opts = self.options;
        std::fs::create_dir_all(&opts.out_dir)?;
        std::fs::create_dir_all(&opts.cache_dir)?;

        let tag_log = AppendLog::new(opts.out_dir.join(TAG_LOG_FILE));
        let judge_log = AppendLog::new(opts.out_dir.join(JUDGE_LOG_FILE));
        let tag_json = opts.out_dir.join(TAG_JSON_FILE);
        let judge_json = opts.out_dir.join(JUDGE_JSON_FILE);
        let judging = opts.judge != JudgeMode::Off;

        if opts.overwrite {
            tag_log.truncate()?;
            if judging {
                judge_log.truncate()?;
            }
        }

        let mut seen = HashSet::new();
        let mut seen_judged = HashSet::new();
        if opts.resume && !opts.overwrite {
            ensure_log_from_array(&tag_json, tag_log.path())?;
            seen.extend(read_log_ids(tag_log.path()));
            seen.extend(read_array_ids(&tag_json));
            if judging {
                ensure_log_from_array(&judge_json, judge_log.path())?;
                seen_judged.extend(read_log_ids(judge_log.path()));
                seen_judged.extend(read_array_ids(&judge_json));
            }
            info!(
                "TaggingRun: resuming with {} tagged and {} judged ids",
                seen.len(),
                seen_judged.len()
            );
        }

        let candidates = select_candidates(records, opts.start_date, opts.end_date, opts.max_posts);
        let mut summary = RunSummary {
            candidates: candidates.len(),
            ..RunSummary::default()
        };
        info!(
            "TaggingRun: {} candidates out of {} records, {} workers",
            candidates.len(),
            records.len(),
            opts.workers.max(1)
        );

        let ctx = Arc::new(RunContext {
            oracle: self.oracle,
            rules: self.rules,
            tag_log,
            judge_log,
            cache_dir: opts.cache_dir.clone(),
            resume: opts.resume,
            judge: opts.judge,
            seen: Mutex::new(seen),
            seen_judged: Mutex::new(seen_judged),
        });

        let workers = opts.workers.max(1);
        let mut pending = candidates.into_iter();
        let mut tasks = JoinSet::new();
        loop {
            while tasks.len() < workers {
                let Some(post) = pending.next() else { break };
                let ctx = Arc::clone(&ctx);
                tasks.spawn(async move {
                    let id = post.id;
                    (id, process_post(ctx, post).await)
                });
            }
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok((_, Ok(outcome))) => {
                    summary.tagged += usize::from(outcome.tagged);
                    summary.judged += usize::from(outcome.judged);
                }
                Ok((id, Err(e))) => {
                    warn!("TaggingRun: post {:?} failed: {}", id, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!("TaggingRun: worker task aborted: {}", e);
                    summary.failed += 1;
                }
            }
        }

        let library = ctx.oracle.library();
        summary.tag_entries = regenerate_json(ctx.tag_log.path(), &tag_json, library)?;
        if judging {
            summary.judge_entries = regenerate_json(ctx.judge_log.path(), &judge_json, library)?;
        }

        info!(
            "TaggingRun: tagged {}, judged {}, failed {} ({} entries in {})",
            summary.tagged,
            summary.judged,
            summary.failed,
            summary.tag_entries,
            tag_json.display()
        );
        Ok(summary)
    }
}

impl<T: ChatTransport> RunContext<T> {
    fn is_seen(&self, id: i64) -> bool {
        lock(&self.seen).contains(&id)
    }

    fn is_judged(&self, id: i64) -> bool {
        lock(&self.seen_judged).contains(&id)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Classify, log, and optionally judge one post.
async fn process_post<T: ChatTransport>(ctx: Arc<RunContext<T>>, post: PostPayload) -> Result<PostOutcome> {
    let mut outcome = PostOutcome::default();
    let Some(id) = post.id else {
        return Ok(outcome);
    };
    let cache_path = ctx.cache_dir.join(format!("{id}.json"));
    let judge_cache_path = ctx.cache_dir.join(format!("judge_{id}.json"));
    let already_tagged = ctx.resume && ctx.is_seen(id);

    let cached = if ctx.resume {
        read_cached(&cache_path).await
    } else {
        None
    };
    let result = match cached {
        Some(r) => r,
        None => {
            if already_tagged && ctx.judge == JudgeMode::Off {
                debug!("TaggingRun: post {} already tagged", id);
                return Ok(outcome);
            }
            info!("TaggingRun: tagging {} id={} {:?}", post.date, id, short_title(&post.title));
            let r = ctx.oracle.classify(&post).await?;
            write_cache(&cache_path, &r).await?;
            r
        }
    };

    if !already_tagged {
        ctx.tag_log.append(&result).await?;
        lock(&ctx.seen).insert(id);
        outcome.tagged = true;
    }

    if ctx.judge == JudgeMode::Off {
        return Ok(outcome);
    }

    let baseline = ctx.rules.classify(&post).await?;
    let candidate = revalidate(&result, ctx.oracle.library())?;
    if ctx.judge == JudgeMode::Disagreements && !should_judge(&baseline, &candidate) {
        debug!("TaggingRun: post {} agrees with the rule-based baseline", id);
        return Ok(outcome);
    }

    let already_judged = ctx.resume && ctx.is_judged(id);
    let cached = if ctx.resume {
        read_cached(&judge_cache_path).await
    } else {
        None
    };
    let judged = match cached {
        Some(r) => r,
        None => {
            if already_judged {
                return Ok(outcome);
            }
            info!("TaggingRun: judging {} id={} {:?}", post.date, id, short_title(&post.title));
            let r = ctx.oracle.judge(&post, &baseline, &candidate).await?;
            write_cache(&judge_cache_path, &r).await?;
            r
        }
    };

    if !already_judged {
        ctx.judge_log.append(&judged).await?;
        lock(&ctx.seen_judged).insert(id);
        outcome.judged = true;
    }
    Ok(outcome)
}

fn short_title(title: &str) -> String {
    title.chars().take(60).collect()
}

// ── Cache and log files ───────────────────────────────────────────────────────

async fn read_cached(path: &Path) -> Option<TaggingResult> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&content) {
        Ok(result) => Some(result),
        Err(e) => {
            debug!("TaggingRun: ignoring unreadable cache {}: {}", path.display(), e);
            None
        }
    }
}

async fn write_cache(path: &Path, result: &TaggingResult) -> Result<()> {
    tokio::fs::write(path, serde_json::to_vec_pretty(result)?).await?;
    Ok(())
}

fn read_log_values(path: &Path) -> Vec<Value> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

fn read_array_values(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|v| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
}

fn ids(values: &[Value]) -> HashSet<i64> {
    values.iter().filter_map(|v| v.get("id")?.as_i64()).collect()
}

/// Ids already present in a JSONL log; unreadable lines are ignored.
pub fn read_log_ids(path: &Path) -> HashSet<i64> {
    ids(&read_log_values(path))
}

/// Ids in a regenerated JSON array; a missing or malformed file yields none.
pub fn read_array_ids(path: &Path) -> HashSet<i64> {
    ids(&read_array_values(path))
}

/// Rebuild the JSONL log from its JSON array when only the array exists.
pub fn ensure_log_from_array(json_path: &Path, log_path: &Path) -> Result<()> {
    if log_path.exists() || !json_path.exists() {
        return Ok(());
    }
    let mut buf = Vec::new();
    let mut count = 0usize;
    for value in read_array_values(json_path).iter().filter(|v| v.is_object()) {
        serde_json::to_writer(&mut buf, value)?;
        buf.push(b'\n');
        count += 1;
    }
    std::fs::write(log_path, buf)?;
    info!(
        "TaggingRun: rebuilt {} from {} ({} entries)",
        log_path.display(),
        json_path.display(),
        count
    );
    Ok(())
}

/// Re-validate every log line and write the surviving entries as one array.
///
/// Lines that no longer validate are skipped. Returns the entry count.
pub fn regenerate_json(log_path: &Path, json_path: &Path, library: &PatternLibrary) -> Result<usize> {
    let entries: Vec<TaggingResult> = read_log_values(log_path)
        .into_iter()
        .filter_map(|v| match validate_oracle_result(v, library) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("TaggingRun: dropping invalid log entry from {}: {}", log_path.display(), e);
                None
            }
        })
        .collect();
    let tmp = json_path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&entries)?)?;
    std::fs::rename(&tmp, json_path)?;
    Ok(entries.len())
}
