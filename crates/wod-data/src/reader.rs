//! Raw-post and side-file loading.
//!
//! The source fetcher drops newline-delimited JSON snapshots into the raw
//! directory; `latest.jsonl` wins when present, otherwise the newest
//! timestamped `posts-*.jsonl` is used.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use wod_core::error::{EtlError, Result};
use wod_core::models::RawPost;

/// Preferred raw snapshot name.
pub const LATEST_FILE: &str = "latest.jsonl";

// ── Public API ────────────────────────────────────────────────────────────────

/// Locate the raw snapshot to build from.
///
/// Returns [`EtlError::NoRawData`] when the directory is missing or holds
/// neither `latest.jsonl` nor any `posts-*.jsonl` file.
pub fn find_raw_file(raw_dir: &Path) -> Result<PathBuf> {
    let latest = raw_dir.join(LATEST_FILE);
    if latest.is_file() {
        return Ok(latest);
    }
    if !raw_dir.exists() {
        warn!("Raw data path does not exist: {}", raw_dir.display());
        return Err(EtlError::NoRawData(raw_dir.to_path_buf()));
    }

    let mut snapshots: Vec<PathBuf> = walkdir::WalkDir::new(raw_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with("posts-") && name.ends_with(".jsonl"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    // Timestamped names sort chronologically.
    snapshots.sort();
    snapshots
        .pop()
        .ok_or_else(|| EtlError::NoRawData(raw_dir.to_path_buf()))
}

/// Load every raw post from the snapshot chosen by [`find_raw_file`].
pub fn load_raw_posts(raw_dir: &Path) -> Result<Vec<RawPost>> {
    let path = find_raw_file(raw_dir)?;
    let posts: Vec<RawPost> = read_jsonl(&path)?;
    debug!("Loaded {} raw posts from {}", posts.len(), path.display());
    Ok(posts)
}

/// Parse a JSONL file into `T`, one value per non-empty line.
///
/// Malformed lines are skipped with a warning; an unreadable file is an error.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|source| EtlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let reader = std::io::BufReader::new(file);
    let mut items = Vec::new();
    let mut skipped = 0usize;

    for (lineno, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to read line {} of {}: {}", lineno + 1, path.display(), e);
                skipped += 1;
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(
                    "Skipping malformed line {} of {}: {}",
                    lineno + 1,
                    path.display(),
                    e
                );
                skipped += 1;
            }
        }
    }

    debug!(
        "File {}: {} parsed, {} skipped",
        path.display(),
        items.len(),
        skipped
    );
    Ok(items)
}

/// Load a JSON object mapping post id (as a string key) to comment count.
///
/// Keys that are not integers are ignored; values that are not
/// non-negative integers are skipped with a warning.
pub fn load_comment_counts(path: &Path) -> Result<HashMap<i64, u32>> {
    let content = std::fs::read_to_string(path).map_err(|source| EtlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)?;

    let mut counts = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let Ok(id) = key.trim().parse::<i64>() else {
            debug!("Ignoring non-numeric comment-count key {:?}", key);
            continue;
        };
        match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(count) => {
                counts.insert(id, count);
            }
            None => warn!("Skipping comment count for post {}: {} is not a count", id, value),
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n")).expect("write");
        path
    }

    // ── find_raw_file ─────────────────────────────────────────────────────────

    #[test]
    fn test_find_raw_file_prefers_latest() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "posts-20240101-000000.jsonl", &["{}"]);
        write(dir.path(), LATEST_FILE, &["{}"]);
        let found = find_raw_file(dir.path()).unwrap();
        assert_eq!(found, dir.path().join(LATEST_FILE));
    }

    #[test]
    fn test_find_raw_file_picks_newest_snapshot() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "posts-20240101-000000.jsonl", &["{}"]);
        write(dir.path(), "posts-20250301-120000.jsonl", &["{}"]);
        write(dir.path(), "notes.jsonl", &["{}"]);
        let found = find_raw_file(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("posts-20250301-120000.jsonl"));
    }

    #[test]
    fn test_find_raw_file_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            find_raw_file(dir.path()),
            Err(EtlError::NoRawData(_))
        ));
        assert!(matches!(
            find_raw_file(&dir.path().join("missing")),
            Err(EtlError::NoRawData(_))
        ));
    }

    // ── read_jsonl ────────────────────────────────────────────────────────────

    #[test]
    fn test_load_raw_posts_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            LATEST_FILE,
            &[
                r#"{"id": 1, "title": "WOD 1.2.15", "components": [{"component": "Metcon", "details": "Run 400m"}]}"#,
                "{not valid json{{",
                "",
                r#"{"id": 2, "title": "Rest Day"}"#,
            ],
        );
        let posts = load_raw_posts(dir.path()).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].components.len(), 1);
        assert_eq!(posts[1].title.as_deref(), Some("Rest Day"));
    }

    #[test]
    fn test_read_jsonl_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_jsonl::<RawPost>(&dir.path().join("nope.jsonl")).unwrap_err();
        assert!(matches!(err, EtlError::FileRead { .. }));
    }

    // ── load_comment_counts ───────────────────────────────────────────────────

    #[test]
    fn test_load_comment_counts() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "counts.json", &[r#"{"101": 4, "102": 0, "x": 9}"#]);
        let counts = load_comment_counts(&path).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&101), Some(&4));
        assert_eq!(counts.get(&102), Some(&0));
    }

    #[test]
    fn test_load_comment_counts_skips_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "counts.json",
            &[r#"{"101": 4, "102": null, "103": -2, "104": 1.5, "105": "7", "106": 12}"#],
        );
        let counts = load_comment_counts(&path).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(&101), Some(&4));
        assert_eq!(counts.get(&106), Some(&12));
    }

    #[test]
    fn test_load_comment_counts_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "counts.json", &["[1, 2"]);
        assert!(matches!(
            load_comment_counts(&path),
            Err(EtlError::JsonParse(_))
        ));
    }
}
