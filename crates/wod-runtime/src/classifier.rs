//! Interchangeable workout classifiers.
//!
//! [`RuleBasedClassifier`] re-runs the pattern tagger; [`OracleClassifier`]
//! asks a chat model. Both return a [`TaggingResult`], so a judge pass can
//! compare them field by field.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wod_core::classifiers::{component_tags, detect_format, is_rest_day, tag_movements};
use wod_core::error::{EtlError, Result};
use wod_core::models::{CanonicalRecord, ComponentTag, Format, PostComponent};
use wod_core::normalizer::TextNormalizer;
use wod_core::patterns::PatternLibrary;

use crate::client::{ChatMessage, ChatTransport, OracleConfig};
use crate::prompt::{judge_prompt, tagging_prompt};
use crate::retry::{oracle_backoff, retry_with_backoff, RetryPolicy};
use crate::validate::validate_oracle_result;

pub const RULE_BASED_NOTE: &str = "Rule-based baseline.";

// ── Payload and result ────────────────────────────────────────────────────────

/// One post as sent to a classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPayload {
    pub id: Option<i64>,
    pub date: String,
    pub title: String,
    pub link: String,
    /// Plain text of every component, headings included.
    pub text: String,
    #[serde(skip)]
    pub components: Vec<PostComponent>,
}

impl PostPayload {
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let text = record
            .components
            .iter()
            .map(|c| match c.heading.trim() {
                "" => c.details.trim().to_string(),
                heading => format!("{heading}\n{}", c.details.trim()),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            id: record.id,
            date: record.date.clone(),
            title: record.title.clone(),
            link: record.link.clone(),
            text,
            components: record.components.clone(),
        }
    }
}

/// Classification of one post, in the oracle's reply schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggingResult {
    pub id: Option<i64>,
    pub date: Option<String>,
    pub title: String,
    pub link: String,
    pub is_rest_day: bool,
    pub components: Vec<PostComponent>,
    pub component_tags: Vec<ComponentTag>,
    pub format: Format,
    pub movements: Vec<String>,
    pub unmapped_movements: Vec<String>,
    pub notes: String,
}

// ── Strategy interface ────────────────────────────────────────────────────────

#[async_trait]
pub trait WorkoutClassifier: Send + Sync {
    /// Short name used in logs.
    fn source(&self) -> &'static str;

    async fn classify(&self, post: &PostPayload) -> Result<TaggingResult>;
}

// ── RuleBasedClassifier ───────────────────────────────────────────────────────

/// The pattern-library tagger wrapped in the common interface.
pub struct RuleBasedClassifier {
    library: Arc<PatternLibrary>,
    normalizer: TextNormalizer,
}

impl RuleBasedClassifier {
    pub fn new(library: Arc<PatternLibrary>, normalizer: TextNormalizer) -> Self {
        Self {
            library,
            normalizer,
        }
    }

    pub fn classify_now(&self, post: &PostPayload) -> TaggingResult {
        let mut result = TaggingResult {
            id: post.id,
            date: Some(post.date.clone()).filter(|d| !d.is_empty()),
            title: post.title.clone(),
            link: post.link.clone(),
            is_rest_day: is_rest_day(&post.title, &post.components),
            components: post.components.clone(),
            component_tags: Vec::new(),
            format: Format::None,
            movements: Vec::new(),
            unmapped_movements: Vec::new(),
            notes: RULE_BASED_NOTE.to_string(),
        };
        if !result.is_rest_day {
            let blob = self.normalizer.normalize(&post.title, &post.components);
            result.movements = tag_movements(&blob, &self.library);
            result.format = detect_format(&blob);
            result.component_tags = component_tags(&post.components);
        }
        result
    }
}

#[async_trait]
impl WorkoutClassifier for RuleBasedClassifier {
    fn source(&self) -> &'static str {
        "rules"
    }

    async fn classify(&self, post: &PostPayload) -> Result<TaggingResult> {
        Ok(self.classify_now(post))
    }
}

// ── OracleClassifier ──────────────────────────────────────────────────────────

pub type BackoffFn = fn(u32, &EtlError) -> Duration;

/// Chat-model classifier with validation and per-call retries.
pub struct OracleClassifier<T: ChatTransport> {
    transport: T,
    library: Arc<PatternLibrary>,
    config: OracleConfig,
    judge_config: OracleConfig,
    tag_prompt: String,
    judge_prompt: String,
    backoff: BackoffFn,
}

impl<T: ChatTransport> OracleClassifier<T> {
    pub fn new(
        transport: T,
        library: Arc<PatternLibrary>,
        config: OracleConfig,
        judge_config: OracleConfig,
    ) -> Self {
        let labels = library.labels();
        Self {
            transport,
            tag_prompt: tagging_prompt(&labels),
            judge_prompt: judge_prompt(&labels),
            library,
            config,
            judge_config,
            backoff: oracle_backoff,
        }
    }

    /// Replace the back-off schedule.
    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Ask the model to reconcile a baseline and a candidate for `post`.
    pub async fn judge(
        &self,
        post: &PostPayload,
        baseline: &TaggingResult,
        candidate: &TaggingResult,
    ) -> Result<TaggingResult> {
        let payload = json!({
            "post": post,
            "regex_result": baseline,
            "llm_result": candidate,
        });
        let messages = [
            ChatMessage::system(self.judge_prompt.as_str()),
            ChatMessage::user(payload.to_string()),
        ];
        self.request(&self.judge_config, &messages).await
    }

    async fn request(&self, config: &OracleConfig, messages: &[ChatMessage]) -> Result<TaggingResult> {
        retry_with_backoff(
            RetryPolicy::new(config.max_retries),
            self.backoff,
            is_oracle_retryable,
            |_attempt| async move {
                if !config.min_pause.is_zero() {
                    tokio::time::sleep(config.min_pause).await;
                }
                let content = self.transport.complete(config, messages).await?;
                let value: serde_json::Value = serde_json::from_str(&content)?;
                validate_oracle_result(value, &self.library)
            },
        )
        .await
    }
}

#[async_trait]
impl<T: ChatTransport> WorkoutClassifier for OracleClassifier<T> {
    fn source(&self) -> &'static str {
        "oracle"
    }

    async fn classify(&self, post: &PostPayload) -> Result<TaggingResult> {
        let messages = [
            ChatMessage::system(self.tag_prompt.as_str()),
            ChatMessage::user(serde_json::to_string(post)?),
        ];
        self.request(&self.config, &messages).await
    }
}

/// Malformed replies are retried along with transport and API failures.
fn is_oracle_retryable(err: &EtlError) -> bool {
    err.is_retryable() || matches!(err, EtlError::Validation(_))
}

// ── Reconciliation ────────────────────────────────────────────────────────────

/// `true` when the two results disagree enough to need a judge.
pub fn should_judge(baseline: &TaggingResult, candidate: &TaggingResult) -> bool {
    fn set<T: Ord + Clone>(items: &[T]) -> BTreeSet<T> {
        items.iter().cloned().collect()
    }
    baseline.is_rest_day != candidate.is_rest_day
        || baseline.format != candidate.format
        || set(&baseline.movements) != set(&candidate.movements)
        || set(&baseline.component_tags) != set(&candidate.component_tags)
        || !candidate.unmapped_movements.is_empty()
}
