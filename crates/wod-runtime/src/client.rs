//! Chat-completion transport for the tagging oracle.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wod_core::error::{EtlError, Result};
use wod_core::settings::Settings;

use crate::retry::parse_retry_after_hint;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

// ── OracleConfig ──────────────────────────────────────────────────────────────

/// Per-pass request settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Attempts per post, the first included.
    pub max_retries: u32,
    /// Pause before every attempt.
    pub min_pause: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 800,
            timeout: Duration::from_secs(60),
            max_retries: 6,
            min_pause: Duration::ZERO,
        }
    }
}

impl OracleConfig {
    /// Tagging-pass config from the command line.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            timeout: Duration::from_secs(settings.timeout_s),
            max_retries: settings.max_retries,
            ..Self::default()
        }
    }

    /// Judge-pass config: same as the tagging pass with the judge model.
    pub fn judge_from_settings(settings: &Settings) -> Self {
        Self {
            model: settings.judge_model().to_string(),
            ..Self::from_settings(settings)
        }
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Sends one chat exchange and returns the assistant's raw content.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, config: &OracleConfig, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTPS transport for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiTransport {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// API key from the environment, else from `.env` in the working
    /// directory.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(require_api_key(Path::new(".env"))?))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn complete(&self, config: &OracleConfig, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": config.model,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": messages,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| EtlError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            let header_hint = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64);
            let text = resp.text().await.unwrap_or_default();
            return Err(EtlError::Api {
                status: status.as_u16(),
                retry_after: header_hint.or_else(|| parse_retry_after_hint(&text)),
                message: text,
            });
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| EtlError::Transport(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EtlError::MissingKey("choices[0].message.content".to_string()))
    }
}

// ── Credentials ───────────────────────────────────────────────────────────────

/// `KEY=value` pairs from a dotenv file, or an empty list when the file is
/// missing or unreadable. The process environment is left untouched.
pub fn load_dotenv(path: &Path) -> Vec<(String, String)> {
    std::fs::read_to_string(path)
        .map(|content| parse_dotenv(&content))
        .unwrap_or_default()
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let value = v.trim().trim_matches('\'').trim_matches('"');
            (k.trim().to_string(), value.to_string())
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// The oracle API key, or [`EtlError::MissingCredentials`].
///
/// A set variable wins over the dotenv file at `dotenv_path`.
pub fn require_api_key(dotenv_path: &Path) -> Result<String> {
    let from_env = std::env::var(API_KEY_VAR).ok();
    credential(API_KEY_VAR, from_env, &load_dotenv(dotenv_path))
}

fn credential(key: &str, from_env: Option<String>, dotenv: &[(String, String)]) -> Result<String> {
    from_env
        .as_deref()
        .and_then(non_empty)
        .or_else(|| {
            dotenv
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| non_empty(v))
        })
        .ok_or_else(|| EtlError::MissingCredentials(format!("{key} is not set")))
}

fn non_empty(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}
