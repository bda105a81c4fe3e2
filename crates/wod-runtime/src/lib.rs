//! Tagging oracle adapter.
//!
//! Sends canonical posts to a chat-completion endpoint, validates and
//! normalizes the replies, reconciles them against the rule-based tagger,
//! and drives the whole batch through a bounded worker pool.

pub mod classifier;
pub mod client;
pub mod pool;
pub mod prompt;
pub mod retry;
pub mod validate;

pub use wod_core as core;
pub use wod_data as data;
