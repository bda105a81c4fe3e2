//! Build layer for the workout archive.
//!
//! Reads raw post snapshots, assembles canonical records, and derives the
//! aggregate, named-workout and comment reports written as artifacts.

pub mod aggregator;
pub mod canonical;
pub mod comments;
pub mod named;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use wod_core as core;
