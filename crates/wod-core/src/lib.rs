pub mod classifiers;
pub mod dates;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod patterns;
pub mod registries;
pub mod settings;

pub use error::{EtlError, Result};
