//! Core types, configuration, and error handling for gsai.
//!
//! This crate provides the shared foundation used by the other gsai crates:
//! - [`GsaiError`]: unified error type using `thiserror`
//! - [`GsaiConfig`]: configuration loaded from `.gsai.toml`
//! - [`CacheStrategy`]: how the repo map cache fingerprints a repository

mod config;
mod error;
mod types;

pub use config::{CacheConfig, GsaiConfig, RepoMapConfig};
pub use error::GsaiError;
pub use types::CacheStrategy;

/// A convenience `Result` type for gsai operations.
pub type Result<T> = std::result::Result<T, GsaiError>;
