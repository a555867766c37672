use std::path::PathBuf;

/// Errors that can occur across gsai.
///
/// Library crates use this type directly; the binary converts to a `miette`
/// diagnostic at the boundary.
///
/// # Examples
///
/// ```
/// use gsai_core::GsaiError;
///
/// let err = GsaiError::Cache("entry truncated".into());
/// assert!(err.to_string().contains("entry truncated"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum GsaiError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git metadata could not be read.
    #[error("git error: {0}")]
    Git(String),

    /// Source code parsing failure that is not a plain syntax error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Cache read or write failure. Never fatal to a map build.
    #[error("cache error: {0}")]
    Cache(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The working directory does not exist or cannot be read.
    #[error("invalid working directory: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),
}
