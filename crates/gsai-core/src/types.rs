use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the repo map cache derives its invalidation key.
///
/// # Examples
///
/// ```
/// use gsai_core::CacheStrategy;
///
/// let strategy: CacheStrategy = "git".parse().unwrap();
/// assert_eq!(strategy, CacheStrategy::Git);
/// assert_eq!(CacheStrategy::default(), CacheStrategy::Auto);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Git metadata inside a repository, `Simple` elsewhere.
    #[default]
    Auto,
    /// HEAD commit plus index mtime. No per-file work.
    Git,
    /// File list plus root directory mtime. No per-file stat calls.
    Simple,
    /// Per-file mtime and size. Precise but costly on large trees.
    Full,
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Auto => write!(f, "auto"),
            CacheStrategy::Git => write!(f, "git"),
            CacheStrategy::Simple => write!(f, "simple"),
            CacheStrategy::Full => write!(f, "full"),
        }
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(CacheStrategy::Auto),
            "git" => Ok(CacheStrategy::Git),
            "simple" => Ok(CacheStrategy::Simple),
            "full" => Ok(CacheStrategy::Full),
            other => Err(format!("unknown cache strategy: {other}")),
        }
    }
}
