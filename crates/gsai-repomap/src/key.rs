//! Invalidation keys: cheap fingerprints of a repository snapshot.
//!
//! A cached map is only served when the key computed now equals the key it
//! was stored under. Strategies trade precision for cost; see
//! [`CacheStrategy`].

use std::path::Path;
use std::time::UNIX_EPOCH;

use git2::Repository;
use gsai_core::{CacheStrategy, GsaiError};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::walker::{list_source_files, path_key};

/// A repository fingerprint and the strategy that produced it.
///
/// `strategy` is never [`CacheStrategy::Auto`]; auto resolves to the
/// strategy that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationKey {
    pub value: String,
    pub strategy: CacheStrategy,
}

/// Whether `root` lies inside a git repository.
pub fn is_git_repo(root: &Path) -> bool {
    Repository::discover(root).is_ok()
}

/// Fingerprint the repository at `root` with `strategy`.
///
/// `auto` tries the git key first and falls back to the simple key.
///
/// # Errors
///
/// Returns [`GsaiError::Git`] when the git strategy is requested outside a
/// repository, [`GsaiError::InvalidWorkingDirectory`] when `root` cannot be
/// listed, or [`GsaiError::Io`] on stat failures.
///
/// # Examples
///
/// ```
/// use gsai_core::CacheStrategy;
/// use gsai_repomap::key::compute_key;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("a.py"), "def f(): pass\n").unwrap();
///
/// let key = compute_key(dir.path(), CacheStrategy::Simple).unwrap();
/// assert_eq!(key.strategy, CacheStrategy::Simple);
/// assert_eq!(key.value.len(), 64);
/// ```
pub fn compute_key(root: &Path, strategy: CacheStrategy) -> Result<InvalidationKey, GsaiError> {
    match strategy {
        CacheStrategy::Git => git_key(root),
        CacheStrategy::Simple => simple_key(root),
        CacheStrategy::Full => full_key(root),
        CacheStrategy::Auto => {
            if is_git_repo(root) {
                match git_key(root) {
                    Ok(key) => return Ok(key),
                    Err(err) => debug!(error = %err, "git key failed, using simple key"),
                }
            }
            simple_key(root)
        }
    }
}

/// HEAD commit plus the index file's mtime and size.
///
/// Unstaged edits to tracked files do not change this key.
fn git_key(root: &Path) -> Result<InvalidationKey, GsaiError> {
    let repo = Repository::discover(root)
        .map_err(|e| GsaiError::Git(format!("failed to open repository: {e}")))?;

    let head = repo
        .head()
        .ok()
        .and_then(|reference| reference.target())
        .map_or_else(|| "unborn".to_string(), |oid| oid.to_string());

    let index = match std::fs::metadata(repo.path().join("index")) {
        Ok(meta) => format!("{}:{}", mtime_nanos(&meta), meta.len()),
        Err(_) => "no-index".to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(b"\0git\0");
    hasher.update(head.as_bytes());
    hasher.update(b"\0");
    hasher.update(index.as_bytes());

    Ok(InvalidationKey {
        value: format!("{:x}", hasher.finalize()),
        strategy: CacheStrategy::Git,
    })
}

/// File count, file list, and the root directory mtime. No per-file stats.
fn simple_key(root: &Path) -> Result<InvalidationKey, GsaiError> {
    let files = list_source_files(root)?;
    let root_mtime = mtime_nanos(&std::fs::metadata(root)?);

    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(b"\0simple\0");
    hasher.update(files.len().to_string().as_bytes());
    for file in &files {
        hasher.update(b"\0");
        hasher.update(path_key(file).as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(root_mtime.to_string().as_bytes());

    Ok(InvalidationKey {
        value: format!("{:x}", hasher.finalize()),
        strategy: CacheStrategy::Simple,
    })
}

/// Every file's path, mtime, and size, plus the total size.
fn full_key(root: &Path) -> Result<InvalidationKey, GsaiError> {
    let files = list_source_files(root)?;

    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(b"\0full\0");

    let mut total: u64 = 0;
    for file in &files {
        let meta = std::fs::metadata(root.join(file))?;
        total += meta.len();
        let entry = format!("{}:{}:{}", path_key(file), mtime_nanos(&meta), meta.len());
        hasher.update(entry.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(total.to_string().as_bytes());

    Ok(InvalidationKey {
        value: format!("{:x}", hasher.finalize()),
        strategy: CacheStrategy::Full,
    })
}

fn mtime_nanos(meta: &std::fs::Metadata) -> u128 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos())
}
