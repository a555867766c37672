//! On-disk cache of rendered repo maps.
//!
//! One JSON file per entry, named by a digest of everything that identifies
//! the map: canonical repository path, invalidation key, focus hash, and
//! token budget. Writes go through a temp file and a rename so concurrent
//! readers never see a partial entry. Every cache failure is logged and
//! turned into a rebuild.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use gsai_core::{CacheConfig, CacheStrategy, GsaiError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::focus::FocusSet;
use crate::key::{compute_key, InvalidationKey};
use crate::walker::validate_root;

const ENTRY_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".gsai-tmp";
/// Temp files older than this belong to a writer that died mid-write.
const STALE_TEMP_SECS: u64 = 60 * 60;

/// A persisted map with the identity it was built for.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    root: String,
    key: String,
    strategy: CacheStrategy,
    focus_hash: String,
    token_budget: usize,
    created_at: u64,
    ttl_seconds: u64,
    size_bytes: u64,
    text: String,
}

impl CacheEntry {
    fn matches(&self, root: &str, key: &InvalidationKey, focus_hash: &str, budget: usize) -> bool {
        self.root == root
            && self.key == key.value
            && self.strategy == key.strategy
            && self.focus_hash == focus_hash
            && self.token_budget == budget
    }

    fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_seconds
    }
}

/// Summary of the cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub dir: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
}

/// Reads, writes, and evicts cached repo maps.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use gsai_core::CacheStrategy;
/// use gsai_repomap::cache::CacheManager;
/// use gsai_repomap::focus::FocusSet;
///
/// let repo = tempfile::tempdir().unwrap();
/// let cache_dir = tempfile::tempdir().unwrap();
/// let cache = CacheManager::new(cache_dir.path(), 3600, 1 << 20, CacheStrategy::Simple);
///
/// let focus = FocusSet::default();
/// let first = cache.get_or_build(repo.path(), &focus, 512, || Ok("map".into())).unwrap();
/// let second = cache
///     .get_or_build(repo.path(), &focus, 512, || Ok("rebuilt".into()))
///     .unwrap();
/// assert_eq!(first, "map");
/// assert_eq!(second, "map");
/// ```
#[derive(Debug, Clone)]
pub struct CacheManager {
    dir: PathBuf,
    ttl_seconds: u64,
    max_size_bytes: u64,
    strategy: CacheStrategy,
    enabled: bool,
}

impl CacheManager {
    pub fn new(dir: &Path, ttl_seconds: u64, max_size_bytes: u64, strategy: CacheStrategy) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ttl_seconds,
            max_size_bytes,
            strategy,
            enabled: true,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            dir: config.resolved_dir(),
            ttl_seconds: config.ttl_seconds(),
            max_size_bytes: config.max_size_bytes(),
            strategy: config.strategy,
            enabled: config.enabled,
        }
    }

    /// A manager that always builds and never touches disk.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            ttl_seconds: 0,
            max_size_bytes: 0,
            strategy: CacheStrategy::Auto,
            enabled: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the cached map for this request, or run `build` and cache its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::InvalidWorkingDirectory`] if `working_dir` is not
    /// a readable directory, or whatever `build` returns. Cache failures
    /// never surface here.
    pub fn get_or_build<F>(
        &self,
        working_dir: &Path,
        focus: &FocusSet,
        token_budget: usize,
        build: F,
    ) -> Result<String, GsaiError>
    where
        F: FnOnce() -> Result<String, GsaiError>,
    {
        validate_root(working_dir)?;
        if !self.enabled {
            return build();
        }

        let root = std::fs::canonicalize(working_dir)
            .map_err(|_| GsaiError::InvalidWorkingDirectory(working_dir.to_path_buf()))?;
        let root_id = root.to_string_lossy().into_owned();

        let started = Instant::now();
        let key = match compute_key(&root, self.strategy) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, strategy = %self.strategy, "cache key failed, building uncached");
                return build();
            }
        };
        debug!(
            strategy = %key.strategy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "computed invalidation key"
        );

        let focus_hash = focus.hash();
        let path = self.entry_path(&root_id, &key, &focus_hash, token_budget);

        match self.load(&path) {
            Ok(Some(entry))
                if entry.matches(&root_id, &key, &focus_hash, token_budget)
                    && !entry.is_expired(now()) =>
            {
                debug!(strategy = %key.strategy, path = %path.display(), "repo map cache hit");
                return Ok(entry.text);
            }
            Ok(Some(_)) => debug!(strategy = %key.strategy, "repo map cache entry stale"),
            Ok(None) => debug!(strategy = %key.strategy, "repo map cache miss"),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding unreadable cache entry");
                if let Err(err) = remove_if_present(&path) {
                    debug!(path = %path.display(), error = %err, "could not remove cache entry");
                }
            }
        }

        let started = Instant::now();
        let text = build()?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "built repo map");

        let entry = CacheEntry {
            root: root_id,
            key: key.value,
            strategy: key.strategy,
            focus_hash,
            token_budget,
            created_at: now(),
            ttl_seconds: self.ttl_seconds,
            size_bytes: text.len() as u64,
            text,
        };
        if let Err(err) = self.store(&path, &entry) {
            warn!(path = %path.display(), error = %err, "failed to write cache entry");
        } else if let Err(err) = self.evict() {
            warn!(dir = %self.dir.display(), error = %err, "cache eviction failed");
        }

        Ok(entry.text)
    }

    /// Count entries and bytes in the cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::Io`] if the directory exists but cannot be read.
    pub fn stats(&self) -> Result<CacheStats, GsaiError> {
        let entries = self.entries()?;
        Ok(CacheStats {
            dir: self.dir.clone(),
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
        })
    }

    /// Delete every cache entry. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::Io`] if the directory cannot be read or an entry
    /// cannot be removed.
    pub fn clear(&self) -> Result<usize, GsaiError> {
        let entries = self.entries()?;
        for entry in &entries {
            remove_if_present(&entry.path)?;
        }
        Ok(entries.len())
    }

    fn entry_path(&self, root: &str, key: &InvalidationKey, focus_hash: &str, budget: usize) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(root.as_bytes());
        hasher.update(b"\0");
        hasher.update(key.strategy.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(key.value.as_bytes());
        hasher.update(b"\0");
        hasher.update(focus_hash.as_bytes());
        hasher.update(b"\0");
        hasher.update(budget.to_string().as_bytes());
        self.dir
            .join(format!("{:x}.{ENTRY_EXTENSION}", hasher.finalize()))
    }

    fn load(&self, path: &Path) -> Result<Option<CacheEntry>, GsaiError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&content)?;
        if entry.size_bytes != entry.text.len() as u64 {
            return Err(GsaiError::Cache("entry size does not match its text".into()));
        }
        Ok(Some(entry))
    }

    fn store(&self, path: &Path, entry: &CacheEntry) -> Result<(), GsaiError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, entry)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| GsaiError::Io(e.error))?;
        Ok(())
    }

    /// Drop abandoned temp files and expired entries, then the oldest
    /// entries until the directory fits `max_size_bytes`.
    fn evict(&self) -> Result<(), GsaiError> {
        let now = SystemTime::now();
        self.sweep_temp_files(now)?;
        let mut live = Vec::new();

        for entry in self.entries()? {
            let age = now.duration_since(entry.modified).map_or(0, |d| d.as_secs());
            if age > self.ttl_seconds {
                debug!(path = %entry.path.display(), "evicting expired cache entry");
                remove_if_present(&entry.path)?;
            } else {
                live.push(entry);
            }
        }

        live.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        let mut total: u64 = live.iter().map(|e| e.size).sum();
        for entry in &live {
            if total <= self.max_size_bytes {
                break;
            }
            debug!(path = %entry.path.display(), "evicting cache entry over size limit");
            remove_if_present(&entry.path)?;
            total -= entry.size;
        }
        Ok(())
    }

    fn sweep_temp_files(&self, now: SystemTime) -> Result<(), GsaiError> {
        let read = match std::fs::read_dir(&self.dir) {
            Ok(r) => r,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for item in read {
            let item = item?;
            if !item.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let Ok(modified) = item.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            let age = now.duration_since(modified).map_or(0, |d| d.as_secs());
            if age > STALE_TEMP_SECS {
                debug!(path = %item.path().display(), "removing abandoned cache temp file");
                remove_if_present(&item.path())?;
            }
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<DirEntryInfo>, GsaiError> {
        let read = match std::fs::read_dir(&self.dir) {
            Ok(r) => r,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for item in read {
            let item = item?;
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Ok(meta) = item.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            entries.push(DirEntryInfo {
                path,
                size: meta.len(),
                modified: meta.modified().unwrap_or(UNIX_EPOCH),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

struct DirEntryInfo {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

fn remove_if_present(path: &Path) -> Result<(), GsaiError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
