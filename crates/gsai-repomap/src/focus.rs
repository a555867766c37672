use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::walker::path_key;

/// Files and identifiers the current request is about.
///
/// File paths are stored relative to the working directory, `/`-separated,
/// deduplicated and sorted, so the same request always hashes the same.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use gsai_repomap::focus::FocusSet;
///
/// let root = Path::new("/repo");
/// let focus = FocusSet::new(
///     root,
///     &[PathBuf::from("/repo/src/a.py"), PathBuf::from("src/a.py"), PathBuf::from("/etc/passwd")],
///     Vec::<String>::new(),
/// );
/// assert_eq!(focus.files().len(), 1);
/// assert!(focus.files().contains("src/a.py"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusSet {
    files: BTreeSet<String>,
    idents: BTreeSet<String>,
    settings: String,
}

impl FocusSet {
    /// Normalize `files` against `root`. Paths that resolve outside `root`
    /// are dropped with a warning.
    pub fn new<I>(root: &Path, files: &[PathBuf], idents: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let canonical_root = std::fs::canonicalize(root).ok();

        let files = files
            .iter()
            .filter_map(|path| {
                let normalized = normalize(root, canonical_root.as_deref(), path);
                if normalized.is_none() {
                    warn!(path = %path.display(), "focus file is outside the working directory, ignoring");
                }
                normalized
            })
            .collect();

        let idents = idents.into_iter().filter(|i| !i.is_empty()).collect();

        Self {
            files,
            idents,
            settings: String::new(),
        }
    }

    /// Tag the set with a digest of the map settings it will be rendered
    /// under. The digest is part of [`FocusSet::hash`].
    pub fn with_settings(mut self, digest: impl Into<String>) -> Self {
        self.settings = digest.into();
        self
    }

    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    /// Identifiers mentioned in the request.
    pub fn idents(&self) -> &BTreeSet<String> {
        &self.idents
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.idents.is_empty()
    }

    /// Stable digest of the set, used in cache keys.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"files");
        for file in &self.files {
            hasher.update(b"\0");
            hasher.update(file.as_bytes());
        }
        hasher.update(b"\0idents");
        for ident in &self.idents {
            hasher.update(b"\0");
            hasher.update(ident.as_bytes());
        }
        hasher.update(b"\0settings\0");
        hasher.update(self.settings.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn normalize(root: &Path, canonical_root: Option<&Path>, path: &Path) -> Option<String> {
    let relative = if path.is_absolute() {
        match path.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let canonical_root = canonical_root?;
                match path.strip_prefix(canonical_root) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => std::fs::canonicalize(path)
                        .ok()?
                        .strip_prefix(canonical_root)
                        .ok()?
                        .to_path_buf(),
                }
            }
        }
    } else {
        path.to_path_buf()
    };

    let cleaned = clean(&relative)?;
    let key = path_key(&cleaned);
    (!key.is_empty()).then_some(key)
}

/// Resolve `.` and `..` lexically. `None` if the path climbs above its start.
fn clean(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
