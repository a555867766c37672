use std::path::{Component, Path, PathBuf};

use gsai_core::GsaiError;
use tracing::debug;

/// Maximum file size to process (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// A source file discovered during repository walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use gsai_repomap::walker::{Language, SourceFile};
///
/// let file = SourceFile {
///     path: PathBuf::from("src/main.rs"),
///     language: Language::Rust,
///     content: "fn main() {}".to_string(),
/// };
/// assert_eq!(file.key(), "src/main.rs");
/// ```
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Detected programming language.
    pub language: Language,
    /// Full file content.
    pub content: String,
}

impl SourceFile {
    /// The `/`-separated relative path used as the file's graph key.
    pub fn key(&self) -> String {
        path_key(&self.path)
    }
}

/// Programming language detected from file extension.
///
/// # Examples
///
/// ```
/// use gsai_repomap::walker::Language;
///
/// assert_eq!(Language::from_extension("rs"), Language::Rust);
/// assert_eq!(Language::from_extension("py"), Language::Python);
/// assert_eq!(Language::from_extension("kt"), Language::Kotlin);
/// assert_eq!(Language::from_extension("txt"), Language::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Php,
    Kotlin,
    Swift,
    Unknown,
}

impl Language {
    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "rs" => Language::Rust,
            "py" | "pyi" => Language::Python,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Language::Cpp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            _ => Language::Unknown,
        }
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Language::Unknown, Language::from_extension)
    }

    /// Get the tree-sitter language grammar for this language.
    ///
    /// Returns `None` for `Language::Unknown`.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::C => Some(tree_sitter_c::LANGUAGE.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }
}

/// Render a relative path as a `/`-separated string, independent of platform.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use gsai_repomap::walker::path_key;
///
/// assert_eq!(path_key(Path::new("src/lib.rs")), "src/lib.rs");
/// assert_eq!(path_key(Path::new("./a.py")), "a.py");
/// ```
pub fn path_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check that `root` exists, is a directory, and can be listed.
///
/// # Errors
///
/// Returns [`GsaiError::InvalidWorkingDirectory`] otherwise.
pub fn validate_root(root: &Path) -> Result<(), GsaiError> {
    if !root.is_dir() || std::fs::read_dir(root).is_err() {
        return Err(GsaiError::InvalidWorkingDirectory(root.to_path_buf()));
    }
    Ok(())
}

/// List source files with a known language under `root`, without reading them.
///
/// Respects `.gitignore`. Returned paths are relative to `root` and sorted.
/// Used by cache key derivation, where reading contents would defeat the
/// point of caching.
///
/// # Errors
///
/// Returns [`GsaiError::InvalidWorkingDirectory`] if `root` is not a
/// readable directory.
pub fn list_source_files(root: &Path) -> Result<Vec<PathBuf>, GsaiError> {
    validate_root(root)?;

    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter(|entry| Language::from_path(entry.path()) != Language::Unknown)
        .map(|entry| relative_to(entry.path(), root))
        .collect();

    files.sort();
    Ok(files)
}

/// Walk a repository, respecting `.gitignore`, returning parseable source files.
///
/// Skips binary files, files larger than 1 MB, and files with unknown
/// extensions. Returned paths are relative to `root`, sorted by path.
///
/// # Errors
///
/// Returns [`GsaiError::InvalidWorkingDirectory`] if `root` is not a
/// readable directory.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use gsai_repomap::walker::walk_repo;
///
/// let files = walk_repo(Path::new(".")).unwrap();
/// for f in &files {
///     println!("{}: {:?}", f.path.display(), f.language);
/// }
/// ```
pub fn walk_repo(root: &Path) -> Result<Vec<SourceFile>, GsaiError> {
    validate_root(root)?;

    let walker = ignore::WalkBuilder::new(root).build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(error = %err, "skipping unreadable walk entry");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        let language = Language::from_path(path);
        if language == Language::Unknown {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.len() > MAX_FILE_SIZE {
            debug!(path = %path.display(), "skipping oversized file");
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping non-UTF-8 file");
                continue;
            }
        };

        // Null bytes in the first 8KB mean binary
        let check_len = content.len().min(BINARY_CHECK_SIZE);
        if content.as_bytes()[..check_len].contains(&0) {
            continue;
        }

        files.push(SourceFile {
            path: relative_to(path, root),
            language,
            content,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Root-level project files from `names` that exist under `root`, plus any
/// `.github/workflows/*.yml`. Paths are `/`-separated and sorted.
///
/// # Examples
///
/// ```
/// use gsai_repomap::walker::find_important_files;
///
/// let repo = tempfile::tempdir().unwrap();
/// std::fs::write(repo.path().join("README.md"), "# demo\n").unwrap();
/// let names = vec!["README.md".to_string(), "Cargo.toml".to_string()];
/// assert_eq!(find_important_files(repo.path(), &names), vec!["README.md"]);
/// ```
pub fn find_important_files(root: &Path, names: &[String]) -> Vec<String> {
    let mut found: Vec<String> = names
        .iter()
        .filter(|name| root.join(name).is_file())
        .map(|name| path_key(Path::new(name)))
        .collect();

    let workflows = root.join(".github").join("workflows");
    match std::fs::read_dir(&workflows) {
        Ok(read) => {
            for entry in read.filter_map(Result::ok) {
                let path = entry.path();
                if path.is_file() && path.extension().is_some_and(|e| e == "yml") {
                    found.push(path_key(&relative_to(&path, root)));
                }
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => debug!(path = %workflows.display(), error = %err, "cannot list workflows"),
    }

    found.sort();
    found.dedup();
    found
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(r) => r.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
