use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GsaiError;
use crate::types::CacheStrategy;

/// Top-level configuration loaded from `.gsai.toml`.
///
/// Resolution order: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use gsai_core::GsaiConfig;
///
/// let config = GsaiConfig::default();
/// assert!(config.cache.enabled);
/// assert_eq!(config.repomap.map_tokens, 1024);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GsaiConfig {
    /// Repo map generation settings.
    #[serde(default)]
    pub repomap: RepoMapConfig,
    /// Repo map cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl GsaiConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::Io`] if the file cannot be read, or
    /// [`GsaiError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gsai_core::GsaiConfig;
    /// use std::path::Path;
    ///
    /// let config = GsaiConfig::from_file(Path::new(".gsai.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, GsaiError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::Toml`] if parsing fails, including an unknown
    /// cache strategy name, or [`GsaiError::Config`] if a value is out of
    /// range (see [`RepoMapConfig::validate`]).
    ///
    /// # Examples
    ///
    /// ```
    /// use gsai_core::{CacheStrategy, GsaiConfig};
    ///
    /// let toml = r#"
    /// [cache]
    /// strategy = "full"
    /// ttl_days = 7
    /// "#;
    /// let config = GsaiConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.cache.strategy, CacheStrategy::Full);
    /// assert_eq!(config.cache.ttl_days, 7);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, GsaiError> {
        let config: Self = toml::from_str(content)?;
        config.repomap.validate()?;
        Ok(config)
    }
}

/// Repo map generation settings.
///
/// # Examples
///
/// ```
/// use gsai_core::RepoMapConfig;
///
/// let config = RepoMapConfig::default();
/// assert_eq!(config.max_symbols_per_file, 8);
/// assert_eq!(config.focus_weight, 100.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMapConfig {
    /// Token budget used when the caller does not pass one (default: 1024).
    #[serde(default = "default_map_tokens")]
    pub map_tokens: usize,
    /// Most signatures shown under a single file (default: 8).
    #[serde(default = "default_max_symbols_per_file")]
    pub max_symbols_per_file: usize,
    /// Repositories with more source files than this get a notice instead
    /// of a map (default: 10000).
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Rendered lines are cut to this many characters (default: 100).
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,
    /// PageRank damping factor (default: 0.85).
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Upper bound on power-iteration steps (default: 100).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Starting weight of a focus file relative to a baseline file (default: 100).
    #[serde(default = "default_focus_weight")]
    pub focus_weight: f64,
    /// Multiplier on references made from focus files (default: 50).
    #[serde(default = "default_focus_referencer_weight")]
    pub focus_referencer_weight: f64,
    /// Root-relative files listed at the top of the map when present, such
    /// as `README.md` or `Cargo.toml`. Files under `.github/workflows/`
    /// ending in `.yml` always count.
    #[serde(default = "default_important_files")]
    pub important_files: Vec<String>,
}

fn default_map_tokens() -> usize {
    1024
}

fn default_max_symbols_per_file() -> usize {
    8
}

fn default_max_files() -> usize {
    10_000
}

fn default_max_line_chars() -> usize {
    100
}

fn default_damping() -> f64 {
    0.85
}

fn default_max_iterations() -> usize {
    100
}

fn default_focus_weight() -> f64 {
    100.0
}

fn default_focus_referencer_weight() -> f64 {
    50.0
}

const IMPORTANT_FILES: &[&str] = &[
    ".gitignore",
    ".gitattributes",
    "README",
    "README.md",
    "README.txt",
    "README.rst",
    "CONTRIBUTING.md",
    "LICENSE",
    "LICENSE.md",
    "LICENSE.txt",
    "CHANGELOG.md",
    "SECURITY.md",
    "CODEOWNERS",
    "requirements.txt",
    "Pipfile",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "package.json",
    "Gemfile",
    "composer.json",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "build.sbt",
    "go.mod",
    "Cargo.toml",
    "mix.exs",
    "Podfile",
    ".env.example",
    ".editorconfig",
    "tsconfig.json",
    "jsconfig.json",
    ".eslintrc",
    ".prettierrc",
    ".pre-commit-config.yaml",
    "tox.ini",
    "pytest.ini",
    "jest.config.js",
    "webpack.config.js",
    "Makefile",
    "Dockerfile",
    "docker-compose.yml",
    ".dockerignore",
    ".gitlab-ci.yml",
    ".travis.yml",
    "Jenkinsfile",
    ".circleci/config.yml",
    ".github/dependabot.yml",
    "openapi.yaml",
    "openapi.json",
    "mkdocs.yml",
    "book.toml",
];

fn default_important_files() -> Vec<String> {
    IMPORTANT_FILES.iter().map(|f| (*f).to_string()).collect()
}

impl Default for RepoMapConfig {
    fn default() -> Self {
        Self {
            map_tokens: default_map_tokens(),
            max_symbols_per_file: default_max_symbols_per_file(),
            max_files: default_max_files(),
            max_line_chars: default_max_line_chars(),
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            focus_weight: default_focus_weight(),
            focus_referencer_weight: default_focus_referencer_weight(),
            important_files: default_important_files(),
        }
    }
}

impl RepoMapConfig {
    /// Check that every value is usable for ranking and rendering.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::Config`] unless `map_tokens` and
    /// `max_line_chars` are positive, `0 < damping < 1`, and both focus
    /// weights are finite and at least 1.
    pub fn validate(&self) -> Result<(), GsaiError> {
        if self.map_tokens == 0 {
            return Err(GsaiError::Config("repomap.map_tokens must be positive".into()));
        }
        if self.max_line_chars == 0 {
            return Err(GsaiError::Config("repomap.max_line_chars must be positive".into()));
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(GsaiError::Config(format!(
                "repomap.damping must be between 0 and 1 (exclusive), got {}",
                self.damping
            )));
        }
        for (name, value) in [
            ("focus_weight", self.focus_weight),
            ("focus_referencer_weight", self.focus_referencer_weight),
        ] {
            if !value.is_finite() || value < 1.0 {
                return Err(GsaiError::Config(format!(
                    "repomap.{name} must be a finite number >= 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Repo map cache settings.
///
/// # Examples
///
/// ```
/// use gsai_core::{CacheConfig, CacheStrategy};
///
/// let config = CacheConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.strategy, CacheStrategy::Auto);
/// assert_eq!(config.ttl_seconds(), 30 * 24 * 60 * 60);
/// assert_eq!(config.max_size_bytes(), 1024 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether rendered maps are cached on disk (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Invalidation key strategy (default: auto).
    #[serde(default)]
    pub strategy: CacheStrategy,
    /// Entries older than this are treated as misses (default: 30).
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
    /// Total on-disk cache size before eviction kicks in (default: 1024).
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    /// Cache directory. Defaults to the per-user cache directory.
    pub dir: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_ttl_days() -> u64 {
    30
}

fn default_max_size_mb() -> u64 {
    1024
}

impl CacheConfig {
    /// Entry time-to-live in seconds.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_days.saturating_mul(24 * 60 * 60)
    }

    /// Maximum total cache size in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// The configured directory, or `<user cache dir>/gsai/repomap`.
    ///
    /// Falls back to `.gsai/cache` under the current directory when the
    /// platform has no cache directory.
    pub fn resolved_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .map(|d| d.join("gsai").join("repomap"))
            .unwrap_or_else(|| PathBuf::from(".gsai").join("cache"))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            strategy: CacheStrategy::default(),
            ttl_days: default_ttl_days(),
            max_size_mb: default_max_size_mb(),
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = GsaiConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.strategy, CacheStrategy::Auto);
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.cache.max_size_mb, 1024);
        assert!(config.cache.dir.is_none());
        assert_eq!(config.repomap.map_tokens, 1024);
        assert_eq!(config.repomap.max_files, 10_000);
        assert_eq!(config.repomap.max_line_chars, 100);
        assert_eq!(config.repomap.damping, 0.85);
        assert_eq!(config.repomap.max_iterations, 100);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[repomap]
map_tokens = 4096
max_symbols_per_file = 3

[cache]
enabled = false
strategy = "simple"
ttl_days = 1
max_size_mb = 16
dir = "/tmp/gsai-cache"
"#;
        let config = GsaiConfig::from_toml(toml).unwrap();
        assert_eq!(config.repomap.map_tokens, 4096);
        assert_eq!(config.repomap.max_symbols_per_file, 3);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.strategy, CacheStrategy::Simple);
        assert_eq!(config.cache.ttl_seconds(), 86_400);
        assert_eq!(config.cache.max_size_bytes(), 16 * 1024 * 1024);
        assert_eq!(config.cache.resolved_dir(), PathBuf::from("/tmp/gsai-cache"));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = GsaiConfig::from_toml("").unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.repomap.max_symbols_per_file, 8);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result = GsaiConfig::from_toml("[cache]\nstrategy = \"mtime\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = GsaiConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn defaults_pass_validation() {
        let config = RepoMapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.focus_referencer_weight, 50.0);
        assert!(config.important_files.iter().any(|f| f == "README.md"));
    }

    #[test]
    fn out_of_range_repomap_values_are_rejected() {
        for toml in [
            "[repomap]\nfocus_weight = -1.0\n",
            "[repomap]\nfocus_weight = 0.0\n",
            "[repomap]\nfocus_weight = nan\n",
            "[repomap]\nfocus_referencer_weight = 0.5\n",
            "[repomap]\ndamping = 1.5\n",
            "[repomap]\ndamping = 1.0\n",
            "[repomap]\ndamping = 0.0\n",
            "[repomap]\nmap_tokens = 0\n",
            "[repomap]\nmax_line_chars = 0\n",
        ] {
            let err = GsaiConfig::from_toml(toml).unwrap_err();
            assert!(matches!(err, GsaiError::Config(_)), "{toml}: {err}");
        }
    }

    #[test]
    fn important_files_can_be_replaced() {
        let config =
            GsaiConfig::from_toml("[repomap]\nimportant_files = [\"NOTES.md\"]\n").unwrap();
        assert_eq!(config.repomap.important_files, vec!["NOTES.md".to_string()]);
    }

    #[test]
    fn default_dir_ends_with_app_path() {
        let config = CacheConfig::default();
        let dir = config.resolved_dir();
        assert!(dir.ends_with("repomap") || dir.ends_with("cache"));
    }
}
