//! Repository structure mapping via tree-sitter and PageRank ranking.
//!
//! Generates a compressed, ranked map of the files and signatures in a
//! repository, sized to a token budget, for use as LLM prompt context.
//! Uses tree-sitter for symbol extraction, petgraph for the file reference
//! graph, the `ignore` crate for file walking, and an on-disk cache keyed by
//! a cheap repository fingerprint so unchanged repositories are not
//! re-parsed.
//!
//! The pipeline is walk → [`parser::extract_tags`] → [`graph::RepoGraph`] →
//! [`rank::rank`] → [`budget::fit_to_budget`] → [`output::format_tree`],
//! wrapped by [`cache::CacheManager::get_or_build`].

pub mod budget;
pub mod cache;
pub mod focus;
pub mod graph;
pub mod key;
pub mod languages;
pub mod output;
pub mod parser;
pub mod rank;
pub mod walker;

use std::path::{Path, PathBuf};

use gsai_core::{GsaiError, RepoMapConfig};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::budget::{CharRatio, TokenEstimator};
use crate::cache::CacheManager;
use crate::focus::FocusSet;
use crate::graph::{IdentWeights, RepoGraph};
use crate::parser::ParserRegistry;
use crate::rank::RankConfig;

/// The map returned in place of a real one when a repository has more
/// source files than `max_files`.
pub const TOO_LARGE_NOTICE: &str = "Repo is too large to generate a repo map.";

/// What to map and how big the map may be.
///
/// # Examples
///
/// ```
/// use gsai_repomap::MapRequest;
///
/// let request = MapRequest::new(".")
///     .with_focus(["src/lib.rs"])
///     .with_idents(["RepoMapper"])
///     .with_budget(2048);
/// assert_eq!(request.token_budget, Some(2048));
/// assert_eq!(request.focus_files.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapRequest {
    /// Working directory to map.
    pub root: PathBuf,
    /// Files the request is about, relative to `root` or absolute.
    pub focus_files: Vec<PathBuf>,
    /// Identifiers mentioned in the request.
    pub mentioned_idents: Vec<String>,
    /// Token budget. `None` uses the configured `map_tokens`.
    pub token_budget: Option<usize>,
}

impl MapRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_focus<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.focus_files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn with_idents<I, S>(mut self, idents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mentioned_idents.extend(idents.into_iter().map(Into::into));
        self
    }

    pub fn with_budget(mut self, tokens: usize) -> Self {
        self.token_budget = Some(tokens);
        self
    }
}

/// Builds repo maps, consulting the cache first.
///
/// # Examples
///
/// ```
/// use gsai_core::RepoMapConfig;
/// use gsai_repomap::cache::CacheManager;
/// use gsai_repomap::{MapRequest, RepoMapper};
///
/// let repo = tempfile::tempdir().unwrap();
/// std::fs::write(repo.path().join("a.py"), "def foo():\n    pass\n").unwrap();
///
/// let mapper = RepoMapper::new(RepoMapConfig::default(), CacheManager::disabled());
/// let map = mapper.generate_map(&MapRequest::new(repo.path())).unwrap();
/// assert!(map.contains("a.py"));
/// assert!(map.contains("def foo()"));
/// ```
pub struct RepoMapper {
    config: RepoMapConfig,
    cache: CacheManager,
    registry: ParserRegistry,
    estimator: Box<dyn TokenEstimator + Send + Sync>,
}

impl RepoMapper {
    pub fn new(config: RepoMapConfig, cache: CacheManager) -> Self {
        Self {
            config,
            cache,
            registry: ParserRegistry::with_defaults(),
            estimator: Box::new(CharRatio::default()),
        }
    }

    /// Replace the symbol extractors.
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the token estimator used for budgeting.
    pub fn with_estimator<E>(mut self, estimator: E) -> Self
    where
        E: TokenEstimator + Send + Sync + 'static,
    {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn config(&self) -> &RepoMapConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Return the repo map for `request`, from cache when possible.
    ///
    /// Repositories over `max_files` get [`TOO_LARGE_NOTICE`], which is
    /// never cached.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::InvalidWorkingDirectory`] if the root is not a
    /// readable directory, or [`GsaiError::Config`] for a zero token budget
    /// or out-of-range settings. Everything else degrades to a smaller map.
    pub fn generate_map(&self, request: &MapRequest) -> Result<String, GsaiError> {
        walker::validate_root(&request.root)?;
        self.config.validate()?;

        let token_budget = request.token_budget.unwrap_or(self.config.map_tokens);
        if token_budget == 0 {
            return Err(GsaiError::Config("token budget must be positive".into()));
        }
        if self.is_too_large(&request.root)? {
            return Ok(TOO_LARGE_NOTICE.to_string());
        }

        let focus = FocusSet::new(
            &request.root,
            &request.focus_files,
            request.mentioned_idents.iter().cloned(),
        )
        .with_settings(settings_digest(&self.config));

        self.cache.get_or_build(&request.root, &focus, token_budget, || {
            Ok(self.render(&request.root, &focus, token_budget))
        })
    }

    /// Run the full pipeline without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns [`GsaiError::InvalidWorkingDirectory`] if `root` is not a
    /// readable directory.
    pub fn build_map(
        &self,
        root: &Path,
        focus: &FocusSet,
        token_budget: usize,
    ) -> Result<String, GsaiError> {
        walker::validate_root(root)?;
        if self.is_too_large(root)? {
            return Ok(TOO_LARGE_NOTICE.to_string());
        }
        Ok(self.render(root, focus, token_budget))
    }

    fn is_too_large(&self, root: &Path) -> Result<bool, GsaiError> {
        let listed = walker::list_source_files(root)?;
        if listed.len() > self.config.max_files {
            warn!(
                files = listed.len(),
                max_files = self.config.max_files,
                "repository too large for a repo map"
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn render(&self, root: &Path, focus: &FocusSet, token_budget: usize) -> String {
        let files = match walker::walk_repo(root) {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "walking repository failed");
                return String::new();
            }
        };
        let tags = parser::extract_tags(&self.registry, &files);

        let weights = IdentWeights::new(focus.idents().clone())
            .with_focus_referencers(focus.files().clone(), self.config.focus_referencer_weight);
        let graph = RepoGraph::build(&tags, &weights);
        let scores = rank::rank(&graph, focus.files(), &RankConfig::from(&self.config));
        debug!(
            files = graph.node_count(),
            edges = graph.edge_count(),
            "ranked repository graph"
        );

        let ranked = budget::build_candidates(&graph, &scores, self.config.max_symbols_per_file);
        let important = walker::find_important_files(root, &self.config.important_files);
        let candidates = budget::with_important_files(ranked, &important);
        let selected = budget::fit_to_budget(
            &candidates,
            token_budget,
            self.config.max_line_chars,
            self.estimator.as_ref(),
        );

        output::format_tree(&selected, self.config.max_line_chars)
    }
}

/// Digest of the settings that shape a rendered map, so a config change
/// never serves a map built under the old settings.
fn settings_digest(config: &RepoMapConfig) -> String {
    let encoded = serde_json::to_vec(config).unwrap_or_default();
    format!("{:x}", Sha256::digest(&encoded))
}

/// Generate an uncached map of `root` with default settings.
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
/// use gsai_repomap::generate_map;
///
/// let map = generate_map(Path::new("."), 1024, &[]).unwrap();
/// println!("{map}");
/// ```
pub fn generate_map(
    root: &Path,
    max_tokens: usize,
    focus_files: &[PathBuf],
) -> Result<String, GsaiError> {
    let mapper = RepoMapper::new(RepoMapConfig::default(), CacheManager::disabled());
    let request = MapRequest {
        root: root.to_path_buf(),
        focus_files: focus_files.to_vec(),
        mentioned_idents: Vec::new(),
        token_budget: Some(max_tokens),
    };
    mapper.generate_map(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mapper(config: RepoMapConfig) -> RepoMapper {
        RepoMapper::new(config, CacheManager::disabled())
    }

    #[test]
    fn oversize_repo_gets_notice() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            fs::write(dir.path().join(format!("f{i}.py")), "x = 1\n").unwrap();
        }
        let config = RepoMapConfig {
            max_files: 2,
            ..RepoMapConfig::default()
        };
        let map = mapper(config)
            .generate_map(&MapRequest::new(dir.path()))
            .unwrap();
        assert_eq!(map, TOO_LARGE_NOTICE);
    }

    #[test]
    fn default_budget_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();

        let config = RepoMapConfig {
            map_tokens: 1,
            ..RepoMapConfig::default()
        };
        let map = mapper(config)
            .generate_map(&MapRequest::new(dir.path()))
            .unwrap();
        assert_eq!(map, "└── a.py\n");
    }

    #[test]
    fn custom_estimator_is_used() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();

        // Everything is free, so a budget of one fits the whole map.
        let map = mapper(RepoMapConfig::default())
            .with_estimator(|_: &str| 0usize)
            .generate_map(&MapRequest::new(dir.path()).with_budget(1))
            .unwrap();
        assert!(map.contains("def alpha()"));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();
        let err = generate_map(dir.path(), 0, &[]).unwrap_err();
        assert!(matches!(err, GsaiError::Config(_)), "{err}");
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();
        let config = RepoMapConfig {
            damping: 1.5,
            ..RepoMapConfig::default()
        };
        let err = mapper(config)
            .generate_map(&MapRequest::new(dir.path()))
            .unwrap_err();
        assert!(matches!(err, GsaiError::Config(_)), "{err}");
    }

    #[test]
    fn oversize_notice_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            fs::write(dir.path().join(format!("f{i}.py")), "x = 1\n").unwrap();
        }
        let config = RepoMapConfig {
            max_files: 2,
            ..RepoMapConfig::default()
        };
        let strategy = gsai_core::CacheStrategy::Simple;
        let cache = CacheManager::new(cache_dir.path(), 3600, 1 << 20, strategy);
        let mapper = RepoMapper::new(config, cache);

        let map = mapper.generate_map(&MapRequest::new(dir.path())).unwrap();
        assert_eq!(map, TOO_LARGE_NOTICE);
        assert_eq!(mapper.cache().stats().unwrap().entries, 0);
    }

    #[test]
    fn important_files_lead_the_map() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def alpha():\n    pass\n").unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

        let map = mapper(RepoMapConfig::default())
            .generate_map(&MapRequest::new(dir.path()).with_budget(1))
            .unwrap();
        assert_eq!(map, "└── README.md\n");

        let map = mapper(RepoMapConfig::default())
            .generate_map(&MapRequest::new(dir.path()))
            .unwrap();
        assert_eq!(map, "├── README.md\n└── a.py\n    └── def alpha()\n");
    }

    #[test]
    fn settings_change_the_cache_identity() {
        let base = settings_digest(&RepoMapConfig::default());
        let narrower = settings_digest(&RepoMapConfig {
            max_line_chars: 40,
            ..RepoMapConfig::default()
        });
        assert_ne!(base, narrower);
        assert_eq!(base, settings_digest(&RepoMapConfig::default()));
    }

    #[test]
    fn empty_repo_maps_to_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(generate_map(dir.path(), 1024, &[]).unwrap(), "");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_map(&dir.path().join("nope"), 1024, &[]).unwrap_err();
        assert!(matches!(err, GsaiError::InvalidWorkingDirectory(_)));
    }
}
