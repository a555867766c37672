use std::collections::{BTreeMap, BTreeSet};

use gsai_core::RepoMapConfig;
use tracing::warn;

use crate::graph::RepoGraph;

/// Parameters of the personalized PageRank run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub focus_weight: f64,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self::from(&RepoMapConfig::default())
    }
}

impl From<&RepoMapConfig> for RankConfig {
    fn from(config: &RepoMapConfig) -> Self {
        Self {
            damping: config.damping,
            max_iterations: config.max_iterations,
            focus_weight: config.focus_weight,
        }
    }
}

/// Importance scores for files and for `(file, symbol)` definitions.
///
/// File scores sum to 1 over all nodes of a non-empty graph.
#[derive(Debug, Clone, Default)]
pub struct RankScores {
    files: BTreeMap<String, f64>,
    symbols: BTreeMap<(String, String), f64>,
}

impl RankScores {
    pub fn file(&self, path: &str) -> f64 {
        self.files.get(path).copied().unwrap_or(0.0)
    }

    /// Rank flowing into the definition of `symbol` in `path`.
    pub fn symbol(&self, path: &str, symbol: &str) -> f64 {
        self.symbols
            .get(&(path.to_string(), symbol.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Files in descending score, ties broken by path ascending.
    pub fn ranked_files(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .files
            .iter()
            .map(|(path, score)| (path.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn total(&self) -> f64 {
        self.files.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Score every file of `graph` with PageRank personalized toward `focus`.
///
/// Focus files start with `focus_weight` times the weight of any other file;
/// with no focus the walk is uniform. Rank of files without outgoing edges is
/// spread back along the personalization vector, so disconnected components
/// and edgeless graphs need no special casing. Iteration stops once the L1
/// change drops below `n * 1e-6` or after `max_iterations` steps.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use gsai_repomap::graph::{IdentWeights, RepoGraph};
/// use gsai_repomap::parser::FileTags;
/// use gsai_repomap::rank::{rank, RankConfig};
///
/// let files = vec![
///     FileTags { path: "a.rs".into(), tags: vec![] },
///     FileTags { path: "b.rs".into(), tags: vec![] },
/// ];
/// let graph = RepoGraph::build(&files, &IdentWeights::default());
/// let scores = rank(&graph, &BTreeSet::new(), &RankConfig::default());
/// assert!((scores.file("a.rs") - 0.5).abs() < 1e-9);
/// ```
pub fn rank(graph: &RepoGraph, focus: &BTreeSet<String>, config: &RankConfig) -> RankScores {
    let n = graph.node_count();
    if n == 0 {
        return RankScores::default();
    }

    let personalization = personalization(graph, focus, config.focus_weight);

    let mut out_weight = vec![0.0; n];
    for (from, _, edge) in graph.edges() {
        out_weight[from.index()] += edge.weight;
    }

    let d = config.damping;
    let tolerance = n as f64 * 1e-6;
    let mut ranks = personalization.clone();

    for _ in 0..config.max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&i| out_weight[i] <= 0.0)
            .map(|i| ranks[i])
            .sum();

        let mut next: Vec<f64> = personalization
            .iter()
            .map(|p| (1.0 - d) * p + d * dangling * p)
            .collect();

        for (from, to, edge) in graph.edges() {
            let i = from.index();
            next[to.index()] += d * ranks[i] * edge.weight / out_weight[i];
        }

        let delta: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();
        ranks = next;
        if delta < tolerance {
            break;
        }
    }

    let total: f64 = ranks.iter().sum();
    if total > 0.0 {
        for r in &mut ranks {
            *r /= total;
        }
    }

    let mut symbols: BTreeMap<(String, String), f64> = BTreeMap::new();
    for (from, to, edge) in graph.edges() {
        let i = from.index();
        let target = graph.path_of(to);
        for (symbol, weight) in &edge.symbols {
            *symbols
                .entry((target.to_string(), symbol.clone()))
                .or_insert(0.0) += ranks[i] * weight / out_weight[i];
        }
    }

    let files = graph
        .files()
        .zip(ranks)
        .map(|(path, score)| (path.to_string(), score))
        .collect();

    RankScores { files, symbols }
}

/// Starting distribution of the walk. Falls back to uniform when the focus
/// weight would make it empty, negative or not finite.
fn personalization(graph: &RepoGraph, focus: &BTreeSet<String>, focus_weight: f64) -> Vec<f64> {
    let mut weights: Vec<f64> = graph
        .files()
        .map(|path| {
            if focus.contains(path) {
                focus_weight
            } else {
                1.0
            }
        })
        .collect();

    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 || weights.iter().any(|w| *w < 0.0) {
        warn!(focus_weight, "unusable focus weight, ranking without focus");
        let uniform = 1.0 / weights.len() as f64;
        return vec![uniform; weights.len()];
    }
    for w in &mut weights {
        *w /= total;
    }
    weights
}
