use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::parser::{FileTags, Tag, TagKind};

/// Weight of one `referencing file → defining file` edge.
///
/// `symbols` breaks `weight` down by identifier so rank can later be
/// attributed to individual definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolEdge {
    pub weight: f64,
    pub symbols: BTreeMap<String, f64>,
}

impl SymbolEdge {
    fn add(&mut self, symbol: &str, weight: f64) {
        self.weight += weight;
        *self.symbols.entry(symbol.to_string()).or_insert(0.0) += weight;
    }
}

/// Identifier-level multipliers applied on top of reference counts.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use gsai_repomap::graph::IdentWeights;
///
/// let weights = IdentWeights::default();
/// assert_eq!(weights.multiplier("foo", 1), 1.0);
/// assert_eq!(weights.multiplier("_x", 1), 0.1);
/// assert_eq!(weights.multiplier("load_config", 1), 10.0);
///
/// let mentioned: BTreeSet<String> = ["foo".to_string()].into();
/// let weights = IdentWeights::new(mentioned);
/// assert_eq!(weights.multiplier("foo", 1), 10.0);
///
/// let focus: BTreeSet<String> = ["src/main.py".to_string()].into();
/// let weights = IdentWeights::default().with_focus_referencers(focus, 50.0);
/// assert_eq!(weights.referencer_multiplier("src/main.py"), 50.0);
/// assert_eq!(weights.referencer_multiplier("src/other.py"), 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdentWeights {
    mentioned: BTreeSet<String>,
    focus_files: BTreeSet<String>,
    focus_referencer_weight: f64,
}

impl IdentWeights {
    pub fn new(mentioned: BTreeSet<String>) -> Self {
        Self {
            mentioned,
            ..Self::default()
        }
    }

    /// Scale every reference made from one of `files` by `weight`.
    pub fn with_focus_referencers(mut self, files: BTreeSet<String>, weight: f64) -> Self {
        self.focus_files = files;
        self.focus_referencer_weight = weight;
        self
    }

    /// Multiplier for references made from `file`.
    pub fn referencer_multiplier(&self, file: &str) -> f64 {
        if self.focus_files.contains(file) {
            self.focus_referencer_weight
        } else {
            1.0
        }
    }

    /// Multiplier for references to `ident`, which is defined in
    /// `definer_count` distinct files.
    pub fn multiplier(&self, ident: &str, definer_count: usize) -> f64 {
        let mut mul = 1.0;

        let is_snake = ident.contains('_') && ident.chars().any(char::is_alphabetic);
        let is_camel =
            ident.chars().any(char::is_uppercase) && ident.chars().any(char::is_lowercase);

        if self.mentioned.contains(ident) {
            mul *= 10.0;
        }
        if (is_snake || is_camel) && ident.chars().count() >= 8 {
            mul *= 10.0;
        }
        if ident.starts_with('_') {
            mul *= 0.1;
        }
        if definer_count > 5 {
            mul *= 0.1;
        }
        mul
    }
}

/// Weighted directed graph over files. An edge `A → B` means A references a
/// symbol defined in B.
///
/// # Examples
///
/// ```
/// use gsai_repomap::graph::{IdentWeights, RepoGraph};
/// use gsai_repomap::parser::{FileTags, Tag, TagKind};
///
/// let tag = |file: &str, name: &str, kind| Tag {
///     file_path: file.into(),
///     symbol_name: name.into(),
///     kind,
///     line: 1,
///     signature_context: None,
/// };
/// let files = vec![
///     FileTags { path: "a.py".into(), tags: vec![tag("a.py", "foo", TagKind::Definition)] },
///     FileTags { path: "b.py".into(), tags: vec![tag("b.py", "foo", TagKind::Reference)] },
/// ];
/// let graph = RepoGraph::build(&files, &IdentWeights::default());
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_weight("b.py", "a.py"), Some(1.0));
/// ```
pub struct RepoGraph {
    graph: DiGraph<String, SymbolEdge>,
    index: BTreeMap<String, NodeIndex>,
    definitions: BTreeMap<String, Vec<Tag>>,
}

impl RepoGraph {
    /// Build the graph from parsed files.
    ///
    /// Every file becomes a node, even one with no tags. For each reference
    /// to a name, an edge goes to every other file defining that name,
    /// weighted by that file's share of the name's definitions. Weights of
    /// repeated references add up. References within a file add nothing.
    /// References made from focus files are scaled by the focus referencer
    /// weight.
    pub fn build(files: &[FileTags], weights: &IdentWeights) -> Self {
        let mut graph: DiGraph<String, SymbolEdge> = DiGraph::new();
        let mut index: BTreeMap<String, NodeIndex> = BTreeMap::new();
        let mut definitions: BTreeMap<String, Vec<Tag>> = BTreeMap::new();

        // name -> file -> count
        let mut defines: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        let mut references: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();

        let mut sorted: Vec<&FileTags> = files.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        for file in sorted {
            if index.contains_key(&file.path) {
                continue;
            }
            let idx = graph.add_node(file.path.clone());
            index.insert(file.path.clone(), idx);

            for tag in &file.tags {
                let counts = match tag.kind {
                    TagKind::Definition => {
                        definitions
                            .entry(file.path.clone())
                            .or_default()
                            .push(tag.clone());
                        &mut defines
                    }
                    TagKind::Reference => &mut references,
                };
                *counts
                    .entry(tag.symbol_name.as_str())
                    .or_default()
                    .entry(file.path.as_str())
                    .or_insert(0) += 1;
            }
        }

        for (name, referencers) in &references {
            let Some(definers) = defines.get(name) else {
                continue;
            };
            let total: usize = definers.values().sum();
            let mul = weights.multiplier(name, definers.len());

            for (&from, &ref_count) in referencers {
                for (&to, &def_count) in definers {
                    if from == to {
                        continue;
                    }
                    let share = def_count as f64 / total as f64;
                    let weight =
                        mul * weights.referencer_multiplier(from) * ref_count as f64 * share;

                    let (a, b) = (index[from], index[to]);
                    match graph.find_edge(a, b) {
                        Some(edge) => graph[edge].add(name, weight),
                        None => {
                            let mut data = SymbolEdge::default();
                            data.add(name, weight);
                            graph.add_edge(a, b, data);
                        }
                    }
                }
            }
        }

        Self {
            graph,
            index,
            definitions,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// File paths in node order (sorted).
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Total weight of the `from → to` edge, if any.
    pub fn edge_weight(&self, from: &str, to: &str) -> Option<f64> {
        let edge = self.graph.find_edge(*self.index.get(from)?, *self.index.get(to)?)?;
        Some(self.graph[edge].weight)
    }

    /// Definition tags of `file`, in appearance order.
    pub fn definitions_in(&self, file: &str) -> &[Tag] {
        self.definitions.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node index of `file`.
    pub(crate) fn node_of(&self, file: &str) -> Option<NodeIndex> {
        self.index.get(file).copied()
    }

    /// Edges as `(from, to, edge)` triples in insertion order.
    pub(crate) fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &SymbolEdge)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (e.source(), e.target(), &e.weight))
    }

    pub(crate) fn path_of(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }
}
