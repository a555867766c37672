use crate::graph::RepoGraph;
use crate::output;
use crate::rank::RankScores;

/// Estimates how many model tokens a piece of text costs.
///
/// Any `Fn(&str) -> usize` is an estimator, so callers can plug in a real
/// tokenizer.
///
/// # Examples
///
/// ```
/// use gsai_repomap::budget::{CharRatio, TokenEstimator};
///
/// assert_eq!(CharRatio::default().estimate("abcdefghi"), 3);
/// let words = |text: &str| text.split_whitespace().count();
/// assert_eq!(words.estimate("fn main ()"), 3);
/// ```
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// One token per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatio {
    pub chars_per_token: usize,
}

impl Default for CharRatio {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenEstimator for CharRatio {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token.max(1))
    }
}

/// A definition eligible for the map, with its rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSymbol {
    pub name: String,
    pub line: u32,
    pub signature: String,
    pub score: f64,
}

/// A file eligible for the map with its best definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub path: String,
    pub score: f64,
    /// Highest rank first, ties by line.
    pub symbols: Vec<RankedSymbol>,
}

/// A file chosen for rendering and the signatures kept under it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile<'a> {
    pub path: &'a str,
    pub symbols: Vec<&'a RankedSymbol>,
}

/// Turn rank scores into per-file candidates, best file first.
///
/// Every file in the graph is a candidate, including files that define
/// nothing. Each keeps at most `max_symbols_per_file` definitions.
pub fn build_candidates(
    graph: &RepoGraph,
    scores: &RankScores,
    max_symbols_per_file: usize,
) -> Vec<Candidate> {
    scores
        .ranked_files()
        .into_iter()
        .map(|(path, score)| {
            let mut symbols: Vec<RankedSymbol> = graph
                .definitions_in(path)
                .iter()
                .map(|tag| RankedSymbol {
                    name: tag.symbol_name.clone(),
                    line: tag.line,
                    signature: tag
                        .signature_context
                        .clone()
                        .unwrap_or_else(|| tag.symbol_name.clone()),
                    score: scores.symbol(path, &tag.symbol_name),
                })
                .collect();
            symbols.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.line.cmp(&b.line)));
            symbols.truncate(max_symbols_per_file);

            Candidate {
                path: path.to_string(),
                score,
                symbols,
            }
        })
        .collect()
}

/// Put bare candidates for `important` files ahead of the ranked ones.
///
/// Files that are already candidates keep their ranked place. Nothing is
/// added when there are no ranked candidates, so a repository without
/// parseable source still maps to nothing.
///
/// # Examples
///
/// ```
/// use gsai_repomap::budget::{with_important_files, Candidate};
///
/// let ranked = vec![Candidate { path: "src/lib.rs".into(), score: 1.0, symbols: vec![] }];
/// let all = with_important_files(ranked, &["Cargo.toml".to_string()]);
/// let paths: Vec<&str> = all.iter().map(|c| c.path.as_str()).collect();
/// assert_eq!(paths, vec!["Cargo.toml", "src/lib.rs"]);
/// ```
pub fn with_important_files(ranked: Vec<Candidate>, important: &[String]) -> Vec<Candidate> {
    if ranked.is_empty() {
        return ranked;
    }
    let mut candidates: Vec<Candidate> = important
        .iter()
        .filter(|path| !ranked.iter().any(|c| &c.path == *path))
        .map(|path| Candidate {
            path: path.clone(),
            score: 0.0,
            symbols: Vec::new(),
        })
        .collect();
    candidates.extend(ranked);
    candidates
}

/// Greedily take candidates in order until the budget runs out.
///
/// Each rendered line is charged with its trailing newline. Selection stops
/// at the first file header or signature that would overflow `max_tokens`,
/// so a larger budget always yields a superset. When not even the first file
/// header fits, including a zero budget, the first file is returned bare.
///
/// # Examples
///
/// ```
/// use gsai_repomap::budget::{fit_to_budget, Candidate, CharRatio, RankedSymbol};
///
/// let candidates = vec![Candidate {
///     path: "src/lib.rs".into(),
///     score: 1.0,
///     symbols: vec![RankedSymbol {
///         name: "run".into(),
///         line: 3,
///         signature: "pub fn run(config: &Config) -> Result<()>".into(),
///         score: 0.5,
///     }],
/// }];
/// let selected = fit_to_budget(&candidates, 1, 100, &CharRatio::default());
/// assert_eq!(selected.len(), 1);
/// assert!(selected[0].symbols.is_empty());
/// ```
pub fn fit_to_budget<'a>(
    candidates: &'a [Candidate],
    max_tokens: usize,
    max_line_chars: usize,
    estimator: &dyn TokenEstimator,
) -> Vec<SelectedFile<'a>> {
    let mut selected: Vec<SelectedFile<'a>> = Vec::new();
    let mut used = 0;

    'files: for candidate in candidates {
        let header = output::file_line(&candidate.path, false, max_line_chars);
        let cost = estimator.estimate(&format!("{header}\n"));
        if used + cost > max_tokens {
            break;
        }
        used += cost;

        let mut file = SelectedFile {
            path: &candidate.path,
            symbols: Vec::new(),
        };
        for symbol in &candidate.symbols {
            let line = output::symbol_line(&symbol.signature, false, false, max_line_chars);
            let cost = estimator.estimate(&format!("{line}\n"));
            if used + cost > max_tokens {
                selected.push(file);
                break 'files;
            }
            used += cost;
            file.symbols.push(symbol);
        }
        selected.push(file);
    }

    if selected.is_empty() {
        if let Some(first) = candidates.first() {
            selected.push(SelectedFile {
                path: &first.path,
                symbols: Vec::new(),
            });
        }
    }

    selected
}
