use std::collections::BTreeMap;
use std::fmt::Write;

use crate::budget::{RankedSymbol, SelectedFile};

const BRANCH: &str = "\u{251c}\u{2500}\u{2500} ";
const LAST_BRANCH: &str = "\u{2514}\u{2500}\u{2500} ";
const PIPE: &str = "\u{2502}   ";
const SPACE: &str = "    ";

/// Render the selection as an ASCII tree.
///
/// Files are listed alphabetically, each followed by its signatures in line
/// order. Every line is cut to `max_line_chars` characters.
///
/// # Examples
///
/// ```
/// use gsai_repomap::budget::SelectedFile;
/// use gsai_repomap::output::format_tree;
///
/// let files = [SelectedFile { path: "src/lib.rs", symbols: vec![] }];
/// assert_eq!(format_tree(&files, 100), "\u{2514}\u{2500}\u{2500} src/lib.rs\n");
/// assert!(format_tree(&[], 100).is_empty());
/// ```
pub fn format_tree(files: &[SelectedFile<'_>], max_line_chars: usize) -> String {
    if files.is_empty() {
        return String::new();
    }

    let mut by_file: BTreeMap<&str, Vec<&RankedSymbol>> = BTreeMap::new();
    for file in files {
        by_file
            .entry(file.path)
            .or_default()
            .extend(file.symbols.iter().copied());
    }
    for symbols in by_file.values_mut() {
        symbols.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.name.cmp(&b.name)));
    }

    let mut out = String::new();
    let file_count = by_file.len();

    for (file_idx, (path, symbols)) in by_file.iter().enumerate() {
        let is_last_file = file_idx == file_count - 1;
        let _ = writeln!(out, "{}", file_line(path, is_last_file, max_line_chars));

        let sym_count = symbols.len();
        for (sym_idx, symbol) in symbols.iter().enumerate() {
            let is_last_sym = sym_idx == sym_count - 1;
            let line = symbol_line(&symbol.signature, is_last_file, is_last_sym, max_line_chars);
            let _ = writeln!(out, "{line}");
        }
    }

    out
}

/// The header line for a file, without the trailing newline.
pub fn file_line(path: &str, is_last_file: bool, max_chars: usize) -> String {
    let prefix = if is_last_file { LAST_BRANCH } else { BRANCH };
    truncate_line(&format!("{prefix}{path}"), max_chars).to_string()
}

/// The line for one signature under a file, without the trailing newline.
pub fn symbol_line(
    signature: &str,
    is_last_file: bool,
    is_last_symbol: bool,
    max_chars: usize,
) -> String {
    let indent = if is_last_file { SPACE } else { PIPE };
    let prefix = if is_last_symbol { LAST_BRANCH } else { BRANCH };
    truncate_line(&format!("{indent}{prefix}{signature}"), max_chars).to_string()
}

/// Cut `line` to at most `max_chars` characters.
pub fn truncate_line(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}
