use std::collections::{HashMap, HashSet};
use std::fmt;

use gsai_core::GsaiError;
use rayon::prelude::*;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

use crate::languages::{spec_for, LanguageSpec, NameLookup};
use crate::walker::{Language, SourceFile};

/// Longest signature kept on a definition tag, in characters.
const MAX_SIGNATURE_CHARS: usize = 200;

/// Whether a tag defines a symbol or refers to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Definition,
    Reference,
}

/// A single identifier occurrence in a source file.
///
/// # Examples
///
/// ```
/// use gsai_repomap::parser::{Tag, TagKind};
///
/// let tag = Tag {
///     file_path: "src/main.rs".into(),
///     symbol_name: "main".into(),
///     kind: TagKind::Definition,
///     line: 1,
///     signature_context: Some("fn main()".into()),
/// };
/// assert!(tag.is_definition());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// File path relative to the repository root, `/`-separated.
    pub file_path: String,
    /// Identifier text.
    pub symbol_name: String,
    /// Definition or reference, decided by AST role.
    pub kind: TagKind,
    /// Line number (1-indexed).
    pub line: u32,
    /// Signature of the defining node. Only set on definitions.
    pub signature_context: Option<String>,
}

impl Tag {
    pub fn is_definition(&self) -> bool {
        self.kind == TagKind::Definition
    }
}

/// Why a file contributed no tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No parser is registered for the file's language.
    Unsupported,
    /// The file parsed with syntax errors.
    SyntaxError,
    /// The parser produced no tree (timeout or cancellation).
    NoTree,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsupported => write!(f, "unsupported language"),
            SkipReason::SyntaxError => write!(f, "syntax error"),
            SkipReason::NoTree => write!(f, "parser produced no tree"),
        }
    }
}

/// Result of parsing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Tags in order of appearance.
    Parsed(Vec<Tag>),
    /// The file is left out of the map.
    Skipped(SkipReason),
}

/// Turns file content into tags.
///
/// `Err` is reserved for failures that are not a property of the file, such
/// as a grammar that cannot be loaded.
pub trait TagParser: Send + Sync {
    fn parse(&self, file_path: &str, content: &str) -> Result<ParseOutcome, GsaiError>;
}

/// Parser used for languages with no grammar. Skips every file.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopParser;

impl TagParser for NoopParser {
    fn parse(&self, _file_path: &str, _content: &str) -> Result<ParseOutcome, GsaiError> {
        Ok(ParseOutcome::Skipped(SkipReason::Unsupported))
    }
}

/// Tree-sitter backed parser driven by a [`LanguageSpec`] table.
///
/// # Examples
///
/// ```
/// use gsai_repomap::parser::{ParseOutcome, TagParser, TreeSitterParser};
/// use gsai_repomap::walker::Language;
///
/// let parser = TreeSitterParser::new(Language::Rust).unwrap();
/// let ParseOutcome::Parsed(tags) = parser.parse("lib.rs", "fn hello() {}").unwrap() else {
///     panic!("expected tags");
/// };
/// assert_eq!(tags[0].symbol_name, "hello");
/// ```
pub struct TreeSitterParser {
    language: Language,
    grammar: tree_sitter::Language,
    spec: &'static LanguageSpec,
}

impl TreeSitterParser {
    /// Build a parser for `language`. `None` when there is no grammar.
    pub fn new(language: Language) -> Option<Self> {
        Some(Self {
            language,
            grammar: language.tree_sitter_language()?,
            spec: spec_for(language)?,
        })
    }
}

impl TagParser for TreeSitterParser {
    fn parse(&self, file_path: &str, content: &str) -> Result<ParseOutcome, GsaiError> {
        let mut parser = Parser::new();
        parser.set_language(&self.grammar).map_err(|e| {
            GsaiError::Parse(format!("failed to set {:?} grammar: {e}", self.language))
        })?;

        let Some(tree) = parser.parse(content, None) else {
            return Ok(ParseOutcome::Skipped(SkipReason::NoTree));
        };
        let root = tree.root_node();
        if root.has_error() {
            return Ok(ParseOutcome::Skipped(SkipReason::SyntaxError));
        }

        Ok(ParseOutcome::Parsed(collect_tags(
            root,
            content.as_bytes(),
            file_path,
            self.spec,
        )))
    }
}

/// Maps languages to parsers. Unregistered languages get [`NoopParser`].
///
/// # Examples
///
/// ```
/// use gsai_repomap::parser::{ParseOutcome, ParserRegistry, SkipReason};
/// use gsai_repomap::walker::Language;
///
/// let registry = ParserRegistry::with_defaults();
/// let outcome = registry.get(Language::Unknown).parse("notes.txt", "hello").unwrap();
/// assert_eq!(outcome, ParseOutcome::Skipped(SkipReason::Unsupported));
/// ```
pub struct ParserRegistry {
    parsers: HashMap<Language, Box<dyn TagParser>>,
    fallback: NoopParser,
}

impl ParserRegistry {
    /// A registry with no parsers; every file is skipped.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
            fallback: NoopParser,
        }
    }

    /// A registry with a tree-sitter parser for every bundled grammar.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for language in [
            Language::Rust,
            Language::Python,
            Language::TypeScript,
            Language::JavaScript,
            Language::Go,
            Language::Java,
            Language::C,
            Language::Cpp,
            Language::Ruby,
            Language::Php,
            Language::Kotlin,
            Language::Swift,
        ] {
            if let Some(parser) = TreeSitterParser::new(language) {
                registry.register(language, Box::new(parser));
            }
        }
        registry
    }

    /// Register or replace the parser for `language`.
    pub fn register(&mut self, language: Language, parser: Box<dyn TagParser>) {
        self.parsers.insert(language, parser);
    }

    /// The parser for `language`, falling back to a no-op parser.
    pub fn get(&self, language: Language) -> &dyn TagParser {
        self.parsers
            .get(&language)
            .map_or(&self.fallback as &dyn TagParser, |p| p.as_ref())
    }

    /// Parse one file, logging skips. Unexpected errors become skips.
    pub fn parse_file(&self, file: &SourceFile) -> ParseOutcome {
        let key = file.key();
        match self.get(file.language).parse(&key, &file.content) {
            Ok(ParseOutcome::Skipped(SkipReason::Unsupported)) => {
                debug!(path = %key, "no parser for file, skipping");
                ParseOutcome::Skipped(SkipReason::Unsupported)
            }
            Ok(ParseOutcome::Skipped(reason)) => {
                warn!(path = %key, %reason, "skipping file");
                ParseOutcome::Skipped(reason)
            }
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %key, error = %err, "parser failed, skipping file");
                ParseOutcome::Skipped(SkipReason::NoTree)
            }
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Tags of one successfully parsed file.
#[derive(Debug, Clone)]
pub struct FileTags {
    /// `/`-separated path relative to the repository root.
    pub path: String,
    pub tags: Vec<Tag>,
}

/// Parse `files` in parallel and return the parsed ones sorted by path.
///
/// Skipped files are dropped. Output does not depend on worker scheduling.
pub fn extract_tags(registry: &ParserRegistry, files: &[SourceFile]) -> Vec<FileTags> {
    let mut parsed: Vec<FileTags> = files
        .par_iter()
        .filter_map(|file| match registry.parse_file(file) {
            ParseOutcome::Parsed(tags) => Some(FileTags {
                path: file.key(),
                tags,
            }),
            ParseOutcome::Skipped(_) => None,
        })
        .collect();

    parsed.sort_by(|a, b| a.path.cmp(&b.path));
    parsed
}

/// Walk the tree in document order, emitting definitions and references.
fn collect_tags(root: Node, source: &[u8], file: &str, spec: &LanguageSpec) -> Vec<Tag> {
    let mut tags = Vec::new();
    let mut name_nodes: HashSet<usize> = HashSet::new();
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();
        let kind = node.kind();

        if let Some(rule) = spec.rule_for(kind) {
            let required = rule.requires_child.map_or(true, |c| child_has_kind(&node, c));
            if let Some(name_node) = required.then(|| find_name(&node, rule.name)).flatten() {
                let name = node_text(&name_node, source);
                if !name.is_empty() {
                    name_nodes.insert(name_node.id());
                    tags.push(Tag {
                        file_path: file.to_string(),
                        symbol_name: name,
                        kind: TagKind::Definition,
                        line: line_of(&node),
                        signature_context: Some(extract_signature(&node, source)),
                    });
                }
            }
        } else if spec.is_identifier(kind) && !name_nodes.contains(&node.id()) {
            let name = node_text(&node, source);
            if !name.is_empty() {
                tags.push(Tag {
                    file_path: file.to_string(),
                    symbol_name: name,
                    kind: TagKind::Reference,
                    line: line_of(&node),
                    signature_context: None,
                });
            }
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return tags;
            }
        }
    }
}

fn find_name<'t>(node: &Node<'t>, lookup: NameLookup) -> Option<Node<'t>> {
    match lookup {
        NameLookup::Field(field) => node.child_by_field_name(field),
        NameLookup::Child(kinds) => {
            let mut cursor = node.walk();
            let found = node.children(&mut cursor).find(|c| kinds.contains(&c.kind()));
            found
        }
        NameLookup::Declarator => {
            let mut current = node.child_by_field_name("declarator")?;
            loop {
                match current.kind() {
                    "identifier" | "field_identifier" | "type_identifier" | "destructor_name"
                    | "operator_name" => return Some(current),
                    "qualified_identifier" => current = current.child_by_field_name("name")?,
                    _ => current = current.child_by_field_name("declarator")?,
                }
            }
        }
    }
}

/// Signature of a definition: its text up to the body, whitespace collapsed.
///
/// Nodes without a `body` field contribute their first line only.
fn extract_signature(node: &Node, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = match node.child_by_field_name("body") {
        Some(body) => body.start_byte(),
        None => node.end_byte(),
    };
    let text = byte_slice(source, start, end);
    let text = match node.child_by_field_name("body") {
        Some(_) => text.as_str(),
        None => text.lines().next().unwrap_or(""),
    };

    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_end_matches(|c: char| c == '{' || c == ':' || c.is_whitespace())
        .to_string();

    truncate_chars(&trimmed, MAX_SIGNATURE_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn line_of(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn byte_slice(source: &[u8], start: usize, end: usize) -> String {
    if start >= source.len() || end > source.len() || start > end {
        return String::new();
    }
    String::from_utf8_lossy(&source[start..end]).to_string()
}

fn node_text(node: &Node, source: &[u8]) -> String {
    byte_slice(source, node.start_byte(), node.end_byte())
}

fn child_has_kind(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == kind);
    found
}
