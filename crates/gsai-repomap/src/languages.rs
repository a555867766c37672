//! Per-language tables describing which AST nodes define a symbol.
//!
//! A node whose kind matches a [`DefinitionRule`] produces a definition tag
//! named by the rule's [`NameLookup`]. Every other node whose kind is listed
//! in [`LanguageSpec::identifiers`] produces a reference tag.

use crate::walker::Language;

/// How to find the name node of a definition.
#[derive(Debug, Clone, Copy)]
pub enum NameLookup {
    /// The grammar exposes the name as a named field.
    Field(&'static str),
    /// The first direct child with one of these kinds.
    Child(&'static [&'static str]),
    /// Follow `declarator` fields down to an identifier (C and C++).
    Declarator,
}

/// A node kind that defines a symbol.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionRule {
    /// Tree-sitter node kind.
    pub node: &'static str,
    /// Where the defined name lives.
    pub name: NameLookup,
    /// Only match when a direct child of this kind is present.
    pub requires_child: Option<&'static str>,
}

const fn def(node: &'static str) -> DefinitionRule {
    DefinitionRule {
        node,
        name: NameLookup::Field("name"),
        requires_child: None,
    }
}

const fn def_child(node: &'static str, kinds: &'static [&'static str]) -> DefinitionRule {
    DefinitionRule {
        node,
        name: NameLookup::Child(kinds),
        requires_child: None,
    }
}

const fn def_with(node: &'static str, name: NameLookup, child: &'static str) -> DefinitionRule {
    DefinitionRule {
        node,
        name,
        requires_child: Some(child),
    }
}

/// Definition rules and reference node kinds for one language.
#[derive(Debug)]
pub struct LanguageSpec {
    pub definitions: &'static [DefinitionRule],
    pub identifiers: &'static [&'static str],
}

impl LanguageSpec {
    /// The rule matching `kind`, if the node defines a symbol.
    pub fn rule_for(&self, kind: &str) -> Option<&DefinitionRule> {
        self.definitions.iter().find(|r| r.node == kind)
    }

    /// Whether nodes of `kind` count as identifier references.
    pub fn is_identifier(&self, kind: &str) -> bool {
        self.identifiers.contains(&kind)
    }
}

static RUST: LanguageSpec = LanguageSpec {
    definitions: &[
        def("function_item"),
        def("function_signature_item"),
        def("struct_item"),
        def("enum_item"),
        def("union_item"),
        def("trait_item"),
        def("type_item"),
        def("const_item"),
        def("static_item"),
        def("mod_item"),
        def("macro_definition"),
    ],
    identifiers: &["identifier", "type_identifier", "field_identifier"],
};

static PYTHON: LanguageSpec = LanguageSpec {
    definitions: &[def("function_definition"), def("class_definition")],
    identifiers: &["identifier"],
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    definitions: &[
        def("function_declaration"),
        def("generator_function_declaration"),
        def("class_declaration"),
        def("method_definition"),
        def_with(
            "variable_declarator",
            NameLookup::Field("name"),
            "arrow_function",
        ),
    ],
    identifiers: &["identifier", "property_identifier"],
};

static TYPESCRIPT: LanguageSpec = LanguageSpec {
    definitions: &[
        def("function_declaration"),
        def("generator_function_declaration"),
        def("class_declaration"),
        def("abstract_class_declaration"),
        def("method_definition"),
        def("interface_declaration"),
        def("type_alias_declaration"),
        def("enum_declaration"),
        def_with(
            "variable_declarator",
            NameLookup::Field("name"),
            "arrow_function",
        ),
    ],
    identifiers: &["identifier", "property_identifier", "type_identifier"],
};

static GO: LanguageSpec = LanguageSpec {
    definitions: &[
        def("function_declaration"),
        def("method_declaration"),
        def("type_spec"),
    ],
    identifiers: &["identifier", "type_identifier", "field_identifier"],
};

static JAVA: LanguageSpec = LanguageSpec {
    definitions: &[
        def("class_declaration"),
        def("interface_declaration"),
        def("enum_declaration"),
        def("record_declaration"),
        def("method_declaration"),
        def("constructor_declaration"),
    ],
    identifiers: &["identifier", "type_identifier"],
};

static C: LanguageSpec = LanguageSpec {
    definitions: &[
        DefinitionRule {
            node: "function_definition",
            name: NameLookup::Declarator,
            requires_child: None,
        },
        def_with("declaration", NameLookup::Declarator, "function_declarator"),
        def_with("struct_specifier", NameLookup::Field("name"), "field_declaration_list"),
        def_with("union_specifier", NameLookup::Field("name"), "field_declaration_list"),
        def_with("enum_specifier", NameLookup::Field("name"), "enumerator_list"),
        DefinitionRule {
            node: "type_definition",
            name: NameLookup::Declarator,
            requires_child: None,
        },
    ],
    identifiers: &["identifier", "type_identifier", "field_identifier"],
};

static CPP: LanguageSpec = LanguageSpec {
    definitions: &[
        DefinitionRule {
            node: "function_definition",
            name: NameLookup::Declarator,
            requires_child: None,
        },
        def_with("declaration", NameLookup::Declarator, "function_declarator"),
        def_with("class_specifier", NameLookup::Field("name"), "field_declaration_list"),
        def_with("struct_specifier", NameLookup::Field("name"), "field_declaration_list"),
        def_with("enum_specifier", NameLookup::Field("name"), "enumerator_list"),
        def("namespace_definition"),
        DefinitionRule {
            node: "type_definition",
            name: NameLookup::Declarator,
            requires_child: None,
        },
    ],
    identifiers: &[
        "identifier",
        "type_identifier",
        "field_identifier",
        "namespace_identifier",
    ],
};

static RUBY: LanguageSpec = LanguageSpec {
    definitions: &[
        def("method"),
        def("singleton_method"),
        def("class"),
        def("module"),
    ],
    identifiers: &["identifier", "constant"],
};

static PHP: LanguageSpec = LanguageSpec {
    definitions: &[
        def("function_definition"),
        def("method_declaration"),
        def("class_declaration"),
        def("interface_declaration"),
        def("trait_declaration"),
        def("enum_declaration"),
    ],
    identifiers: &["name"],
};

const KOTLIN_NAMES: &[&str] = &["identifier", "simple_identifier", "type_identifier"];

static KOTLIN: LanguageSpec = LanguageSpec {
    definitions: &[
        def_child("function_declaration", KOTLIN_NAMES),
        def_child("class_declaration", KOTLIN_NAMES),
        def_child("object_declaration", KOTLIN_NAMES),
        def_child("interface_declaration", KOTLIN_NAMES),
    ],
    identifiers: &["identifier", "simple_identifier", "type_identifier"],
};

const SWIFT_NAMES: &[&str] = &["simple_identifier", "type_identifier"];

static SWIFT: LanguageSpec = LanguageSpec {
    definitions: &[
        def_child("function_declaration", SWIFT_NAMES),
        def_child("class_declaration", SWIFT_NAMES),
        def_child("protocol_declaration", SWIFT_NAMES),
    ],
    identifiers: &["simple_identifier", "type_identifier"],
};

/// The tag table for `language`, or `None` when there is no grammar.
///
/// # Examples
///
/// ```
/// use gsai_repomap::languages::spec_for;
/// use gsai_repomap::walker::Language;
///
/// let python = spec_for(Language::Python).unwrap();
/// assert!(python.rule_for("function_definition").is_some());
/// assert!(spec_for(Language::Unknown).is_none());
/// ```
pub fn spec_for(language: Language) -> Option<&'static LanguageSpec> {
    match language {
        Language::Rust => Some(&RUST),
        Language::Python => Some(&PYTHON),
        Language::TypeScript => Some(&TYPESCRIPT),
        Language::JavaScript => Some(&JAVASCRIPT),
        Language::Go => Some(&GO),
        Language::Java => Some(&JAVA),
        Language::C => Some(&C),
        Language::Cpp => Some(&CPP),
        Language::Ruby => Some(&RUBY),
        Language::Php => Some(&PHP),
        Language::Kotlin => Some(&KOTLIN),
        Language::Swift => Some(&SWIFT),
        Language::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_language_has_a_spec() {
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
            let spec = spec_for(language).unwrap();
            assert!(!spec.definitions.is_empty(), "{language:?}");
            assert!(!spec.identifiers.is_empty(), "{language:?}");
        }
    }

    #[test]
    fn c_declarations_require_function_declarator() {
        let rule = spec_for(Language::C).unwrap().rule_for("declaration").unwrap();
        assert_eq!(rule.requires_child, Some("function_declarator"));
    }
}
