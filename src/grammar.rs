use std::ffi::OsStr;
use std::path::Path;

use fancy_regex::{Regex, RegexBuilder};
use lazy_static::lazy_static;

use crate::error::ScanError;

/// Upper bound on backtracking steps for a single match attempt. Patterns that
/// need the backtracking engine fail with a `ScanError` instead of hanging.
const BACKTRACK_LIMIT: usize = 1_000_000;

/// How declarations of one language are recognized. Capture group 1 of every
/// pattern must be the declared name.
#[derive(Debug, Clone)]
pub struct LanguageGrammar {
    pub language_id: &'static str,
    pub extensions: &'static [&'static str],
    pub method_pattern: &'static str,
    pub module_pattern: &'static str,
    pub class_pattern: &'static str,
}

pub static CSHARP: LanguageGrammar = LanguageGrammar {
    language_id: "csharp",
    extensions: &["cs"],
    method_pattern: r"(?:public|protected|internal|private)(?:\s+async){0,1}(?:\s+(?:abstract|static|virtual|override|sealed))?\s+[\w+<>\[\]\s]+\s+([\w]+\([\w\s<>]*\))",
    module_pattern: r"namespace\s+([\w.]+)",
    class_pattern: r"(?:public|private|internal|protected)(?:\s+(?:abstract|sealed|static|partial))*\s+class\s+([\w<>]+)",
};

pub static JAVA: LanguageGrammar = LanguageGrammar {
    language_id: "java",
    extensions: &["java"],
    method_pattern: r"(?:public|protected|private|static|\s)+[\w<>\[\]]+\s+([\w]+\s*(?:\w+)*\([^\)]*\))",
    module_pattern: r"package\s+([\w.]+);",
    class_pattern: r"(?:public|protected|private|static)\s*class\s+([\w.<>]+)",
};

/// Elixir has modules but no classes, so its class pattern never names anything.
pub static ELIXIR: LanguageGrammar = LanguageGrammar {
    language_id: "elixir",
    extensions: &["ex", "exs"],
    method_pattern: r"def[p]?\s+((?:\w+)(?:\(.*\))?)\s*,?\s*do",
    module_pattern: r"defmodule\s+([\w.]+)\s+do",
    class_pattern: r"^$",
};

pub static BUILTIN_GRAMMARS: [&LanguageGrammar; 3] = [&CSHARP, &JAVA, &ELIXIR];

lazy_static! {
    pub static ref GRAMMAR_TABLE: GrammarTable = GrammarTable::from_grammars(&BUILTIN_GRAMMARS);
}

impl LanguageGrammar {
    pub fn selects_language(&self, language_id: &str) -> bool {
        self.language_id == language_id
    }

    pub fn selects_path(&self, path: &Path) -> bool {
        path.extension()
            .map_or(false, |ext| self.extensions.iter().any(|e| ext == OsStr::new(e)))
    }

    pub fn compile(&self) -> Result<CompiledGrammar, ScanError> {
        Ok(CompiledGrammar {
            grammar: self.clone(),
            method: compile_pattern(self.method_pattern)?,
            module: compile_pattern(self.module_pattern)?,
            class: compile_pattern(self.class_pattern)?,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ScanError> {
    RegexBuilder::new(pattern)
        .backtrack_limit(BACKTRACK_LIMIT)
        .build()
        .map_err(|source| ScanError::Compile {
            pattern: pattern.to_string(),
            source,
        })
}

/// A grammar with its patterns ready to match.
#[derive(Debug)]
pub struct CompiledGrammar {
    pub grammar: LanguageGrammar,
    pub method: Regex,
    pub module: Regex,
    pub class: Regex,
}

/// The set of grammars a document can be scanned with.
#[derive(Debug, Default)]
pub struct GrammarTable {
    grammars: Vec<CompiledGrammar>,
}

impl GrammarTable {
    /// Compiles `grammars`, leaving out (and logging) any that fail.
    pub fn from_grammars(grammars: &[&LanguageGrammar]) -> Self {
        let grammars = grammars
            .iter()
            .filter_map(|grammar| match grammar.compile() {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    tracing::error!(
                        language = grammar.language_id,
                        "dropping grammar that doesn't compile: {}",
                        e
                    );
                    None
                }
            })
            .collect();
        Self { grammars }
    }

    /// Picks a grammar by LSP language id, falling back to the file extension.
    pub fn for_document(&self, language_id: &str, path: Option<&Path>) -> Option<&CompiledGrammar> {
        self.grammars
            .iter()
            .find(|compiled| compiled.grammar.selects_language(language_id))
            .or_else(|| {
                let path = path?;
                self.grammars
                    .iter()
                    .find(|compiled| compiled.grammar.selects_path(path))
            })
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledGrammar> {
        self.grammars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_grammars_all_compile() {
        assert_eq!(GRAMMAR_TABLE.len(), BUILTIN_GRAMMARS.len());
    }

    #[test]
    fn broken_grammar_is_left_out_of_the_table() {
        static BROKEN: LanguageGrammar = LanguageGrammar {
            language_id: "broken",
            extensions: &["brk"],
            method_pattern: r"(unclosed",
            module_pattern: r"module\s+(\w+)",
            class_pattern: r"^$",
        };

        let table = GrammarTable::from_grammars(&[&BROKEN, &JAVA]);

        assert_eq!(table.len(), 1);
        assert!(table.for_document("broken", None).is_none());
        assert!(matches!(BROKEN.compile(), Err(ScanError::Compile { .. })));
    }

    #[test]
    fn selects_by_language_id_then_extension() {
        let by_id = GRAMMAR_TABLE.for_document("csharp", None).unwrap();
        assert_eq!(by_id.grammar.language_id, "csharp");

        let by_path = GRAMMAR_TABLE
            .for_document("plaintext", Some(Path::new("/src/lib/cart.exs")))
            .unwrap();
        assert_eq!(by_path.grammar.language_id, "elixir");

        assert!(GRAMMAR_TABLE
            .for_document("python", Some(Path::new("main.py")))
            .is_none());
    }
}
