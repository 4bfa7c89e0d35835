//! Method-site discovery and call-frequency annotation.
//!
//! A document is scanned with a [`grammar::CompiledGrammar`] into an inventory of
//! [`scanner::MethodSite`]s. Each site can later be annotated on demand by an
//! [`annotation::AnnotationResolver`], which asks the statistics backend how often
//! the method was called and turns the answer into a short label.

pub mod annotation;
pub mod error;
pub mod grammar;
pub mod locator;
pub mod scanner;
pub mod settings;
pub mod sparkline;
pub mod statistics;

pub use annotation::AnnotationResolver;
pub use error::{FetchError, ScanError};
pub use grammar::{CompiledGrammar, GrammarTable, LanguageGrammar, GRAMMAR_TABLE};
pub use locator::{locate, nearest_enclosing, Occurrence};
pub use scanner::{scan, MethodSite};
pub use settings::LensSettings;
pub use statistics::{CallStatistics, StatisticsClient, StatisticsQuery};
