use code_call_lens::MethodSite;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Url;

use crate::position_finder::PositionFinder;

#[derive(Derivative)]
#[derivative(Debug)]
/// This represents what we track for an open source file.
pub struct Document {
    pub language_id: String,
    pub version: i32,
    #[derivative(Debug = "ignore")]
    pub text: String,
    pub position_finder: PositionFinder,
    /// Bumped by every edit and settings change; lenses from older
    /// generations are stale.
    pub generation: u64,
    /// Cancelled when the generation moves on.
    pub cancel: CancellationToken,
    /// Whether `sites` holds the inventory of the current text.
    pub scanned: bool,
    pub sites: Vec<MethodSite>,
}

/// What a code lens carries between `codeLens` and `codeLens/resolve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensData {
    pub uri: Url,
    pub generation: u64,
    pub index: usize,
}

impl Document {
    pub fn new(language_id: String, version: i32, text: String) -> Self {
        Self {
            language_id,
            version,
            position_finder: PositionFinder::from_text(&text),
            text,
            generation: 0,
            cancel: CancellationToken::new(),
            scanned: false,
            sites: Vec::new(),
        }
    }

    fn next_generation(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
    }

    pub fn refresh(&mut self, version: i32, text: String) {
        self.invalidate();
        self.version = version;
        self.position_finder = PositionFinder::from_text(&text);
        self.text = text;
    }

    /// Drops the inventory and cancels work on it, e.g. after the settings
    /// that produced it changed.
    pub fn invalidate(&mut self) {
        self.next_generation();
        self.scanned = false;
        self.sites.clear();
    }

    /// Stores the inventory of the current text and returns the generation
    /// it belongs to. Scanning the same text twice yields the same sites, so
    /// once scanned the stored inventory and its outstanding work are kept.
    pub fn replace_sites(&mut self, sites: Vec<MethodSite>) -> u64 {
        if !self.scanned {
            self.sites = sites;
            self.scanned = true;
        }
        self.generation
    }

    /// Returns a copy of a site plus the token that cancels work on it, as
    /// long as `data` still refers to the current generation.
    pub fn site_for(&self, data: &LensData) -> Option<(MethodSite, CancellationToken)> {
        if data.generation != self.generation {
            return None;
        }
        self.sites
            .get(data.index)
            .map(|site| (site.clone(), self.cancel.clone()))
    }

    /// Writes back an annotated site unless the document moved on or the
    /// site was already annotated.
    pub fn store_annotated(&mut self, data: &LensData, site: MethodSite) -> bool {
        if data.generation != self.generation {
            return false;
        }
        match self.sites.get_mut(data.index) {
            Some(stored) if !stored.is_annotated() => {
                *stored = site;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rowan::TextRange;

    use super::*;

    fn site(name: &str) -> MethodSite {
        MethodSite::new(name.to_string(), TextRange::new(0.into(), 3.into()))
    }

    fn lens_data(generation: u64, index: usize) -> LensData {
        LensData {
            uri: Url::parse("file:///src/Invoice.cs").unwrap(),
            generation,
            index,
        }
    }

    #[test]
    fn rescanning_unchanged_text_keeps_outstanding_work() {
        let mut document = Document::new("csharp".to_string(), 1, "abc".to_string());
        let generation = document.replace_sites(vec![site("A()")]);
        let (_, cancel) = document.site_for(&lens_data(generation, 0)).unwrap();

        let again = document.replace_sites(vec![site("A()")]);

        assert_eq!(generation, again);
        assert!(!cancel.is_cancelled());
        assert!(document.site_for(&lens_data(generation, 0)).is_some());
    }

    #[test]
    fn rescanning_keeps_stored_annotations() {
        let mut document = Document::new("csharp".to_string(), 1, "abc".to_string());
        let generation = document.replace_sites(vec![site("A()")]);
        let mut annotated = site("A()");
        annotated.invocation_count = Some(2);
        assert!(document.store_annotated(&lens_data(generation, 0), annotated));

        document.replace_sites(vec![site("A()")]);

        assert_eq!(document.sites[0].invocation_count, Some(2));
    }

    #[test]
    fn invalidating_cancels_outstanding_work() {
        let mut document = Document::new("csharp".to_string(), 1, "abc".to_string());
        let generation = document.replace_sites(vec![site("A()")]);
        let (_, cancel) = document.site_for(&lens_data(generation, 0)).unwrap();

        document.invalidate();
        let next = document.replace_sites(vec![site("B()")]);

        assert!(cancel.is_cancelled());
        assert_ne!(generation, next);
        assert!(document.site_for(&lens_data(generation, 0)).is_none());
        assert_eq!(document.site_for(&lens_data(next, 0)).unwrap().0.qualified_name, "B()");
    }

    #[test]
    fn edits_invalidate_sites() {
        let mut document = Document::new("csharp".to_string(), 1, "abc".to_string());
        let generation = document.replace_sites(vec![site("A()")]);

        let (_, cancel) = document.site_for(&lens_data(generation, 0)).unwrap();

        document.refresh(2, "abcd".to_string());

        assert!(cancel.is_cancelled());
        assert!(!document.scanned);
        assert!(document.sites.is_empty());
        assert_eq!(document.version, 2);
        assert!(document.site_for(&lens_data(generation, 0)).is_none());
    }

    #[test]
    fn annotated_site_is_stored_once() {
        let mut document = Document::new("csharp".to_string(), 1, "abc".to_string());
        let generation = document.replace_sites(vec![site("A()")]);
        let mut annotated = site("A()");
        annotated.invocation_count = Some(4);

        assert!(document.store_annotated(&lens_data(generation, 0), annotated.clone()));
        assert!(!document.store_annotated(&lens_data(generation, 0), annotated.clone()));
        assert!(!document.store_annotated(&lens_data(generation + 1, 0), annotated));
        assert_eq!(document.sites[0].invocation_count, Some(4));
    }
}
