use rowan::TextRange;

use crate::error::ScanError;
use crate::grammar::CompiledGrammar;
use crate::locator::{locate, nearest_enclosing};
use crate::settings::LensSettings;
use crate::statistics::CallStatistics;

/// A method declaration together with the name it is looked up by.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSite {
    pub qualified_name: String,
    pub range: TextRange,
    pub invocation_count: Option<u64>,
    pub history: Option<Vec<f64>>,
}

impl MethodSite {
    pub fn new(qualified_name: String, range: TextRange) -> Self {
        Self {
            qualified_name,
            range,
            invocation_count: None,
            history: None,
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.invocation_count.is_some()
    }

    pub fn record(&mut self, statistics: &CallStatistics) {
        self.invocation_count = Some(statistics.count);
        self.history = statistics.history.clone();
    }
}

/// Builds the full inventory of method sites in `text`.
///
/// Every method is prefixed with the nearest module and the nearest class
/// that start at or before it. Nothing is scanned while the lens is disabled.
pub fn scan(
    grammar: &CompiledGrammar,
    text: &str,
    settings: &LensSettings,
) -> Result<Vec<MethodSite>, ScanError> {
    if !settings.enabled {
        return Ok(Vec::new());
    }
    if u32::try_from(text.len()).is_err() {
        return Err(ScanError::DocumentTooLarge(text.len()));
    }

    let modules = locate(&grammar.module, text)?;
    let classes = locate(&grammar.class, text)?;
    let methods = locate(&grammar.method, text)?;

    let sites: Vec<MethodSite> = methods
        .into_iter()
        .map(|method| {
            let start = method.range.start();
            let qualified_name = format!(
                "{}{}{}",
                nearest_enclosing(start, &modules),
                nearest_enclosing(start, &classes),
                method.name
            );
            MethodSite::new(qualified_name, method.range)
        })
        .collect();

    tracing::debug!(
        language = grammar.grammar.language_id,
        modules = modules.len(),
        classes = classes.len(),
        sites = sites.len(),
        "scanned document"
    );
    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GRAMMAR_TABLE;

    fn grammar(language_id: &str) -> &'static CompiledGrammar {
        GRAMMAR_TABLE.for_document(language_id, None).unwrap()
    }

    fn names(sites: &[MethodSite]) -> Vec<&str> {
        sites.iter().map(|s| s.qualified_name.as_str()).collect()
    }

    #[test]
    fn bare_csharp_method_has_no_prefix() {
        let sites = scan(grammar("csharp"), "public void Foo()", &LensSettings::default()).unwrap();

        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].qualified_name, "Foo()");
        assert_eq!(sites[0].range, TextRange::new(0.into(), 17.into()));
        assert!(!sites[0].is_annotated());
    }

    #[test]
    fn non_ascii_identifiers_are_named_in_full() {
        let text = "namespace Café\npublic void naïve()";
        let sites = scan(grammar("csharp"), text, &LensSettings::default()).unwrap();

        assert_eq!(names(&sites), vec!["Café.naïve()"]);
        assert_eq!(usize::from(sites[0].range.end()), text.len());
    }

    #[test]
    fn csharp_methods_are_qualified_by_namespace_and_class() {
        let text = "\
namespace Acme.Billing
{
    public abstract class Invoice
    {
        public void Total(int x) {}
        private static async Task<int> Load() {}
    }
}";
        let sites = scan(grammar("csharp"), text, &LensSettings::default()).unwrap();

        assert_eq!(
            names(&sites),
            vec!["Acme.Billing.Invoice.Total(int x)", "Acme.Billing.Invoice.Load()"]
        );
    }

    #[test]
    fn java_methods_are_qualified_by_package_and_class() {
        let text = "\
package com.acme;

public class Greeter {
    public String greet(String name) {
        return name;
    }
}";
        let sites = scan(grammar("java"), text, &LensSettings::default()).unwrap();

        assert_eq!(names(&sites), vec!["com.acme.Greeter.greet(String name)"]);
    }

    #[test]
    fn elixir_methods_only_get_a_module_prefix() {
        let text = "\
defmodule Shop.Cart do
  def add(cart, item) do
    [item | cart]
  end

  defp empty, do: []
end";
        let sites = scan(grammar("elixir"), text, &LensSettings::default()).unwrap();

        assert_eq!(names(&sites), vec!["Shop.Cart.add(cart, item)", "Shop.Cart.empty"]);
    }

    #[test]
    fn methods_before_any_scope_are_unprefixed() {
        let text = "\
def helper(x) do
end
defmodule Later do
  def inside do
  end
end";
        let sites = scan(grammar("elixir"), text, &LensSettings::default()).unwrap();

        assert_eq!(names(&sites), vec!["helper(x)", "Later.inside"]);
    }

    #[test]
    fn closed_scopes_still_prefix_later_methods() {
        let text = "\
namespace First { }
namespace Second { }
public void Loose()";
        let sites = scan(grammar("csharp"), text, &LensSettings::default()).unwrap();

        assert_eq!(names(&sites), vec!["Second.Loose()"]);
    }

    #[test]
    fn rescanning_unchanged_text_is_deterministic() {
        let text = "\
package com.acme;
public class A {
    public void one() {}
    private int two(int x) {}
}";
        let settings = LensSettings::default();

        let first = scan(grammar("java"), text, &settings).unwrap();
        let second = scan(grammar("java"), text, &settings).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn disabled_lens_scans_nothing() {
        let settings = LensSettings {
            enabled: false,
            ..LensSettings::default()
        };

        let sites = scan(grammar("csharp"), "public void Foo()", &settings).unwrap();

        assert!(sites.is_empty());
    }

    #[test]
    fn record_fills_statistics_fields() {
        let mut site = MethodSite::new("A.b()".to_string(), TextRange::new(0.into(), 5.into()));

        site.record(&CallStatistics {
            count: 3,
            window_days: None,
            history: Some(vec![0.0, 50.0]),
        });

        assert_eq!(site.invocation_count, Some(3));
        assert_eq!(site.history, Some(vec![0.0, 50.0]));
    }
}
