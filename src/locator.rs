use fancy_regex::Regex;
use rowan::{TextRange, TextSize};

use crate::error::ScanError;

/// A named declaration found by a grammar pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub name: String,
    pub range: TextRange,
}

/// Finds every match of `pattern` in `text`, left to right.
///
/// The name of each occurrence is capture group 1 and the range covers the
/// whole match. Matches where group 1 did not participate are skipped.
///
/// Callers must ensure `text` fits in a `u32` offset.
pub fn locate(pattern: &Regex, text: &str) -> Result<Vec<Occurrence>, ScanError> {
    let mut occurrences = Vec::new();
    let mut pos = 0;
    while pos <= text.len() {
        let captures = match pattern.captures_from_pos(text, pos) {
            Ok(Some(captures)) => captures,
            Ok(None) => break,
            Err(source) => {
                return Err(ScanError::Match {
                    pattern: pattern.as_str().to_string(),
                    source,
                })
            }
        };
        let whole = match captures.get(0) {
            Some(whole) => whole,
            None => break,
        };

        if let Some(name) = captures.get(1) {
            occurrences.push(Occurrence {
                name: name.as_str().to_string(),
                range: TextRange::new(
                    TextSize::from(whole.start() as u32),
                    TextSize::from(whole.end() as u32),
                ),
            });
        }

        pos = if whole.end() > whole.start() {
            whole.end()
        } else {
            // empty match: step over one character or we'd match here forever
            match text[whole.end()..].chars().next() {
                Some(c) => whole.end() + c.len_utf8(),
                None => break,
            }
        };
    }
    Ok(occurrences)
}

/// Returns `"<name>."` for the last occurrence starting at or before
/// `position`, or an empty string if there is none.
///
/// `occurrences` must be in ascending start order, which [`locate`] guarantees.
/// This does not track nesting: a scope that already closed still wins if it
/// was the last one opened.
pub fn nearest_enclosing(position: TextSize, occurrences: &[Occurrence]) -> String {
    let preceding = occurrences.partition_point(|occurrence| occurrence.range.start() <= position);
    match preceding.checked_sub(1) {
        Some(idx) => format!("{}.", occurrences[idx].name),
        None => String::new(),
    }
}
