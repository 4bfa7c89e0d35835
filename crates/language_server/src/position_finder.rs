use rowan::{TextRange, TextSize};
use tower_lsp::lsp_types::{Position, Range};

/// Converts byte offsets into LSP positions (line, UTF-16 column).
#[derive(Debug)]
pub struct PositionFinder {
    /// offset at which each line starts
    line_starts: Vec<u32>,
}

impl PositionFinder {
    pub fn from_text(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(pos, _)| pos as u32 + 1));
        Self { line_starts }
    }

    pub fn get_lineno(&self, offset: TextSize) -> u32 {
        let offset = u32::from(offset);
        // line_starts[0] == 0, so at least one line always qualifies
        (self.line_starts.partition_point(|&start| start <= offset) - 1) as u32
    }

    pub fn get_position(&self, text: &str, offset: TextSize) -> Position {
        let line = self.get_lineno(offset);
        let line_start = self.line_starts[line as usize] as usize;
        let end = usize::from(offset).min(text.len());
        let character = text
            .get(line_start..end)
            .map_or(0, |prefix| prefix.encode_utf16().count() as u32);
        Position { line, character }
    }

    pub fn get_range(&self, text: &str, range: TextRange) -> Range {
        Range {
            start: self.get_position(text, range.start()),
            end: self.get_position(text, range.end()),
        }
    }
}
