//! Offset to line/column conversion.
//!
//! The core engine positions everything by byte offset; LSP speaks
//! zero-based line/character positions with UTF-16 character counts.
//! The index stores line start offsets and converts in both
//! directions against the text it was built from.

use lsp_types::Position;

pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex { line_starts }
    }

    /// Convert a byte offset into an LSP position. Offsets past the
    /// end of the text clamp to the last position.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = self.line_starts.partition_point(|&s| s <= offset) - 1;
        let line_start = self.line_starts[line];
        let character: usize = text[line_start..offset].chars().map(char::len_utf16).sum();
        Position::new(line as u32, character as u32)
    }

    /// Convert an LSP position into a byte offset. Characters past the
    /// end of a line clamp to the line end; lines past the end of the
    /// text clamp to the text end.
    pub fn offset(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return text.len();
        }
        let line_start = self.line_starts[line];
        let mut utf16 = 0usize;
        for (i, c) in text[line_start..].char_indices() {
            if utf16 >= position.character as usize || c == '\n' {
                return line_start + i;
            }
            utf16 += c.len_utf16();
        }
        text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_offsets() {
        let text = "SET ACTION ADD .\nADD ELEMENT el .";
        let index = LineIndex::new(text);
        assert_eq!(index.position(text, 0), Position::new(0, 0));
        assert_eq!(index.position(text, 4), Position::new(0, 4));
        let second_line = text.find("ADD ELEMENT").unwrap();
        assert_eq!(index.position(text, second_line), Position::new(1, 0));
        assert_eq!(index.offset(text, Position::new(1, 0)), second_line);
        assert_eq!(index.offset(text, Position::new(0, 4)), 4);
    }

    #[test]
    fn clamps_out_of_range_positions() {
        let text = "SET .\n";
        let index = LineIndex::new(text);
        assert_eq!(index.offset(text, Position::new(0, 99)), 5);
        assert_eq!(index.offset(text, Position::new(9, 0)), text.len());
        assert_eq!(index.position(text, 999), Position::new(1, 0));
    }

    #[test]
    fn counts_utf16_units() {
        let text = "A\u{1F600}B";
        let index = LineIndex::new(text);
        // The emoji is 4 bytes and 2 UTF-16 units.
        assert_eq!(index.position(text, 5), Position::new(0, 3));
        assert_eq!(index.offset(text, Position::new(0, 3)), 5);
    }
}
