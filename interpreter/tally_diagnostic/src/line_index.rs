//! Byte-offset to line/column resolution.

/// Zero-based line/column position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Precomputed line-start table for one source text.
#[derive(Clone, Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line; always begins with 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build the index for a source text.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(u32::try_from(i + 1).unwrap_or(u32::MAX));
            }
        }
        LineIndex { line_starts }
    }

    /// Resolve a byte offset to a zero-based line/column.
    pub fn position(&self, offset: u32) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let column = offset.saturating_sub(self.line_starts[line]);
        Position {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column,
        }
    }

    /// Text of a zero-based line, without its trailing newline.
    pub fn line_text<'s>(&self, source: &'s str, line: u32) -> Option<&'s str> {
        let start = *self.line_starts.get(line as usize)? as usize;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .map_or(source.len(), |&next| next as usize);
        let text = source.get(start..end)?;
        Some(text.trim_end_matches(['\n', '\r']))
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn positions_across_lines() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.position(0), Position { line: 0, column: 0 });
        assert_eq!(index.position(1), Position { line: 0, column: 1 });
        assert_eq!(index.position(3), Position { line: 1, column: 0 });
        assert_eq!(index.position(4), Position { line: 1, column: 1 });
    }

    #[test]
    fn line_text_strips_newline() {
        let source = "one\ntwo\r\nthree";
        let index = LineIndex::new(source);
        assert_eq!(index.line_text(source, 0), Some("one"));
        assert_eq!(index.line_text(source, 1), Some("two"));
        assert_eq!(index.line_text(source, 2), Some("three"));
        assert_eq!(index.line_count(), 3);
    }
}
