//! Source positions attached to every statement and diagnostic.

use std::fmt::{self, Display};

use miette::SourceSpan;

/// A location in source text.
///
/// `line` and `column` are 1-based. A zeroed position (the `Default`) means the
/// location is unknown, e.g. for trees built by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in bytes.
    pub column: usize,
}

impl Position {
    /// Returns true if this position was resolved against source text.
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}

/// A half-open range of source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// First byte covered by the span.
    pub start: Position,
    /// First byte after the span.
    pub end: Position,
}

impl Span {
    /// Creates a span from its two ends.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    /// Returns true if the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        (span.start.offset, span.len()).into()
    }
}

/// Resolves byte offsets into line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of line starts
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Indexes the line starts of `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Position of the byte at `offset`. Offsets past the end clamp to the end.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        Position {
            offset,
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }

    /// Converts a miette span (as reported by the KDL parser) into a [`Span`].
    pub fn span(&self, span: SourceSpan) -> Span {
        Span {
            start: self.position(span.offset()),
            end: self.position(span.offset() + span.len()),
        }
    }

    /// Span covering the whole source.
    pub fn full_span(&self) -> Span {
        Span {
            start: self.position(0),
            end: self.position(self.len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_lookup() {
        let index = LineIndex::new("abc\ndef\nghi");
        assert_eq!(index.position(0).to_string(), "1:1");
        assert_eq!(index.position(3).to_string(), "1:4");
        assert_eq!(index.position(4).to_string(), "2:1");
        assert_eq!(index.position(10).to_string(), "3:3");
    }

    #[test]
    fn offsets_clamp_to_source_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.position(99).offset, 2);
        assert_eq!(index.full_span().len(), 2);
    }

    #[test]
    fn unknown_position_display() {
        assert_eq!(Position::default().to_string(), "<unknown>");
        assert!(Span::default().is_empty());
    }

    #[test]
    fn converts_to_source_span() {
        let index = LineIndex::new("hello\nworld");
        let span = index.span((6, 5).into());
        assert_eq!(span.start.line, 2);
        let source_span: SourceSpan = span.into();
        assert_eq!(source_span.offset(), 6);
        assert_eq!(source_span.len(), 5);
    }
}
