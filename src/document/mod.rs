//! Document text and cursor geometry.
//!
//! Commands work against [`TextSource`], which exposes only the full text
//! and conversions between byte offsets and line/column positions. The
//! rope-backed [`Document`] is the implementation used by the CLI.

mod buffer;

use std::borrow::Cow;

pub use buffer::Document;

use crate::block;

/// Zero-based line and character column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A range of positions. `end` is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Build a range, swapping the ends if they are reversed.
    pub fn new(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// An empty range at `pos` (a bare cursor).
    pub const fn cursor(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The view of an editor buffer that evaluation needs.
pub trait TextSource {
    /// The full text.
    fn text(&self) -> Cow<'_, str>;

    /// Byte offset of `pos`, clamped to the document.
    fn offset_at(&self, pos: Position) -> usize;

    /// Position of byte `offset`, clamped to the document.
    fn position_at(&self, offset: usize) -> Position;

    /// Range of line `line` without its terminator, or `None` past the end.
    fn line_range(&self, line: usize) -> Option<Range>;

    /// Text covered by `range`.
    fn slice(&self, range: Range) -> String {
        let text = self.text();
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        text.get(start..end).unwrap_or_default().to_string()
    }

    /// Innermost parenthesized block around `pos`.
    fn enclosing_block(&self, pos: Position) -> Option<Range> {
        let text = self.text();
        let span = block::locate(text.as_ref(), self.offset_at(pos))?;
        Some(Range::new(
            self.position_at(span.start),
            self.position_at(span.end),
        ))
    }
}
