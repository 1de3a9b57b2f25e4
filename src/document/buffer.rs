use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use ropey::{Rope, RopeSlice};

use super::{Position, Range, TextSource};
use crate::block::{self, Span};

/// sclang identifiers: class names, methods, variables.
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word pattern is valid"));

/// A read-only text document backed by a rope.
///
/// Offsets are byte offsets. Columns count characters, so a position maps
/// to the same place regardless of how many bytes the line's characters use.
#[derive(Debug, Clone)]
pub struct Document {
    rope: Rope,
    path: Option<PathBuf>,
}

impl Document {
    /// Create a document from a string.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            path: None,
        }
    }

    /// Load a document from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not valid UTF-8.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let rope = Rope::from_reader(BufReader::new(File::open(path)?))?;
        Ok(Self {
            rope,
            path: Some(path.to_path_buf()),
        })
    }

    /// The file this document was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total number of lines. An empty document has one line.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Content of a line without its terminator.
    pub fn line_at(&self, line: usize) -> Option<String> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let slice = self.rope.line(line);
        Some(slice.slice(..content_len(slice)).to_string())
    }

    /// Convert a byte span into a position range.
    pub fn span_to_range(&self, span: Span) -> Range {
        Range::new(self.position_at(span.start), self.position_at(span.end))
    }

    /// Range of the identifier under or just before `pos`.
    pub fn word_range_at(&self, pos: Position) -> Option<Range> {
        let line = self.line_at(pos.line)?;
        let byte_col = line
            .char_indices()
            .nth(pos.column)
            .map_or(line.len(), |(idx, _)| idx);
        let found = WORD
            .find_iter(&line)
            .find(|m| m.start() <= byte_col && byte_col <= m.end())?;
        let start = line[..found.start()].chars().count();
        let len = found.as_str().chars().count();
        Some(Range::new(
            Position::new(pos.line, start),
            Position::new(pos.line, start + len),
        ))
    }

    /// Identifier under or just before `pos`.
    pub fn word_at(&self, pos: Position) -> Option<String> {
        self.word_range_at(pos).map(|r| self.slice(r))
    }

    fn clamp_line(&self, line: usize) -> usize {
        line.min(self.rope.len_lines().saturating_sub(1))
    }
}

impl TextSource for Document {
    fn text(&self) -> Cow<'_, str> {
        let slice = self.rope.slice(..);
        slice
            .as_str()
            .map_or_else(|| Cow::Owned(slice.to_string()), Cow::Borrowed)
    }

    fn offset_at(&self, pos: Position) -> usize {
        let line = self.clamp_line(pos.line);
        let start = self.rope.line_to_char(line);
        let column = pos.column.min(content_len(self.rope.line(line)));
        self.rope.char_to_byte(start + column)
    }

    fn position_at(&self, offset: usize) -> Position {
        let char_idx = self.rope.byte_to_char(offset.min(self.rope.len_bytes()));
        let line = self.rope.char_to_line(char_idx);
        Position::new(line, char_idx - self.rope.line_to_char(line))
    }

    fn line_range(&self, line: usize) -> Option<Range> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let len = content_len(self.rope.line(line));
        Some(Range::new(Position::new(line, 0), Position::new(line, len)))
    }

    fn slice(&self, range: Range) -> String {
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        self.rope.byte_slice(start..end).to_string()
    }

    fn enclosing_block(&self, pos: Position) -> Option<Range> {
        block::locate(&self.rope, self.offset_at(pos)).map(|span| self.span_to_range(span))
    }
}

/// Characters in a line excluding its terminator (`\r\n` counts as one).
fn content_len(line: RopeSlice<'_>) -> usize {
    let mut len = line.len_chars();
    if len > 0 && is_line_break(line.char(len - 1)) {
        let last = line.char(len - 1);
        len -= 1;
        if last == '\n' && len > 0 && line.char(len - 1) == '\r' {
            len -= 1;
        }
    }
    len
}

// The breaks ropey splits lines on.
const fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}
