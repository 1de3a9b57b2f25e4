//! Enclosing-block detection.
//!
//! When nothing is selected, the code to evaluate is the innermost
//! parenthesized region around the cursor. The scan walks backward to the
//! nearest unbalanced `(` and then forward to its matching `)`, so the cost
//! is proportional to the size of the block rather than the document.
//!
//! Only `(` and `)` are tracked. Parentheses inside string literals or
//! comments are treated as structural.

use ropey::Rope;

const OPEN: u8 = b'(';
const CLOSE: u8 = b')';

/// Half-open byte range `[start, end)` into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `offset` falls inside the span, counting the closing bracket.
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Byte-addressable text the locator can scan.
///
/// Brackets are ASCII, so scanning UTF-8 bytes never mistakes part of a
/// multi-byte character for a bracket.
pub trait ScanText {
    fn len_bytes(&self) -> usize;
    fn byte_at(&self, idx: usize) -> u8;
}

impl ScanText for str {
    fn len_bytes(&self) -> usize {
        self.len()
    }

    fn byte_at(&self, idx: usize) -> u8 {
        self.as_bytes()[idx]
    }
}

impl ScanText for Rope {
    fn len_bytes(&self) -> usize {
        Self::len_bytes(self)
    }

    fn byte_at(&self, idx: usize) -> u8 {
        self.byte(idx)
    }
}

/// Find the innermost parenthesized block enclosing `cursor`.
///
/// Returns `None` when there is no unbalanced `(` before the cursor, when
/// that bracket has no matching `)`, or when `cursor` is past the end.
pub fn locate<T: ScanText + ?Sized>(text: &T, cursor: usize) -> Option<Span> {
    let len = text.len_bytes();
    if cursor > len {
        return None;
    }

    let open = find_open(text, cursor)?;
    let close = find_close(text, open + 1, len)?;

    // Unreachable for balanced input; guards degenerate matches.
    if cursor < open || cursor > close {
        return None;
    }

    Some(Span::new(open, close + 1))
}

fn find_open<T: ScanText + ?Sized>(text: &T, cursor: usize) -> Option<usize> {
    let mut depth = 0usize;
    for idx in (0..cursor).rev() {
        match text.byte_at(idx) {
            CLOSE => depth += 1,
            OPEN if depth == 0 => return Some(idx),
            OPEN => depth -= 1,
            _ => {}
        }
    }
    None
}

fn find_close<T: ScanText + ?Sized>(text: &T, from: usize, len: usize) -> Option<usize> {
    let mut depth = 0usize;
    for idx in from..len {
        match text.byte_at(idx) {
            OPEN => depth += 1,
            CLOSE if depth == 0 => return Some(idx),
            CLOSE => depth -= 1,
            _ => {}
        }
    }
    None
}
