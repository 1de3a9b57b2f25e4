//! Choosing what code to send.
//!
//! A selection is sent as-is. A bare cursor sends the enclosing
//! parenthesized block, or the cursor's line when there is no block.

use std::fmt;

use crate::document::{Position, Range, TextSource};

/// Where the evaluated code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Selection,
    Block,
    Line,
    File,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Selection => "selection",
            Self::Block => "block",
            Self::Line => "line",
            Self::File => "file",
        };
        f.write_str(name)
    }
}

/// Code ready to be sent, with the range it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalTarget {
    pub code: String,
    pub range: Range,
    pub kind: TargetKind,
}

/// Resolve the code for a selection or cursor.
///
/// Returns `None` when the resulting code is blank.
pub fn resolve_target<S: TextSource + ?Sized>(source: &S, selection: Range) -> Option<EvalTarget> {
    let (range, kind) = if !selection.is_empty() {
        (selection, TargetKind::Selection)
    } else if let Some(block) = source.enclosing_block(selection.start) {
        (block, TargetKind::Block)
    } else {
        (source.line_range(selection.start.line)?, TargetKind::Line)
    };

    let code = source.slice(range);
    if code.trim().is_empty() {
        return None;
    }
    Some(EvalTarget { code, range, kind })
}

/// The whole document as one target, unless it is blank.
pub fn resolve_file<S: TextSource + ?Sized>(source: &S) -> Option<EvalTarget> {
    let text = source.text();
    if text.trim().is_empty() {
        return None;
    }
    let range = Range::new(Position::default(), source.position_at(text.len()));
    Some(EvalTarget {
        code: text.into_owned(),
        range,
        kind: TargetKind::File,
    })
}
