//! Echo the evaluated code with a highlight, standing in for the editor's
//! brief flash of the evaluated region.

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};

use crate::eval::EvalTarget;

/// Write `target` to `out` on a yellow background, one styled run per line.
///
/// # Errors
/// Returns any error from writing to `out`.
pub fn echo<W: Write>(out: &mut W, target: &EvalTarget) -> io::Result<()> {
    let start = target.range.start;
    queue!(
        out,
        SetAttribute(Attribute::Dim),
        Print(format!(
            "-- {} at {}:{}\n",
            target.kind,
            start.line + 1,
            start.column + 1
        )),
        SetAttribute(Attribute::Reset),
    )?;
    for line in target.code.lines() {
        queue!(
            out,
            SetBackgroundColor(Color::Yellow),
            SetForegroundColor(Color::Black),
            Print(line),
            ResetColor,
            Print("\n"),
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Position, Range};
    use crate::eval::TargetKind;

    #[test]
    fn test_echo_labels_and_prints_each_line() {
        let target = EvalTarget {
            code: "(\n  1 + 2\n)".to_string(),
            range: Range::new(Position::new(3, 0), Position::new(5, 1)),
            kind: TargetKind::Block,
        };
        let mut out = Vec::new();
        echo(&mut out, &target).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("-- block at 4:1"));
        assert!(text.contains("  1 + 2"));
        // Every highlighted line is reset before its newline.
        assert!(text.matches("\u{1b}[0m").count() >= 3);
    }
}
