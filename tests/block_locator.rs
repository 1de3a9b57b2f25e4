use sclink::prelude::*;

#[test]
fn test_cursor_inside_single_block() {
    let text = "(\n  1 + 1\n)";
    let span = locate(text, 4).expect("block");
    assert_eq!(span, Span::new(0, text.len()));
}

#[test]
fn test_innermost_block_wins() {
    let text = "(a (b) c)";
    assert_eq!(locate(text, 4), Some(Span::new(3, 6)));
    assert_eq!(locate(text, 8), Some(Span::new(0, 9)));
}

#[test]
fn test_cursor_outside_any_block() {
    assert_eq!(locate("1.postln; (2)", 3), None);
    assert_eq!(locate("", 0), None);
}

#[test]
fn test_unbalanced_block_is_not_found() {
    assert_eq!(locate("(\n 1 + 1", 3), None);
}

#[test]
fn test_document_maps_block_back_to_positions() {
    let doc = Document::from_text("x = 1;\n(\n  x.postln;\n)\n");
    let range = doc.enclosing_block(Position::new(2, 3)).expect("block");
    assert_eq!(range.start, Position::new(1, 0));
    assert_eq!(range.end, Position::new(3, 1));
    assert_eq!(doc.slice(range), "(\n  x.postln;\n)");
}
