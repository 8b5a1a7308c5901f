//! Tests for edit script application.

use facet_testhelpers::test;
use inkdiff::diff::HtmlEditOp;
use inkdiff::{Document, MatchingConfig, Parser, apply_script, build_edit_script};
use phloem::EditOp;

fn parse(fragment: &str) -> Document {
    Parser::default().parse_fragment(fragment).unwrap()
}

/// Apply diff(old, new) to old and compare the bodies.
#[track_caller]
fn roundtrip(old: &str, new: &str) -> Vec<HtmlEditOp> {
    let mut prev = parse(old);
    let next = parse(new);
    let script = build_edit_script(&prev, &next, &MatchingConfig::default()).unwrap();
    apply_script(&mut prev, &next, &script).unwrap();

    let result = prev.body_html().unwrap();
    let expected = next.body_html().unwrap();
    assert_eq!(result, expected, "ops: {:#?}", script.ops());
    script.ops().to_vec()
}

#[test]
fn test_parse_and_serialize_roundtrip() {
    let doc = parse("<p>Hello</p>");
    assert_eq!(doc.body_html().unwrap(), "<p>Hello</p>");
}

#[test]
fn test_apply_text_update() {
    let ops = roundtrip("<p>Hello</p>", "<p>Goodbye</p>");
    assert!(matches!(ops.as_slice(), [EditOp::UpdateText { .. }]));
}

#[test]
fn test_apply_attribute_update() {
    let ops = roundtrip("<div>Content</div>", r#"<div class="highlight">Content</div>"#);
    assert!(matches!(ops.as_slice(), [EditOp::UpdateAttributes { .. }]));
}

#[test]
fn test_apply_insert_at_start_middle_end() {
    roundtrip("<ul><li>b</li><li>c</li></ul>", "<ul><li>a</li><li>b</li><li>c</li></ul>");
    roundtrip("<ul><li>a</li><li>c</li></ul>", "<ul><li>a</li><li>b</li><li>c</li></ul>");
    roundtrip("<ul><li>a</li><li>b</li></ul>", "<ul><li>a</li><li>b</li><li>c</li></ul>");
}

#[test]
fn test_insert_is_subtree_granular() {
    let ops = roundtrip(
        "<p>intro</p>",
        "<p>intro</p><section><h2>New</h2><p>with <em>nested</em> content</p></section>",
    );
    assert_eq!(ops.len(), 1, "{ops:#?}");
    assert!(matches!(ops[0], EditOp::Insert { position: 1, .. }));
}

#[test]
fn test_apply_delete_everything() {
    let ops = roundtrip("<div><p>a</p></div><p>b</p>", "");
    assert!(ops.iter().all(|op| matches!(op, EditOp::Delete { .. })));
}

#[test]
fn test_apply_reorder_and_edit() {
    roundtrip(
        "<ol><li>one</li><li>two</li><li>three</li><li>four</li></ol>",
        "<ol><li>four</li><li>two</li><li>one!</li><li>three</li></ol>",
    );
}

#[test]
fn test_apply_nested_changes() {
    roundtrip(
        r#"<article><header><h1 id="t">Title</h1></header><div class="body"><p>First</p><p>Second</p></div></article>"#,
        r#"<article><header><h1 id="title">Title</h1></header><div class="body"><p>First</p><blockquote>Quote</blockquote><p>Second, edited</p></div><footer>End</footer></article>"#,
    );
}

#[test]
fn test_apply_tables() {
    roundtrip(
        "<table><tr><td>1</td><td>2</td></tr><tr><td>3</td><td>4</td></tr></table>",
        "<table><tr><td>1</td><td>2</td><td>2b</td></tr><tr><td>4</td></tr></table>",
    );
}

#[test]
fn test_apply_svg_content() {
    roundtrip(
        r#"<svg viewBox="0 0 10 10"><circle r="1"></circle></svg>"#,
        r#"<svg viewBox="0 0 10 10"><circle r="2"></circle><rect width="3"></rect></svg>"#,
    );
}

#[test]
fn test_apply_duplicate_content() {
    roundtrip(
        "<p>same</p><p>same</p><p>other</p>",
        "<p>other</p><p>same</p><p>same</p><p>same</p>",
    );
}
