//! Decorating the previous document with an edit script.
//!
//! Nothing is removed: deleted subtrees stay in place and are marked,
//! inserted subtrees are copied in from the next document and marked, and
//! updated nodes take their new content while the mark keeps the old one.
//! A move is shown as a deletion at the old place plus an insertion at the
//! new one.

use phloem::indextree::{NodeEdge, NodeId};
use phloem::{EditOp, MatchingConfig};
use rapidhash::RapidHashSet as HashSet;

use crate::diff::{EditScript, Placement, build_edit_script};
use crate::dom::{Document, NodeKind};
use crate::dump::MarkedTreeDump;
use crate::error::DiffError;
use crate::mark::{AttrChange, ChangeMark, ChangeSummary};
use crate::serialize::{SerializeOptions, serialize_fragment};
use crate::{debug, trace};

/// Result of marking: either nothing changed, or a marked tree.
#[derive(Debug, Clone)]
pub enum MarkOutcome {
    /// The documents are structurally equal. The previous document is
    /// handed back untouched.
    Unchanged(Document),
    /// At least one change was found.
    Marked(MarkedTree),
}

impl MarkOutcome {
    /// Whether any change was found.
    pub fn has_changes(&self) -> bool {
        matches!(self, MarkOutcome::Marked(_))
    }

    /// The marked tree, if any change was found.
    pub fn into_marked(self) -> Option<MarkedTree> {
        match self {
            MarkOutcome::Unchanged(_) => None,
            MarkOutcome::Marked(tree) => Some(tree),
        }
    }
}

/// The previous document after marking: its own nodes plus ghost copies of
/// inserted content, every change carrying a [`ChangeMark`].
#[derive(Debug, Clone)]
pub struct MarkedTree {
    pub(crate) doc: Document,
    pub(crate) root: NodeId,
}

impl MarkedTree {
    /// The marked document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Give up the marked document.
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// The diff root (`<body>`).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Count marks by kind.
    pub fn summary(&self) -> ChangeSummary {
        summarize(&self.doc, self.root)
    }

    /// Pretty-printer showing every node with its mark.
    pub fn dump(&self) -> MarkedTreeDump<'_> {
        MarkedTreeDump::new(&self.doc, self.root)
    }

    /// Write the children of `<body>` as HTML, unpruned.
    pub fn serialize(&self, opts: &SerializeOptions) -> Result<String, DiffError> {
        serialize_fragment(&self.doc, opts)
    }
}

pub(crate) fn summarize(doc: &Document, root: NodeId) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for id in root.descendants(&doc.arena) {
        summary.record(&doc.get(id).mark);
    }
    summary
}

/// Diff `prev` against `next` and mark `prev` with the result.
pub fn mark_diff(
    prev: Document,
    next: &Document,
    config: &MatchingConfig,
) -> Result<MarkOutcome, DiffError> {
    let script = build_edit_script(&prev, next, config)?;
    apply_marks(prev, next, &script)
}

/// Mark `prev` with a script built for `(prev, next)`.
///
/// On error the partially marked document is dropped.
pub fn apply_marks(
    mut prev: Document,
    next: &Document,
    script: &EditScript,
) -> Result<MarkOutcome, DiffError> {
    if script.is_empty() {
        debug!("no changes");
        return Ok(MarkOutcome::Unchanged(prev));
    }
    let root = prev.require_body()?;

    // Next-side nodes whose content arrives with a copied subtree.
    let mut covered: HashSet<NodeId> = HashSet::default();
    let mut doomed: HashSet<NodeId> = HashSet::default();
    for op in script.ops() {
        match op {
            EditOp::Insert { node_b, .. } => covered.extend(node_b.descendants(&next.arena)),
            EditOp::Move { node_a, node_b, .. } => {
                covered.extend(node_b.descendants(&next.arena));
                doomed.insert(*node_a);
            }
            EditOp::Delete { node_a } => {
                doomed.insert(*node_a);
            }
            EditOp::UpdateAttributes { .. } | EditOp::UpdateText { .. } => {}
        }
    }
    let mut placement = Placement::new(script.matching(), doomed);

    for op in script.ops() {
        trace!(%op, "mark");
        match op {
            EditOp::UpdateText {
                node_a,
                node_b,
                old,
                new,
            } => {
                if covered.contains(node_b) {
                    continue;
                }
                let data = prev.get_mut(*node_a);
                let NodeKind::Text(text) = &mut data.kind else {
                    return Err(DiffError::NotATextNode {
                        node: usize::from(*node_a),
                    });
                };
                *text = new.clone();
                data.mark = ChangeMark::TextChanged { old: old.clone() };
            }
            EditOp::UpdateAttributes {
                node_a,
                node_b,
                changes,
            } => {
                if covered.contains(node_b) {
                    continue;
                }
                let NodeKind::Element(source) = &next.get(*node_b).kind else {
                    return Err(DiffError::NotAnElement {
                        node: usize::from(*node_b),
                    });
                };
                let data = prev.get_mut(*node_a);
                let NodeKind::Element(target) = &mut data.kind else {
                    return Err(DiffError::NotAnElement {
                        node: usize::from(*node_a),
                    });
                };
                target.attrs = source.attrs.clone();
                data.mark = ChangeMark::AttributesChanged(
                    changes
                        .iter()
                        .map(|change| AttrChange {
                            name: change.key.clone(),
                            old: change.old_value.clone(),
                            new: change.new_value.clone(),
                        })
                        .collect(),
                );
            }
            EditOp::Insert {
                node_b,
                parent_b,
                position,
            } => {
                if covered.contains(parent_b) {
                    continue;
                }
                let ghost = prev.import_subtree(next, *node_b);
                placement.insert(&mut prev.arena, next, *parent_b, *position, ghost)?;
                prev.get_mut(ghost).mark = ChangeMark::Inserted;
                placement.record(*node_b, ghost);
            }
            EditOp::Move {
                node_a,
                node_b,
                new_parent_b,
                new_position,
            } => {
                prev.get_mut(*node_a).mark = ChangeMark::Deleted;
                if covered.contains(new_parent_b) {
                    continue;
                }
                let ghost = prev.import_subtree(next, *node_b);
                placement.insert(&mut prev.arena, next, *new_parent_b, *new_position, ghost)?;
                prev.get_mut(ghost).mark = ChangeMark::Inserted;
                placement.record(*node_b, ghost);
            }
            EditOp::Delete { node_a } => {
                prev.get_mut(*node_a).mark = ChangeMark::Deleted;
            }
        }
    }

    clear_nested_marks(&mut prev, root);
    let tree = MarkedTree { doc: prev, root };
    debug!(summary = ?tree.summary(), "marked");
    trace!("marked tree:\n{}", tree.dump());
    Ok(MarkOutcome::Marked(tree))
}

/// Inside an inserted or deleted subtree the outer mark says it all.
fn clear_nested_marks(doc: &mut Document, root: NodeId) {
    let mut depth_inside = 0usize;
    let mut nested = Vec::new();
    for edge in root.traverse(&doc.arena) {
        match edge {
            NodeEdge::Start(id) => {
                let mark = &doc.get(id).mark;
                if depth_inside > 0 && mark.is_change() {
                    nested.push(id);
                }
                if depth_inside > 0 || mark.covers_subtree() {
                    depth_inside += 1;
                }
            }
            NodeEdge::End(_) if depth_inside > 0 => depth_inside -= 1,
            NodeEdge::End(_) => {}
        }
    }
    for id in nested {
        doc.get_mut(id).mark = ChangeMark::Unchanged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Parser;
    use facet_testhelpers::test;

    fn mark(old: &str, new: &str) -> MarkOutcome {
        let parser = Parser::default();
        let prev = parser.parse_fragment(old).unwrap();
        let next = parser.parse_fragment(new).unwrap();
        mark_diff(prev, &next, &MatchingConfig::default()).unwrap()
    }

    fn marked(old: &str, new: &str) -> MarkedTree {
        match mark(old, new) {
            MarkOutcome::Marked(tree) => tree,
            MarkOutcome::Unchanged(_) => panic!("expected changes between {old:?} and {new:?}"),
        }
    }

    /// `(tag or text, mark label)` for every marked node, in document order.
    fn marks(tree: &MarkedTree) -> Vec<(String, &'static str)> {
        let doc = tree.document();
        tree.root()
            .descendants(&doc.arena)
            .filter(|&id| doc.get(id).mark.is_change())
            .map(|id| {
                let data = doc.get(id);
                let name = data
                    .tag()
                    .map(|tag| format!("<{tag}>"))
                    .or_else(|| data.text().map(str::to_owned))
                    .unwrap_or_default();
                (name, data.mark.label())
            })
            .collect()
    }

    #[test]
    fn test_identical_is_unchanged() {
        let outcome = mark("<p>same</p>", "<p>same</p>");
        assert!(!outcome.has_changes());
        assert!(outcome.into_marked().is_none());
    }

    #[test]
    fn test_text_change_keeps_old_text() {
        let tree = marked("<p>Hello</p>", "<p>Hello world</p>");
        assert_eq!(marks(&tree), [("Hello world".to_string(), "text")]);

        let doc = tree.document();
        let text = tree
            .root()
            .descendants(&doc.arena)
            .find(|&id| doc.get(id).mark.is_change())
            .unwrap();
        assert_eq!(
            doc.get(text).mark,
            ChangeMark::TextChanged { old: "Hello".into() }
        );
    }

    #[test]
    fn test_insert_is_a_ghost_copy() {
        let tree = marked("<ul><li>A</li></ul>", "<ul><li>A</li><li>B</li></ul>");
        assert_eq!(marks(&tree), [("<li>".to_string(), "inserted")]);
        assert_eq!(tree.summary().inserted, 1);

        // The ghost sits after the original item.
        let doc = tree.document();
        let ul = doc.children(tree.root()).next().unwrap();
        let items: Vec<_> = doc.children(ul).map(|id| doc.get(id).mark.label()).collect();
        assert_eq!(items, ["unchanged", "inserted"]);
    }

    #[test]
    fn test_delete_stays_in_place() {
        let tree = marked("<p>one</p><p>two</p><p>three</p>", "<p>one</p><p>three</p>");
        assert_eq!(marks(&tree), [("<p>".to_string(), "deleted")]);
        let doc = tree.document();
        assert_eq!(doc.children(tree.root()).count(), 3);
    }

    #[test]
    fn test_replacement_puts_insert_after_delete() {
        let tree = marked("<div><h1>Title</h1></div>", "<div><h2>Title</h2></div>");
        let doc = tree.document();
        let div = doc.children(tree.root()).next().unwrap();
        let children: Vec<_> = doc
            .children(div)
            .map(|id| (doc.get(id).tag().unwrap_or_default().to_string(), doc.get(id).mark.label()))
            .collect();
        assert_eq!(
            children,
            [
                ("h1".to_string(), "deleted"),
                ("h2".to_string(), "inserted")
            ]
        );
    }

    #[test]
    fn test_attribute_change_records_old_value() {
        let tree = marked(r#"<p class="a">x</p>"#, r#"<p class="b">x</p>"#);
        assert_eq!(marks(&tree), [("<p>".to_string(), "attributes")]);

        let doc = tree.document();
        let p = doc.children(tree.root()).next().unwrap();
        let NodeKind::Element(elem) = &doc.get(p).kind else {
            panic!("expected element");
        };
        assert_eq!(elem.attrs.get("class").map(|v| v.as_str()), Some("b"));
        let ChangeMark::AttributesChanged(changes) = &doc.get(p).mark else {
            panic!("expected attribute mark");
        };
        assert_eq!(
            changes,
            &[AttrChange {
                name: "class".into(),
                old: Some("a".into()),
                new: Some("b".into()),
            }]
        );
    }

    #[test]
    fn test_move_is_delete_plus_insert() {
        let tree = marked(
            "<ul><li>first item</li><li>second item</li></ul>",
            "<ul><li>second item</li><li>first item</li></ul>",
        );
        let summary = tree.summary();
        assert_eq!(summary.deleted, 1, "{}", tree.dump());
        assert_eq!(summary.inserted, 1, "{}", tree.dump());
    }

    #[test]
    fn test_marks_inside_moved_original_are_cleared() {
        // The <li> moves and its text changes: the deleted original keeps
        // its old text, the ghost brings the new one.
        let tree = marked(
            "<ul><li>alpha beta gamma</li><li>delta</li></ul><ol></ol>",
            "<ul><li>delta</li></ul><ol><li>alpha beta gamma delta</li></ol>",
        );
        let doc = tree.document();
        for id in tree.root().descendants(&doc.arena) {
            let data = doc.get(id);
            assert!(
                !matches!(data.mark, ChangeMark::TextChanged { .. }),
                "{}",
                tree.dump()
            );
        }
        let texts: Vec<&str> = tree
            .root()
            .descendants(&doc.arena)
            .filter_map(|id| doc.get(id).text())
            .collect();
        assert!(texts.contains(&"alpha beta gamma"), "{}", tree.dump());
        assert!(texts.contains(&"alpha beta gamma delta"), "{}", tree.dump());
    }
}
