//! Apply edit scripts to documents.
//!
//! For property testing: apply(A, diff(A, B)) == B
//!
//! [`Placement`] resolves where a next-side position lands in the working
//! tree. The marker uses it too, so both agree on where content goes.

use phloem::indextree::{Arena, NodeId};
use phloem::{EditOp, Matching};
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use super::EditScript;
use crate::debug;
use crate::dom::{Document, NodeData, NodeKind};
use crate::error::DiffError;

/// Where next-side nodes ended up in the working tree.
pub(crate) struct Placement<'m> {
    matching: &'m Matching,
    /// Next-side node → the working-tree node standing in for it, for
    /// everything inserted or moved so far.
    placed: HashMap<NodeId, NodeId>,
    /// Working-tree nodes that are (or will be) deleted. New content is
    /// placed after them, never before.
    doomed: HashSet<NodeId>,
}

impl<'m> Placement<'m> {
    pub(crate) fn new(matching: &'m Matching, doomed: HashSet<NodeId>) -> Self {
        Self {
            matching,
            placed: HashMap::default(),
            doomed,
        }
    }

    /// Remember that `working` now stands in for `node_b`.
    pub(crate) fn record(&mut self, node_b: NodeId, working: NodeId) {
        self.placed.insert(node_b, working);
    }

    pub(crate) fn is_doomed(&self, working: NodeId) -> bool {
        self.doomed.contains(&working)
    }

    fn locate(&self, node_b: NodeId) -> Option<NodeId> {
        self.placed
            .get(&node_b)
            .copied()
            .or_else(|| self.matching.get_a(node_b))
    }

    /// Attach the detached `node` under `parent_b`'s counterpart so that it
    /// becomes its `position`-th child once doomed siblings are gone.
    pub(crate) fn insert(
        &self,
        arena: &mut Arena<NodeData>,
        next: &Document,
        parent_b: NodeId,
        position: usize,
        node: NodeId,
    ) -> Result<(), DiffError> {
        let parent = self.locate(parent_b).ok_or(DiffError::UnresolvedParent {
            node: usize::from(parent_b),
        })?;

        let mut anchor = match position.checked_sub(1) {
            None => None,
            Some(previous) => {
                let sibling_b = next.children(parent_b).nth(previous).ok_or(
                    DiffError::UnresolvedAnchor {
                        node: usize::from(parent_b),
                    },
                )?;
                let sibling = self
                    .locate(sibling_b)
                    .filter(|&sibling| arena[sibling].parent() == Some(parent))
                    .ok_or(DiffError::UnresolvedAnchor {
                        node: usize::from(sibling_b),
                    })?;
                Some(sibling)
            }
        };

        let mut following = match anchor {
            None => parent.children(arena).next(),
            Some(sibling) => arena[sibling].next_sibling(),
        };
        while let Some(sibling) = following
            && self.doomed.contains(&sibling)
        {
            anchor = Some(sibling);
            following = arena[sibling].next_sibling();
        }

        match anchor {
            None => parent.prepend(node, arena),
            Some(sibling) => sibling.insert_after(node, arena),
        }
        Ok(())
    }
}

/// Apply `script` to `prev`, turning it into a tree structurally equal to
/// `next` (the documents the script was built from). Marks are left alone.
pub fn apply_script(
    prev: &mut Document,
    next: &Document,
    script: &EditScript,
) -> Result<(), DiffError> {
    let doomed: HashSet<NodeId> = script
        .ops()
        .iter()
        .filter_map(|op| match op {
            EditOp::Delete { node_a } => Some(*node_a),
            _ => None,
        })
        .collect();
    let mut placement = Placement::new(script.matching(), doomed);

    for op in script.ops() {
        debug!(%op, "apply");
        match op {
            EditOp::UpdateText { node_a, new, .. } => match &mut prev.get_mut(*node_a).kind {
                NodeKind::Text(text) => *text = new.clone(),
                _ => {
                    return Err(DiffError::NotATextNode {
                        node: usize::from(*node_a),
                    });
                }
            },
            EditOp::UpdateAttributes { node_a, node_b, .. } => {
                let NodeKind::Element(source) = &next.get(*node_b).kind else {
                    return Err(DiffError::NotAnElement {
                        node: usize::from(*node_b),
                    });
                };
                let NodeKind::Element(target) = &mut prev.get_mut(*node_a).kind else {
                    return Err(DiffError::NotAnElement {
                        node: usize::from(*node_a),
                    });
                };
                target.attrs = source.attrs.clone();
            }
            EditOp::Insert {
                node_b,
                parent_b,
                position,
            } => {
                let copy = prev.import_subtree(next, *node_b);
                placement.insert(&mut prev.arena, next, *parent_b, *position, copy)?;
                placement.record(*node_b, copy);
            }
            EditOp::Move {
                node_a,
                node_b,
                new_parent_b,
                new_position,
            } => {
                node_a.detach(&mut prev.arena);
                placement.insert(&mut prev.arena, next, *new_parent_b, *new_position, *node_a)?;
                placement.record(*node_b, *node_a);
            }
            EditOp::Delete { .. } => {
                // Removed at the end so positions resolve against them.
            }
        }
    }

    for op in script.ops() {
        if let EditOp::Delete { node_a } = op
            && placement.is_doomed(*node_a)
        {
            node_a.remove_subtree(&mut prev.arena);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::build_edit_script;
    use crate::dom::Parser;
    use crate::serialize::{SerializeOptions, serialize_fragment};
    use facet_testhelpers::test;
    use phloem::MatchingConfig;

    fn parse(fragment: &str) -> Document {
        Parser::default().parse_fragment(fragment).unwrap()
    }

    #[track_caller]
    fn assert_roundtrip(old: &str, new: &str) {
        let mut prev = parse(old);
        let next = parse(new);
        let script = build_edit_script(&prev, &next, &MatchingConfig::default()).unwrap();
        debug!(ops = ?script.ops(), "script");
        apply_script(&mut prev, &next, &script).unwrap();

        let (a, b) = (prev.require_body().unwrap(), next.require_body().unwrap());
        let opts = SerializeOptions::default();
        assert!(
            prev.structurally_eq(a, &next, b),
            "expected {:?}, got {:?}",
            serialize_fragment(&next, &opts).unwrap(),
            serialize_fragment(&prev, &opts).unwrap(),
        );
    }

    #[test]
    fn test_text_change() {
        assert_roundtrip("<p>Hello</p>", "<p>Hello world</p>");
    }

    #[test]
    fn test_insert_and_delete() {
        assert_roundtrip("<ul><li>A</li><li>B</li></ul>", "<ul><li>A</li><li>C</li><li>D</li></ul>");
        assert_roundtrip("<p>one</p><p>two</p><p>three</p>", "<p>one</p><p>three</p>");
        assert_roundtrip("", "<p>new</p>");
        assert_roundtrip("<p>gone</p>", "");
    }

    #[test]
    fn test_reorder() {
        assert_roundtrip(
            "<ul><li>A</li><li>B</li><li>C</li></ul>",
            "<ul><li>C</li><li>A</li><li>B</li></ul>",
        );
    }

    #[test]
    fn test_attribute_change() {
        assert_roundtrip(r#"<div class="a" id="x">t</div>"#, r#"<div class="b">t</div>"#);
    }

    #[test]
    fn test_wrap_and_unwrap() {
        assert_roundtrip(
            "<p>para one</p><p>para two</p>",
            "<section><p>para one</p><p>para two</p></section>",
        );
        assert_roundtrip(
            "<div><p>para one</p><p>para two</p></div>",
            "<p>para one</p><p>para two</p>",
        );
    }

    #[test]
    fn test_mixed_inline_content() {
        assert_roundtrip(
            "<p>Some <b>bold</b> and <i>italic</i> text</p>",
            "<p>Some <i>italic</i> and <b>bolder</b> text here</p>",
        );
    }

    #[test]
    fn test_wrong_kind_is_an_error() {
        let prev = parse("<p>text</p>");
        let next = parse("<p>other</p>");
        let script = build_edit_script(&prev, &next, &MatchingConfig::default()).unwrap();

        // Applying to a document whose ids point at different nodes.
        let mut unrelated = parse("<div><span></span></div>");
        let result = apply_script(&mut unrelated, &next, &script);
        assert!(result.is_err());
    }
}
