//! Edit script generation from a node matching.
//!
//! Follows the shape of Chawathe et al. (1996), "Change Detection in
//! Hierarchically Structured Information", emitting subtree-granular
//! operations:
//! 1. UPDATE: attribute and text changes on matched nodes
//! 2. INSERT / MOVE: children of every anchored next-side parent, left to
//!    right, with sibling order aligned by a longest common subsequence
//! 3. DELETE: top-most previous-side nodes without a counterpart
//!
//! Positions always refer to the next tree's child indices. A consumer
//! applying the operations in order resolves position `k` under parent `P`
//! by placing the node right after wherever `P`'s child `k - 1` ended up
//! (or at the start of the list for `k == 0`), skipping siblings that a
//! later DELETE removes.

use crate::{debug, trace};
use core::fmt;

use crate::matching::Matching;
use crate::tree::{DiffTree, Properties, PropertyChange, TreeTypes};
use facet::Facet;
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;
use similar::{Algorithm, DiffOp, capture_diff_slices};

/// Type alias for property changes to satisfy clippy::type_complexity
pub type PropChanges<T> = Vec<
    PropertyChange<
        <<T as TreeTypes>::Props as Properties>::Key,
        <<T as TreeTypes>::Props as Properties>::Value,
    >,
>;

/// An edit operation in the diff.
#[derive(Clone, PartialEq, Eq)]
pub enum EditOp<T: TreeTypes> {
    /// Replace the attributes of a matched node.
    UpdateAttributes {
        /// The node in tree A
        node_a: NodeId,
        /// The corresponding node in tree B
        node_b: NodeId,
        /// Every attribute that was added, removed or changed
        changes: PropChanges<T>,
    },

    /// Replace the text of a matched leaf.
    UpdateText {
        /// The node in tree A
        node_a: NodeId,
        /// The corresponding node in tree B
        node_b: NodeId,
        /// Text in tree A
        old: T::Text,
        /// Text in tree B
        new: T::Text,
    },

    /// Insert the whole subtree rooted at `node_b`.
    Insert {
        /// Root of the new subtree in tree B
        node_b: NodeId,
        /// Parent in tree B
        parent_b: NodeId,
        /// Position among the parent's children in tree B (0-indexed)
        position: usize,
    },

    /// Delete the whole subtree rooted at `node_a`.
    Delete {
        /// The node in tree A being deleted
        node_a: NodeId,
    },

    /// Move a matched node (and its subtree) to a new location.
    Move {
        /// The node in tree A
        node_a: NodeId,
        /// The corresponding node in tree B
        node_b: NodeId,
        /// New parent in tree B
        new_parent_b: NodeId,
        /// Position among the new parent's children in tree B
        new_position: usize,
    },
}

impl<T: TreeTypes> fmt::Display for EditOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOp::UpdateAttributes {
                node_a, changes, ..
            } => {
                write!(f, "UpdateAttrs(a:{}", usize::from(*node_a))?;
                for change in changes {
                    write!(f, " {}:", change.key)?;
                    match (&change.old_value, &change.new_value) {
                        (Some(old), Some(new)) => write!(f, " {old} → {new}")?,
                        (None, Some(new)) => write!(f, " + {new}")?,
                        (Some(old), None) => write!(f, " - {old}")?,
                        (None, None) => write!(f, "=")?,
                    }
                }
                write!(f, ")")
            }
            EditOp::UpdateText {
                node_a,
                node_b,
                old,
                new,
            } => {
                write!(
                    f,
                    "UpdateText(a:{} → b:{} {:?} → {:?})",
                    usize::from(*node_a),
                    usize::from(*node_b),
                    old.as_ref(),
                    new.as_ref()
                )
            }
            EditOp::Insert {
                node_b,
                parent_b,
                position,
            } => {
                write!(
                    f,
                    "Insert(b:{} @{} under b:{})",
                    usize::from(*node_b),
                    position,
                    usize::from(*parent_b)
                )
            }
            EditOp::Delete { node_a } => {
                write!(f, "Delete(a:{})", usize::from(*node_a))
            }
            EditOp::Move {
                node_a,
                node_b,
                new_parent_b,
                new_position,
            } => {
                write!(
                    f,
                    "Move(a:{} → b:{} @{} under b:{})",
                    usize::from(*node_a),
                    usize::from(*node_b),
                    new_position,
                    usize::from(*new_parent_b)
                )
            }
        }
    }
}

impl<T: TreeTypes> fmt::Debug for EditOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse Display implementation for Debug
        fmt::Display::fmt(self, f)
    }
}

/// Errors raised when a matching cannot be turned into an edit script.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ScriptError {
    /// the roots of the two trees are not matched to each other
    RootsUnmatched,

    /// matched nodes a:{node_a} and b:{node_b} have different kinds
    KindMismatch { node_a: usize, node_b: usize },

    /// pair a:{node_a} ↔ b:{node_b} crosses the pairing of its ancestors
    CrossingPair { node_a: usize, node_b: usize },
}

/// Wrapper for collecting edit operations with automatic tracing.
struct Ops<T: TreeTypes> {
    inner: Vec<EditOp<T>>,
}

impl<T: TreeTypes> Ops<T> {
    fn new() -> Self {
        Self { inner: Vec::new() }
    }

    fn push(&mut self, op: EditOp<T>) {
        debug!(%op, "emit");
        self.inner.push(op);
    }

    fn into_inner(self) -> Vec<EditOp<T>> {
        self.inner
    }
}

/// Generate an edit script from a matching between two trees.
///
/// Only pairs whose next-side node hangs off a chain of matched ancestors
/// ("anchored" pairs) are honoured: content inside an inserted subtree is
/// inserted wholesale, and its previous-side partners are deleted.
///
/// Applying the operations in order to tree A yields a tree structurally
/// equal to tree B.
pub fn generate_edit_script<TA, TB>(
    tree_a: &TA,
    tree_b: &TB,
    matching: &Matching,
) -> Result<Vec<EditOp<TA::Types>>, ScriptError>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    trace!(matched_pairs = matching.len(), "generate_edit_script start");
    let root_a = tree_a.root();
    let root_b = tree_b.root();
    if matching.get_b(root_a) != Some(root_b) {
        return Err(ScriptError::RootsUnmatched);
    }

    // B nodes reachable from the root through matched nodes only.
    let mut anchored: HashSet<NodeId> = HashSet::default();
    for b_id in tree_b.iter() {
        let parent_anchored = tree_b.parent(b_id).is_none_or(|p| anchored.contains(&p));
        if parent_anchored && matching.contains_b(b_id) {
            anchored.insert(b_id);
        }
    }
    let effective = |a_id: NodeId| matching.get_b(a_id).filter(|b| anchored.contains(b));

    validate(tree_a, tree_b, matching, &anchored)?;

    let mut ops = Ops::new();

    // Phase 1: UPDATE - text and attribute changes on anchored pairs
    for a_id in tree_a.iter() {
        let Some(b_id) = effective(a_id) else {
            continue;
        };

        if let (Some(old), Some(new)) = (tree_a.text(a_id), tree_b.text(b_id))
            && old != new
        {
            ops.push(EditOp::UpdateText {
                node_a: a_id,
                node_b: b_id,
                old: old.clone(),
                new: new.clone(),
            });
        }

        let a_props = tree_a.properties(a_id);
        let b_props = tree_b.properties(b_id);
        // Short-circuit: if both have no properties, nothing to do
        if a_props.is_empty() && b_props.is_empty() {
            continue;
        }
        let changes = a_props.diff(b_props);
        if !changes.is_empty() {
            ops.push(EditOp::UpdateAttributes {
                node_a: a_id,
                node_b: b_id,
                changes,
            });
        }
    }

    // Phase 2: INSERT / MOVE - children of anchored parents, parents first
    for parent_b in tree_b.iter() {
        if !anchored.contains(&parent_b) {
            continue;
        }
        let Some(parent_a) = matching.get_a(parent_b) else {
            continue;
        };
        let children_b: Vec<NodeId> = tree_b.children(parent_b).collect();
        let in_order = aligned_children(tree_a, tree_b, matching, &anchored, parent_a, parent_b);

        for (position, &b_id) in children_b.iter().enumerate() {
            if !anchored.contains(&b_id) {
                ops.push(EditOp::Insert {
                    node_b: b_id,
                    parent_b,
                    position,
                });
            } else if !in_order.contains(&b_id)
                && let Some(a_id) = matching.get_a(b_id)
            {
                trace!(
                    a = usize::from(a_id),
                    b = usize::from(b_id),
                    same_parent = tree_a.parent(a_id) == Some(parent_a),
                    "move: out of order or reparented"
                );
                ops.push(EditOp::Move {
                    node_a: a_id,
                    node_b: b_id,
                    new_parent_b: parent_b,
                    new_position: position,
                });
            }
        }
    }

    // Phase 3: DELETE - top-most unanchored nodes of tree A
    for a_id in tree_a.iter() {
        if effective(a_id).is_some() {
            continue;
        }
        if let Some(parent_a) = tree_a.parent(a_id)
            && effective(parent_a).is_some()
        {
            ops.push(EditOp::Delete { node_a: a_id });
        }
    }

    debug!(total_ops = ops.inner.len(), "generate_edit_script done");
    Ok(ops.into_inner())
}

/// Children of `parent_b` that keep their place: anchored children whose
/// partners are children of `parent_a`, restricted to the longest common
/// subsequence of both sibling orders.
fn aligned_children<TA, TB>(
    tree_a: &TA,
    tree_b: &TB,
    matching: &Matching,
    anchored: &HashSet<NodeId>,
    parent_a: NodeId,
    parent_b: NodeId,
) -> HashSet<NodeId>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let seq_a: Vec<NodeId> = tree_a
        .children(parent_a)
        .filter_map(|a_id| matching.get_b(a_id))
        .filter(|b_id| anchored.contains(b_id) && tree_b.parent(*b_id) == Some(parent_b))
        .collect();
    let seq_b: Vec<NodeId> = tree_b
        .children(parent_b)
        .filter(|b_id| {
            anchored.contains(b_id)
                && matching
                    .get_a(*b_id)
                    .is_some_and(|a_id| tree_a.parent(a_id) == Some(parent_a))
        })
        .collect();

    let mut in_order = HashSet::default();
    for op in capture_diff_slices(Algorithm::Myers, &seq_a, &seq_b) {
        if let DiffOp::Equal { new_index, len, .. } = op {
            in_order.extend(seq_b[new_index..new_index + len].iter().copied());
        }
    }
    in_order
}

/// Reject matchings that cannot produce a sound script: anchored pairs must
/// agree on kind, and each must sit under the partner of its next-side parent.
fn validate<TA, TB>(
    tree_a: &TA,
    tree_b: &TB,
    matching: &Matching,
    anchored: &HashSet<NodeId>,
) -> Result<(), ScriptError>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    for b_id in tree_b.iter() {
        if !anchored.contains(&b_id) {
            continue;
        }
        let Some(a_id) = matching.get_a(b_id) else {
            continue;
        };
        if tree_a.kind(a_id) != tree_b.kind(b_id) {
            return Err(ScriptError::KindMismatch {
                node_a: usize::from(a_id),
                node_b: usize::from(b_id),
            });
        }
        let Some(parent_b) = tree_b.parent(b_id) else {
            continue;
        };
        let mut ancestor = tree_a.parent(a_id);
        while let Some(node) = ancestor
            && !matching.contains_a(node)
        {
            ancestor = tree_a.parent(node);
        }
        if ancestor != matching.get_a(parent_b) {
            return Err(ScriptError::CrossingPair {
                node_a: usize::from(a_id),
                node_b: usize::from(b_id),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MatchingConfig;
    use crate::matching::compute_matching;
    use crate::tree::{NodeData, SimpleTypes, Tree};
    use facet_testhelpers::test;
    use std::collections::BTreeMap;

    type TestTypes = SimpleTypes<&'static str>;

    fn diff(tree_a: &Tree<TestTypes>, tree_b: &Tree<TestTypes>) -> Vec<EditOp<TestTypes>> {
        let matching = compute_matching(tree_a, tree_b, &MatchingConfig::default());
        generate_edit_script(tree_a, tree_b, &matching).unwrap()
    }

    fn count(ops: &[EditOp<TestTypes>], pred: impl Fn(&EditOp<TestTypes>) -> bool) -> usize {
        ops.iter().filter(|op| pred(op)).count()
    }

    fn list(items: &[&str]) -> Tree<TestTypes> {
        let mut tree: Tree<TestTypes> = Tree::new(NodeData::leaf("ul"));
        for item in items {
            let li = tree.add_child(tree.root, NodeData::leaf("li"));
            tree.add_child(li, NodeData::text("text", *item));
        }
        tree
    }

    #[test]
    fn test_no_changes() {
        let ops = diff(&list(&["a", "b"]), &list(&["a", "b"]));
        assert!(ops.is_empty(), "Identical trees should have no edits");
    }

    #[test]
    fn test_insert_is_subtree_granular() {
        let ops = diff(&list(&["a"]), &list(&["a", "b"]));
        assert_eq!(ops.len(), 1, "one insert for the whole <li>, got {ops:?}");
        assert!(matches!(ops[0], EditOp::Insert { position: 1, .. }));
    }

    #[test]
    fn test_delete_is_subtree_granular() {
        let ops = diff(&list(&["a", "b", "c"]), &list(&["a", "c"]));
        let deletes = count(&ops, |op| matches!(op, EditOp::Delete { .. }));
        assert_eq!(deletes, 1, "got {ops:?}");
        assert_eq!(
            count(&ops, |op| matches!(op, EditOp::Insert { .. })),
            0,
            "got {ops:?}"
        );
    }

    #[test]
    fn test_text_update() {
        let ops = diff(&list(&["Hello"]), &list(&["Hello world"]));
        assert_eq!(ops.len(), 1, "got {ops:?}");
        match &ops[0] {
            EditOp::UpdateText { old, new, .. } => {
                assert_eq!(old, "Hello");
                assert_eq!(new, "Hello world");
            }
            other => panic!("expected UpdateText, got {other}"),
        }
    }

    #[test]
    fn test_swap_two_siblings() {
        // Tree A: ul -> [li "first", li "second"]
        // Tree B: ul -> [li "second", li "first"]
        // Only one of the two needs to move; the other stays in place.
        let ops = diff(&list(&["first", "second"]), &list(&["second", "first"]));
        let moves = count(&ops, |op| matches!(op, EditOp::Move { .. }));
        assert_eq!(moves, 1, "got {ops:?}");
        assert_eq!(ops.len(), 1, "got {ops:?}");
    }

    #[test]
    fn test_unwrap_moves_child_out_of_deleted_parent() {
        // A: root -> [div -> [p -> "body"]]
        // B: root -> [p -> "body"]
        let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::leaf("root"));
        let div = tree_a.add_child(tree_a.root, NodeData::leaf("div"));
        let p_a = tree_a.add_child(div, NodeData::leaf("p"));
        tree_a.add_child(p_a, NodeData::text("text", "body"));

        let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::leaf("root"));
        let p_b = tree_b.add_child(tree_b.root, NodeData::leaf("p"));
        tree_b.add_child(p_b, NodeData::text("text", "body"));

        let ops = diff(&tree_a, &tree_b);
        assert!(
            ops.contains(&EditOp::Move {
                node_a: p_a,
                node_b: p_b,
                new_parent_b: tree_b.root,
                new_position: 0,
            }),
            "got {ops:?}"
        );
        assert!(ops.contains(&EditOp::Delete { node_a: div }), "got {ops:?}");
        // Deletes come last.
        assert!(matches!(ops.last(), Some(EditOp::Delete { .. })));
    }

    #[test]
    fn test_unmatched_roots_is_an_error() {
        let tree_a: Tree<TestTypes> = Tree::new(NodeData::leaf("ul"));
        let tree_b: Tree<TestTypes> = Tree::new(NodeData::leaf("ol"));
        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());
        let err = generate_edit_script(&tree_a, &tree_b, &matching).unwrap_err();
        assert!(matches!(err, ScriptError::RootsUnmatched));
    }

    #[test]
    fn test_crossing_matching_is_rejected() {
        // A hand-made matching that pairs an item with one under a
        // different (matched) list.
        let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::leaf("root"));
        let ul_a = tree_a.add_child(tree_a.root, NodeData::leaf("ul"));
        let li_a = tree_a.add_child(ul_a, NodeData::leaf("li"));
        let ol_a = tree_a.add_child(tree_a.root, NodeData::leaf("ol"));

        let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::leaf("root"));
        let ul_b = tree_b.add_child(tree_b.root, NodeData::leaf("ul"));
        let ol_b = tree_b.add_child(tree_b.root, NodeData::leaf("ol"));
        let li_b = tree_b.add_child(ol_b, NodeData::leaf("li"));

        let mut matching = Matching::new();
        matching.add(tree_a.root, tree_b.root);
        matching.add(ul_a, ul_b);
        matching.add(ol_a, ol_b);
        matching.add(li_a, li_b);

        let err = generate_edit_script(&tree_a, &tree_b, &matching).unwrap_err();
        assert!(matches!(err, ScriptError::CrossingPair { .. }), "got {err}");
    }

    /// Test properties implementation for HTML-like attributes
    #[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
    struct HtmlAttrs(BTreeMap<&'static str, &'static str>);

    impl HtmlAttrs {
        fn with(mut self, key: &'static str, value: &'static str) -> Self {
            self.0.insert(key, value);
            self
        }
    }

    impl Properties for HtmlAttrs {
        type Key = &'static str;
        type Value = &'static str;

        fn keys(&self) -> impl Iterator<Item = &Self::Key> + '_ {
            self.0.keys()
        }

        fn diff(&self, other: &Self) -> Vec<PropertyChange<Self::Key, Self::Value>> {
            let mut keys: Vec<_> = self.0.keys().chain(other.0.keys()).copied().collect();
            keys.sort();
            keys.dedup();
            keys.into_iter()
                .filter_map(|key| {
                    let old_value = self.0.get(key).copied();
                    let new_value = other.0.get(key).copied();
                    (old_value != new_value).then_some(PropertyChange {
                        key,
                        old_value,
                        new_value,
                    })
                })
                .collect()
        }

        fn len(&self) -> usize {
            self.0.len()
        }
    }

    type HtmlTypes = SimpleTypes<&'static str, HtmlAttrs>;

    #[test]
    fn test_properties_emit_update_attribute_ops() {
        // Tree A: root -> div (id="foo", class="box")
        let mut tree_a: Tree<HtmlTypes> = Tree::new(NodeData::leaf("root"));
        tree_a.add_child(
            tree_a.root,
            NodeData::element("div", HtmlAttrs::default().with("id", "foo").with("class", "box")),
        );

        // Tree B: root -> div (id="bar", class="box")
        let mut tree_b: Tree<HtmlTypes> = Tree::new(NodeData::leaf("root"));
        tree_b.add_child(
            tree_b.root,
            NodeData::element("div", HtmlAttrs::default().with("id", "bar").with("class", "box")),
        );

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());
        let ops = generate_edit_script(&tree_a, &tree_b, &matching).unwrap();

        debug!(?ops, "generated");
        assert_eq!(ops.len(), 1, "got {ops:?}");
        let EditOp::UpdateAttributes { changes, .. } = &ops[0] else {
            panic!("expected UpdateAttributes, got {:?}", ops[0]);
        };
        assert_eq!(
            changes,
            &vec![PropertyChange {
                key: "id",
                old_value: Some("foo"),
                new_value: Some("bar"),
            }]
        );
    }

    #[test]
    fn test_equal_properties_emit_nothing() {
        let mut tree_a: Tree<HtmlTypes> = Tree::new(NodeData::leaf("root"));
        let div_a = tree_a.add_child(
            tree_a.root,
            NodeData::element("div", HtmlAttrs::default().with("class", "box")),
        );
        tree_a.add_child(div_a, NodeData::text("text", "old"));

        let mut tree_b: Tree<HtmlTypes> = Tree::new(NodeData::leaf("root"));
        let div_b = tree_b.add_child(
            tree_b.root,
            NodeData::element("div", HtmlAttrs::default().with("class", "box")),
        );
        tree_b.add_child(div_b, NodeData::text("text", "new"));

        let matching = compute_matching(&tree_a, &tree_b, &MatchingConfig::default());
        let ops = generate_edit_script(&tree_a, &tree_b, &matching).unwrap();
        assert!(
            ops.iter()
                .all(|op| !matches!(op, EditOp::UpdateAttributes { .. })),
            "got {ops:?}"
        );
    }
}
