//! # Phloem
//!
//! Ordered labeled tree matching and subtree-granular edit scripts.
//!
//! Phloem pairs the nodes of two versions of a tree and describes how to
//! get from one to the other:
//! - **GumTree** (Falleri et al., ASE 2014) style matching
//! - **Chawathe et al.** (1996) style edit script generation
//!
//! The algorithm works in phases:
//!
//! 1. **Top-down matching**: pair identical subtrees by Merkle hash,
//!    confirmed by a deep comparison
//! 2. **Bottom-up matching**: pair the rest by position under matched
//!    parents, then by attribute and descendant-label similarity
//! 3. **Ancestry check**: drop pairs whose ancestors were paired elsewhere
//! 4. **Edit script generation**: UPDATE, INSERT, MOVE, DELETE operations,
//!    each covering a whole subtree
//!
//! ## Usage
//!
//! ```
//! use phloem::{EditOp, MatchingConfig, NodeData, SimpleTypes, Tree, diff_trees};
//!
//! type TestTypes = SimpleTypes<&'static str>;
//!
//! let mut tree_a: Tree<TestTypes> = Tree::new(NodeData::leaf("ul"));
//! let li = tree_a.add_child(tree_a.root, NodeData::leaf("li"));
//! tree_a.add_child(li, NodeData::text("text", "one"));
//!
//! let mut tree_b: Tree<TestTypes> = Tree::new(NodeData::leaf("ul"));
//! let li = tree_b.add_child(tree_b.root, NodeData::leaf("li"));
//! tree_b.add_child(li, NodeData::text("text", "one"));
//! tree_b.add_child(tree_b.root, NodeData::leaf("li"));
//!
//! let ops = diff_trees(&tree_a, &tree_b, &MatchingConfig::default()).unwrap();
//! assert!(matches!(ops.as_slice(), [EditOp::Insert { position: 1, .. }]));
//! ```

#![warn(missing_docs)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

mod chawathe;
/// GumTree-style matching algorithm
pub mod matching;
/// Tree representation, hashing and the structural index
pub mod tree;

pub use chawathe::*;
pub use matching::*;
pub use tree::{
    DiffTree, NoProps, NodeData, NodeHash, Properties, PropertyChange, SimpleTypes,
    StructuralIndex, Tree, TreeTypes, identical_subtrees,
};

/// Compute a diff between two trees.
///
/// This is the main entry point for tree diffing. It:
/// 1. Computes a matching between nodes (see [`compute_matching`])
/// 2. Generates an edit script from it (see [`generate_edit_script`])
pub fn diff_trees<TA, TB>(
    tree_a: &TA,
    tree_b: &TB,
    config: &MatchingConfig,
) -> Result<Vec<EditOp<TA::Types>>, ScriptError>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let (ops, _matching) = diff_trees_with_matching(tree_a, tree_b, config)?;
    Ok(ops)
}

/// Like [`diff_trees`], but also returns the node matching.
///
/// Consumers that render the result against tree A need the matching to
/// find where tree B's nodes came from.
pub fn diff_trees_with_matching<TA, TB>(
    tree_a: &TA,
    tree_b: &TB,
    config: &MatchingConfig,
) -> Result<(Vec<EditOp<TA::Types>>, Matching), ScriptError>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let matching = compute_matching(tree_a, tree_b, config);
    let ops = generate_edit_script(tree_a, tree_b, &matching)?;
    Ok((ops, matching))
}
