//! Structural diffing of HTML documents.
//!
//! Documents are compared below their `<body>` through phloem: matching
//! first, then an edit script of subtree-granular operations.

mod apply;
mod tree;

pub(crate) use apply::Placement;
pub use apply::apply_script;
pub use tree::{DiffableDocument, DocumentIndex, HtmlAttrs, HtmlNodeKind, HtmlTypes};

use phloem::{EditOp, Matching, MatchingConfig, compute_matching, generate_edit_script};

use crate::debug;
use crate::dom::Document;
use crate::error::DiffError;

/// Edit operations over the HTML tree types.
pub type HtmlEditOp = EditOp<HtmlTypes>;

/// An edit script together with the matching it was built from.
///
/// Node ids refer to the two documents the script was computed for.
#[derive(Debug, Clone)]
pub struct EditScript {
    ops: Vec<HtmlEditOp>,
    matching: Matching,
}

impl EditScript {
    /// Operations, in the order they must be applied.
    pub fn ops(&self) -> &[HtmlEditOp] {
        &self.ops
    }

    /// Node correspondence between the two documents.
    pub fn matching(&self) -> &Matching {
        &self.matching
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the documents are structurally equal.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Match the bodies of two documents.
pub fn match_documents(
    prev: &Document,
    next: &Document,
    config: &MatchingConfig,
) -> Result<Matching, DiffError> {
    let prev_index = DocumentIndex::build(prev)?;
    let next_index = DocumentIndex::build(next)?;
    Ok(compute_matching(
        &prev_index.view(prev),
        &next_index.view(next),
        config,
    ))
}

/// Match two documents and derive the edit script from `prev` to `next`.
pub fn build_edit_script(
    prev: &Document,
    next: &Document,
    config: &MatchingConfig,
) -> Result<EditScript, DiffError> {
    let prev_index = DocumentIndex::build(prev)?;
    let next_index = DocumentIndex::build(next)?;
    let (tree_a, tree_b) = (prev_index.view(prev), next_index.view(next));
    let matching = compute_matching(&tree_a, &tree_b, config);
    script_from_matching(tree_a, tree_b, matching)
}

/// Derive the edit script for an existing matching.
pub fn script_from_matching(
    tree_a: DiffableDocument<'_>,
    tree_b: DiffableDocument<'_>,
    matching: Matching,
) -> Result<EditScript, DiffError> {
    let ops = generate_edit_script(&tree_a, &tree_b, &matching)?;
    debug!(
        ops_count = ops.len(),
        matched_pairs = matching.len(),
        "phloem diff complete"
    );
    Ok(EditScript { ops, matching })
}
