//! Cutting a marked tree down to its changes.
//!
//! A node survives when it carries a mark, sits above a node that survives,
//! or is the diff root. Inserted and deleted subtrees survive whole. Pruning
//! only removes: order and marks of what is left are untouched.

use facet::Facet;
use phloem::indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use crate::dom::Document;
use crate::dump::MarkedTreeDump;
use crate::error::DiffError;
use crate::mark::ChangeSummary;
use crate::marker::{MarkedTree, summarize};
use crate::serialize::{SerializeOptions, serialize_fragment};
use crate::{debug, trace};

/// What to keep besides the changes themselves.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[facet(default)]
pub struct PrunePolicy {
    /// Unchanged siblings kept on each side of a marked node, whole. A
    /// change with no siblings of its own borrows those of its nearest
    /// ancestor that has some. `0` keeps only the changes and their
    /// ancestors.
    pub context_siblings: usize,
}

impl PrunePolicy {
    /// Keep only changes and their ancestors.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Also keep up to `count` siblings on each side of every change.
    pub fn with_context(count: usize) -> Self {
        Self {
            context_siblings: count,
        }
    }
}

/// A marked tree with the unchanged parts removed.
#[derive(Debug, Clone)]
pub struct PrunedTree {
    doc: Document,
    root: NodeId,
}

impl PrunedTree {
    /// The pruned document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Give up the pruned document.
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// The diff root (`<body>`).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Count marks by kind. Same as before pruning.
    pub fn summary(&self) -> ChangeSummary {
        summarize(&self.doc, self.root)
    }

    /// Pretty-printer showing every node with its mark.
    pub fn dump(&self) -> MarkedTreeDump<'_> {
        MarkedTreeDump::new(&self.doc, self.root)
    }

    /// Write the children of `<body>` as HTML.
    pub fn serialize(&self, opts: &SerializeOptions) -> Result<String, DiffError> {
        serialize_fragment(&self.doc, opts)
    }
}

impl MarkedTree {
    /// Remove every node that is neither a change, nor above one, nor kept
    /// as context by `policy`.
    pub fn prune(self, policy: &PrunePolicy) -> PrunedTree {
        let MarkedTree { mut doc, root } = self;
        let keep = kept_nodes(&doc, root, policy);

        // Topmost unkept nodes: their whole subtree goes.
        let doomed: Vec<NodeId> = root
            .descendants(&doc.arena)
            .filter(|id| !keep.contains(id))
            .filter(|&id| doc.parent(id).is_some_and(|parent| keep.contains(&parent)))
            .collect();
        debug!(kept = keep.len(), removed_subtrees = doomed.len(), "prune");
        for id in doomed {
            id.remove_subtree(&mut doc.arena);
        }

        let pruned = PrunedTree { doc, root };
        trace!("pruned tree:\n{}", pruned.dump());
        pruned
    }
}

fn kept_nodes(doc: &Document, root: NodeId, policy: &PrunePolicy) -> HashSet<NodeId> {
    let mut keep: HashSet<NodeId> = HashSet::default();
    keep.insert(root);

    let keep_path = |keep: &mut HashSet<NodeId>, id: NodeId| {
        for ancestor in id.ancestors(&doc.arena) {
            if !keep.insert(ancestor) || ancestor == root {
                break;
            }
        }
    };

    let marked: Vec<NodeId> = root
        .descendants(&doc.arena)
        .filter(|&id| doc.get(id).mark.is_change())
        .collect();

    for &id in &marked {
        keep_path(&mut keep, id);
        if doc.get(id).mark.covers_subtree() {
            keep.extend(id.descendants(&doc.arena));
        }
    }

    let context = policy.context_siblings;
    if context > 0 {
        for &id in &marked {
            let Some(anchor) = context_anchor(doc, root, id) else {
                continue;
            };
            let before = anchor.preceding_siblings(&doc.arena).skip(1).take(context);
            let after = anchor.following_siblings(&doc.arena).skip(1).take(context);
            for sibling in before.chain(after) {
                keep.extend(sibling.descendants(&doc.arena));
            }
        }
    }
    keep
}

/// The node whose siblings give context to a change at `id`: `id` itself,
/// or its nearest ancestor below `root` that has siblings. A lone text
/// change takes its context from around the enclosing element.
fn context_anchor(doc: &Document, root: NodeId, id: NodeId) -> Option<NodeId> {
    id.ancestors(&doc.arena)
        .take_while(|&node| node != root)
        .find(|&node| {
            let node = &doc.arena[node];
            node.previous_sibling().is_some() || node.next_sibling().is_some()
        })
}
