//! Phloem tree implementation for the HTML DOM.
//!
//! The differ sees a document's `<body>` subtree through [`DiffableDocument`],
//! which borrows the document and a precomputed [`DocumentIndex`]. The index
//! owns everything derived from the document (labels, sorted attributes,
//! Merkle hashes), so it can outlive a borrow of the document and be reused
//! across pipeline stages.

use compact_str::CompactString;
use phloem::indextree::NodeId;
use phloem::{DiffTree, NodeHash, Properties, PropertyChange, StructuralIndex, TreeTypes};
use smallvec::SmallVec;
use std::fmt;

use crate::dom::{Document, Namespace, NodeData, NodeKind};
use crate::error::DiffError;
use crate::trace;

/// Node kind in the HTML tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum HtmlNodeKind {
    /// An element node with a tag name
    Element(CompactString, Namespace),
    /// A text node
    #[default]
    Text,
}

impl fmt::Display for HtmlNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtmlNodeKind::Element(tag, Namespace::Html) => write!(f, "<{tag}>"),
            HtmlNodeKind::Element(tag, ns) => write!(f, "<{tag} ns={ns:?}>"),
            HtmlNodeKind::Text => write!(f, "#text"),
        }
    }
}

/// Element attributes, sorted by name so equality and hashing ignore
/// source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HtmlAttrs(SmallVec<[(CompactString, CompactString); 4]>);

impl HtmlAttrs {
    /// Collect and sort attributes.
    pub fn new<'a>(attrs: impl IntoIterator<Item = (&'a CompactString, &'a CompactString)>) -> Self {
        let mut attrs: SmallVec<[(CompactString, CompactString); 4]> = attrs
            .into_iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        attrs.sort_by(|a, b| a.0.cmp(&b.0));
        Self(attrs)
    }

    /// Value of an attribute.
    pub fn get(&self, name: &str) -> Option<&CompactString> {
        self.0
            .binary_search_by(|(key, _)| key.as_str().cmp(name))
            .ok()
            .map(|index| &self.0[index].1)
    }

    /// `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&CompactString, &CompactString)> + '_ {
        self.0.iter().map(|(name, value)| (name, value))
    }
}

impl Properties for HtmlAttrs {
    type Key = CompactString;
    type Value = CompactString;

    fn keys(&self) -> impl Iterator<Item = &Self::Key> + '_ {
        self.0.iter().map(|(name, _)| name)
    }

    fn diff(&self, other: &Self) -> Vec<PropertyChange<Self::Key, Self::Value>> {
        // Both sides are sorted: merge them.
        let mut changes = Vec::new();
        let (mut left, mut right) = (self.0.iter().peekable(), other.0.iter().peekable());
        loop {
            let change = match (left.peek().copied(), right.peek().copied()) {
                (None, None) => break,
                (Some((name, old)), None) => {
                    left.next();
                    Some((name, Some(old), None))
                }
                (None, Some((name, new))) => {
                    right.next();
                    Some((name, None, Some(new)))
                }
                (Some((name_a, old)), Some((name_b, new))) => match name_a.cmp(name_b) {
                    std::cmp::Ordering::Less => {
                        left.next();
                        Some((name_a, Some(old), None))
                    }
                    std::cmp::Ordering::Greater => {
                        right.next();
                        Some((name_b, None, Some(new)))
                    }
                    std::cmp::Ordering::Equal => {
                        left.next();
                        right.next();
                        (old != new).then_some((name_a, Some(old), Some(new)))
                    }
                },
            };
            if let Some((name, old, new)) = change {
                changes.push(PropertyChange {
                    key: name.clone(),
                    old_value: old.cloned(),
                    new_value: new.cloned(),
                });
            }
        }
        changes
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Tree types marker for HTML DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTypes;

impl TreeTypes for HtmlTypes {
    type Kind = HtmlNodeKind;
    type Props = HtmlAttrs;
    type Text = CompactString;
}

/// What the differ sees of one node.
#[derive(Debug, Clone, Default)]
struct NodeView {
    kind: HtmlNodeKind,
    attrs: HtmlAttrs,
    text: Option<CompactString>,
}

impl NodeView {
    fn of(data: &NodeData) -> Self {
        match &data.kind {
            NodeKind::Element(elem) => Self {
                kind: HtmlNodeKind::Element(elem.tag.clone(), data.ns),
                attrs: HtmlAttrs::new(&elem.attrs),
                text: None,
            },
            NodeKind::Text(text) => Self {
                kind: HtmlNodeKind::Text,
                attrs: HtmlAttrs::default(),
                text: Some(text.clone()),
            },
            // never below <body>
            NodeKind::Document => Self::default(),
        }
    }

    fn local_hash(&self) -> NodeHash {
        phloem::tree::local_hash::<HtmlTypes>(&self.kind, &self.attrs, self.text.as_ref())
    }
}

/// Labels, attributes and structure of a document's `<body>` subtree,
/// computed once per document.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    root: NodeId,
    views: Vec<NodeView>,
    structure: StructuralIndex,
}

impl DocumentIndex {
    /// Index the body of `doc`.
    pub fn build(doc: &Document) -> Result<Self, DiffError> {
        let root = doc.require_body()?;
        let mut views = vec![NodeView::default(); doc.arena.count() + 1];
        for id in root.descendants(&doc.arena) {
            views[usize::from(id)] = NodeView::of(doc.get(id));
        }
        // Attributes on <body> come from the shell, or from a stray <body>
        // tag html5ever folded into it. Neither is fragment content.
        views[usize::from(root)].attrs = HtmlAttrs::default();
        let structure = StructuralIndex::build(&doc.arena, root, |id, _| views[usize::from(id)].local_hash());
        trace!(nodes = structure.len(), "indexed document");
        Ok(Self {
            root,
            views,
            structure,
        })
    }

    /// The diff root (`<body>`).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Pair this index with the document it was built from.
    pub fn view<'a>(&'a self, doc: &'a Document) -> DiffableDocument<'a> {
        DiffableDocument { doc, index: self }
    }
}

/// A document seen as a [`DiffTree`] rooted at its `<body>`.
#[derive(Clone, Copy)]
pub struct DiffableDocument<'a> {
    doc: &'a Document,
    index: &'a DocumentIndex,
}

impl<'a> DiffableDocument<'a> {
    /// The underlying document.
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    fn view(&self, id: NodeId) -> &'a NodeView {
        &self.index.views[usize::from(id)]
    }
}

impl DiffTree for DiffableDocument<'_> {
    type Types = HtmlTypes;

    fn root(&self) -> NodeId {
        self.index.root
    }

    fn node_count(&self) -> usize {
        self.index.structure.len()
    }

    fn hash(&self, id: NodeId) -> NodeHash {
        self.index.structure.hash(id)
    }

    fn kind(&self, id: NodeId) -> &HtmlNodeKind {
        &self.view(id).kind
    }

    fn properties(&self, id: NodeId) -> &HtmlAttrs {
        &self.view(id).attrs
    }

    fn text(&self, id: NodeId) -> Option<&CompactString> {
        self.view(id).text.as_ref()
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        if id == self.index.root {
            return None;
        }
        self.doc.parent(id)
    }

    fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.doc.arena)
    }

    fn position(&self, id: NodeId) -> usize {
        self.index.structure.position(id)
    }

    fn height(&self, id: NodeId) -> usize {
        self.index.structure.height(id)
    }

    fn rank(&self, id: NodeId) -> usize {
        self.index.structure.rank(id)
    }

    fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index.structure.preorder().iter().copied()
    }

    fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index.structure.postorder().iter().copied()
    }

    fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.doc.arena)
    }
}
