//! Tree representation shared by the matcher and the edit script builder.
//!
//! Trees are stored in an [`indextree::Arena`]. The algorithms only see them
//! through the [`DiffTree`] trait, so callers can diff their own arena-backed
//! documents without copying them into a [`Tree`] first.

use core::cell::OnceCell;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::RapidHasher;

/// Structural (Merkle) hash of a subtree.
pub type NodeHash = u64;

/// The type parameters of a tree: labels, attribute bags and text payloads.
pub trait TreeTypes: 'static {
    /// Node label. Nodes are only ever matched against nodes of the same kind.
    type Kind: Clone + Eq + Hash + fmt::Debug + fmt::Display;
    /// Attribute bag attached to every node.
    type Props: Properties;
    /// Text payload carried by leaves.
    type Text: Clone + Eq + Hash + fmt::Debug + AsRef<str>;
}

/// One property that differs between two matched nodes.
///
/// `old_value` is `None` for an added property, `new_value` is `None` for a
/// removed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange<K, V> {
    /// Property name.
    pub key: K,
    /// Value on the previous side.
    pub old_value: Option<V>,
    /// Value on the next side.
    pub new_value: Option<V>,
}

/// Attribute bag of a node.
///
/// Equality and hashing must ignore insertion order if the underlying format
/// does (HTML attributes do).
pub trait Properties: Clone + Eq + Hash + fmt::Debug {
    /// Property name.
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display;
    /// Property value.
    type Value: Clone + Eq + fmt::Debug + fmt::Display;

    /// Names of all properties present.
    fn keys(&self) -> impl Iterator<Item = &Self::Key> + '_;

    /// Changes needed to turn `self` into `other`, in a stable order.
    /// Empty when both bags are equal.
    fn diff(&self, other: &Self) -> Vec<PropertyChange<Self::Key, Self::Value>>;

    /// Number of properties.
    fn len(&self) -> usize;

    /// Whether there are no properties.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Similarity in `[0, 1]`: the Dice coefficient of the property names.
    /// Two empty bags are fully similar.
    fn similarity(&self, other: &Self) -> f64 {
        let total = self.len() + other.len();
        if total == 0 {
            return 1.0;
        }
        let common = self
            .keys()
            .filter(|key| other.keys().any(|k| k == *key))
            .count();
        2.0 * common as f64 / total as f64
    }
}

/// Property bag for trees without properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NoProps;

impl Properties for NoProps {
    type Key = &'static str;
    type Value = &'static str;

    fn keys(&self) -> impl Iterator<Item = &Self::Key> + '_ {
        core::iter::empty()
    }

    fn diff(&self, _other: &Self) -> Vec<PropertyChange<Self::Key, Self::Value>> {
        Vec::new()
    }

    fn len(&self) -> usize {
        0
    }
}

/// Ready-made [`TreeTypes`] with `String` text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTypes<K, P = NoProps>(PhantomData<(K, P)>);

impl<K, P> TreeTypes for SimpleTypes<K, P>
where
    K: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static,
    P: Properties + 'static,
{
    type Kind = K;
    type Props = P;
    type Text = String;
}

/// Payload of a [`Tree`] node.
pub struct NodeData<T: TreeTypes> {
    /// Node label.
    pub kind: T::Kind,
    /// Node properties.
    pub properties: T::Props,
    /// Text content, for leaves that carry any.
    pub text: Option<T::Text>,
}

impl<T: TreeTypes> NodeData<T> {
    /// A node with properties and no text.
    pub fn element(kind: T::Kind, properties: T::Props) -> Self {
        Self {
            kind,
            properties,
            text: None,
        }
    }

    /// Hash of this node's own content, children excluded.
    pub fn local_hash(&self) -> NodeHash {
        local_hash::<T>(&self.kind, &self.properties, self.text.as_ref())
    }
}

impl<T: TreeTypes> NodeData<T>
where
    T::Props: Default,
{
    /// A node with default properties and no text.
    pub fn leaf(kind: T::Kind) -> Self {
        Self::element(kind, T::Props::default())
    }

    /// A text-carrying node with default properties.
    pub fn text(kind: T::Kind, text: impl Into<T::Text>) -> Self {
        Self {
            kind,
            properties: T::Props::default(),
            text: Some(text.into()),
        }
    }
}

impl<T: TreeTypes> Clone for NodeData<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            properties: self.properties.clone(),
            text: self.text.clone(),
        }
    }
}

impl<T: TreeTypes> fmt::Debug for NodeData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeData")
            .field("kind", &self.kind)
            .field("properties", &self.properties)
            .field("text", &self.text)
            .finish()
    }
}

/// Hash a node's own content (kind, properties, text).
pub fn local_hash<T: TreeTypes>(
    kind: &T::Kind,
    properties: &T::Props,
    text: Option<&T::Text>,
) -> NodeHash {
    let mut hasher = RapidHasher::default();
    kind.hash(&mut hasher);
    properties.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

/// Precomputed per-node structure of one tree: Merkle hashes, heights,
/// sibling positions and document order.
///
/// Tables are indexed by the arena slot of each `NodeId`, so lookups for
/// nodes outside the indexed subtree return zeros instead of panicking.
#[derive(Debug, Clone)]
pub struct StructuralIndex {
    preorder: Vec<NodeId>,
    postorder: Vec<NodeId>,
    hash: Vec<NodeHash>,
    height: Vec<usize>,
    position: Vec<usize>,
    rank: Vec<usize>,
}

impl StructuralIndex {
    /// Index the subtree rooted at `root`. `local` hashes one node's own
    /// content; children's hashes are folded in here.
    pub fn build<N>(
        arena: &Arena<N>,
        root: NodeId,
        mut local: impl FnMut(NodeId, &N) -> NodeHash,
    ) -> Self {
        let slots = arena.count() + 1;
        let mut index = Self {
            preorder: Vec::new(),
            postorder: Vec::new(),
            hash: vec![0; slots],
            height: vec![0; slots],
            position: vec![0; slots],
            rank: vec![0; slots],
        };

        for edge in root.traverse(arena) {
            match edge {
                NodeEdge::Start(id) => {
                    index.rank[usize::from(id)] = index.preorder.len();
                    index.preorder.push(id);
                }
                NodeEdge::End(id) => {
                    let mut hasher = RapidHasher::default();
                    local(id, arena[id].get()).hash(&mut hasher);
                    let mut height = 0;
                    for (position, child) in id.children(arena).enumerate() {
                        let slot = usize::from(child);
                        index.position[slot] = position;
                        index.hash[slot].hash(&mut hasher);
                        height = height.max(index.height[slot] + 1);
                    }
                    let slot = usize::from(id);
                    index.hash[slot] = hasher.finish();
                    index.height[slot] = height;
                    index.postorder.push(id);
                }
            }
        }

        index
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.preorder.len()
    }

    /// Whether the index is empty (never true for a built index).
    pub fn is_empty(&self) -> bool {
        self.preorder.is_empty()
    }

    /// Nodes in document order.
    pub fn preorder(&self) -> &[NodeId] {
        &self.preorder
    }

    /// Nodes in post-order (children before parents).
    pub fn postorder(&self) -> &[NodeId] {
        &self.postorder
    }

    /// Merkle hash of the subtree rooted at `id`.
    pub fn hash(&self, id: NodeId) -> NodeHash {
        self.hash.get(usize::from(id)).copied().unwrap_or_default()
    }

    /// Height of the subtree rooted at `id` (leaves are 0).
    pub fn height(&self, id: NodeId) -> usize {
        self.height.get(usize::from(id)).copied().unwrap_or_default()
    }

    /// Index of `id` among its siblings.
    pub fn position(&self, id: NodeId) -> usize {
        self.position.get(usize::from(id)).copied().unwrap_or_default()
    }

    /// Document-order rank of `id`.
    pub fn rank(&self, id: NodeId) -> usize {
        self.rank.get(usize::from(id)).copied().unwrap_or_default()
    }
}

/// Read-only view of a tree, as consumed by the matcher and script builder.
pub trait DiffTree {
    /// Label, property and text types of this tree.
    type Types: TreeTypes;

    /// Root node. Its parent, if the backing arena has one, is never reported.
    fn root(&self) -> NodeId;

    /// Number of nodes under (and including) the root.
    fn node_count(&self) -> usize;

    /// Merkle hash of the subtree rooted at `id`.
    fn hash(&self, id: NodeId) -> NodeHash;

    /// Label of `id`.
    fn kind(&self, id: NodeId) -> &<Self::Types as TreeTypes>::Kind;

    /// Properties of `id`.
    fn properties(&self, id: NodeId) -> &<Self::Types as TreeTypes>::Props;

    /// Text of `id`, if it carries any.
    fn text(&self, id: NodeId) -> Option<&<Self::Types as TreeTypes>::Text>;

    /// Parent of `id`, `None` for the root.
    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// Children of `id`, in order.
    fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_;

    /// Number of children of `id`.
    fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Index of `id` among its siblings.
    fn position(&self, id: NodeId) -> usize;

    /// Height of the subtree rooted at `id` (leaves are 0).
    fn height(&self, id: NodeId) -> usize;

    /// Document-order rank of `id` (the root is 0).
    fn rank(&self, id: NodeId) -> usize;

    /// All nodes in document order.
    fn iter(&self) -> impl Iterator<Item = NodeId> + '_;

    /// All nodes in post-order.
    fn post_order(&self) -> impl Iterator<Item = NodeId> + '_;

    /// `id` and everything below it, in document order.
    fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_;

    /// Whether `ancestor` is a proper ancestor of `id`.
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }
}

/// Deep structural comparison of two subtrees: same kinds, properties, text
/// and children, recursively. Used to confirm hash hits.
pub fn identical_subtrees<TA, TB>(tree_a: &TA, a: NodeId, tree_b: &TB, b: NodeId) -> bool
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    let mut stack = vec![(a, b)];
    while let Some((a, b)) = stack.pop() {
        if tree_a.kind(a) != tree_b.kind(b)
            || tree_a.properties(a) != tree_b.properties(b)
            || tree_a.text(a) != tree_b.text(b)
            || tree_a.child_count(a) != tree_b.child_count(b)
        {
            return false;
        }
        stack.extend(tree_a.children(a).zip(tree_b.children(b)));
    }
    true
}

/// A standalone arena tree, handy for tests and for callers without their own
/// arena representation.
pub struct Tree<T: TreeTypes> {
    /// Node storage.
    pub arena: Arena<NodeData<T>>,
    /// Root node.
    pub root: NodeId,
    index: OnceCell<StructuralIndex>,
}

impl<T: TreeTypes> Tree<T> {
    /// Create a tree holding a single root node.
    pub fn new(root: NodeData<T>) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self {
            arena,
            root,
            index: OnceCell::new(),
        }
    }

    /// Append a child under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData<T>) -> NodeId {
        self.index.take();
        let child = self.arena.new_node(data);
        parent.append(child, &mut self.arena);
        child
    }

    /// Payload of `id`.
    pub fn get(&self, id: NodeId) -> &NodeData<T> {
        self.arena[id].get()
    }

    fn index(&self) -> &StructuralIndex {
        self.index
            .get_or_init(|| StructuralIndex::build(&self.arena, self.root, |_, data| data.local_hash()))
    }
}

impl<T: TreeTypes> DiffTree for Tree<T> {
    type Types = T;

    fn root(&self) -> NodeId {
        self.root
    }

    fn node_count(&self) -> usize {
        self.index().len()
    }

    fn hash(&self, id: NodeId) -> NodeHash {
        self.index().hash(id)
    }

    fn kind(&self, id: NodeId) -> &T::Kind {
        &self.get(id).kind
    }

    fn properties(&self, id: NodeId) -> &T::Props {
        &self.get(id).properties
    }

    fn text(&self, id: NodeId) -> Option<&T::Text> {
        self.get(id).text.as_ref()
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        if id == self.root {
            return None;
        }
        self.arena[id].parent()
    }

    fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    fn position(&self, id: NodeId) -> usize {
        self.index().position(id)
    }

    fn height(&self, id: NodeId) -> usize {
        self.index().height(id)
    }

    fn rank(&self, id: NodeId) -> usize {
        self.index().rank(id)
    }

    fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index().preorder().iter().copied()
    }

    fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.index().postorder().iter().copied()
    }

    fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }
}
