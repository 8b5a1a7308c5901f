//! Node matching between a previous and a next tree.
//!
//! Matching runs in phases:
//! 1. Top-down: the roots are paired, then identical subtrees (Merkle hash,
//!    confirmed structurally) are paired wholesale while descending through
//!    same-kind parents.
//! 2. Bottom-up: remaining internal nodes are paired by sibling position under
//!    matched parents, falling back to a similarity score; leaves go last.
//! 3. Consistency: pairs whose nearest matched ancestors do not correspond are
//!    dropped, and the freed nodes get one more bottom-up round.

use crate::{debug, trace};

use crate::tree::{DiffTree, Properties, TreeTypes, identical_subtrees};
use facet::Facet;
use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;
use similar::TextDiff;
use std::collections::VecDeque;
use std::rc::Rc;

#[cfg(feature = "matching-stats")]
thread_local! {
    static SCORE_CALLS: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

/// Reset matching statistics (call before compute_matching)
#[cfg(feature = "matching-stats")]
pub fn reset_stats() {
    SCORE_CALLS.with(|c| c.set(0));
}

/// Number of similarity scores computed since the last reset.
#[cfg(feature = "matching-stats")]
pub fn get_stats() -> usize {
    SCORE_CALLS.with(|c| c.get())
}

/// A bidirectional, one-to-one mapping between nodes in two trees.
/// Uses Vec for O(1) lookups indexed by NodeId.
#[derive(Debug, Clone, Default)]
pub struct Matching {
    /// Map from tree A node to tree B node (indexed by A's NodeId)
    a_to_b: Vec<Option<NodeId>>,
    /// Map from tree B node to tree A node (indexed by B's NodeId)
    b_to_a: Vec<Option<NodeId>>,
    /// All matched pairs, in the order they were added
    pairs: Vec<(NodeId, NodeId)>,
}

impl Matching {
    /// Create a new empty matching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new matching with preallocated capacity.
    pub fn with_capacity(max_a: usize, max_b: usize) -> Self {
        Self {
            a_to_b: vec![None; max_a],
            b_to_a: vec![None; max_b],
            pairs: Vec::new(),
        }
    }

    /// Add a match between two nodes. Both must be unmatched.
    #[inline]
    pub fn add(&mut self, a: NodeId, b: NodeId) {
        let a_idx = usize::from(a);
        let b_idx = usize::from(b);

        if a_idx >= self.a_to_b.len() {
            self.a_to_b.resize(a_idx + 1, None);
        }
        if b_idx >= self.b_to_a.len() {
            self.b_to_a.resize(b_idx + 1, None);
        }

        self.a_to_b[a_idx] = Some(b);
        self.b_to_a[b_idx] = Some(a);
        self.pairs.push((a, b));
    }

    /// Remove the pair `a ↔ b`, if present.
    pub fn remove(&mut self, a: NodeId, b: NodeId) {
        if self.get_b(a) != Some(b) {
            return;
        }
        self.a_to_b[usize::from(a)] = None;
        self.b_to_a[usize::from(b)] = None;
        self.pairs.retain(|&pair| pair != (a, b));
    }

    /// Check if a node from tree A is matched.
    #[inline(always)]
    pub fn contains_a(&self, a: NodeId) -> bool {
        self.get_b(a).is_some()
    }

    /// Check if a node from tree B is matched.
    #[inline(always)]
    pub fn contains_b(&self, b: NodeId) -> bool {
        self.get_a(b).is_some()
    }

    /// Get the match for a node from tree A.
    #[inline(always)]
    pub fn get_b(&self, a: NodeId) -> Option<NodeId> {
        self.a_to_b.get(usize::from(a)).copied().flatten()
    }

    /// Get the match for a node from tree B.
    #[inline(always)]
    pub fn get_a(&self, b: NodeId) -> Option<NodeId> {
        self.b_to_a.get(usize::from(b)).copied().flatten()
    }

    /// Get all matched pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Get the number of matched pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if there are no matches.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Configuration for the matching algorithm.
#[derive(Facet, Debug, Clone, PartialEq)]
#[facet(default)]
pub struct MatchingConfig {
    /// Minimum similarity for bottom-up matching.
    /// Nodes scoring below this threshold won't be matched.
    pub similarity_threshold: f64,

    /// Minimum height for a subtree to be paired wholesale in the top-down
    /// phase. Smaller subtrees are left for bottom-up matching.
    pub min_height: usize,

    /// Upper bound on the candidates scored per node in the similarity
    /// fallback, taken nearest to the alignment cursor. `None` scores all of
    /// them, which is quadratic for very dissimilar trees.
    pub max_candidates: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            min_height: 1,
            max_candidates: None,
        }
    }
}

impl MatchingConfig {
    /// Set the similarity threshold.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the minimum height for top-down pairing.
    pub fn min_height(mut self, height: usize) -> Self {
        self.min_height = height;
        self
    }

    /// Bound the number of candidates scored per node.
    pub fn max_candidates(mut self, limit: usize) -> Self {
        self.max_candidates = Some(limit);
        self
    }
}

/// Similarity of two texts in `[0, 1]`, on word granularity.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    f64::from(TextDiff::from_words(a, b).ratio())
}

/// Compute the matching between two trees.
///
/// The result is deterministic for identical inputs and satisfies the
/// ancestry invariant: for every pair, the nearest matched proper ancestors
/// on both sides are matched to each other (or both absent).
pub fn compute_matching<TA, TB>(tree_a: &TA, tree_b: &TB, config: &MatchingConfig) -> Matching
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    debug!(
        nodes_a = tree_a.node_count(),
        nodes_b = tree_b.node_count(),
        "compute_matching start"
    );
    let mut matcher = Matcher::new(tree_a, tree_b, config);

    matcher.top_down_phase();
    debug!(matched = matcher.matching.len(), "after top_down_phase");

    matcher.bottom_up_phase();
    debug!(matched = matcher.matching.len(), "after bottom_up_phase");

    if matcher.enforce_ancestry() > 0 {
        matcher.bottom_up_phase();
        matcher.enforce_ancestry();
    }
    debug!(matched = matcher.matching.len(), "compute_matching done");

    matcher.matching
}

/// Multiset of the labels found below a node.
type LabelBag<K> = HashMap<K, usize>;

/// Lazily computed descendant-label multisets.
/// Only computes bags for nodes that are actually scored.
struct LabelBags<'t, T: DiffTree> {
    tree: &'t T,
    cache: HashMap<NodeId, Rc<LabelBag<<T::Types as TreeTypes>::Kind>>>,
}

impl<'t, T: DiffTree> LabelBags<'t, T> {
    fn new(tree: &'t T) -> Self {
        Self {
            tree,
            cache: HashMap::default(),
        }
    }

    fn get(&mut self, id: NodeId) -> Rc<LabelBag<<T::Types as TreeTypes>::Kind>> {
        if let Some(bag) = self.cache.get(&id) {
            return Rc::clone(bag);
        }
        let mut bag = LabelBag::default();
        for desc in self.tree.descendants(id).skip(1) {
            *bag.entry(self.tree.kind(desc).clone()).or_insert(0) += 1;
        }
        let bag = Rc::new(bag);
        self.cache.insert(id, Rc::clone(&bag));
        bag
    }
}

/// Dice overlap of two label multisets. Two empty bags overlap fully.
fn bag_overlap<K: Eq + core::hash::Hash>(a: &LabelBag<K>, b: &LabelBag<K>) -> f64 {
    let total: usize = a.values().sum::<usize>() + b.values().sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    let common: usize = a
        .iter()
        .map(|(label, &count)| count.min(b.get(label).copied().unwrap_or(0)))
        .sum();
    2.0 * common as f64 / total as f64
}

struct Matcher<'t, TA, TB>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    tree_a: &'t TA,
    tree_b: &'t TB,
    config: &'t MatchingConfig,
    matching: Matching,
    /// Document-order rank just past the most recently matched B node.
    cursor: usize,
    bags_a: LabelBags<'t, TA>,
    bags_b: LabelBags<'t, TB>,
}

impl<'t, TA, TB> Matcher<'t, TA, TB>
where
    TA: DiffTree,
    TB: DiffTree<Types = TA::Types>,
{
    fn new(tree_a: &'t TA, tree_b: &'t TB, config: &'t MatchingConfig) -> Self {
        Self {
            tree_a,
            tree_b,
            config,
            matching: Matching::with_capacity(tree_a.node_count() + 1, tree_b.node_count() + 1),
            cursor: 0,
            bags_a: LabelBags::new(tree_a),
            bags_b: LabelBags::new(tree_b),
        }
    }

    fn add(&mut self, a: NodeId, b: NodeId) {
        self.matching.add(a, b);
        self.cursor = self.tree_b.rank(b) + 1;
    }

    fn is_identical(&self, a: NodeId, b: NodeId) -> bool {
        self.tree_a.hash(a) == self.tree_b.hash(b)
            && identical_subtrees(self.tree_a, a, self.tree_b, b)
    }

    /// Phase 1: pair the roots, then identical subtrees top-down.
    fn top_down_phase(&mut self) {
        trace!("top_down_phase start");
        let root_a = self.tree_a.root();
        let root_b = self.tree_b.root();

        if self.tree_a.kind(root_a) != self.tree_b.kind(root_b) {
            debug!(
                a_kind = %self.tree_a.kind(root_a),
                b_kind = %self.tree_b.kind(root_b),
                "roots differ in kind, leaving them unmatched"
            );
            return;
        }
        if self.is_identical(root_a, root_b) {
            self.match_subtrees(root_a, root_b);
            return;
        }
        self.add(root_a, root_b);

        // Breadth-first over same-kind pairs, so shallow pairs are tried
        // before deeper ones and earlier siblings before later ones.
        let mut queue = VecDeque::from([(root_a, root_b)]);
        while let Some((a_id, b_id)) = queue.pop_front() {
            let a_children: Vec<NodeId> = self.tree_a.children(a_id).collect();
            let b_children: Vec<NodeId> = self.tree_b.children(b_id).collect();

            for &a_child in &a_children {
                if self.matching.contains_a(a_child)
                    || self.tree_a.height(a_child) < self.config.min_height
                {
                    continue;
                }
                let a_pos = self.tree_a.position(a_child);
                let twin = b_children
                    .iter()
                    .copied()
                    .filter(|&b| !self.matching.contains_b(b) && self.is_identical(a_child, b))
                    .min_by_key(|&b| {
                        let b_pos = self.tree_b.position(b);
                        (b_pos.abs_diff(a_pos), b_pos)
                    });
                if let Some(b_child) = twin {
                    trace!(
                        a = usize::from(a_child),
                        b = usize::from(b_child),
                        kind = %self.tree_a.kind(a_child),
                        "top_down: identical subtree"
                    );
                    self.match_subtrees(a_child, b_child);
                }
            }

            // Descend into differing same-kind pairs: identical subtrees may
            // still be found further down.
            for &a_child in &a_children {
                if self.matching.contains_a(a_child) || self.tree_a.child_count(a_child) == 0 {
                    continue;
                }
                let a_pos = self.tree_a.position(a_child);
                let kind = self.tree_a.kind(a_child);
                let mut pairs: Vec<NodeId> = b_children
                    .iter()
                    .copied()
                    .filter(|&b| {
                        !self.matching.contains_b(b)
                            && self.tree_b.kind(b) == kind
                            && self.tree_b.child_count(b) > 0
                    })
                    .collect();
                if let Some(limit) = self.config.max_candidates {
                    pairs.sort_by_key(|&b| {
                        let b_pos = self.tree_b.position(b);
                        (b_pos.abs_diff(a_pos), b_pos)
                    });
                    pairs.truncate(limit);
                    pairs.sort_by_key(|&b| self.tree_b.position(b));
                }
                queue.extend(pairs.into_iter().map(|b| (a_child, b)));
            }

            // Drop queued pairs whose nodes got matched meanwhile.
            while let Some(&(a, b)) = queue.front() {
                if self.matching.contains_a(a) || self.matching.contains_b(b) {
                    queue.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Match two identical subtrees node by node.
    fn match_subtrees(&mut self, a_id: NodeId, b_id: NodeId) {
        let mut stack = vec![(a_id, b_id)];
        while let Some((a, b)) = stack.pop() {
            // A descendant may already be matched when candidate order put it first.
            if self.matching.contains_a(a) || self.matching.contains_b(b) {
                continue;
            }
            self.add(a, b);
            let children: Vec<_> = self
                .tree_a
                .children(a)
                .zip(self.tree_b.children(b))
                .collect();
            stack.extend(children.into_iter().rev());
        }
    }

    /// Nearest proper ancestor of `a` that is currently matched.
    fn matched_ancestor_a(&self, a: NodeId) -> Option<NodeId> {
        let mut current = self.tree_a.parent(a);
        while let Some(node) = current {
            if self.matching.contains_a(node) {
                return Some(node);
            }
            current = self.tree_a.parent(node);
        }
        None
    }

    /// Nearest proper ancestor of `b` that is currently matched.
    fn matched_ancestor_b(&self, b: NodeId) -> Option<NodeId> {
        let mut current = self.tree_b.parent(b);
        while let Some(node) = current {
            if self.matching.contains_b(node) {
                return Some(node);
            }
            current = self.tree_b.parent(node);
        }
        None
    }

    /// Check if `a ↔ b` would agree with the pairs already made above them:
    /// their nearest matched ancestors must be matched to each other.
    fn ancestry_compatible(&self, a: NodeId, b: NodeId) -> bool {
        match (self.matched_ancestor_a(a), self.matched_ancestor_b(b)) {
            (None, None) => true,
            (Some(anc_a), Some(anc_b)) => self.matching.get_b(anc_a) == Some(anc_b),
            (anc_a, anc_b) => {
                trace!(
                    a = usize::from(a),
                    b = usize::from(b),
                    ?anc_a,
                    ?anc_b,
                    "ancestry check failed"
                );
                false
            }
        }
    }

    /// Similarity of `a` and `b` in `[0, 1]`.
    ///
    /// Text leaves compare their words. Everything else averages the Dice
    /// coefficient of attribute names and the overlap of descendant labels.
    fn score(&mut self, a: NodeId, b: NodeId) -> f64 {
        #[cfg(feature = "matching-stats")]
        SCORE_CALLS.with(|c| c.set(c.get() + 1));

        if let (Some(text_a), Some(text_b)) = (self.tree_a.text(a), self.tree_b.text(b)) {
            return text_similarity(text_a.as_ref(), text_b.as_ref());
        }
        let attrs = self
            .tree_a
            .properties(a)
            .similarity(self.tree_b.properties(b));
        let bag_a = self.bags_a.get(a);
        let bag_b = self.bags_b.get(b);
        (attrs + bag_overlap(&bag_a, &bag_b)) / 2.0
    }

    /// Whether `candidate` beats `best`: higher score, then smaller distance
    /// from the alignment cursor, then earlier in document order. Both are
    /// next-side nodes competing for one previous-side node.
    fn beats(&self, candidate: (NodeId, f64), best: Option<(NodeId, f64)>) -> bool {
        let Some((best_id, best_score)) = best else {
            return true;
        };
        let (id, score) = candidate;
        if (score - best_score).abs() > f64::EPSILON {
            return score > best_score;
        }
        let rank = self.tree_b.rank(id);
        let best_rank = self.tree_b.rank(best_id);
        let distance = rank.abs_diff(self.cursor);
        let best_distance = best_rank.abs_diff(self.cursor);
        (distance, rank) < (best_distance, best_rank)
    }

    /// The highest-scoring candidate at or above the similarity threshold.
    fn best_scored(&mut self, a: NodeId, candidates: &[NodeId]) -> Option<(NodeId, f64)> {
        let mut best: Option<(NodeId, f64)> = None;
        for &b in candidates {
            let score = self.score(a, b);
            trace!(
                a = usize::from(a),
                b = usize::from(b),
                score,
                "bottom_up: similarity"
            );
            if score >= self.config.similarity_threshold && self.beats((b, score), best) {
                best = Some((b, score));
            }
        }
        best
    }

    /// The identical candidate nearest to the cursor.
    fn nearest_identical(&self, a: NodeId, candidates: &[NodeId]) -> Option<NodeId> {
        candidates
            .iter()
            .copied()
            .filter(|&b| self.is_identical(a, b))
            .min_by_key(|&b| {
                let rank = self.tree_b.rank(b);
                (rank.abs_diff(self.cursor), rank)
            })
    }

    /// Unmatched, ancestry-compatible nodes of `a`'s kind, limited to the
    /// `max_candidates` nearest the cursor.
    fn global_candidates(&self, a: NodeId, pool: &[NodeId]) -> Vec<NodeId> {
        let window: &[NodeId] = match self.config.max_candidates {
            Some(limit) if pool.len() > limit => {
                let split = pool.partition_point(|&b| self.tree_b.rank(b) < self.cursor);
                let start = split.saturating_sub(limit / 2).min(pool.len() - limit);
                &pool[start..start + limit]
            }
            _ => pool,
        };
        window
            .iter()
            .copied()
            .filter(|&b| !self.matching.contains_b(b) && self.ancestry_compatible(a, b))
            .collect()
    }

    /// The next-side sibling at `a`'s position under `a`'s matched parent,
    /// if it has the same kind and compatible attributes.
    fn position_candidate(&self, a: NodeId) -> Option<NodeId> {
        let parent_b = self.tree_a.parent(a).and_then(|p| self.matching.get_b(p))?;
        let b = self
            .tree_b
            .children(parent_b)
            .nth(self.tree_a.position(a))?;
        if self.matching.contains_b(b) || self.tree_a.kind(a) != self.tree_b.kind(b) {
            return None;
        }
        if self.tree_a.text(a).is_some() {
            return Some(b);
        }
        let props = self
            .tree_a
            .properties(a)
            .similarity(self.tree_b.properties(b));
        (props >= self.config.similarity_threshold).then_some(b)
    }

    /// Phase 2: bottom-up matching of whatever the top-down phase left.
    fn bottom_up_phase(&mut self) {
        self.cursor = 0;
        let root_a = self.tree_a.root();
        let root_b = self.tree_b.root();

        // Unmatched B nodes by kind, in document order.
        let mut b_by_kind: HashMap<<TA::Types as TreeTypes>::Kind, Vec<NodeId>> =
            HashMap::default();
        for b_id in self.tree_b.iter() {
            if b_id != root_b && !self.matching.contains_b(b_id) {
                b_by_kind
                    .entry(self.tree_b.kind(b_id).clone())
                    .or_default()
                    .push(b_id);
            }
        }
        let order_a: Vec<NodeId> = self.tree_a.iter().collect();

        // PASS 1: internal nodes, parents before children.
        for &a_id in &order_a {
            if a_id == root_a
                || self.matching.contains_a(a_id)
                || self.tree_a.child_count(a_id) == 0
            {
                continue;
            }

            if let Some(b_id) = self.position_candidate(a_id) {
                trace!(
                    a = usize::from(a_id),
                    b = usize::from(b_id),
                    kind = %self.tree_a.kind(a_id),
                    "bottom_up pass1: position+kind match"
                );
                self.add(a_id, b_id);
                continue;
            }

            let pool = b_by_kind
                .get(self.tree_a.kind(a_id))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let candidates = self.global_candidates(a_id, pool);
            if let Some((b_id, score)) = self.best_scored(a_id, &candidates) {
                trace!(
                    a = usize::from(a_id),
                    b = usize::from(b_id),
                    score,
                    "bottom_up pass1: similarity match"
                );
                self.add(a_id, b_id);
            }
        }

        // PASS 2: leaves, now that their ancestors have settled.
        for &a_id in &order_a {
            if a_id == root_a
                || self.matching.contains_a(a_id)
                || self.tree_a.child_count(a_id) != 0
            {
                continue;
            }
            let kind = self.tree_a.kind(a_id);
            let parent_b = self
                .tree_a
                .parent(a_id)
                .and_then(|p| self.matching.get_b(p));

            let found = if let Some(parent_b) = parent_b {
                // Parent is matched: only look among its partner's children.
                let siblings: Vec<NodeId> = self
                    .tree_b
                    .children(parent_b)
                    .filter(|&b| !self.matching.contains_b(b) && self.tree_b.kind(b) == kind)
                    .collect();
                let a_pos = self.tree_a.position(a_id);
                siblings
                    .iter()
                    .copied()
                    .filter(|&b| self.is_identical(a_id, b))
                    .min_by_key(|&b| {
                        let b_pos = self.tree_b.position(b);
                        (b_pos.abs_diff(a_pos), b_pos)
                    })
                    .or_else(|| self.best_scored(a_id, &siblings).map(|(b, _)| b))
                    .or_else(|| self.position_candidate(a_id))
            } else {
                // Parent is unmatched (will be deleted): search globally so
                // content of a removed wrapper can still be recognized.
                let pool = b_by_kind.get(kind).map(Vec::as_slice).unwrap_or_default();
                let candidates = self.global_candidates(a_id, pool);
                self.nearest_identical(a_id, &candidates)
                    .or_else(|| self.best_scored(a_id, &candidates).map(|(b, _)| b))
            };

            if let Some(b_id) = found {
                trace!(
                    a = usize::from(a_id),
                    b = usize::from(b_id),
                    "bottom_up pass2: leaf match"
                );
                self.add(a_id, b_id);
            }
        }
    }

    /// Phase 3: drop pairs that contradict their ancestors' pairing, until
    /// none do. Returns how many pairs were dropped.
    fn enforce_ancestry(&mut self) -> usize {
        let mut dropped = 0;
        loop {
            let mut changed = false;
            let order_a: Vec<NodeId> = self
                .tree_a
                .iter()
                .filter(|&a| self.matching.contains_a(a))
                .collect();
            for a_id in order_a {
                let Some(b_id) = self.matching.get_b(a_id) else {
                    continue;
                };
                if !self.ancestry_compatible(a_id, b_id) {
                    trace!(
                        a = usize::from(a_id),
                        b = usize::from(b_id),
                        "enforce_ancestry: dropping crossing pair"
                    );
                    self.matching.remove(a_id, b_id);
                    dropped += 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        if dropped > 0 {
            debug!(dropped, "enforce_ancestry dropped pairs");
        }
        dropped
    }
}
