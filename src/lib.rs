//! # fluid-grid
//!
//! A spatial index mapping 3D integer grid coordinates to simulation cells,
//! stored in a B-tree whose leaves are chained left to right.
//!
//! ## Example
//!
//! ```rust
//! use fluid_grid::{Cell, FluidGrid};
//!
//! let mut grid: FluidGrid = FluidGrid::new();
//! grid.insert(0, 0, 0, Cell::planar(1.0, 0.0, 101.3, 1));
//! grid.insert(-1, 2, 0, Cell::planar(0.0, 0.5, 99.8, 2));
//!
//! assert_eq!(grid.find(0, 0, 0).map(|c| c.material_id), Some(1));
//! assert!(grid.find(9, 9, 9).is_none());
//! ```

#![forbid(unsafe_code)]

mod cell;
mod error;
mod key;
mod shared;

pub use cell::Cell;
pub use error::{GridError, Result};
pub use key::GridKey;
pub use shared::SharedGrid;

use std::fmt;
use std::mem;
use std::ops::{Bound, RangeBounds};

use tracing::{debug, trace, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Branching order used by [`FluidGrid::new`].
pub const DEFAULT_ORDER: usize = 16;

/// Smallest order for which node splits keep both halves non-empty.
pub const MIN_ORDER: usize = 2;

/// Largest accepted order; keeps `2 * order - 1` and node sizes bounded.
pub const MAX_ORDER: usize = 1 << 16;

/// Construction parameters for a [`FluidGrid`].
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Branching order `t`: non-root nodes hold `t - 1 ..= 2t - 1` keys.
    pub order: usize,
    /// Number of node slots to preallocate.
    pub initial_capacity: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            initial_capacity: 0,
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Index of a node in the grid's node arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct NodeId(usize);

#[derive(Clone)]
enum NodeKind<V> {
    /// One value per key; `next` is the following leaf in key order.
    Leaf { values: Vec<V>, next: Option<NodeId> },
    /// `keys.len() + 1` children.
    Internal { children: Vec<NodeId> },
}

#[derive(Clone)]
struct Node<V> {
    keys: Vec<GridKey>,
    kind: NodeKind<V>,
}

impl<V> Node<V> {
    fn empty_leaf() -> Self {
        Self {
            keys: Vec::new(),
            kind: NodeKind::Leaf {
                values: Vec::new(),
                next: None,
            },
        }
    }

    fn empty_internal() -> Self {
        Self {
            keys: Vec::new(),
            kind: NodeKind::Internal {
                children: Vec::new(),
            },
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Child slot covering `key`. A separator equal to `key` routes right.
    #[inline]
    fn route(&self, key: &GridKey) -> usize {
        match self.keys.binary_search(key) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    #[inline]
    fn child(&self, idx: usize) -> NodeId {
        match &self.kind {
            NodeKind::Internal { children } => children[idx],
            NodeKind::Leaf { .. } => unreachable!("leaf nodes have no children"),
        }
    }

    /// Makes room for one more separator and child so `attach` cannot allocate.
    fn reserve_entry(&mut self) {
        self.keys.reserve(1);
        if let NodeKind::Internal { children } = &mut self.kind {
            children.reserve(1);
        }
    }

    /// Inserts `sep` at `idx` with `right` as the child just after it.
    fn attach(&mut self, idx: usize, sep: GridKey, right: NodeId) {
        self.keys.insert(idx, sep);
        if let NodeKind::Internal { children } = &mut self.kind {
            children.insert(idx + 1, right);
        }
    }

    /// Splits a full node around its median key, returning the separator to
    /// promote and the new right sibling, which will live at `right_id`.
    /// The sibling's buffers are allocated before any entry moves.
    ///
    /// Leaves keep the median as the first key of the right half so that it
    /// stays reachable when an equal separator routes right. Internal nodes
    /// hand the median to the parent.
    fn split(&mut self, order: usize, right_id: NodeId) -> (GridKey, Node<V>) {
        debug_assert_eq!(self.keys.len(), 2 * order - 1);
        let mid = order - 1;
        let sep = self.keys[mid];

        match &mut self.kind {
            NodeKind::Leaf { values, next } => {
                let mut right_keys = Vec::with_capacity(self.keys.len() - mid);
                let mut right_values = Vec::with_capacity(values.len() - mid);
                right_keys.extend(self.keys.drain(mid..));
                right_values.extend(values.drain(mid..));
                let right = Node {
                    keys: right_keys,
                    kind: NodeKind::Leaf {
                        values: right_values,
                        next: next.replace(right_id),
                    },
                };
                (sep, right)
            }
            NodeKind::Internal { children } => {
                let mut right_keys = Vec::with_capacity(self.keys.len() - order);
                let mut right_children = Vec::with_capacity(children.len() - order);
                right_keys.extend(self.keys.drain(order..));
                right_children.extend(children.drain(order..));
                self.keys.truncate(mid);
                let right = Node {
                    keys: right_keys,
                    kind: NodeKind::Internal {
                        children: right_children,
                    },
                };
                (sep, right)
            }
        }
    }

    /// Inserts into a leaf, returning the previous value for an existing key.
    fn leaf_insert(&mut self, key: GridKey, value: V) -> Option<V> {
        let NodeKind::Leaf { values, .. } = &mut self.kind else {
            unreachable!("insert descent ends at a leaf");
        };
        match self.keys.binary_search(&key) {
            Ok(i) => Some(mem::replace(&mut values[i], value)),
            Err(i) => {
                self.keys.insert(i, key);
                values.insert(i, value);
                None
            }
        }
    }
}

// =============================================================================
// FluidGrid
// =============================================================================

/// Ordered map from [`GridKey`] to `V` (by default a [`Cell`]).
///
/// Nodes live in an arena owned by the grid. Every internal node lists its
/// children by index and every node has exactly one parent; the leaf `next`
/// links are a traversal aid and own nothing. Nodes are only ever created,
/// never freed, since the grid has no removal operation.
///
/// The grid has no internal locking. Wrap it in [`SharedGrid`] (or any
/// reader-writer lock) to share it across threads.
#[derive(Clone)]
pub struct FluidGrid<V = Cell> {
    nodes: Vec<Node<V>>,
    root: NodeId,
    order: usize,
    /// Levels from root to leaves, inclusive.
    height: usize,
    len: usize,
}

impl<V> FluidGrid<V> {
    /// Creates an empty grid with [`DEFAULT_ORDER`].
    pub fn new() -> Self {
        Self::build(DEFAULT_ORDER, 0)
    }

    /// Creates an empty grid with the given branching order.
    ///
    /// Fails with [`GridError::InvalidOrder`] unless
    /// `MIN_ORDER <= order <= MAX_ORDER`.
    pub fn with_order(order: usize) -> Result<Self> {
        Self::with_config(GridConfig {
            order,
            ..GridConfig::default()
        })
    }

    /// Fails with [`GridError::InvalidOrder`] for an order outside
    /// `MIN_ORDER..=MAX_ORDER` and with [`GridError::CapacityOverflow`] if the
    /// requested node slots cannot be reserved.
    pub fn with_config(config: GridConfig) -> Result<Self> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&config.order) {
            warn!(order = config.order, "rejecting grid order out of range");
            return Err(GridError::InvalidOrder {
                order: config.order,
            });
        }

        let mut nodes = Vec::new();
        if nodes.try_reserve(config.initial_capacity.max(1)).is_err() {
            warn!(
                initial_capacity = config.initial_capacity,
                "rejecting unreservable node capacity"
            );
            return Err(GridError::CapacityOverflow {
                requested: config.initial_capacity,
            });
        }
        Ok(Self::with_nodes(config.order, nodes))
    }

    fn build(order: usize, initial_capacity: usize) -> Self {
        Self::with_nodes(order, Vec::with_capacity(initial_capacity.max(1)))
    }

    fn with_nodes(order: usize, mut nodes: Vec<Node<V>>) -> Self {
        nodes.push(Node::empty_leaf());
        Self {
            nodes,
            root: NodeId(0),
            order,
            height: 1,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of levels; a grid whose root is a leaf has height 1.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    fn max_keys(&self) -> usize {
        2 * self.order - 1
    }

    #[inline]
    fn min_keys(&self) -> usize {
        self.order - 1
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.0]
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Descends from the root to the leaf whose key range covers `key`.
    fn find_leaf(&self, key: &GridKey) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return current;
            }
            current = node.child(node.route(key));
        }
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return current;
            }
            current = node.child(0);
        }
    }
}

impl<V> FluidGrid<V> {
    /// Looks up the value stored at `(x, y, z)`.
    #[inline]
    pub fn find(&self, x: i32, y: i32, z: i32) -> Option<&V> {
        self.get(&GridKey::new(x, y, z))
    }

    /// Looks up the value stored at `(x, y)` on the `z = 0` plane.
    #[inline]
    pub fn find_planar(&self, x: i32, y: i32) -> Option<&V> {
        self.get(&GridKey::planar(x, y))
    }

    #[inline]
    pub fn find_mut(&mut self, x: i32, y: i32, z: i32) -> Option<&mut V> {
        self.get_mut(&GridKey::new(x, y, z))
    }

    pub fn get(&self, key: &GridKey) -> Option<&V> {
        let leaf = self.node(self.find_leaf(key));
        let NodeKind::Leaf { values, .. } = &leaf.kind else {
            return None;
        };
        leaf.keys.binary_search(key).ok().map(|i| &values[i])
    }

    pub fn get_mut(&mut self, key: &GridKey) -> Option<&mut V> {
        let id = self.find_leaf(key);
        let Node { keys, kind } = &mut self.nodes[id.0];
        let NodeKind::Leaf { values, .. } = kind else {
            return None;
        };
        match keys.binary_search(key) {
            Ok(i) => Some(&mut values[i]),
            Err(_) => None,
        }
    }

    #[inline]
    pub fn contains(&self, key: &GridKey) -> bool {
        self.get(key).is_some()
    }

    /// Stores `value` at `(x, y, z)`, returning the value it replaced.
    #[inline]
    pub fn insert(&mut self, x: i32, y: i32, z: i32, value: V) -> Option<V> {
        self.insert_key(GridKey::new(x, y, z), value)
    }

    /// Stores `value` under `key`, returning the value it replaced.
    ///
    /// Overwriting an existing key never changes the tree's shape. A new key
    /// is placed by a single top-down pass that splits every full node before
    /// stepping into it, so the target leaf always has room.
    pub fn insert_key(&mut self, key: GridKey, value: V) -> Option<V> {
        if let Some(slot) = self.get_mut(&key) {
            return Some(mem::replace(slot, value));
        }

        if self.node(self.root).keys.len() == self.max_keys() {
            self.split_root();
        }

        let mut current = self.root;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                break;
            }
            let mut idx = node.route(&key);
            if self.node(node.child(idx)).keys.len() == self.max_keys() {
                self.split_child(current, idx);
                if self.node(current).keys[idx] <= key {
                    idx += 1;
                }
            }
            current = self.node(current).child(idx);
        }

        let old = self.nodes[current.0].leaf_insert(key, value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Grows the tree by one level: the full root becomes the only child of
    /// a new internal root and is split under it.
    fn split_root(&mut self) {
        let old_root = self.root;
        let new_root = self.alloc(Node {
            keys: Vec::with_capacity(1),
            kind: NodeKind::Internal {
                children: vec![old_root],
            },
        });
        self.split_child(new_root, 0);
        self.root = new_root;
        self.height += 1;
        debug!(
            height = self.height,
            nodes = self.nodes.len(),
            "root split"
        );
    }

    /// Splits the full child at slot `idx` of `parent`.
    ///
    /// The sibling slot and the parent's extra capacity are allocated before
    /// any key leaves the full node.
    fn split_child(&mut self, parent: NodeId, idx: usize) {
        let child = self.node(parent).child(idx);
        let is_leaf = self.node(child).is_leaf();
        let right = self.alloc(if is_leaf {
            Node::empty_leaf()
        } else {
            Node::empty_internal()
        });
        self.nodes[parent.0].reserve_entry();

        let order = self.order;
        let (sep, sibling) = self.nodes[child.0].split(order, right);
        self.nodes[right.0] = sibling;
        self.nodes[parent.0].attach(idx, sep, right);
        trace!(?sep, left = child.0, right = right.0, is_leaf, "split child");
    }
}

// =============================================================================
// Iteration
// =============================================================================

impl<V> FluidGrid<V> {
    /// Iterates all entries in ascending key order along the leaf chain.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            grid: self,
            leaf: Some(self.leftmost_leaf()),
            pos: 0,
            end: Bound::Unbounded,
        }
    }

    /// Iterates entries whose keys fall in `range`, in ascending order.
    pub fn range<R: RangeBounds<GridKey>>(&self, range: R) -> Iter<'_, V> {
        let (leaf, pos) = match range.start_bound() {
            Bound::Included(start) => {
                let leaf = self.find_leaf(start);
                (leaf, self.node(leaf).keys.partition_point(|k| k < start))
            }
            Bound::Excluded(start) => {
                let leaf = self.find_leaf(start);
                (leaf, self.node(leaf).keys.partition_point(|k| k <= start))
            }
            Bound::Unbounded => (self.leftmost_leaf(), 0),
        };
        Iter {
            grid: self,
            leaf: Some(leaf),
            pos,
            end: range.end_bound().cloned(),
        }
    }
}

/// Ascending iterator over `(key, value)` pairs, following leaf `next` links.
pub struct Iter<'a, V> {
    grid: &'a FluidGrid<V>,
    leaf: Option<NodeId>,
    pos: usize,
    end: Bound<GridKey>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (GridKey, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let grid = self.grid;
        loop {
            let node = grid.node(self.leaf?);
            let NodeKind::Leaf { values, next } = &node.kind else {
                self.leaf = None;
                return None;
            };

            if let Some(&key) = node.keys.get(self.pos) {
                let within = match self.end {
                    Bound::Included(end) => key <= end,
                    Bound::Excluded(end) => key < end,
                    Bound::Unbounded => true,
                };
                if !within {
                    self.leaf = None;
                    return None;
                }
                let value = &values[self.pos];
                self.pos += 1;
                return Some((key, value));
            }

            self.leaf = *next;
            self.pos = 0;
        }
    }
}

impl<'a, V> IntoIterator for &'a FluidGrid<V> {
    type Item = (GridKey, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Invariant checking
// =============================================================================

#[derive(Default)]
struct Walk {
    leaves: Vec<NodeId>,
    entries: usize,
    nodes: usize,
}

fn corrupted(msg: impl Into<String>) -> GridError {
    GridError::Corrupted(msg.into())
}

impl<V> FluidGrid<V> {
    /// Verifies the structural invariants of the tree.
    ///
    /// Checks that every leaf sits at the same depth, that node sizes stay
    /// within `order - 1 ..= 2 * order - 1` (the root is exempt from the
    /// minimum), that keys ascend strictly and respect their separators, and
    /// that the leaf chain visits every leaf once, left to right.
    pub fn check_invariants(&self) -> Result<()> {
        let mut walk = Walk::default();
        self.check_node(self.root, 1, None, None, &mut walk)?;

        if walk.nodes != self.nodes.len() {
            return Err(corrupted(format!(
                "{} of {} nodes reachable from root",
                walk.nodes,
                self.nodes.len()
            )));
        }
        if walk.entries != self.len {
            return Err(corrupted(format!(
                "leaves hold {} entries but len is {}",
                walk.entries, self.len
            )));
        }

        let mut chain = Vec::with_capacity(walk.leaves.len());
        let mut current = Some(self.leftmost_leaf());
        while let Some(id) = current {
            if chain.len() == walk.leaves.len() {
                return Err(corrupted("leaf chain longer than leaf count"));
            }
            chain.push(id);
            let node = self
                .nodes
                .get(id.0)
                .ok_or_else(|| corrupted(format!("leaf chain reaches dangling node id {}", id.0)))?;
            current = match &node.kind {
                NodeKind::Leaf { next, .. } => *next,
                NodeKind::Internal { .. } => {
                    return Err(corrupted(format!("leaf chain reaches internal node {}", id.0)))
                }
            };
        }
        if chain != walk.leaves {
            return Err(corrupted("leaf chain does not follow left-to-right leaf order"));
        }

        let mut prev: Option<GridKey> = None;
        for (key, _) in self.iter() {
            if prev.is_some_and(|p| p >= key) {
                return Err(corrupted(format!("leaf chain not ascending at {key:?}")));
            }
            prev = Some(key);
        }
        Ok(())
    }

    /// Checks the subtree at `id`, whose keys must lie in `[lower, upper)`.
    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<GridKey>,
        upper: Option<GridKey>,
        walk: &mut Walk,
    ) -> Result<()> {
        let node = self
            .nodes
            .get(id.0)
            .ok_or_else(|| corrupted(format!("dangling node id {}", id.0)))?;
        walk.nodes += 1;

        let n = node.keys.len();
        if n > self.max_keys() {
            return Err(corrupted(format!("node {} holds {n} keys", id.0)));
        }
        if id != self.root && n < self.min_keys() {
            return Err(corrupted(format!("node {} underfull with {n} keys", id.0)));
        }
        if !node.keys.windows(2).all(|w| w[0] < w[1]) {
            return Err(corrupted(format!("node {} keys not strictly ascending", id.0)));
        }
        if let (Some(lo), Some(first)) = (lower, node.keys.first()) {
            if *first < lo {
                return Err(corrupted(format!("node {} key {first:?} below separator {lo:?}", id.0)));
            }
        }
        if let (Some(hi), Some(last)) = (upper, node.keys.last()) {
            if *last >= hi {
                return Err(corrupted(format!("node {} key {last:?} not below separator {hi:?}", id.0)));
            }
        }

        match &node.kind {
            NodeKind::Leaf { values, .. } => {
                if values.len() != n {
                    return Err(corrupted(format!("leaf {} has {} values for {n} keys", id.0, values.len())));
                }
                if depth != self.height {
                    return Err(corrupted(format!(
                        "leaf {} at depth {depth}, expected {}",
                        id.0, self.height
                    )));
                }
                walk.leaves.push(id);
                walk.entries += n;
            }
            NodeKind::Internal { children } => {
                if n == 0 {
                    return Err(corrupted(format!("internal node {} has no keys", id.0)));
                }
                if children.len() != n + 1 {
                    return Err(corrupted(format!(
                        "internal node {} has {} children for {n} keys",
                        id.0,
                        children.len()
                    )));
                }
                for (i, &child) in children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(node.keys[i - 1]) };
                    let hi = if i == n { upper } else { Some(node.keys[i]) };
                    self.check_node(child, depth + 1, lo, hi, walk)?;
                }
            }
        }
        Ok(())
    }
}

impl<V> Default for FluidGrid<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for FluidGrid<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}


#[cfg(test)]
mod proptests;
