use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{Result, SearchError};

/// Integer edge weight as supplied by the caller.
pub type Weight = i32;

/// Cumulative weight along a path.
pub type PathWeight = i64;

/// Dense node index assigned at build time.
pub type NodeIndex = u32;

/// Hard cap on distinct nodes in one graph.
pub const MAX_NODE_COUNT: usize = 0x40000 + 1;

/// Every edge weight must be strictly greater than this floor. Slots at or
/// below it are skip pointers; a slot equal to it ends the row.
pub const WEIGHT_THRESHOLD: Weight = i32::MIN + (MAX_NODE_COUNT as i32 - 1);

/// A row is trimmed when `unused << TRIM_SHIFT >= node_count`.
const TRIM_SHIFT: u32 = 2;

/// Node values usable as graph vertices.
pub trait Node: Eq + Hash + Clone + Debug + Send + Sync {}

impl<T: Eq + Hash + Clone + Debug + Send + Sync> Node for T {}

/// Immutable weighted digraph over dense node indexes.
///
/// Each source index owns one row of slots plus a trailer. A populated slot
/// holds the edge weight; the first slot of every gap holds a skip pointer
/// `WEIGHT_THRESHOLD - next` to the next populated absolute index, so walking
/// a row costs O(out-degree). The trailer holds the trim offset: rows whose
/// populated span is small are stored from their first target onwards and
/// slot `s` then maps to target `s + trailer`.
///
/// Row `node_count` is the virtual root: a zero-weight edge to every node
/// with at least one outgoing edge.
pub struct Graph<N> {
    index: HashMap<N, NodeIndex>,
    nodes: Vec<N>,
    rows: Vec<Box<[Weight]>>,
    edge_count: usize,
    trimmed_rows: usize,
}

impl<N: Node> Graph<N> {
    /// Build from three parallel edge lists.
    pub fn build(from: &[N], to: &[N], weights: &[Weight]) -> Result<Self> {
        if from.len() != to.len() || to.len() != weights.len() {
            return Err(SearchError::LengthMismatch {
                from: from.len(),
                to: to.len(),
                weights: weights.len(),
            });
        }

        let mut index: HashMap<N, NodeIndex> = HashMap::new();
        let mut nodes: Vec<N> = Vec::new();
        for node in from.iter().chain(to.iter()) {
            if index.contains_key(node) {
                continue;
            }
            if nodes.len() == MAX_NODE_COUNT {
                return Err(SearchError::TooManyNodes { max: MAX_NODE_COUNT });
            }
            index.insert(node.clone(), nodes.len() as NodeIndex);
            nodes.push(node.clone());
        }

        let node_count = nodes.len();
        let mut targets: Vec<Vec<(NodeIndex, Weight)>> = vec![Vec::new(); node_count];
        for ((f, t), &w) in from.iter().zip(to.iter()).zip(weights.iter()) {
            if w <= WEIGHT_THRESHOLD {
                return Err(SearchError::WeightOutOfRange {
                    weight: w,
                    floor: WEIGHT_THRESHOLD,
                });
            }
            targets[index[f] as usize].push((index[t], w));
        }

        let mut edge_count = 0;
        let mut trimmed_rows = 0;
        let mut rows = Vec::with_capacity(node_count + 1);
        let mut root: Vec<(NodeIndex, Weight)> = Vec::new();

        for (source, mut row) in targets.into_iter().enumerate() {
            // Stable sort: for duplicate targets the later weight wins.
            row.sort_by_key(|&(t, _)| t);
            row.reverse();
            row.dedup_by_key(|&mut (t, _)| t);
            row.reverse();

            if !row.is_empty() {
                root.push((source as NodeIndex, 0));
            }
            edge_count += row.len();
            let (encoded, trimmed) = encode_row(&row, node_count);
            trimmed_rows += trimmed as usize;
            rows.push(encoded);
        }
        let (encoded, trimmed) = encode_row(&root, node_count);
        trimmed_rows += trimmed as usize;
        rows.push(encoded);

        tracing::debug!(
            nodes = node_count,
            edges = edge_count,
            trimmed_rows,
            "graph built"
        );

        Ok(Self {
            index,
            nodes,
            rows,
            edge_count,
            trimmed_rows,
        })
    }

    /// Build from an iterator of `(from, to, weight)` triples.
    pub fn from_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, N, Weight)>,
    {
        let mut from = Vec::new();
        let mut to = Vec::new();
        let mut weights = Vec::new();
        for (f, t, w) in edges {
            from.push(f);
            to.push(t);
            weights.push(w);
        }
        Self::build(&from, &to, &weights)
    }

    pub fn index_of(&self, node: &N) -> Option<NodeIndex> {
        self.index.get(node).copied()
    }

    /// Sum the edge weights along an explicit path.
    ///
    /// Empty and single-node paths weigh 0. Fails on an unknown node or on a
    /// step that is not an edge.
    pub fn weight_of(&self, path: &[N]) -> Result<PathWeight> {
        let mut indexes = path.iter().map(|node| {
            self.index_of(node)
                .ok_or_else(|| SearchError::UnknownNode(format!("{:?}", node)))
        });
        let Some(first) = indexes.next() else {
            return Ok(0);
        };
        let mut prev = first?;
        let mut total: PathWeight = 0;
        for (step, next) in indexes.enumerate() {
            let next = next?;
            let w = self
                .edge_weight(prev, next)
                .ok_or(SearchError::MissingEdge { step: step + 1 })?;
            total += PathWeight::from(w);
            prev = next;
        }
        Ok(total)
    }
}

impl<N> Graph<N> {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of rows (virtual root included) stored in trimmed form.
    pub fn trimmed_rows(&self) -> usize {
        self.trimmed_rows
    }

    /// Index of the virtual root row.
    pub fn root_index(&self) -> NodeIndex {
        self.nodes.len() as NodeIndex
    }

    /// External value of a node index. Panics on an out-of-range index.
    pub fn node(&self, index: NodeIndex) -> &N {
        &self.nodes[index as usize]
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Outgoing edges of `index` in increasing target order.
    /// `index == node_count()` yields the virtual root row.
    pub fn row(&self, index: NodeIndex) -> Row<'_> {
        Row::new(&self.rows[index as usize])
    }

    pub fn root_row(&self) -> Row<'_> {
        self.row(self.root_index())
    }

    /// Weight of the edge `from -> to`, if present.
    pub fn edge_weight(&self, from: NodeIndex, to: NodeIndex) -> Option<Weight> {
        let row = self.rows.get(from as usize)?;
        let (slots, offset) = split_row(row);
        let slot = to.checked_sub(offset)? as usize;
        slots.get(slot).copied().filter(|&w| w > WEIGHT_THRESHOLD)
    }

    /// Weight of an edge the caller knows exists (a step it has walked).
    pub(crate) fn step_weight(&self, from: NodeIndex, to: NodeIndex) -> PathWeight {
        let w = self.edge_weight(from, to);
        debug_assert!(w.is_some(), "no edge {} -> {}", from, to);
        w.map_or(0, PathWeight::from)
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let rows: usize = self.rows.iter().map(|r| r.len() * size_of::<Weight>()).sum();
        let nodes = self.nodes.len() * (size_of::<N>() * 2 + size_of::<NodeIndex>() + 16);
        rows + nodes
    }
}

/// Iterator over one adjacency row, yielding `(target, weight)`.
pub struct Row<'g> {
    slots: &'g [Weight],
    offset: NodeIndex,
    pos: usize,
}

impl<'g> Row<'g> {
    fn new(row: &'g [Weight]) -> Self {
        let (slots, offset) = split_row(row);
        Self {
            slots,
            offset,
            pos: 0,
        }
    }
}

impl Iterator for Row<'_> {
    type Item = (NodeIndex, Weight);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let value = *self.slots.get(self.pos)?;
            if value > WEIGHT_THRESHOLD {
                let target = self.pos as NodeIndex + self.offset;
                self.pos += 1;
                return Some((target, value));
            }
            if value == WEIGHT_THRESHOLD {
                return None;
            }
            let next = (WEIGHT_THRESHOLD - value) as NodeIndex;
            self.pos = (next - self.offset) as usize;
        }
    }
}

fn split_row(row: &[Weight]) -> (&[Weight], NodeIndex) {
    match row.split_last() {
        Some((&trailer, slots)) => (slots, trailer as NodeIndex),
        None => (&[], 0),
    }
}

/// Encode sorted, deduplicated `(target, weight)` pairs into a row.
/// Returns the row and whether it was trimmed.
fn encode_row(edges: &[(NodeIndex, Weight)], node_count: usize) -> (Box<[Weight]>, bool) {
    let (Some(&(first, _)), Some(&(last, _))) = (edges.first(), edges.last()) else {
        return (vec![0].into_boxed_slice(), false);
    };
    let (first, end) = (first as usize, last as usize + 1);
    let unused = first + (node_count - end);
    let trim = (unused << TRIM_SHIFT) >= node_count;
    let offset = if trim { first } else { 0 };
    let width = if trim { end - first } else { node_count };

    let mut row = vec![WEIGHT_THRESHOLD; width + 1];
    let mut pos = 0;
    for &(target, weight) in edges {
        let slot = target as usize - offset;
        if pos < slot {
            row[pos] = WEIGHT_THRESHOLD - target as Weight;
        }
        row[slot] = weight;
        pos = slot + 1;
    }
    row[width] = offset as Weight;
    (row.into_boxed_slice(), trim)
}
