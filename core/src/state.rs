use std::ops::{Deref, DerefMut};

use crate::graph::{NodeIndex, PathWeight};
use crate::task::{Decision, ForkResultHandler, Task};

/// Fixed-size bitset over node indexes.
#[derive(Debug, Clone)]
pub(crate) struct VisitedSet {
    words: Vec<u64>,
}

impl VisitedSet {
    pub fn new(node_count: usize) -> Self {
        Self {
            words: vec![0; node_count.div_ceil(64)],
        }
    }

    pub fn insert(&mut self, index: NodeIndex) {
        self.words[index as usize / 64] |= 1 << (index % 64);
    }

    pub fn remove(&mut self, index: NodeIndex) {
        self.words[index as usize / 64] &= !(1 << (index % 64));
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.words[index as usize / 64] & (1 << (index % 64)) != 0
    }
}

/// Mutable state owned by one branch of a search.
///
/// `path` and `indexes` are parallel: node values for the callback, dense
/// indexes for the engines. The node being expanded is the last entry; an
/// empty path means the virtual root. `weight` is the cumulative weight of
/// the whole path. `visited` is present only with repeat tracking on.
pub(crate) struct SearchState<N, R> {
    pub path: Vec<N>,
    pub indexes: Vec<NodeIndex>,
    pub weight: PathWeight,
    pub visited: Option<VisitedSet>,
    pub holder: R,
}

impl<N: Clone, R> SearchState<N, R> {
    pub fn new(holder: R, visited: Option<VisitedSet>) -> Self {
        Self {
            path: Vec::new(),
            indexes: Vec::new(),
            weight: 0,
            visited,
            holder,
        }
    }

    pub fn push(&mut self, node: N, index: NodeIndex) {
        self.path.push(node);
        self.indexes.push(index);
    }

    pub fn truncate(&mut self, len: usize) {
        self.path.truncate(len);
        self.indexes.truncate(len);
    }

    pub fn mark(&mut self, index: NodeIndex) {
        if let Some(visited) = self.visited.as_mut() {
            visited.insert(index);
        }
    }

    pub fn unmark(&mut self, index: NodeIndex) {
        if let Some(visited) = self.visited.as_mut() {
            visited.remove(index);
        }
    }

    pub fn repeated(&self, index: NodeIndex) -> Option<bool> {
        self.visited.as_ref().map(|v| v.contains(index))
    }

    /// Run the task callback on the node at the end of the path.
    pub fn check<T>(&mut self, task: &T, weight: PathWeight, repeated: Option<bool>) -> Decision
    where
        T: Task<N, Holder = R>,
    {
        let depth = self.path.len() - 1;
        task.check(&self.path, depth, weight, &mut self.holder, repeated)
    }

    /// Deep copy for a new branch rooted at the last path entry, which has
    /// cumulative weight `weight`.
    pub fn branch(&self, weight: PathWeight, handler: &dyn ForkResultHandler<R>) -> Self {
        let mut visited = self.visited.clone();
        if let (Some(v), Some(&last)) = (visited.as_mut(), self.indexes.last()) {
            v.insert(last);
        }
        Self {
            path: self.path.clone(),
            indexes: self.indexes.clone(),
            weight,
            visited,
            holder: handler.fork(&self.holder),
        }
    }
}

/// One hop of a depth-first walk over a shared [`SearchState`].
///
/// Entering pushes the child; dropping truncates the path back to its length
/// on entry, restores the weight and clears the visited mark if this step set
/// one. That holds for every way out of the hop, unwinding included.
pub(crate) struct Step<'s, N: Clone, R> {
    state: &'s mut SearchState<N, R>,
    entry_len: usize,
    entry_weight: PathWeight,
    marked: Option<NodeIndex>,
}

impl<'s, N: Clone, R> Step<'s, N, R> {
    pub fn enter(state: &'s mut SearchState<N, R>, node: &N, index: NodeIndex) -> Self {
        let entry_len = state.path.len();
        let entry_weight = state.weight;
        state.push(node.clone(), index);
        Self {
            state,
            entry_len,
            entry_weight,
            marked: None,
        }
    }

    /// Make the pushed child the node being expanded.
    pub fn descend(&mut self, index: NodeIndex, weight: PathWeight) {
        self.state.weight = weight;
        if self.state.visited.is_some() {
            self.state.mark(index);
            self.marked = Some(index);
        }
    }
}

impl<N: Clone, R> Deref for Step<'_, N, R> {
    type Target = SearchState<N, R>;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl<N: Clone, R> DerefMut for Step<'_, N, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl<N: Clone, R> Drop for Step<'_, N, R> {
    fn drop(&mut self) {
        self.state.truncate(self.entry_len);
        self.state.weight = self.entry_weight;
        if let Some(index) = self.marked.take() {
            self.state.unmark(index);
        }
    }
}
