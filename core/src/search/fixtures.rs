//! Tasks and graphs shared by the search tests.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{SearcherConfig, TaskConfig};
use crate::graph::{Graph, Node, PathWeight};
use crate::search::GraphSearcher;
use crate::task::{Decision, ForkResultHandler, Task};

/// One callback invocation: `(path, depth, weight, repeated)`.
pub(crate) type Visit<N> = (Vec<N>, usize, PathWeight, Option<bool>);

/// `A -> B (1)`, `B -> C (2)`, `A -> C (5)`.
pub(crate) fn triangle() -> GraphSearcher<char> {
    let graph = Graph::from_edges([('A', 'B', 1), ('B', 'C', 2), ('A', 'C', 5)]).unwrap();
    GraphSearcher::from_graph(graph, SearcherConfig::default()).unwrap()
}

pub(crate) fn sorted<N: Ord>(mut visits: Vec<Visit<N>>) -> Vec<Visit<N>> {
    visits.sort();
    visits
}

pub(crate) struct Concat<N>(PhantomData<fn() -> N>);

impl<N: Send> ForkResultHandler<Vec<Visit<N>>> for Concat<N> {
    fn fork(&self, _old: &Vec<Visit<N>>) -> Vec<Visit<N>> {
        Vec::new()
    }

    fn merge(&self, mut left: Vec<Visit<N>>, right: Vec<Visit<N>>) -> Vec<Visit<N>> {
        left.extend(right);
        left
    }

    fn has_result(&self, holder: &Vec<Visit<N>>) -> bool {
        !holder.is_empty()
    }
}

/// Records every invocation and prunes below `max_depth`.
pub(crate) struct Recorder<N> {
    config: TaskConfig<N>,
    max_depth: usize,
    fork: bool,
    handler: Option<Concat<N>>,
    break_depth: Option<usize>,
}

impl<N> Recorder<N> {
    pub fn new(config: TaskConfig<N>, max_depth: usize) -> Self {
        Self {
            config,
            max_depth,
            fork: false,
            handler: Some(Concat(PhantomData)),
            break_depth: None,
        }
    }

    /// Answer `ForkContinue` instead of `Continue`.
    pub fn forking(mut self) -> Self {
        self.fork = true;
        self
    }

    pub fn without_handler(mut self) -> Self {
        self.handler = None;
        self
    }

    /// Answer `Break` at the first node seen at `depth`.
    pub fn breaking_at(mut self, depth: usize) -> Self {
        self.break_depth = Some(depth);
        self
    }
}

impl<N: Node> Task<N> for Recorder<N> {
    type Holder = Vec<Visit<N>>;

    fn config(&self) -> &TaskConfig<N> {
        &self.config
    }

    fn create_result_holder(&self) -> Self::Holder {
        Vec::new()
    }

    fn check(
        &self,
        path: &[N],
        depth: usize,
        weight: PathWeight,
        holder: &mut Self::Holder,
        repeated: Option<bool>,
    ) -> Decision {
        assert_eq!(path.len(), depth + 1);
        holder.push((path.to_vec(), depth, weight, repeated));
        if self.break_depth == Some(depth) {
            Decision::Break
        } else if depth >= self.max_depth {
            Decision::Stop
        } else if self.fork {
            Decision::ForkContinue
        } else {
            Decision::Continue
        }
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<Self::Holder>> {
        self.handler
            .as_ref()
            .map(|h| h as &dyn ForkResultHandler<Self::Holder>)
    }
}

pub(crate) struct Discard;

impl ForkResultHandler<()> for Discard {
    fn fork(&self, _old: &()) {}

    fn merge(&self, _left: (), _right: ()) {}

    fn has_result(&self, _holder: &()) -> bool {
        false
    }
}

/// Counts invocations across all branches and breaks on the `break_at`-th.
pub(crate) struct Counter<'a> {
    config: TaskConfig<u32>,
    calls: &'a AtomicUsize,
    break_at: usize,
    fork: bool,
}

impl<'a> Counter<'a> {
    pub fn new(config: TaskConfig<u32>, calls: &'a AtomicUsize, break_at: usize) -> Self {
        Self {
            config,
            calls,
            break_at,
            fork: false,
        }
    }

    pub fn forking(mut self) -> Self {
        self.fork = true;
        self
    }
}

impl Task<u32> for Counter<'_> {
    type Holder = ();

    fn config(&self) -> &TaskConfig<u32> {
        &self.config
    }

    fn create_result_holder(&self) {}

    fn check(&self, _: &[u32], _: usize, _: PathWeight, _: &mut (), _: Option<bool>) -> Decision {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.break_at {
            Decision::Break
        } else if self.fork {
            Decision::ForkContinue
        } else {
            Decision::Continue
        }
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<()>> {
        Some(&Discard)
    }
}
