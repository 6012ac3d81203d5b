//! Search facade and the shared traversal context.
//!
//! A search runs inside one `rayon` scope. The initiating caller walks its own
//! branch synchronously; every honoured `ForkContinue` spawns a deep-copied
//! branch into the same scope. Leaving the scope waits for all of them, after
//! which the branch holders are merged into the caller's.

mod breadth_first;
mod depth_first;
#[cfg(test)]
pub(crate) mod fixtures;

use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, debug_span, trace};

use crate::config::{Order, SearcherConfig};
use crate::error::{Result, SearchError};
use crate::fork::ForkCoordinator;
use crate::graph::{Graph, Node, NodeIndex, PathWeight, Weight};
use crate::state::{SearchState, VisitedSet};
use crate::task::{Decision, Task};

/// How a walk over one branch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Exhausted, or stopped after observing termination.
    Done,
    /// The callback returned `Break` somewhere in this branch.
    Break,
}

/// Everything a branch needs besides its own state.
pub(crate) struct Context<'a, 'scope, N, T: Task<N>> {
    pub graph: &'scope Graph<N>,
    pub task: &'scope T,
    pub coordinator: &'scope ForkCoordinator<T::Holder>,
    pub order: Order,
    pub scope: &'a Scope<'scope>,
}

impl<'scope, N: Node, T: Task<N>> Context<'_, 'scope, N, T> {
    /// Expand the last node of `state` (the roots, for an empty path).
    pub fn run(&self, state: &mut SearchState<N, T::Holder>) -> Result<Flow> {
        match self.order {
            Order::DepthFirst => depth_first::walk(self, state),
            Order::BreadthFirst => breadth_first::walk(self, state),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.coordinator.is_terminated()
    }

    /// Check the configured start node, then walk from it.
    fn start(&self, state: &mut SearchState<N, T::Holder>, start: Option<NodeIndex>) -> Result<Flow> {
        if let Some(index) = start {
            state.push(self.graph.node(index).clone(), index);
            let repeated = state.repeated(index);
            match state.check(self.task, 0, repeated) {
                Decision::Continue | Decision::ForkContinue => {}
                Decision::Stop => return Ok(Flow::Done),
                Decision::Break => return Ok(Flow::Break),
            }
            state.mark(index);
        }
        self.run(state)
    }

    /// Hand the subtree below the last node of `state` to a new branch.
    ///
    /// Returns `false` when forking is disabled or the party cap is reached;
    /// the caller then continues in place.
    pub fn try_fork(&self, state: &SearchState<N, T::Holder>, weight: PathWeight) -> Result<bool> {
        if !self.coordinator.accepts_forks() {
            return Ok(false);
        }
        let handler = self.task.fork_handler().ok_or(SearchError::MissingForkHandler)?;
        if !self.coordinator.register() {
            return Ok(false);
        }
        let mut branch = state.branch(weight, handler);
        trace!(depth = branch.path.len() - 1, weight, "forked branch");

        let (graph, task, coordinator, order) = (self.graph, self.task, self.coordinator, self.order);
        self.scope.spawn(move |scope| {
            let _guard = TerminateOnUnwind(coordinator);
            let ctx = Context {
                graph,
                task,
                coordinator,
                order,
                scope,
            };
            let outcome = ctx.run(&mut branch);
            coordinator.complete(handler, branch.holder, outcome);
        });
        Ok(true)
    }
}

/// Stops every other branch when a callback panics, on the initiating branch
/// or a spawned one. The panic itself resurfaces from the enclosing scope.
struct TerminateOnUnwind<'c, R: Send>(&'c ForkCoordinator<R>);

impl<R: Send> Drop for TerminateOnUnwind<'_, R> {
    fn drop(&mut self) {
        self.0.terminate_if_panicking();
    }
}

/// Result of [`GraphSearcher::search_with_stats`].
#[derive(Debug)]
pub struct SearchOutcome<R> {
    pub holder: R,
    /// Branches spawned by `ForkContinue`.
    pub forked_branches: usize,
    /// Branch holders merged into the result (those with `has_result`).
    pub merged_branches: usize,
    /// Whether a `Break` ended the search.
    pub terminated: bool,
}

/// Route search over one immutable graph.
pub struct GraphSearcher<N> {
    graph: Graph<N>,
    pool: Option<ThreadPool>,
}

impl<N: Node> GraphSearcher<N> {
    /// Build over the edges `from[i] -> to[i]` with `weights[i]`, sharing
    /// rayon's global pool.
    pub fn new(from: &[N], to: &[N], weights: &[Weight]) -> Result<Self> {
        Self::with_config(from, to, weights, SearcherConfig::default())
    }

    pub fn with_config(
        from: &[N],
        to: &[N],
        weights: &[Weight],
        config: SearcherConfig,
    ) -> Result<Self> {
        Self::from_graph(Graph::build(from, to, weights)?, config)
    }

    pub fn from_graph(graph: Graph<N>, config: SearcherConfig) -> Result<Self> {
        let pool = build_pool(&config)?;
        Ok(Self { graph, pool })
    }

    pub fn graph(&self) -> &Graph<N> {
        &self.graph
    }

    /// Total weight of an explicit path. See [`Graph::weight_of`].
    pub fn weight_of(&self, path: &[N]) -> Result<PathWeight> {
        self.graph.weight_of(path)
    }

    /// Run `task` and return its merged holder.
    pub fn search<T: Task<N>>(&self, task: &T) -> Result<T::Holder> {
        self.search_with_stats(task).map(|outcome| outcome.holder)
    }

    /// Run `task` and return its merged holder plus fork statistics.
    ///
    /// Fails with `UnknownNode` for a start node outside the graph and with
    /// `MissingForkHandler` when a fork is attempted without a handler.
    /// A panicking callback propagates out of this call.
    pub fn search_with_stats<T: Task<N>>(&self, task: &T) -> Result<SearchOutcome<T::Holder>> {
        let config = task.config();
        let start = match &config.start {
            Some(node) => Some(
                self.graph
                    .index_of(node)
                    .ok_or_else(|| SearchError::UnknownNode(format!("{:?}", node)))?,
            ),
            None => None,
        };

        let span = debug_span!(
            "search",
            order = ?config.order,
            stop_on_repeat = config.stop_on_repeat,
            max_parallel_branches = config.max_parallel_branches,
        );
        let _enter = span.enter();

        let coordinator = ForkCoordinator::new(config.max_parallel_branches);
        let visited = config
            .stop_on_repeat
            .then(|| VisitedSet::new(self.graph.node_count()));
        let mut state = SearchState::new(task.create_result_holder(), visited);

        let graph = &self.graph;
        let coordinator_ref = &coordinator;
        let state_ref = &mut state;
        let order = config.order;
        let outcome = self.in_scope(move |scope| {
            let _guard = TerminateOnUnwind(coordinator_ref);
            let ctx = Context {
                graph,
                task,
                coordinator: coordinator_ref,
                order,
                scope,
            };
            let outcome = ctx.start(state_ref, start);
            match &outcome {
                Ok(Flow::Break) => coordinator_ref.terminate(),
                Err(e) => coordinator_ref.fail(e.clone()),
                Ok(Flow::Done) => {}
            }
            outcome
        });

        let forked_branches = coordinator.forked_branches();
        let terminated = coordinator.is_terminated();
        outcome?;
        let (holder, merged_branches) = coordinator.merge_into(task.fork_handler(), state.holder)?;
        debug!(forked_branches, merged_branches, terminated, "search finished");
        Ok(SearchOutcome {
            holder,
            forked_branches,
            merged_branches,
            terminated,
        })
    }

    fn in_scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.scope(op),
            None => rayon::scope(op),
        }
    }
}

fn build_pool(config: &SearcherConfig) -> Result<Option<ThreadPool>> {
    config.validate()?;
    if !config.wants_dedicated_pool() {
        return Ok(None);
    }
    let prefix = config.thread_name.clone();
    let mut builder = ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .thread_name(move |i| format!("{}-{}", prefix, i));
    if let Some(size) = config.stack_size {
        builder = builder.stack_size(size);
    }
    let pool = builder
        .build()
        .map_err(|e| SearchError::WorkerPool(e.to_string()))?;
    debug!(threads = pool.current_num_threads(), "built search worker pool");
    Ok(Some(pool))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::fixtures::{sorted, triangle, Counter, Recorder};
    use super::*;
    use crate::config::TaskConfig;
    use crate::task::ForkResultHandler;

    fn searcher(edges: &[(char, char, Weight)]) -> GraphSearcher<char> {
        let graph = Graph::from_edges(edges.iter().copied()).unwrap();
        GraphSearcher::from_graph(graph, SearcherConfig::default()).unwrap()
    }

    /// Collects every path from the start node that ends at `target`.
    struct RoutesTo {
        config: TaskConfig<char>,
        target: char,
    }

    impl Task<char> for RoutesTo {
        type Holder = Vec<(Vec<char>, PathWeight)>;

        fn config(&self) -> &TaskConfig<char> {
            &self.config
        }

        fn create_result_holder(&self) -> Self::Holder {
            Vec::new()
        }

        fn check(
            &self,
            path: &[char],
            depth: usize,
            weight: PathWeight,
            holder: &mut Self::Holder,
            _repeated: Option<bool>,
        ) -> Decision {
            if depth > 0 && path[depth] == self.target {
                holder.push((path.to_vec(), weight));
                return Decision::Stop;
            }
            Decision::Continue
        }
    }

    #[test]
    fn test_triangle_routes() {
        for order in [Order::DepthFirst, Order::BreadthFirst] {
            let task = RoutesTo {
                config: TaskConfig::from_node('A').with_order(order),
                target: 'C',
            };
            let mut routes = triangle().search(&task).unwrap();
            routes.sort();
            assert_eq!(routes, vec![(vec!['A', 'B', 'C'], 3), (vec!['A', 'C'], 5)]);
        }
    }

    #[test]
    fn test_start_node_is_checked_first() {
        let task = Recorder::new(TaskConfig::from_node('B'), 5);
        let visits = triangle().search(&task).unwrap();
        assert_eq!(visits[0], (vec!['B'], 0, 0, None));
        assert_eq!(visits.len(), 2);
    }

    #[test]
    fn test_start_node_stop_and_break() {
        let stop = Recorder::new(TaskConfig::from_node('A'), 0);
        assert_eq!(triangle().search(&stop).unwrap().len(), 1);

        let halt = Recorder::new(TaskConfig::from_node('A'), 5).breaking_at(0);
        let outcome = triangle().search_with_stats(&halt).unwrap();
        assert_eq!(outcome.holder.len(), 1);
        assert!(outcome.terminated);
    }

    #[test]
    fn test_unknown_start_node() {
        let task = Recorder::new(TaskConfig::from_node('Z'), 3);
        let err = triangle().search(&task).unwrap_err();
        assert_eq!(err, SearchError::UnknownNode("'Z'".into()));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_any_node_starts_at_every_source() {
        for order in [Order::DepthFirst, Order::BreadthFirst] {
            let task = Recorder::new(TaskConfig::any_node().with_order(order), 0);
            let roots: Vec<_> = triangle()
                .search(&task)
                .unwrap()
                .into_iter()
                .map(|(path, depth, weight, _)| (path, depth, weight))
                .collect();
            // C has no outgoing edge, so it is not a root.
            assert_eq!(roots, vec![(vec!['A'], 0, 0), (vec!['B'], 0, 0)]);
        }
    }

    #[test]
    fn test_orders_agree_on_cycle() {
        let s = searcher(&[('A', 'B', 1), ('B', 'C', 2), ('C', 'A', 3), ('B', 'A', 4)]);
        for repeat in [false, true] {
            let config = TaskConfig::any_node().with_stop_on_repeat(repeat);
            let dfs = Recorder::new(config.clone().with_order(Order::DepthFirst), 4);
            let bfs = Recorder::new(config.with_order(Order::BreadthFirst), 4);
            assert_eq!(sorted(s.search(&dfs).unwrap()), sorted(s.search(&bfs).unwrap()));
        }
    }

    #[test]
    fn test_forked_matches_sequential() {
        let s = searcher(&[
            ('A', 'B', 1),
            ('A', 'C', 2),
            ('B', 'D', 3),
            ('C', 'D', 4),
            ('D', 'A', 5),
            ('D', 'E', 6),
        ]);
        for order in [Order::DepthFirst, Order::BreadthFirst] {
            let config = TaskConfig::from_node('A').with_order(order);
            let sequential = Recorder::new(config.clone().with_max_parallel_branches(1), 6);
            let expected = sorted(s.search(&sequential).unwrap());
            for max in [2, 3, 1000] {
                let forked = Recorder::new(config.clone().with_max_parallel_branches(max), 6)
                    .forking();
                let outcome = s.search_with_stats(&forked).unwrap();
                assert!(outcome.forked_branches > 0);
                assert_eq!(sorted(outcome.holder), expected);
            }
        }
    }

    #[test]
    fn test_fork_without_handler() {
        let task = Recorder::new(TaskConfig::from_node('A'), 3)
            .forking()
            .without_handler();
        let err = triangle().search(&task).unwrap_err();
        assert_eq!(err, SearchError::MissingForkHandler);
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalState);

        // With forking disabled the handler is never asked for.
        let task = Recorder::new(TaskConfig::from_node('A').with_max_parallel_branches(1), 3)
            .forking()
            .without_handler();
        assert_eq!(triangle().search(&task).unwrap().len(), 4);
    }

    #[test]
    fn test_empty_branches_match_unforked() {
        struct Nothing;
        impl ForkResultHandler<u32> for Nothing {
            fn fork(&self, _old: &u32) -> u32 {
                0
            }
            fn merge(&self, left: u32, right: u32) -> u32 {
                left + right
            }
            fn has_result(&self, _holder: &u32) -> bool {
                false
            }
        }

        struct Silent(TaskConfig<char>);
        impl Task<char> for Silent {
            type Holder = u32;
            fn config(&self) -> &TaskConfig<char> {
                &self.0
            }
            fn create_result_holder(&self) -> u32 {
                7
            }
            fn check(&self, _: &[char], depth: usize, _: PathWeight, _: &mut u32, _: Option<bool>) -> Decision {
                if depth < 3 {
                    Decision::ForkContinue
                } else {
                    Decision::Stop
                }
            }
            fn fork_handler(&self) -> Option<&dyn ForkResultHandler<u32>> {
                Some(&Nothing)
            }
        }

        let s = searcher(&[('A', 'B', 1), ('B', 'C', 1), ('C', 'A', 1)]);
        let forked = s.search_with_stats(&Silent(TaskConfig::from_node('A'))).unwrap();
        let plain = s
            .search(&Silent(TaskConfig::from_node('A').with_max_parallel_branches(1)))
            .unwrap();
        assert_eq!(forked.holder, plain);
        assert_eq!(forked.merged_branches, 0);
    }

    #[test]
    fn test_break_halts_all_branches() {
        // Complete binary tree rooted at 1, depth 14.
        let edges: Vec<(u32, u32, Weight)> = (1..1 << 14)
            .flat_map(|i| [(i, 2 * i, 1), (i, 2 * i + 1, 1)])
            .collect();
        let total = (1 << 15) - 1;
        let graph = Graph::from_edges(edges).unwrap();
        let s = GraphSearcher::from_graph(graph, SearcherConfig::default().with_worker_threads(4))
            .unwrap();

        for order in [Order::DepthFirst, Order::BreadthFirst] {
            let calls = AtomicUsize::new(0);
            let task = Counter::new(TaskConfig::from_node(1u32).with_order(order), &calls, 50);
            let outcome = s.search_with_stats(&task).unwrap();
            assert!(outcome.terminated);
            assert_eq!(calls.load(Ordering::SeqCst), 50);

            let calls = AtomicUsize::new(0);
            let task = Counter::new(TaskConfig::from_node(1u32).with_order(order), &calls, 50).forking();
            let outcome = s.search_with_stats(&task).unwrap();
            assert!(outcome.terminated);
            let settled = calls.load(Ordering::SeqCst);
            assert!(settled >= 50 && settled < total);
            std::thread::sleep(std::time::Duration::from_millis(10));
            assert_eq!(calls.load(Ordering::SeqCst), settled);
        }
    }

    #[test]
    fn test_initiating_panic_stops_forked_branches() {
        // Node 1 forks its left child 2, then the initiating branch panics
        // at the right child 3 while the fork walks the left subtree.
        struct PanicsRight<'a> {
            config: TaskConfig<u32>,
            left_calls: &'a AtomicUsize,
        }
        impl Task<u32> for PanicsRight<'_> {
            type Holder = ();
            fn config(&self) -> &TaskConfig<u32> {
                &self.config
            }
            fn create_result_holder(&self) {}
            fn check(&self, path: &[u32], _: usize, _: PathWeight, _: &mut (), _: Option<bool>) -> Decision {
                match path {
                    [1, 2] => Decision::ForkContinue,
                    [1, 3] => panic!("right subtree exploded"),
                    [1, 2, ..] => {
                        self.left_calls.fetch_add(1, Ordering::SeqCst);
                        Decision::Continue
                    }
                    _ => Decision::Continue,
                }
            }
            fn fork_handler(&self) -> Option<&dyn ForkResultHandler<()>> {
                Some(&super::fixtures::Discard)
            }
        }

        let edges: Vec<(u32, u32, Weight)> = (1..1 << 17)
            .flat_map(|i| [(i, 2 * i, 1), (i, 2 * i + 1, 1)])
            .collect();
        let left_subtree = (1 << 17) - 2;
        let graph = Graph::from_edges(edges).unwrap();
        let s = GraphSearcher::from_graph(graph, SearcherConfig::default().with_worker_threads(4))
            .unwrap();

        let left_calls = AtomicUsize::new(0);
        let task = PanicsRight {
            config: TaskConfig::from_node(1).depth_first(true),
            left_calls: &left_calls,
        };
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| s.search(&task)));
        assert!(result.is_err());
        assert!(left_calls.load(Ordering::SeqCst) < left_subtree);
    }

    #[test]
    #[should_panic(expected = "callback exploded")]
    fn test_callback_panic_propagates() {
        struct Explodes(TaskConfig<char>);
        impl Task<char> for Explodes {
            type Holder = ();
            fn config(&self) -> &TaskConfig<char> {
                &self.0
            }
            fn create_result_holder(&self) {}
            fn check(&self, path: &[char], _: usize, _: PathWeight, _: &mut (), _: Option<bool>) -> Decision {
                if path.last() == Some(&'C') {
                    panic!("callback exploded");
                }
                Decision::Continue
            }
        }
        let _ = triangle().search(&Explodes(TaskConfig::from_node('A').depth_first(true)));
    }

    #[test]
    fn test_dedicated_pool_config() {
        let config = SearcherConfig::default().with_worker_threads(2).with_stack_size(1 << 20);
        let graph = Graph::from_edges([('A', 'B', 1)]).unwrap();
        let s = GraphSearcher::from_graph(graph, config).unwrap();
        assert_eq!(s.weight_of(&['A', 'B']).unwrap(), 1);
        assert_eq!(s.graph().node_count(), 2);

        let bad = SearcherConfig::default().with_stack_size(16);
        let graph = Graph::from_edges([('A', 'B', 1)]).unwrap();
        assert!(matches!(
            GraphSearcher::from_graph(graph, bad),
            Err(SearchError::InvalidConfig(_))
        ));
    }
}
