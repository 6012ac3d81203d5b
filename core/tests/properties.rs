use std::collections::{HashMap, VecDeque};

use proptest::prelude::*;
use route_search_core::{
    CompactFrontierQueue, Decision, ForkResultHandler, Graph, GraphSearcher, Order, PathWeight,
    SearcherConfig, Task, TaskConfig, Weight,
};

type Visit = (Vec<u8>, usize, PathWeight, Option<bool>);

struct Concat;

impl ForkResultHandler<Vec<Visit>> for Concat {
    fn fork(&self, _old: &Vec<Visit>) -> Vec<Visit> {
        Vec::new()
    }

    fn merge(&self, mut left: Vec<Visit>, right: Vec<Visit>) -> Vec<Visit> {
        left.extend(right);
        left
    }

    fn has_result(&self, holder: &Vec<Visit>) -> bool {
        !holder.is_empty()
    }
}

/// Records every call; prunes at `max_depth` and on odd weights past depth 1.
struct Recorder {
    config: TaskConfig<u8>,
    max_depth: usize,
    fork: bool,
}

impl Task<u8> for Recorder {
    type Holder = Vec<Visit>;

    fn config(&self) -> &TaskConfig<u8> {
        &self.config
    }

    fn create_result_holder(&self) -> Self::Holder {
        Vec::new()
    }

    fn check(
        &self,
        path: &[u8],
        depth: usize,
        weight: PathWeight,
        holder: &mut Self::Holder,
        repeated: Option<bool>,
    ) -> Decision {
        holder.push((path.to_vec(), depth, weight, repeated));
        if depth >= self.max_depth || (depth > 1 && weight % 2 != 0) {
            Decision::Stop
        } else if self.fork {
            Decision::ForkContinue
        } else {
            Decision::Continue
        }
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<Self::Holder>> {
        Some(&Concat)
    }
}

fn edges() -> impl Strategy<Value = Vec<(u8, u8, Weight)>> {
    proptest::collection::vec((0u8..8, 0u8..8, -20i32..20), 1..24)
}

fn searcher(edges: &[(u8, u8, Weight)]) -> GraphSearcher<u8> {
    let graph = Graph::from_edges(edges.iter().copied()).unwrap();
    GraphSearcher::from_graph(graph, SearcherConfig::default()).unwrap()
}

fn config(edges: &[(u8, u8, Weight)], start: Option<usize>, repeat: bool) -> TaskConfig<u8> {
    let base = match start {
        Some(i) => TaskConfig::from_node(edges[i % edges.len()].0),
        None => TaskConfig::any_node(),
    };
    base.with_stop_on_repeat(repeat)
}

fn run(s: &GraphSearcher<u8>, config: TaskConfig<u8>, max_depth: usize, fork: bool) -> Vec<Visit> {
    let mut visits = s
        .search(&Recorder {
            config,
            max_depth,
            fork,
        })
        .unwrap();
    visits.sort();
    visits
}

#[derive(Debug, Clone)]
enum QueueOp {
    Offer(u32),
    Poll,
    Mark,
    Rewind(usize),
}

fn queue_ops() -> impl Strategy<Value = Vec<QueueOp>> {
    proptest::collection::vec(
        prop_oneof![
            4 => prop_oneof![0u32..10, 0u32..300, 0u32..70_000, any::<u32>()].prop_map(QueueOp::Offer),
            3 => Just(QueueOp::Poll),
            1 => Just(QueueOp::Mark),
            1 => (0usize..4).prop_map(QueueOp::Rewind),
        ],
        1..300,
    )
}

proptest! {
    #[test]
    fn test_orders_report_same_calls(
        edges in edges(),
        start in proptest::option::of(any::<usize>()),
        repeat in any::<bool>(),
        max_depth in 0usize..5,
    ) {
        let s = searcher(&edges);
        let cfg = config(&edges, start, repeat);
        let dfs = run(&s, cfg.clone().with_order(Order::DepthFirst), max_depth, false);
        let bfs = run(&s, cfg.with_order(Order::BreadthFirst), max_depth, false);
        prop_assert_eq!(dfs, bfs);
    }

    #[test]
    fn test_forked_matches_sequential(
        edges in edges(),
        start in proptest::option::of(any::<usize>()),
        repeat in any::<bool>(),
        depth_first in any::<bool>(),
        max_parallel in 2usize..16,
    ) {
        let s = searcher(&edges);
        let cfg = config(&edges, start, repeat).depth_first(depth_first);
        let sequential = run(&s, cfg.clone().with_max_parallel_branches(1), 4, false);
        let forked = run(&s, cfg.with_max_parallel_branches(max_parallel), 4, true);
        prop_assert_eq!(sequential, forked);
    }

    #[test]
    fn test_reported_weight_matches_path(edges in edges(), repeat in any::<bool>()) {
        let s = searcher(&edges);
        for (path, depth, weight, repeated) in run(&s, config(&edges, None, repeat), 4, false) {
            prop_assert_eq!(path.len(), depth + 1);
            prop_assert_eq!(s.weight_of(&path).unwrap(), weight);
            if repeat {
                let (last, earlier) = path.split_last().unwrap();
                let mut seen = earlier.to_vec();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), earlier.len());
                prop_assert_eq!(repeated, Some(earlier.contains(last)));
            } else {
                prop_assert_eq!(repeated, None);
            }
        }
    }

    #[test]
    fn test_weight_of_round_trip(edges in edges()) {
        let s = searcher(&edges);
        let mut expected = HashMap::new();
        for &(from, to, weight) in &edges {
            expected.insert((from, to), weight);
        }
        for (&(from, to), &weight) in &expected {
            prop_assert_eq!(s.weight_of(&[from, to]).unwrap(), PathWeight::from(weight));
            prop_assert_eq!(s.graph().edge_weight(
                s.graph().index_of(&from).unwrap(),
                s.graph().index_of(&to).unwrap(),
            ), Some(weight));
        }
        prop_assert_eq!(s.graph().edge_count(), expected.len());
    }

    #[test]
    fn test_rows_follow_skips(edges in proptest::collection::vec((0u16..300, 0u16..300, -5i32..5), 1..60)) {
        let graph = Graph::from_edges(edges.iter().copied()).unwrap();
        let mut expected: HashMap<u32, Vec<(u32, Weight)>> = HashMap::new();
        let mut last: HashMap<(u16, u16), Weight> = HashMap::new();
        for &(from, to, weight) in &edges {
            last.insert((from, to), weight);
        }
        for (&(from, to), &weight) in &last {
            let f = graph.index_of(&from).unwrap();
            let t = graph.index_of(&to).unwrap();
            expected.entry(f).or_default().push((t, weight));
        }
        for index in 0..graph.node_count() as u32 {
            let mut want = expected.remove(&index).unwrap_or_default();
            want.sort();
            let got: Vec<_> = graph.row(index).collect();
            prop_assert_eq!(got, want);
        }
    }

    #[test]
    fn test_queue_matches_model(
        hint in prop_oneof![0u32..100_000, Just(u32::MAX - 1), Just(u32::MAX)],
        ops in queue_ops(),
    ) {
        let mut queue = CompactFrontierQueue::with_capacity(8, hint);
        let mut model: VecDeque<u32> = VecDeque::new();
        // Values between the head and the bookmark, plus the bookmark itself.
        let mut mark = None;

        for op in ops {
            match op {
                QueueOp::Offer(value) => {
                    queue.offer(value);
                    model.push_back(value);
                }
                QueueOp::Poll => {
                    if let Some((0, _)) = mark {
                        continue;
                    }
                    prop_assert_eq!(queue.poll(), model.pop_front());
                    if let Some((before, _)) = mark.as_mut() {
                        *before -= 1;
                    }
                }
                QueueOp::Mark => {
                    mark = Some((model.len(), queue.bookmark()));
                }
                QueueOp::Rewind(keep) => {
                    if let Some((before, bookmark)) = mark {
                        let keep = keep.min(model.len() - before);
                        model.truncate(before + keep);
                        queue.rewind(bookmark, keep);
                    }
                }
            }
            prop_assert_eq!(queue.is_empty(), model.is_empty());
        }
        let drained: Vec<u32> = std::iter::from_fn(|| queue.poll()).collect();
        prop_assert_eq!(drained, Vec::from(model));
    }
}
