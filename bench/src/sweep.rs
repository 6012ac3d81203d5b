//! Route-counting sweep over generated graphs: every walk order, with and
//! without forking, at increasing depth limits.

use std::time::Instant;

use route_search_core::{
    Decision, ForkResultHandler, Graph, GraphSearcher, Order, PathWeight, Result, SearchError,
    SearcherConfig, Task, TaskConfig,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::generators::Shape;
use crate::tasks::Sum;

/// Counts every route from the start node up to `max_depth` hops.
struct RouteCount {
    config: TaskConfig<u32>,
    max_depth: usize,
    /// Fork at depths below this; 0 never forks.
    fork_below: usize,
}

impl Task<u32> for RouteCount {
    type Holder = u64;

    fn config(&self) -> &TaskConfig<u32> {
        &self.config
    }

    fn create_result_holder(&self) -> u64 {
        0
    }

    fn check(&self, _: &[u32], depth: usize, _: PathWeight, count: &mut u64, _: Option<bool>) -> Decision {
        if depth > 0 {
            *count += 1;
        }
        if depth >= self.max_depth {
            Decision::Stop
        } else if depth < self.fork_below {
            Decision::ForkContinue
        } else {
            Decision::Continue
        }
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<u64>> {
        Some(&Sum)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    pub nodes: u32,
    pub max_depth: usize,
    pub stop_on_repeat: bool,
    pub fork_below: usize,
    pub max_parallel_branches: usize,
}

#[derive(Debug, Serialize)]
pub struct Timing {
    pub routes: u64,
    pub millis: f64,
}

#[derive(Debug, Serialize)]
pub struct DepthRow {
    pub depth: usize,
    pub depth_first: Timing,
    pub breadth_first: Timing,
    pub forked: Timing,
    pub forked_branches: usize,
}

#[derive(Debug, Serialize)]
pub struct ShapeReport {
    pub shape: Shape,
    pub title: &'static str,
    pub nodes: usize,
    pub edges: usize,
    pub trimmed_rows: usize,
    pub memory_bytes: usize,
    pub build_millis: f64,
    pub depths: Vec<DepthRow>,
}

fn millis(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Generate `shape`, then count routes from node 0 at every depth limit.
pub fn run_shape(shape: Shape, options: &SweepOptions, searcher_config: &SearcherConfig) -> Result<ShapeReport> {
    let t = Instant::now();
    let graph = Graph::from_edges(shape.generate(options.nodes))?;
    let build_millis = millis(t);
    info!(
        shape = shape.title(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        build_millis,
        "graph built"
    );

    let mut report = ShapeReport {
        shape,
        title: shape.title(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        trimmed_rows: graph.trimmed_rows(),
        memory_bytes: graph.memory_usage(),
        build_millis,
        depths: Vec::with_capacity(options.max_depth),
    };
    let searcher = GraphSearcher::from_graph(graph, searcher_config.clone())?;

    for depth in 1..=options.max_depth {
        let config = TaskConfig::from_node(0).with_stop_on_repeat(options.stop_on_repeat);
        let timed = |order: Order, fork_below: usize, max_parallel: usize| {
            let task = RouteCount {
                config: config.clone().with_order(order).with_max_parallel_branches(max_parallel),
                max_depth: depth,
                fork_below,
            };
            let t = Instant::now();
            let outcome = searcher.search_with_stats(&task)?;
            Ok::<_, SearchError>((
                Timing {
                    routes: outcome.holder,
                    millis: millis(t),
                },
                outcome.forked_branches,
            ))
        };

        let (depth_first, _) = timed(Order::DepthFirst, 0, 1)?;
        let (breadth_first, _) = timed(Order::BreadthFirst, 0, 1)?;
        let (forked, forked_branches) =
            timed(Order::DepthFirst, options.fork_below, options.max_parallel_branches)?;

        if depth_first.routes != breadth_first.routes || depth_first.routes != forked.routes {
            warn!(
                depth,
                depth_first = depth_first.routes,
                breadth_first = breadth_first.routes,
                forked = forked.routes,
                "route counts disagree"
            );
        }
        report.depths.push(DepthRow {
            depth,
            depth_first,
            breadth_first,
            forked,
            forked_branches,
        });
    }
    Ok(report)
}
