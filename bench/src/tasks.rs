//! The classic route queries over single-character town graphs.

use route_search_core::{
    Decision, ForkResultHandler, GraphSearcher, Order, PathWeight, Result, Task, TaskConfig,
};

/// How every query of one run is executed.
#[derive(Debug, Clone, Copy)]
pub struct Mode {
    pub order: Order,
    /// Answer `ForkContinue` wherever a query would continue.
    pub fork: bool,
    pub max_parallel_branches: usize,
}

impl Mode {
    fn config(&self, start: char) -> TaskConfig<char> {
        let config = TaskConfig::from_node(start).with_order(self.order);
        if self.fork {
            config.with_max_parallel_branches(self.max_parallel_branches)
        } else {
            config.with_max_parallel_branches(1)
        }
    }

    fn proceed(&self) -> Decision {
        if self.fork {
            Decision::ForkContinue
        } else {
            Decision::Continue
        }
    }
}

/// Route count summed across branches.
pub(crate) struct Sum;

impl ForkResultHandler<u64> for Sum {
    fn fork(&self, _old: &u64) -> u64 {
        0
    }

    fn merge(&self, left: u64, right: u64) -> u64 {
        left + right
    }

    fn has_result(&self, holder: &u64) -> bool {
        *holder > 0
    }
}

/// Smallest weight found by any branch.
struct Best;

impl ForkResultHandler<Option<PathWeight>> for Best {
    fn fork(&self, _old: &Option<PathWeight>) -> Option<PathWeight> {
        None
    }

    fn merge(&self, left: Option<PathWeight>, right: Option<PathWeight>) -> Option<PathWeight> {
        match (left, right) {
            (Some(l), Some(r)) => Some(l.min(r)),
            (l, r) => l.or(r),
        }
    }

    fn has_result(&self, holder: &Option<PathWeight>) -> bool {
        holder.is_some()
    }
}

/// Weight of one exact route; breaks as soon as it is found.
struct FixedRoute {
    config: TaskConfig<char>,
    route: Vec<char>,
}

impl Task<char> for FixedRoute {
    type Holder = Option<PathWeight>;

    fn config(&self) -> &TaskConfig<char> {
        &self.config
    }

    fn create_result_holder(&self) -> Self::Holder {
        None
    }

    fn check(
        &self,
        path: &[char],
        depth: usize,
        weight: PathWeight,
        holder: &mut Self::Holder,
        _repeated: Option<bool>,
    ) -> Decision {
        if self.route.get(depth) != Some(&path[depth]) {
            return Decision::Stop;
        }
        if depth + 1 == self.route.len() {
            *holder = Some(weight);
            return Decision::Break;
        }
        Decision::ForkContinue
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<Self::Holder>> {
        Some(&Best)
    }
}

/// Routes from `start` to `end` with a stop count in `1..=max_depth`, or
/// exactly `max_depth` when `exact`.
struct StopCounter {
    config: TaskConfig<char>,
    mode: Mode,
    end: char,
    max_depth: usize,
    exact: bool,
}

impl Task<char> for StopCounter {
    type Holder = u64;

    fn config(&self) -> &TaskConfig<char> {
        &self.config
    }

    fn create_result_holder(&self) -> u64 {
        0
    }

    fn check(&self, path: &[char], depth: usize, _: PathWeight, count: &mut u64, _: Option<bool>) -> Decision {
        let counted = if self.exact {
            depth == self.max_depth
        } else {
            depth > 0 && depth <= self.max_depth
        };
        if counted && path[depth] == self.end {
            *count += 1;
        }
        if depth >= self.max_depth {
            Decision::Stop
        } else {
            self.mode.proceed()
        }
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<u64>> {
        Some(&Sum)
    }
}

/// Routes from `start` to `end` with total weight below `limit`.
struct DistanceCounter {
    config: TaskConfig<char>,
    mode: Mode,
    end: char,
    limit: PathWeight,
}

impl Task<char> for DistanceCounter {
    type Holder = u64;

    fn config(&self) -> &TaskConfig<char> {
        &self.config
    }

    fn create_result_holder(&self) -> u64 {
        0
    }

    fn check(&self, path: &[char], depth: usize, weight: PathWeight, count: &mut u64, _: Option<bool>) -> Decision {
        if weight >= self.limit {
            return Decision::Stop;
        }
        if depth > 0 && path[depth] == self.end {
            *count += 1;
        }
        // Negative edges can bring a route back under the limit.
        self.mode.proceed()
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<u64>> {
        Some(&Sum)
    }
}

/// Lightest route from `start` to `end`, never revisiting a town.
struct Shortest {
    config: TaskConfig<char>,
    mode: Mode,
    end: char,
}

impl Task<char> for Shortest {
    type Holder = Option<PathWeight>;

    fn config(&self) -> &TaskConfig<char> {
        &self.config
    }

    fn create_result_holder(&self) -> Self::Holder {
        None
    }

    fn check(
        &self,
        path: &[char],
        depth: usize,
        weight: PathWeight,
        best: &mut Self::Holder,
        _repeated: Option<bool>,
    ) -> Decision {
        if depth > 0 && path[depth] == self.end {
            *best = Some(best.map_or(weight, |b| b.min(weight)));
            return Decision::Stop;
        }
        if best.is_some_and(|b| weight >= b) {
            return Decision::Stop;
        }
        self.mode.proceed()
    }

    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<Self::Holder>> {
        Some(&Best)
    }
}

/// One query of the classic suite.
#[derive(Debug, Clone, Copy)]
pub enum Query {
    Distance(&'static str),
    MaxStops { from: char, to: char, max: usize },
    ExactStops { from: char, to: char, stops: usize },
    Shortest { from: char, to: char },
    MaxDistance { from: char, to: char, limit: PathWeight },
}

/// The ten queries of the classic town-graph exercise.
pub const CLASSIC: [Query; 10] = [
    Query::Distance("ABC"),
    Query::Distance("AD"),
    Query::Distance("ADC"),
    Query::Distance("AEBCD"),
    Query::Distance("AED"),
    Query::MaxStops { from: 'C', to: 'C', max: 3 },
    Query::ExactStops { from: 'A', to: 'C', stops: 4 },
    Query::Shortest { from: 'A', to: 'C' },
    Query::Shortest { from: 'B', to: 'B' },
    Query::MaxDistance { from: 'C', to: 'C', limit: 30 },
];

const NO_ROUTE: &str = "NO SUCH ROUTE";

impl Query {
    pub fn label(&self) -> String {
        match self {
            Query::Distance(route) => format!("distance of {}", route),
            Query::MaxStops { from, to, max } => {
                format!("routes {} -> {} with at most {} stops", from, to, max)
            }
            Query::ExactStops { from, to, stops } => {
                format!("routes {} -> {} with exactly {} stops", from, to, stops)
            }
            Query::Shortest { from, to } => format!("shortest route {} -> {}", from, to),
            Query::MaxDistance { from, to, limit } => {
                format!("routes {} -> {} shorter than {}", from, to, limit)
            }
        }
    }

    fn start(&self) -> Option<char> {
        match *self {
            Query::Distance(route) => route.chars().next(),
            Query::MaxStops { from, .. }
            | Query::ExactStops { from, .. }
            | Query::Shortest { from, .. }
            | Query::MaxDistance { from, .. } => Some(from),
        }
    }

    /// Answer for a query whose start town is not in the graph.
    fn unreachable(&self) -> String {
        match self {
            Query::Distance(_) | Query::Shortest { .. } => NO_ROUTE.to_string(),
            _ => "0".to_string(),
        }
    }

    /// Run the query and format its answer. A start town missing from the
    /// graph has no routes at all.
    pub fn run(&self, searcher: &GraphSearcher<char>, mode: Mode) -> Result<String> {
        match self.start() {
            Some(town) if searcher.graph().index_of(&town).is_some() => {}
            _ => return Ok(self.unreachable()),
        }
        let answer = match *self {
            Query::Distance(route) => {
                let route: Vec<char> = route.chars().collect();
                let task = FixedRoute {
                    config: mode.config(route[0]),
                    route,
                };
                weight_or_none(searcher.search(&task)?)
            }
            Query::MaxStops { from, to, max } => {
                let task = StopCounter {
                    config: mode.config(from),
                    mode,
                    end: to,
                    max_depth: max,
                    exact: false,
                };
                searcher.search(&task)?.to_string()
            }
            Query::ExactStops { from, to, stops } => {
                let task = StopCounter {
                    config: mode.config(from),
                    mode,
                    end: to,
                    max_depth: stops,
                    exact: true,
                };
                searcher.search(&task)?.to_string()
            }
            Query::Shortest { from, to } => {
                let task = Shortest {
                    config: mode.config(from).with_stop_on_repeat(true),
                    mode,
                    end: to,
                };
                weight_or_none(searcher.search(&task)?)
            }
            Query::MaxDistance { from, to, limit } => {
                let task = DistanceCounter {
                    config: mode.config(from),
                    mode,
                    end: to,
                    limit,
                };
                searcher.search(&task)?.to_string()
            }
        };
        Ok(answer)
    }
}

fn weight_or_none(weight: Option<PathWeight>) -> String {
    weight.map_or_else(|| NO_ROUTE.to_string(), |w| w.to_string())
}
