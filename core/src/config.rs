use crate::error::{Result, SearchError};

/// Default cap on concurrently registered branches (the initiating caller counts as one).
pub const DEFAULT_MAX_PARALLEL_BRANCHES: usize = 1000;

/// Upper bound for a dedicated worker pool.
pub const MAX_WORKER_THREADS: usize = 4096;

/// Smallest worker stack accepted; depth-first recursion uses one frame per hop.
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Traversal order of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    DepthFirst,
    #[default]
    BreadthFirst,
}

/// Per-task search options.
///
/// `start = None` starts "from any node": every node with at least one
/// outgoing edge is reached through the virtual root at depth 0.
#[derive(Debug, Clone)]
pub struct TaskConfig<N> {
    pub start: Option<N>,
    pub order: Order,
    pub stop_on_repeat: bool,
    pub max_parallel_branches: usize,
}

impl<N> TaskConfig<N> {
    pub fn from_node(start: N) -> Self {
        Self {
            start: Some(start),
            ..Self::any_node()
        }
    }

    pub fn any_node() -> Self {
        Self {
            start: None,
            order: Order::default(),
            stop_on_repeat: false,
            max_parallel_branches: DEFAULT_MAX_PARALLEL_BRANCHES,
        }
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn depth_first(self, depth_first: bool) -> Self {
        self.with_order(if depth_first {
            Order::DepthFirst
        } else {
            Order::BreadthFirst
        })
    }

    /// Track the nodes on the current path; a child already on it is reported
    /// with `repeated = Some(true)` and never expanded.
    pub fn with_stop_on_repeat(mut self, stop_on_repeat: bool) -> Self {
        self.stop_on_repeat = stop_on_repeat;
        self
    }

    /// Values of 0 or 1 disable forking entirely.
    pub fn with_max_parallel_branches(mut self, max: usize) -> Self {
        self.max_parallel_branches = max;
        self
    }
}

impl<N> Default for TaskConfig<N> {
    fn default() -> Self {
        Self::any_node()
    }
}

/// Worker pool settings for a [`GraphSearcher`](crate::GraphSearcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearcherConfig {
    /// 0 shares rayon's global pool; anything else builds a dedicated pool.
    pub worker_threads: usize,
    pub stack_size: Option<usize>,
    pub thread_name: String,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            stack_size: None,
            thread_name: "route-search".to_string(),
        }
    }
}

impl SearcherConfig {
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// A dedicated pool is built when threads or a stack size are requested.
    pub fn wants_dedicated_pool(&self) -> bool {
        self.worker_threads > 0 || self.stack_size.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(SearchError::InvalidConfig(format!(
                "worker_threads {} exceeds maximum {}",
                self.worker_threads, MAX_WORKER_THREADS
            )));
        }
        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(SearchError::InvalidConfig(format!(
                    "stack_size {} is below minimum {}",
                    size, MIN_STACK_SIZE
                )));
            }
        }
        if self.thread_name.is_empty() {
            return Err(SearchError::InvalidConfig("thread_name must not be empty".into()));
        }
        Ok(())
    }
}
