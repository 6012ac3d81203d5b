//! route-search-core: callback-driven route search over weighted digraphs.
//!
//! A pure Rust library that packs a graph into skip-encoded adjacency rows
//! and walks it depth-first or breadth-first, asking a caller-supplied task
//! at every node whether to continue, fork, prune or stop. Forked branches
//! run on a rayon pool and their accumulators are merged at the end.
//!
//! The breadth-first walk keeps a single path buffer and rebuilds it from a
//! compact frontier queue, so its memory grows with depth plus frontier
//! width rather than their product.

mod config;
mod error;
mod fork;
mod frontier;
mod graph;
mod search;
mod state;
mod task;

pub use config::{
    Order, SearcherConfig, TaskConfig, DEFAULT_MAX_PARALLEL_BRANCHES, MAX_WORKER_THREADS,
    MIN_STACK_SIZE,
};
pub use error::{ErrorKind, Result, SearchError};
pub use fork::ArrivalBarrier;
pub use frontier::{Bookmark, CompactFrontierQueue, SlotWidth};
pub use graph::{
    Graph, Node, NodeIndex, PathWeight, Row, Weight, MAX_NODE_COUNT, WEIGHT_THRESHOLD,
};
pub use search::{GraphSearcher, SearchOutcome};
pub use task::{Decision, ForkResultHandler, Task};
