use crate::config::TaskConfig;
use crate::graph::PathWeight;

/// What the traversal does after the callback has seen a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep searching below this node.
    Continue,
    /// Keep searching below this node, on a new parallel branch if the
    /// parallelism budget allows; otherwise the same as `Continue`.
    ForkContinue,
    /// Prune this node; siblings are still visited.
    Stop,
    /// End the whole search, across every branch.
    Break,
}

/// A search request: configuration, decision callback and accumulator factory.
///
/// One task value is shared by every branch of a search, so it must be
/// `Sync`; per-branch mutable state belongs in the holder.
pub trait Task<N>: Sync {
    /// Accumulator carried by each branch.
    type Holder: Send;

    fn config(&self) -> &TaskConfig<N>;

    fn create_result_holder(&self) -> Self::Holder;

    /// Called once per visited node.
    ///
    /// `path` runs from the start node (or a root reached through the virtual
    /// root) to the visited node, which sits at `path[depth]`. `weight` is the
    /// cumulative edge weight of `path`. `repeated` is `None` unless repeat
    /// tracking is on, in which case it tells whether the visited node already
    /// appears earlier in `path`.
    fn check(
        &self,
        path: &[N],
        depth: usize,
        weight: PathWeight,
        holder: &mut Self::Holder,
        repeated: Option<bool>,
    ) -> Decision;

    /// Fork/merge policy for the holder. Required as soon as a
    /// `ForkContinue` is honoured.
    fn fork_handler(&self) -> Option<&dyn ForkResultHandler<Self::Holder>> {
        None
    }
}

/// How branch accumulators are created and combined.
pub trait ForkResultHandler<R>: Sync {
    /// Fresh holder for a new branch forked from one holding `old`.
    fn fork(&self, old: &R) -> R;

    /// Combine two holders. Branch results arrive in no particular order.
    fn merge(&self, left: R, right: R) -> R;

    /// Whether a finished branch holds anything worth merging.
    fn has_result(&self, holder: &R) -> bool;
}
