use crate::error::Result;
use crate::graph::{Node, PathWeight};
use crate::search::{Context, Flow};
use crate::state::{SearchState, Step};
use crate::task::{Decision, Task};

/// Recursive depth-first walk below the last node of `state`.
///
/// Each child is pushed through a [`Step`], so the path, weight and visited
/// set are back to their entry values whenever this returns, including on
/// `Break`, on error and on unwinding.
pub(crate) fn walk<N: Node, T: Task<N>>(
    ctx: &Context<'_, '_, N, T>,
    state: &mut SearchState<N, T::Holder>,
) -> Result<Flow> {
    let graph = ctx.graph;
    let row = match state.indexes.last() {
        Some(&index) => graph.row(index),
        None => graph.root_row(),
    };

    for (target, edge) in row {
        if ctx.is_terminated() {
            return Ok(Flow::Done);
        }
        let weight = state.weight + PathWeight::from(edge);
        let mut step = Step::enter(state, graph.node(target), target);
        let repeated = step.repeated(target);

        match step.check(ctx.task, weight, repeated) {
            Decision::Break => {
                ctx.coordinator.terminate();
                return Ok(Flow::Break);
            }
            Decision::Stop => {}
            _ if repeated == Some(true) => {}
            Decision::ForkContinue if ctx.try_fork(&step, weight)? => {}
            Decision::Continue | Decision::ForkContinue => {
                step.descend(target, weight);
                if walk(ctx, &mut step)? == Flow::Break {
                    return Ok(Flow::Break);
                }
            }
        }
    }
    Ok(Flow::Done)
}
