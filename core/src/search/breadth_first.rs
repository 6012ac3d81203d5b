//! Level-order walk over a single shared path buffer.
//!
//! The frontier queue holds, per level, a sequence of groups: a header
//! `HEADER(s)` followed by the ancestor indexes for positions `s..level` and
//! then the child indexes sharing those ancestors. `s` is the first position
//! where the group's ancestors differ from the previous group's, so siblings
//! only pay for the suffix that changed. `LEVEL_END` separates levels.
//!
//! Reading a header rewinds the materialized path back to the first position
//! that actually changed, subtracting edge weights and clearing visited marks
//! on the way down, then replays the new suffix. Writing one is speculative:
//! it is staged at a queue bookmark before the node's children are checked
//! and rewound away (or partially reused by the next sibling) if none of them
//! gets enqueued.

use crate::error::Result;
use crate::frontier::{Bookmark, CompactFrontierQueue};
use crate::graph::{Node, NodeIndex, PathWeight};
use crate::search::{Context, Flow};
use crate::state::SearchState;
use crate::task::{Decision, Task};

const INITIAL_SLOTS: usize = 64;

/// Expected depth, used only to size queue slots.
const DEPTH_HINT: u32 = 64;

pub(crate) fn walk<N: Node, T: Task<N>>(
    ctx: &Context<'_, '_, N, T>,
    state: &mut SearchState<N, T::Holder>,
) -> Result<Flow> {
    LevelWalk::new(ctx, state.path.len()).run(state)
}

/// A header staged at the queue tail, not yet followed by any child.
struct Pending {
    bookmark: Bookmark,
    start: usize,
}

struct LevelWalk<'c, 'a, 'scope, N, T: Task<N>> {
    ctx: &'c Context<'a, 'scope, N, T>,
    queue: CompactFrontierQueue,
    /// Queue value ending a level. Larger values are headers, smaller ones
    /// node indexes.
    level_end: u32,
    /// Position of the nodes currently being polled.
    level: usize,
    /// Cumulative weight of the materialized ancestors `0..level`.
    ancestors_weight: PathWeight,
    /// Ancestors of the last committed header in the level being written.
    written: Vec<NodeIndex>,
    /// Ancestors of the pending header.
    staged: Vec<NodeIndex>,
    pending: Option<Pending>,
    incoming: Vec<NodeIndex>,
}

impl<'c, 'a, 'scope, N: Node, T: Task<N>> LevelWalk<'c, 'a, 'scope, N, T> {
    fn new(ctx: &'c Context<'a, 'scope, N, T>, depth: usize) -> Self {
        let level_end = ctx.graph.node_count() as NodeIndex;
        let hint = level_end + 1 + depth as u32 + DEPTH_HINT;
        Self {
            ctx,
            queue: CompactFrontierQueue::with_capacity(INITIAL_SLOTS, hint),
            level_end,
            level: 0,
            ancestors_weight: 0,
            written: Vec::new(),
            staged: Vec::new(),
            pending: None,
            incoming: Vec::new(),
        }
    }

    fn run(mut self, state: &mut SearchState<N, T::Holder>) -> Result<Flow> {
        match state.indexes.last().copied() {
            None => {
                if self.expand(state)? == Flow::Break {
                    return Ok(Flow::Break);
                }
                self.end_level();
            }
            Some(index) => {
                self.level = state.indexes.len() - 1;
                self.ancestors_weight = state.weight - self.in_weight(&state.indexes, self.level);
                self.queue.offer(index);
                self.queue.offer(self.level_end);
            }
        }

        while let Some(value) = self.queue.poll() {
            if value == self.level_end {
                self.discard_pending();
                if self.queue.is_empty() {
                    break;
                }
                self.end_level();
                self.promote(state);
            } else if value > self.level_end {
                self.apply_header(state, (value - self.level_end - 1) as usize);
            } else {
                if self.ctx.is_terminated() {
                    return Ok(Flow::Done);
                }
                if self.visit(state, value)? == Flow::Break {
                    return Ok(Flow::Break);
                }
            }
        }
        Ok(Flow::Done)
    }

    /// Weight of the edge into `indexes[pos]`; roots weigh 0.
    fn in_weight(&self, indexes: &[NodeIndex], pos: usize) -> PathWeight {
        match pos {
            0 => 0,
            _ => self.ctx.graph.step_weight(indexes[pos - 1], indexes[pos]),
        }
    }

    fn header(&self, start: usize) -> u32 {
        self.level_end + 1 + start as u32
    }

    /// The last node polled becomes an ancestor of the next level.
    fn promote(&mut self, state: &mut SearchState<N, T::Holder>) {
        let level = self.level;
        debug_assert_eq!(state.indexes.len(), level + 1);
        self.ancestors_weight += self.in_weight(&state.indexes, level);
        state.mark(state.indexes[level]);
        self.level += 1;
    }

    fn apply_header(&mut self, state: &mut SearchState<N, T::Holder>, start: usize) {
        let graph = self.ctx.graph;
        let count = self.level.saturating_sub(start);
        self.incoming.clear();
        self.incoming
            .extend(std::iter::from_fn(|| self.queue.poll()).take(count));

        state.truncate(self.level);
        let held = state.indexes.get(start..).unwrap_or_default();
        let keep = start + common_prefix(held, &self.incoming);

        while state.indexes.len() > keep {
            let pos = state.indexes.len() - 1;
            self.ancestors_weight -= self.in_weight(&state.indexes, pos);
            state.unmark(state.indexes[pos]);
            state.truncate(pos);
        }
        for i in keep - start..self.incoming.len() {
            let index = self.incoming[i];
            state.push(graph.node(index).clone(), index);
            self.ancestors_weight += self.in_weight(&state.indexes, state.indexes.len() - 1);
            state.mark(index);
        }
    }

    fn visit(&mut self, state: &mut SearchState<N, T::Holder>, index: NodeIndex) -> Result<Flow> {
        let level = self.level;
        state.truncate(level);
        state.push(self.ctx.graph.node(index).clone(), index);
        state.weight = self.ancestors_weight + self.in_weight(&state.indexes, level);
        state.mark(index);
        let flow = self.expand(state)?;
        state.unmark(index);
        state.truncate(level + 1);
        Ok(flow)
    }

    /// Check every child of the last path node (the roots, for an empty
    /// path) and enqueue the ones to continue into.
    fn expand(&mut self, state: &mut SearchState<N, T::Holder>) -> Result<Flow> {
        let graph = self.ctx.graph;
        let children = state.indexes.len();
        let row = match state.indexes.last() {
            Some(&index) => graph.row(index),
            None => graph.root_row(),
        };
        self.stage_header(&state.indexes);
        let mut committed = false;

        for (target, edge) in row {
            if self.ctx.is_terminated() {
                return Ok(Flow::Done);
            }
            let weight = state.weight + PathWeight::from(edge);
            state.truncate(children);
            state.push(graph.node(target).clone(), target);
            let repeated = state.repeated(target);

            match state.check(self.ctx.task, weight, repeated) {
                Decision::Break => {
                    self.ctx.coordinator.terminate();
                    return Ok(Flow::Break);
                }
                Decision::Stop => {}
                _ if repeated == Some(true) => {}
                Decision::ForkContinue if self.ctx.try_fork(state, weight)? => {}
                Decision::Continue | Decision::ForkContinue => {
                    self.enqueue(target, &mut committed);
                }
            }
        }
        state.truncate(children);
        Ok(Flow::Done)
    }

    /// Stage the header for children of `ancestors`, reusing the pending
    /// header of a childless sibling where it still matches.
    fn stage_header(&mut self, ancestors: &[NodeIndex]) {
        let start = common_prefix(&self.written, ancestors);
        if let Some(pending) = self.pending.take() {
            if pending.start == start {
                let kept = start + common_prefix(&self.staged[start..], &ancestors[start..]);
                self.queue.rewind(pending.bookmark, 1 + kept - start);
                for &index in &ancestors[kept..] {
                    self.queue.offer(index);
                }
                self.staged.truncate(kept);
                self.staged.extend_from_slice(&ancestors[kept..]);
                self.pending = Some(pending);
                return;
            }
            self.queue.rewind(pending.bookmark, 0);
        }

        let bookmark = self.queue.bookmark();
        self.queue.offer(self.header(start));
        for &index in &ancestors[start..] {
            self.queue.offer(index);
        }
        self.staged.clear();
        self.staged.extend_from_slice(ancestors);
        self.pending = Some(Pending { bookmark, start });
    }

    fn enqueue(&mut self, target: NodeIndex, committed: &mut bool) {
        if !*committed {
            if self.pending.take().is_some() {
                std::mem::swap(&mut self.written, &mut self.staged);
            }
            *committed = true;
        }
        self.queue.offer(target);
    }

    fn discard_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.queue.rewind(pending.bookmark, 0);
        }
    }

    /// Close the level being written; the next one starts without a
    /// reference header.
    fn end_level(&mut self) {
        self.discard_pending();
        self.queue.offer(self.level_end);
        self.written.clear();
    }
}

fn common_prefix(a: &[NodeIndex], b: &[NodeIndex]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
