//! Fork/merge coordination shared by every branch of one search.
//!
//! Branches register with an [`ArrivalBarrier`] before they are spawned and
//! deregister when they finish. A `Break` anywhere forces termination: the
//! flag is sticky and every branch polls it cooperatively. Apart from the
//! breaking branch itself, branches finishing after it drop their results.
//! Waiting for outstanding branches is left to the enclosing `rayon::scope`,
//! so no worker ever blocks inside the pool.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Result, SearchError};
use crate::search::Flow;
use crate::task::ForkResultHandler;

/// Party counter plus termination flag.
///
/// The initiating caller is registered from the start, so a fresh barrier
/// has one party.
#[derive(Debug)]
pub struct ArrivalBarrier {
    parties: AtomicUsize,
    terminated: AtomicBool,
}

impl Default for ArrivalBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrivalBarrier {
    pub fn new() -> Self {
        Self {
            parties: AtomicUsize::new(1),
            terminated: AtomicBool::new(false),
        }
    }

    /// Register one more party unless that would exceed `max`.
    pub fn register_within(&self, max: usize) -> bool {
        self.parties
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }

    /// Returns the number of parties still registered.
    pub fn arrive_and_deregister(&self) -> usize {
        self.parties.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn force_termination(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn registered_parties(&self) -> usize {
        self.parties.load(Ordering::Acquire)
    }
}

/// Shared state of one search: barrier, result channel and first failure.
pub(crate) struct ForkCoordinator<R> {
    barrier: ArrivalBarrier,
    max_parties: usize,
    results_tx: Sender<R>,
    results_rx: Receiver<R>,
    failure: OnceLock<SearchError>,
    forked: AtomicUsize,
}

impl<R: Send> ForkCoordinator<R> {
    pub fn new(max_parties: usize) -> Self {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        Self {
            barrier: ArrivalBarrier::new(),
            max_parties,
            results_tx,
            results_rx,
            failure: OnceLock::new(),
            forked: AtomicUsize::new(0),
        }
    }

    /// Whether this search may fork at all.
    pub fn accepts_forks(&self) -> bool {
        self.max_parties > 1
    }

    /// Reserve a party for a new branch.
    pub fn register(&self) -> bool {
        if self.is_terminated() || !self.barrier.register_within(self.max_parties) {
            return false;
        }
        self.forked.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.barrier.is_terminated()
    }

    pub fn terminate(&self) {
        self.barrier.force_termination();
    }

    /// Record an error and stop every branch. The first error wins.
    pub fn fail(&self, error: SearchError) {
        let _ = self.failure.set(error);
        self.terminate();
    }

    /// Called once by a forked branch when its walk returns.
    pub fn complete(
        &self,
        handler: &dyn ForkResultHandler<R>,
        holder: R,
        outcome: Result<Flow>,
    ) {
        let flow = match outcome {
            Ok(flow) => flow,
            Err(e) => {
                self.fail(e);
                return;
            }
        };
        match flow {
            // The breaking branch has already raised the flag itself.
            Flow::Break => {
                self.publish(handler, holder);
                self.terminate();
            }
            Flow::Done if self.is_terminated() => {}
            Flow::Done => {
                self.publish(handler, holder);
                self.barrier.arrive_and_deregister();
            }
        }
    }

    fn publish(&self, handler: &dyn ForkResultHandler<R>, holder: R) {
        if handler.has_result(&holder) {
            // The receiver lives as long as `self`.
            let _ = self.results_tx.send(holder);
        }
    }

    /// Terminate if the current thread is unwinding. Used from a drop guard
    /// in spawned branches so siblings stop early.
    pub fn terminate_if_panicking(&self) {
        if std::thread::panicking() {
            self.terminate();
        }
    }

    pub fn forked_branches(&self) -> usize {
        self.forked.load(Ordering::Relaxed)
    }

    /// Fold every collected branch result into `primary`.
    ///
    /// Must run after all branches have finished. Returns the merged holder
    /// and how many branch results went into it.
    pub fn merge_into(
        self,
        handler: Option<&dyn ForkResultHandler<R>>,
        primary: R,
    ) -> Result<(R, usize)> {
        if let Some(error) = self.failure.into_inner() {
            return Err(error);
        }
        drop(self.results_tx);
        let Some(handler) = handler else {
            return Ok((primary, 0));
        };
        let mut merged = 0;
        let holder = self.results_rx.try_iter().fold(primary, |acc, branch| {
            merged += 1;
            handler.merge(acc, branch)
        });
        Ok((holder, merged))
    }
}
