//! Solver context and collective operations.
//!
//! A [`Context`] owns the communicator the drivers reduce through. It is
//! created explicitly with [`Context::init`] and released with
//! [`Context::shutdown`] or on drop. Every reduction a driver performs goes
//! through the context in the same order on every participant, so a
//! distributed communicator can be slotted in without touching the drivers.
//! Only the single-process communicator ships with the crate.

use crate::linalg::vector;
use std::sync::atomic::{AtomicU64, Ordering};

/// Collective operations over the participants of a solve.
pub trait Communicator {
    /// Rank of this participant.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn size(&self) -> usize;

    /// Sum of `local` over all participants.
    fn all_reduce_sum(&self, local: f64) -> f64;

    /// Maximum of `local` over all participants.
    fn all_reduce_max(&self, local: f64) -> f64;

    /// Minimum of `local` over all participants.
    fn all_reduce_min(&self, local: f64) -> f64 {
        -self.all_reduce_max(-local)
    }

    /// Block until every participant arrives.
    fn barrier(&self) {}
}

/// Single-process communicator: every collective is the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfCommunicator;

impl Communicator for SelfCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        local
    }
}

/// Library context for a solve.
pub struct Context<C: Communicator = SelfCommunicator> {
    comm: C,
    collectives: AtomicU64,
}

impl Context<SelfCommunicator> {
    /// Initialize a single-process context.
    pub fn init() -> Self {
        Self::with_communicator(SelfCommunicator)
    }
}

impl<C: Communicator> Context<C> {
    pub fn with_communicator(comm: C) -> Self {
        log::debug!(
            "context initialized (rank {} of {})",
            comm.rank(),
            comm.size()
        );
        Self {
            comm,
            collectives: AtomicU64::new(0),
        }
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Number of collectives issued through this context.
    pub fn collectives(&self) -> u64 {
        self.collectives.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.collectives.fetch_add(1, Ordering::Relaxed);
    }

    /// Global dot product.
    pub fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        self.count();
        self.comm.all_reduce_sum(vector::dot(a, b))
    }

    /// Global Euclidean norm.
    pub fn norm2(&self, a: &[f64]) -> f64 {
        self.count();
        self.comm.all_reduce_sum(vector::norm2_sq(a)).sqrt()
    }

    /// Global minimum entry.
    pub fn min(&self, a: &[f64]) -> f64 {
        self.count();
        self.comm.all_reduce_min(vector::min(a))
    }

    /// Global minimum of an already reduced local scalar.
    pub fn min_scalar(&self, local: f64) -> f64 {
        self.count();
        self.comm.all_reduce_min(local)
    }

    /// Global sum of an already reduced local scalar.
    pub fn sum_scalar(&self, local: f64) -> f64 {
        self.count();
        self.comm.all_reduce_sum(local)
    }

    /// Wait for every participant, then release the context.
    pub fn shutdown(self) {
        self.count();
        self.comm.barrier();
    }
}

impl<C: Communicator> Drop for Context<C> {
    fn drop(&mut self) {
        log::debug!(
            "context shut down after {} collectives",
            self.collectives.load(Ordering::Relaxed)
        );
    }
}
