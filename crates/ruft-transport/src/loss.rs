//! # Loss Simulation
//!
//! Per-direction probabilistic drop gates. The sender owns both gates: the
//! forward gate fires immediately before a segment would reach the wire, the
//! reverse gate fires on each arriving ACK. A dropped packet is journaled and
//! counted by the caller; protocol state is as if it never existed on that
//! path.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A Bernoulli drop gate with its own deterministic RNG stream.
#[derive(Debug)]
pub struct LossGate {
    prob: f64,
    rng: StdRng,
}

impl LossGate {
    /// Gate with OS-entropy seeding. `prob` must lie in `[0.0, 1.0]`.
    pub fn new(prob: f64) -> Self {
        Self::from_rng(prob, StdRng::from_os_rng())
    }

    /// Deterministically seeded gate for reproducible runs.
    pub fn seeded(prob: f64, seed: u64) -> Self {
        Self::from_rng(prob, StdRng::seed_from_u64(seed))
    }

    fn from_rng(prob: f64, rng: StdRng) -> Self {
        assert!((0.0..=1.0).contains(&prob), "loss probability out of range");
        LossGate { prob, rng }
    }

    /// Draw once: `true` means the packet is dropped.
    pub fn roll(&mut self) -> bool {
        self.rng.random::<f64>() < self.prob
    }

    pub fn probability(&self) -> f64 {
        self.prob
    }
}
