pub mod create;

use anyhow::Result;

pub const LEARNING_RATE: f64 = 0.0005;

/// Capability contract for a trainable Q-value approximator. The learning core
/// only ever calls these two operations and never inspects internals
pub trait QModel {
    /// Q-value estimates for a single state, one entry per action
    fn predict(&self, state: &[f64]) -> Result<Vec<f64>>;

    /// One gradient-update pass over a batch of states and target Q-vectors
    fn fit(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<()>;
}
