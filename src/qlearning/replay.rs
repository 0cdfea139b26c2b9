use std::collections::VecDeque;

use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ReplayError {
    #[error("cannot sample from an empty replay buffer")]
    Empty,
}

/// One recorded decision: the observed state, the Q-vector with the acted entry
/// overwritten by the Bellman target, and the raw prediction it started from
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: Vec<f64>,
    pub target: Vec<f64>,
    pub predicted: Vec<f64>,
}

/// Sliding-window experience store that resamples transitions in proportion to
/// how much they surprised the network. Lives for one epoch
pub struct ExperienceReplay {
    window_size: usize,
    buffer: VecDeque<Transition>,
    weights: VecDeque<f64>,
}

impl ExperienceReplay {
    pub fn new(window_size: usize) -> Self {
        ExperienceReplay {
            window_size,
            buffer: VecDeque::with_capacity(window_size),
            weights: VecDeque::with_capacity(window_size),
        }
    }

    /// Append a transition, evicting the oldest pair once the window is full.
    /// The priority weight is the Euclidean distance between the target and the
    /// prediction
    pub fn push(&mut self, transition: Transition) {
        let error = transition
            .target
            .iter()
            .zip(&transition.predicted)
            .map(|(target, predicted)| (target - predicted) * (target - predicted))
            .sum::<f64>()
            .sqrt();

        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
            self.weights.pop_front();
        }

        self.buffer.push_back(transition);
        self.weights.push_back(error);

        debug_assert_eq!(self.buffer.len(), self.weights.len());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Draw `batch_size` transitions independently, with replacement, from the
    /// categorical distribution the priority weights define. Returns the stacked
    /// states and targets in draw order.
    ///
    /// When every stored priority is zero (nothing has surprised the network
    /// yet) the draw falls back to uniform sampling instead of failing.
    pub fn sample_batch(
        &self,
        batch_size: usize,
        rng: &mut impl Rng,
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>), ReplayError> {
        if self.buffer.is_empty() {
            return Err(ReplayError::Empty);
        }

        let indices: Vec<usize> = match WeightedIndex::new(self.weights.iter().copied()) {
            Ok(distribution) => (0..batch_size)
                .map(|_| distribution.sample(rng))
                .collect(),
            Err(_) => (0..batch_size)
                .map(|_| rng.gen_range(0..self.buffer.len()))
                .collect(),
        };

        let mut states = Vec::with_capacity(batch_size);
        let mut targets = Vec::with_capacity(batch_size);

        for index in indices {
            states.push(self.buffer[index].state.clone());
            targets.push(self.buffer[index].target.clone());
        }

        Ok((states, targets))
    }
}
