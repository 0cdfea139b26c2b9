use std::mem;

use anyhow::Result;
use colored::Colorize;
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    constants::NUM_ACTIONS,
    history::{episode::EpisodeHistory, meta::MetaHistory},
    neural_net::QModel,
    types::FeatureMatrix,
};

use super::{
    argmax,
    evaluate::evaluate_performance,
    market::MarketState,
    replay::{ExperienceReplay, Transition},
    Action, TrainConfig,
};

/// Double Q-learning over a market simulation, in the single-pair variant where
/// one network drives behavior and targets while the other absorbs the fits.
///
/// The predict network is frozen for a whole iteration; the roles are exchanged
/// only at iteration boundaries, by swapping the two handles
pub struct DoubleQTrainer<M: QModel> {
    predict_net: M,
    update_net: M,
    config: TrainConfig,
    rng: StdRng,
}

pub struct TrainingReport {
    pub meta: MetaHistory,
    pub episodes: Vec<EpisodeHistory>,
}

impl<M: QModel> DoubleQTrainer<M> {
    pub fn new(predict_net: M, update_net: M, config: TrainConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        DoubleQTrainer {
            predict_net,
            update_net,
            config,
            rng,
        }
    }

    pub fn predict_net(&self) -> &M {
        &self.predict_net
    }

    pub fn update_net(&self) -> &M {
        &self.update_net
    }

    /// After training the predict handle holds the most recently fitted network
    pub fn into_networks(self) -> (M, M) {
        (self.predict_net, self.update_net)
    }

    pub fn train(
        &mut self,
        data: &FeatureMatrix,
        data_norm: &FeatureMatrix,
    ) -> Result<TrainingReport> {
        let mut meta = MetaHistory::default();
        let mut episodes = Vec::new();

        #[cfg(all(feature = "debug_training", not(test)))]
        let closes: Vec<f64> = data.iter().map(|row| row[0]).collect();

        for iteration in 0..self.config.iterations {
            // Exploration resets for every iteration
            let mut epsilon = self.config.initial_epsilon;

            for epoch in 0..self.config.epochs {
                let episode = self.run_epoch(data, data_norm, epsilon)?;

                println!(
                    "[iter {iteration}] epoch {epoch} final pvalue: {:.2} epsilon: {epsilon:.3}",
                    episode.final_pvalue()
                );

                meta.final_pvalues.push(episode.final_pvalue());

                // Diagnostic greedy rollout against the network being fitted;
                // no effect on weights
                if epoch + 1 == self.config.epochs {
                    let evaluation =
                        evaluate_performance(data, data_norm, &self.update_net, &self.config)?;

                    println!(
                        "{}",
                        format!(
                            "[iter {iteration}] eval total reward: {:.4}",
                            evaluation.total_reward
                        )
                        .green()
                    );

                    meta.eval_rewards.push(evaluation.total_reward);
                }

                #[cfg(all(feature = "debug_training", not(test)))]
                episode.record(iteration, epoch, &closes);

                episodes.push(episode);

                // Slowly reduce epsilon as the model gets smarter:
                // 1, 1, 0.5, 0.33, 0.25, ...
                if epoch >= self.config.decay_epoch {
                    epsilon = 1. / ((epoch - self.config.decay_epoch + 2) as f64);
                }
            }

            // Trade the roles of the two networks
            mem::swap(&mut self.predict_net, &mut self.update_net);
        }

        Ok(TrainingReport { meta, episodes })
    }

    /// One full pass over the training series with a fresh market and replay
    /// buffer
    fn run_epoch(
        &mut self,
        data: &FeatureMatrix,
        data_norm: &FeatureMatrix,
        epsilon: f64,
    ) -> Result<EpisodeHistory> {
        let mut market = MarketState::new(
            data,
            data_norm,
            self.config.starting_capital,
            self.config.starting_coin,
        )?;
        let mut replay = ExperienceReplay::new(self.config.window_size);

        let mut cash = vec![market.capital()];
        let mut rewards = Vec::new();

        while !market.is_terminal() {
            let state = market.state();
            let q_values = self.predict_net.predict(&state)?;

            let action = if self.rng.gen::<f64>() < epsilon {
                Action::from_index(self.rng.gen_range(0..NUM_ACTIONS))
            } else {
                Action::from_index(argmax(&q_values))
            };

            market.apply_action(action)?;
            let reward = market.reward()?;

            let target = if market.is_terminal() {
                // No discounted future value at the terminal state
                build_target(&q_values, action, reward, None, &self.config)
            } else {
                let next_q = self.predict_net.predict(&market.state())?;
                let q_max = next_q
                    .iter()
                    .copied()
                    .map(OrderedFloat)
                    .max()
                    .map(|value| value.0)
                    .unwrap_or(0.);

                build_target(&q_values, action, reward, Some(q_max), &self.config)
            };

            replay.push(Transition {
                state,
                target,
                predicted: q_values,
            });

            if replay.len() >= self.config.batch_size {
                let (states, targets) = replay.sample_batch(self.config.batch_size, &mut self.rng)?;
                self.update_net.fit(&states, &targets)?;
            }

            cash.push(market.capital());
            rewards.push(reward);
        }

        Ok(EpisodeHistory::from_market(&market, cash, rewards))
    }
}

/// Copy of the predicted Q-vector with the acted entry overwritten by the
/// Bellman target. Holding discounts future value with the passive gamma,
/// trades with the active one
pub fn build_target(
    q_values: &[f64],
    action: Action,
    reward: f64,
    next_q_max: Option<f64>,
    config: &TrainConfig,
) -> Vec<f64> {
    let mut target = q_values.to_vec();

    target[action.index()] = match next_q_max {
        None => reward,
        Some(q_max) => {
            let gamma = if action == Action::Hold {
                config.passive_gamma
            } else {
                config.active_gamma
            };

            reward + gamma * q_max
        }
    };

    target
}
