use anyhow::Result;

use crate::{
    neural_net::QModel,
    types::{Data, FeatureMatrix},
};

use super::{argmax, market::MarketState, Action, TrainConfig};

pub struct Evaluation<'a> {
    pub total_reward: f64,
    pub rewards: Data,
    pub cash: Data,
    /// Final market for inspection and plotting
    pub market: MarketState<'a>,
}

/// Deterministic rollout of a frozen network: always the greedy action, no
/// exploration and no fitting. Scores how the network trades on its own
pub fn evaluate_performance<'a, M: QModel>(
    data: &'a FeatureMatrix,
    data_norm: &'a FeatureMatrix,
    model: &M,
    config: &TrainConfig,
) -> Result<Evaluation<'a>> {
    let mut market = MarketState::new(
        data,
        data_norm,
        config.starting_capital,
        config.starting_coin,
    )?;

    let mut total_reward = 0.;
    let mut rewards = Vec::new();
    let mut cash = vec![market.capital()];

    while !market.is_terminal() {
        let q_values = model.predict(&market.state())?;
        market.apply_action(Action::from_index(argmax(&q_values)))?;

        let reward = market.reward()?;
        total_reward += reward;
        rewards.push(reward);
        cash.push(market.capital());
    }

    Ok(Evaluation {
        total_reward,
        rewards,
        cash,
        market,
    })
}

#[cfg(test)]
mod tests {
    use crate::constants::NUM_FEATURES;

    use super::*;

    struct FixedModel {
        q_values: Vec<f64>,
    }

    impl QModel for FixedModel {
        fn predict(&self, _state: &[f64]) -> Result<Vec<f64>> {
            Ok(self.q_values.clone())
        }

        fn fit(&mut self, _states: &[Vec<f64>], _targets: &[Vec<f64>]) -> Result<()> {
            panic!("evaluation must never fit");
        }
    }

    fn series(closes: &[f64]) -> (FeatureMatrix, FeatureMatrix) {
        let data = closes
            .iter()
            .map(|close| {
                let mut row = vec![0.; NUM_FEATURES];
                row[0] = *close;
                row
            })
            .collect::<FeatureMatrix>();
        let norm = vec![vec![0.; NUM_FEATURES]; closes.len()];

        (data, norm)
    }

    #[test]
    fn greedy_rollout_runs_to_the_terminal_step() {
        let closes: Vec<f64> = (0..20).map(|index| 100. + index as f64).collect();
        let (data, norm) = series(&closes);

        // Always prefers buying
        let model = FixedModel {
            q_values: vec![0., 1., 0.],
        };
        let config = TrainConfig {
            starting_capital: 20_000.,
            starting_coin: 0.,
            ..TrainConfig::default()
        };

        let evaluation = evaluate_performance(&data, &norm, &model, &config).unwrap();

        assert!(evaluation.market.is_terminal());
        assert_eq!(evaluation.rewards.len(), closes.len() - 1);
        assert!(evaluation.market.coin() > 0.);

        let summed: f64 = evaluation.rewards.iter().sum();
        assert!((summed - evaluation.total_reward).abs() < 1e-9);
    }
}
