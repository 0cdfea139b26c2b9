use hashbrown::HashMap;

use crate::{
    charts::general::{assets_chart, buy_sell_chart, reward_chart},
    constants::files::TRAINING_PATH,
    qlearning::market::MarketState,
    types::Data,
    utils::create_folder_if_not_exists,
};

/// Everything recorded over one pass of the market: trades keyed by timestep,
/// cash and portfolio value streams, and the per-step rewards
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeHistory {
    pub buys: HashMap<usize, f64>,
    pub sells: HashMap<usize, f64>,
    pub cash: Data,
    pub pvalue: Data,
    pub rewards: Data,
}

impl EpisodeHistory {
    pub fn from_market(market: &MarketState, cash: Data, rewards: Data) -> Self {
        let mut buys = HashMap::new();
        let mut sells = HashMap::new();

        for (timestep, traded) in market.signal().iter().enumerate() {
            if *traded > 0. {
                buys.insert(timestep, *traded);
            } else if *traded < 0. {
                sells.insert(timestep, -*traded);
            }
        }

        EpisodeHistory {
            buys,
            sells,
            cash,
            pvalue: market.pvalue_log().clone(),
            rewards,
        }
    }

    pub fn final_pvalue(&self) -> f64 {
        *self.pvalue.last().unwrap_or(&0.)
    }

    pub fn record(&self, iteration: usize, epoch: usize, closes: &Data) {
        let dir = format!("{TRAINING_PATH}/iters/{iteration}/{epoch}");
        self.record_to_path(&dir, closes);
    }

    pub fn record_to_path(&self, dir: &str, closes: &Data) {
        create_folder_if_not_exists(dir);

        let _ = buy_sell_chart(dir, closes, &self.buys, &self.sells);
        let _ = assets_chart(dir, &self.pvalue, &self.cash);
        let _ = reward_chart(dir, &self.rewards);
    }
}
