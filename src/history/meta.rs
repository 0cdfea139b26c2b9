use crate::{
    charts::general::simple_chart, constants::files::TRAINING_PATH, types::Data,
    utils::create_folder_if_not_exists,
};

/// Progress across epochs and iterations of one training run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaHistory {
    /// Greedy evaluation totals, one per iteration
    pub eval_rewards: Data,
    /// Final portfolio value of every training epoch
    pub final_pvalues: Data,
}

impl MetaHistory {
    pub fn record(&self) {
        create_folder_if_not_exists(TRAINING_PATH);

        let _ = simple_chart(TRAINING_PATH, "eval_rewards", &self.eval_rewards);
        let _ = simple_chart(TRAINING_PATH, "final_pvalues", &self.final_pvalues);
    }
}
