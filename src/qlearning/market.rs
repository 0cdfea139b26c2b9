use std::fmt;

use thiserror::Error;

use crate::{
    constants::{NUM_FEATURES, STATE_WIDTH},
    types::{Data, FeatureMatrix},
};

use super::Action;

/// Prices at or below this are treated as missing data; the trade is skipped
const MIN_TRADEABLE_PRICE: f64 = 0.01;
/// Proportional charge applied to buys
const BUY_FEE_RATE: f64 = 0.01;
/// Flat currency charge applied to sells
const SELL_FEE: f64 = 2.5;
/// Charged while either side of the book is empty
const EMPTY_SIDE_PENALTY: f64 = 0.01;
/// Fraction of starting capital spent or raised per trade
const TRADE_UNIT_DIVISOR: f64 = 100.;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("price series is empty")]
    EmptySeries,
    #[error("raw series has {raw} rows but normalized series has {norm}")]
    LengthMismatch { raw: usize, norm: usize },
    #[error("row {row} has {got} columns, expected {expected}")]
    RowWidth {
        row: usize,
        got: usize,
        expected: usize,
    },
    #[error("non-finite value at row {row} column {column}")]
    NonFinite { row: usize, column: usize },
    #[error("cannot act on terminal timestep {timestep}")]
    TerminalTimestep { timestep: usize },
    #[error("reward requested before any action was applied")]
    RewardBeforeAction,
}

/// Deterministic market simulation over one asset's price history. Owns the
/// portfolio balances, applies one action per timestep and logs the trade and
/// portfolio value streams the reward function reads back.
///
/// One instance covers exactly one episode; build a fresh one per epoch.
#[derive(Debug)]
pub struct MarketState<'a> {
    data: &'a FeatureMatrix,
    data_norm: &'a FeatureMatrix,
    steps: usize,
    timestep: usize,
    capital: f64,
    coin: f64,
    starting_capital: f64,
    trade_unit: f64,
    /// Signed coin amount traded at each timestep, 0 where no trade happened
    signal: Data,
    /// Portfolio valuation at each visited timestep
    pvalue: Data,
}

impl<'a> MarketState<'a> {
    pub fn new(
        data: &'a FeatureMatrix,
        data_norm: &'a FeatureMatrix,
        starting_capital: f64,
        starting_coin: f64,
    ) -> Result<Self, StateError> {
        if data.is_empty() {
            return Err(StateError::EmptySeries);
        }
        if data.len() != data_norm.len() {
            return Err(StateError::LengthMismatch {
                raw: data.len(),
                norm: data_norm.len(),
            });
        }

        for series in [data, data_norm] {
            for (row_index, row) in series.iter().enumerate() {
                if row.len() != NUM_FEATURES {
                    return Err(StateError::RowWidth {
                        row: row_index,
                        got: row.len(),
                        expected: NUM_FEATURES,
                    });
                }

                for (column, value) in row.iter().enumerate() {
                    if !value.is_finite() {
                        return Err(StateError::NonFinite {
                            row: row_index,
                            column,
                        });
                    }
                }
            }
        }

        let steps = data.len();
        let mut state = MarketState {
            data,
            data_norm,
            steps,
            timestep: 0,
            capital: starting_capital,
            coin: starting_coin,
            starting_capital,
            trade_unit: starting_capital / TRADE_UNIT_DIVISOR,
            signal: vec![0.; steps],
            pvalue: vec![0.; steps],
        };
        state.pvalue[0] = state.portfolio_value();

        Ok(state)
    }

    fn close_at(&self, timestep: usize) -> f64 {
        self.data[timestep][0]
    }

    pub fn close(&self) -> f64 {
        self.close_at(self.timestep)
    }

    pub fn portfolio_value(&self) -> f64 {
        self.capital + self.coin * self.close()
    }

    /// Execute one action at the current timestep, then advance the cursor and
    /// record the new portfolio valuation
    pub fn apply_action(&mut self, action: Action) -> Result<(), StateError> {
        if self.timestep == self.steps - 1 {
            return Err(StateError::TerminalTimestep {
                timestep: self.timestep,
            });
        }

        let close_price = self.close();

        // A dust price would divide the trade by zero; skip the trade but still
        // advance the cursor
        if close_price > MIN_TRADEABLE_PRICE {
            match action {
                Action::Hold => {}
                Action::Buy => {
                    let usd_amount = self.trade_unit.min(self.capital);
                    let coin_amount = usd_amount / close_price;

                    self.capital -= usd_amount;
                    self.coin += coin_amount;
                    self.signal[self.timestep] = coin_amount;
                }
                Action::Sell => {
                    let position_value = self.coin * close_price;
                    let usd_amount = position_value.min(self.trade_unit);
                    // Full liquidation zeroes the position exactly
                    let coin_amount = if position_value <= self.trade_unit {
                        self.coin
                    } else {
                        usd_amount / close_price
                    };

                    self.capital += usd_amount;
                    self.coin -= coin_amount;
                    self.signal[self.timestep] = -coin_amount;
                }
            }
        }

        self.timestep += 1;
        self.pvalue[self.timestep] = self.portfolio_value();

        Ok(())
    }

    /// Shaped reward for the action applied at the previous timestep: percentage
    /// portfolio change minus simulated fees, in percentage points
    pub fn reward(&self) -> Result<f64, StateError> {
        if self.timestep == 0 {
            return Err(StateError::RewardBeforeAction);
        }

        let previous = self.timestep - 1;
        let previous_value = self.pvalue[previous];

        let mut reward = (self.pvalue[self.timestep] - previous_value) / previous_value;

        // Transaction fees: proportional on buys, flat on sells, both relative
        // to the portfolio they were paid from
        let traded = self.signal[previous];
        if traded > 0. {
            reward -= (BUY_FEE_RATE * traded.abs() * self.close_at(previous)) / previous_value;
        } else if traded < 0. {
            reward -= SELL_FEE / previous_value;
        }

        // Discourage sitting all-in or all-out
        if self.coin == 0. || self.capital == 0. {
            reward -= EMPTY_SIDE_PENALTY;
        }

        Ok(reward * 100.)
    }

    /// Observation for the learner: the normalized feature row at the current
    /// timestep plus the cash ratio. Absolute coin holdings stay hidden
    pub fn state(&self) -> Vec<f64> {
        let mut state = self.data_norm[self.timestep].clone();
        state.push(self.capital / self.starting_capital);

        debug_assert_eq!(state.len(), STATE_WIDTH);
        state
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_terminal(&self) -> bool {
        self.timestep == self.steps - 1
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn coin(&self) -> f64 {
        self.coin
    }

    pub fn signal(&self) -> &Data {
        &self.signal
    }

    pub fn pvalue_log(&self) -> &Data {
        &self.pvalue
    }
}

impl fmt::Display for MarketState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timestep: {} capital: {:.2} coin: {:.6} close: {:.2} pvalue: {:.2}",
            self.timestep,
            self.capital,
            self.coin,
            self.close(),
            self.pvalue[self.timestep]
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::constants::NUM_ACTIONS;

    /// Feature rows for a synthetic close-price series, normalized rows zeroed
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
    fn construction_rejects_malformed_input() {
        let (data, norm) = series(&[100., 110.]);

        assert_eq!(
            MarketState::new(&Vec::new(), &Vec::new(), 20_000., 0.).unwrap_err(),
            StateError::EmptySeries
        );

        let short_norm = norm[..1].to_vec();
        assert!(matches!(
            MarketState::new(&data, &short_norm, 20_000., 0.).unwrap_err(),
            StateError::LengthMismatch { raw: 2, norm: 1 }
        ));

        let mut bad_width = data.clone();
        bad_width[1].pop();
        assert!(matches!(
            MarketState::new(&bad_width, &norm, 20_000., 0.).unwrap_err(),
            StateError::RowWidth { row: 1, .. }
        ));

        let mut bad_value = data.clone();
        bad_value[0][3] = f64::NAN;
        assert!(matches!(
            MarketState::new(&bad_value, &norm, 20_000., 0.).unwrap_err(),
            StateError::NonFinite { row: 0, column: 3 }
        ));
    }

    #[test]
    fn buy_and_sell_move_balances_and_log_signal() {
        let (data, norm) = series(&[100., 100., 100., 100.]);
        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();

        market.apply_action(Action::Buy).unwrap();
        assert_eq!(market.capital(), 19_800.);
        assert_eq!(market.coin(), 2.);
        assert_eq!(market.signal()[0], 2.);

        market.apply_action(Action::Sell).unwrap();
        assert_eq!(market.capital(), 20_000.);
        assert_eq!(market.coin(), 0.);
        assert_eq!(market.signal()[1], -2.);

        market.apply_action(Action::Hold).unwrap();
        assert_eq!(market.signal()[2], 0.);
        assert_eq!(market.capital(), 20_000.);
    }

    #[test]
    fn clamped_trades_never_raise() {
        let (data, norm) = series(&[100., 100., 100.]);

        // Selling with no coin held is a no-op trade
        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();
        market.apply_action(Action::Sell).unwrap();
        assert_eq!(market.coin(), 0.);
        assert_eq!(market.capital(), 20_000.);

        // Buying with no cash is a no-op trade
        let mut market = MarketState::new(&data, &norm, 0., 1.).unwrap();
        market.apply_action(Action::Buy).unwrap();
        assert_eq!(market.coin(), 1.);
        assert_eq!(market.capital(), 0.);
    }

    #[test]
    fn dust_price_skips_trade_but_advances() {
        let (data, norm) = series(&[0.005, 0.005, 0.005]);
        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();

        market.apply_action(Action::Buy).unwrap();
        assert_eq!(market.timestep(), 1);
        assert_eq!(market.coin(), 0.);
        assert_eq!(market.capital(), 20_000.);
        assert_eq!(market.signal()[0], 0.);
    }

    #[test]
    fn acting_on_terminal_timestep_fails() {
        let (data, norm) = series(&[100., 110.]);
        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();

        market.apply_action(Action::Hold).unwrap();
        assert_eq!(
            market.apply_action(Action::Hold).unwrap_err(),
            StateError::TerminalTimestep { timestep: 1 }
        );
    }

    #[test]
    fn reward_before_any_action_fails() {
        let (data, norm) = series(&[100., 110.]);
        let market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();

        assert_eq!(market.reward().unwrap_err(), StateError::RewardBeforeAction);
    }

    #[test]
    fn reward_matches_hand_computed_reference() {
        let (data, norm) = series(&[100., 110., 100.]);
        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();

        // Buy 200 usd at 100: 2 coins, pvalue goes 20_000 -> 20_020 at close 110.
        // Reward is the 0.1% gain minus the 0.01 * 2 * 100 / 20_000 buy fee
        market.apply_action(Action::Buy).unwrap();
        let reward = market.reward().unwrap();
        assert!((reward - 0.09).abs() < 1e-9, "got {reward}");

        // Hold into the drop back to 100: plain percentage loss, no fee
        market.apply_action(Action::Hold).unwrap();
        let reward = market.reward().unwrap();
        let expected = (20_000. - 20_020.) / 20_020. * 100.;
        assert!((reward - expected).abs() < 1e-9, "got {reward}");
    }

    #[test]
    fn empty_side_penalty_applies_to_all_hold() {
        let (data, norm) = series(&[100., 100.]);
        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();

        market.apply_action(Action::Hold).unwrap();
        // No value change, no fee, but the book holds zero coin
        assert_eq!(market.reward().unwrap(), -1.);
    }

    #[test]
    fn fuzzed_action_sequences_keep_invariants() {
        let closes: Vec<f64> = (0..200)
            .map(|index| 50. + 40. * ((index as f64) * 0.37).sin())
            .collect();
        let (data, norm) = series(&closes);

        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..20 {
            let mut market = MarketState::new(&data, &norm, 20_000., 0.5).unwrap();

            while !market.is_terminal() {
                let action = Action::from_index(rng.gen_range(0..NUM_ACTIONS));
                market.apply_action(action).unwrap();

                assert!(market.capital() >= 0., "negative capital");
                assert!(market.coin() >= 0., "negative coin");

                // Value bookkeeping at the visited timestep
                let t = market.timestep();
                let expected = market.capital() + market.coin() * data[t][0];
                let logged = market.pvalue_log()[t];
                assert!(
                    (logged - expected).abs() < 1e-9 * expected.abs().max(1.),
                    "pvalue mismatch at {t}: {logged} vs {expected}"
                );
            }

            assert_eq!(market.timestep(), closes.len() - 1);
        }
    }

    #[test]
    fn state_appends_cash_ratio() {
        let (data, mut norm) = series(&[100., 110.]);
        norm[0] = (0..NUM_FEATURES).map(|column| column as f64 / 10.).collect();

        let mut market = MarketState::new(&data, &norm, 20_000., 0.).unwrap();
        let state = market.state();

        assert_eq!(state.len(), STATE_WIDTH);
        assert_eq!(&state[..NUM_FEATURES], norm[0].as_slice());
        assert_eq!(state[NUM_FEATURES], 1.);

        market.apply_action(Action::Buy).unwrap();
        let state = market.state();
        assert!((state[NUM_FEATURES] - 0.99).abs() < 1e-12);
    }
}
