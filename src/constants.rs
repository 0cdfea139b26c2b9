pub const COINS: [&str; 5] = ["bitcoin", "litecoin", "ripple", "iota", "ethereum"];
pub const COIN: &str = "bitcoin";

/// Market feature columns per timestep, close price first
pub const NUM_FEATURES: usize = 10;
/// Market features plus the cash ratio appended by the state machine
pub const STATE_WIDTH: usize = NUM_FEATURES + 1;
pub const NUM_ACTIONS: usize = 3;

pub mod indicators {
    pub const SMA_SHORT_PERIOD: usize = 15;
    pub const SMA_LONG_PERIOD: usize = 60;
    pub const RSI_PERIOD: usize = 14;
    pub const ATR_PERIOD: usize = 14;
}

pub mod files {
    pub const DATA_PATH: &str = "datasets/popular_coins";
    pub const CACHE_PATH: &str = "data";
    pub const TRAINING_PATH: &str = "training";
    pub const WEIGHTS_PATH: &str = "weights";
}
