/// A list of values indexed by timestep, where the last index is the most recent
pub type Data = Vec<f64>;

/// Per-timestep feature rows for one asset. Close price is always column 0
pub type FeatureMatrix = Vec<Vec<f64>>;
