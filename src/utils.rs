use std::fs;

use crate::types::{Data, FeatureMatrix};

pub fn get_differences(data: &Data) -> Data {
    let mut diff = vec![];

    for (index, value) in data.iter().enumerate() {
        let previous = {
            let (previous_index, overflowed) = index.overflowing_sub(1);

            if overflowed {
                *value
            } else {
                data[previous_index]
            }
        };
        diff.push(value - previous)
    }

    diff
}

/// Calculates the exponential moving average
///
/// # Arguments
///
/// * `alpha` - The exponential weight to apply to the newest value. For example, 0.18 adds 18% of the new value to 82% of the previous average
///
pub fn ema(data: &Data, alpha: f64) -> Data {
    let mut averages = Vec::new();

    for (index, value) in data.iter().enumerate() {
        let previous = {
            let (previous_index, overflowed) = index.overflowing_sub(1);
            if overflowed {
                averages.push(*value * alpha);
                continue;
            } else {
                averages[previous_index]
            }
        };
        let avg = *value * alpha + previous * (1. - alpha);
        averages.push(avg);
    }
    averages
}

/// Simple moving average over a trailing window. The warmup prefix, where a full
/// window does not exist yet, is left at 0 so downstream normalization sees finite values
pub fn sma(data: &Data, period: usize) -> Data {
    let mut averages = vec![0.; data.len()];
    if period == 0 || data.len() < period {
        return averages;
    }

    let mut window_sum: f64 = data[..period].iter().sum();
    averages[period - 1] = window_sum / period as f64;

    for index in period..data.len() {
        window_sum += data[index] - data[index - period];
        averages[index] = window_sum / period as f64;
    }

    averages
}

/// Get the relative strength index value for each data point
pub fn get_rsi_values(data: &Data, period: usize) -> Data {
    let diffs = get_differences(data);

    let mut upwards = Vec::new();
    let mut downwards = Vec::new();

    for diff in diffs.iter() {
        if *diff >= 0. {
            upwards.push(*diff);
            downwards.push(0.);
            continue;
        }

        downwards.push(diff.abs());
        upwards.push(0.);
    }

    let alpha = 1. / (period as f64 + 1.);

    let upward_avg = ema(&upwards, alpha);
    let downward_avg = ema(&downwards, alpha);

    upward_avg
        .iter()
        .zip(downward_avg.iter())
        .map(|(up, down)| {
            if *down == 0. {
                return if *up == 0. { 0. } else { 100. };
            }
            let rs = up / down;
            100. - (100. / (1. + rs))
        })
        .collect()
}

/// Average true range with Wilder smoothing. Entries before a full period are 0
pub fn get_atr_values(high: &Data, low: &Data, close: &Data, period: usize) -> Data {
    let steps = close.len();
    let mut atr = vec![0.; steps];
    if period == 0 || steps < period + 1 {
        return atr;
    }

    let mut true_ranges = vec![high[0] - low[0]];
    for index in 1..steps {
        let range = (high[index] - low[index])
            .max((high[index] - close[index - 1]).abs())
            .max((low[index] - close[index - 1]).abs());
        true_ranges.push(range);
    }

    let seed: f64 = true_ranges[1..=period].iter().sum::<f64>() / period as f64;
    atr[period] = seed;

    for index in (period + 1)..steps {
        atr[index] = (atr[index - 1] * (period as f64 - 1.) + true_ranges[index]) / period as f64;
    }

    atr
}

/// Replace any value that survived indicator warmup as NaN or infinite with 0
pub fn sanitize_non_finite(matrix: &mut FeatureMatrix) {
    for row in matrix.iter_mut() {
        for value in row.iter_mut() {
            if !value.is_finite() {
                *value = 0.;
            }
        }
    }
}

/// Column-wise min-max normalization to [0, 1]. Flat columns normalize to 0
pub fn min_max_normalize(matrix: &FeatureMatrix) -> FeatureMatrix {
    let Some(first) = matrix.first() else {
        return Vec::new();
    };
    let columns = first.len();

    let mut mins = vec![f64::MAX; columns];
    let mut maxes = vec![f64::MIN; columns];

    for row in matrix.iter() {
        for (column, value) in row.iter().enumerate() {
            mins[column] = mins[column].min(*value);
            maxes[column] = maxes[column].max(*value);
        }
    }

    matrix
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(column, value)| {
                    let range = maxes[column] - mins[column];
                    if range == 0. {
                        0.
                    } else {
                        (value - mins[column]) / range
                    }
                })
                .collect()
        })
        .collect()
}

pub fn create_folder_if_not_exists(path: &str) {
    let _ = fs::create_dir_all(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warmup_is_zero() {
        let data = vec![2., 4., 6., 8.];
        let averages = sma(&data, 2);

        assert_eq!(averages[0], 0.);
        assert_eq!(averages[1], 3.);
        assert_eq!(averages[2], 5.);
        assert_eq!(averages[3], 7.);
    }

    #[test]
    fn rsi_all_gains_saturates() {
        let data = vec![1., 2., 3., 4., 5., 6.];
        let rsi = get_rsi_values(&data, 3);

        for value in &rsi[1..] {
            assert!(*value > 99.9, "expected saturated rsi, got {value}");
        }
    }

    #[test]
    fn atr_has_zero_warmup_and_positive_tail() {
        let high = vec![12., 13., 14., 15., 16., 17.];
        let low = vec![10., 11., 12., 13., 14., 15.];
        let close = vec![11., 12., 13., 14., 15., 16.];
        let atr = get_atr_values(&high, &low, &close, 3);

        assert_eq!(&atr[..3], &[0., 0., 0.]);
        for value in &atr[3..] {
            assert!(*value > 0.);
        }
    }

    #[test]
    fn min_max_normalize_bounds_and_flat_columns() {
        let matrix = vec![vec![1., 5.], vec![3., 5.], vec![2., 5.]];
        let normalized = min_max_normalize(&matrix);

        assert_eq!(normalized[0], vec![0., 0.]);
        assert_eq!(normalized[1], vec![1., 0.]);
        assert_eq!(normalized[2], vec![0.5, 0.]);
    }

    #[test]
    fn sanitize_replaces_non_finite() {
        let mut matrix = vec![vec![f64::NAN, 1.], vec![f64::INFINITY, 2.]];
        sanitize_non_finite(&mut matrix);

        assert_eq!(matrix, vec![vec![0., 1.], vec![0., 2.]]);
    }
}
