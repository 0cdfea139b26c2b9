use std::fs;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{files, indicators, NUM_FEATURES},
    types::{Data, FeatureMatrix},
    utils::{
        create_folder_if_not_exists, get_atr_values, get_rsi_values, min_max_normalize,
        sanitize_non_finite, sma,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub market_cap: f64,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: String,
    #[serde(rename = "Market Cap")]
    market_cap: String,
}

pub fn get_historical_data(coin: &str) -> Result<Vec<Bar>> {
    // Try to get the data from the local cache
    if let Some(bars) = get_historical_data_from_cache(coin) {
        return Ok(bars);
    }

    // Otherwise parse the dataset csv

    let bars = get_historical_data_from_csv(coin)?;

    // Write compacted data to a file

    create_folder_if_not_exists(files::CACHE_PATH);

    let encoded = postcard::to_stdvec(&bars)?;
    fs::write(format!("{}/{coin}.bin", files::CACHE_PATH), encoded)?;

    Ok(bars)
}

fn get_historical_data_from_cache(coin: &str) -> Option<Vec<Bar>> {
    let path = format!("{}/{coin}.bin", files::CACHE_PATH);
    let file = fs::read(path).ok()?;

    postcard::from_bytes(&file).ok()
}

fn get_historical_data_from_csv(coin: &str) -> Result<Vec<Bar>> {
    let path = format!("{}/{coin}_price.csv", files::DATA_PATH);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("failed to open csv: {path}"))?;

    let mut bars = Vec::new();

    for row in reader.deserialize() {
        let row: CsvRow = row.with_context(|| format!("malformed row in {path}"))?;

        bars.push(Bar {
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: parse_separated_number(&row.volume),
            market_cap: parse_separated_number(&row.market_cap),
            date: row.date,
        });
    }

    // The dataset files list the newest day first
    bars.sort_by_key(|bar| parse_date(&bar.date));

    Ok(bars)
}

fn parse_date(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%b %d, %Y").unwrap_or(NaiveDate::MIN)
}

/// Numbers in the volume and market cap columns carry thousands separators, and
/// days without data are recorded as "-"
fn parse_separated_number(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();

    if cleaned.is_empty() || cleaned == "-" {
        return 0.;
    }

    cleaned.parse().unwrap_or(0.)
}

/// Indicator-enriched feature rows and their normalized counterpart for one coin
#[derive(Debug)]
pub struct CoinDataset {
    pub closes: Data,
    pub features: FeatureMatrix,
    pub normalized: FeatureMatrix,
}

pub fn build_dataset(bars: &[Bar]) -> CoinDataset {
    let closes: Data = bars.iter().map(|bar| bar.close).collect();
    let highs: Data = bars.iter().map(|bar| bar.high).collect();
    let lows: Data = bars.iter().map(|bar| bar.low).collect();

    let sma_short = sma(&closes, indicators::SMA_SHORT_PERIOD);
    let sma_long = sma(&closes, indicators::SMA_LONG_PERIOD);
    let rsi = get_rsi_values(&closes, indicators::RSI_PERIOD);
    let atr = get_atr_values(&highs, &lows, &closes, indicators::ATR_PERIOD);

    let mut features: FeatureMatrix = bars
        .iter()
        .enumerate()
        .map(|(index, bar)| {
            vec![
                bar.close,
                sma_short[index],
                sma_long[index],
                rsi[index],
                atr[index],
                bar.open,
                bar.high,
                bar.low,
                bar.volume,
                bar.market_cap,
            ]
        })
        .collect();

    debug_assert!(features.is_empty() || features[0].len() == NUM_FEATURES);

    sanitize_non_finite(&mut features);
    let normalized = min_max_normalize(&features);

    CoinDataset {
        closes,
        features,
        normalized,
    }
}
