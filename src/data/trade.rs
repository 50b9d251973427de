//! Trade records as written by the ingester
//!
//! Field names follow the exchange trade stream (`qty`, `ts`, `isBuyerMaker`).

use serde::{Deserialize, Serialize};

/// Single executed trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    #[serde(rename = "qty", default)]
    pub quantity: f64,
    /// Trade time in milliseconds since the Unix epoch
    #[serde(rename = "ts", default)]
    pub timestamp: i64,
    #[serde(rename = "isBuyerMaker", default)]
    pub is_maker_side: bool,
}

impl Trade {
    /// Create a new trade
    pub fn new(price: f64, quantity: f64, timestamp: i64, is_maker_side: bool) -> Self {
        Self {
            price,
            quantity,
            timestamp,
            is_maker_side,
        }
    }
}

/// Extract the price series from a trade history, oldest first.
///
/// Trades with a non-finite price are dropped.
pub fn prices(trades: &[Trade]) -> Vec<f64> {
    trades
        .iter()
        .map(|t| t.price)
        .filter(|p| p.is_finite())
        .collect()
}
