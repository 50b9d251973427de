//! Rolling price window and its summary statistics
//!
//! The window is rebuilt from the trade history every cycle; it is never
//! carried over between cycles.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Standard deviation substituted when the window has zero dispersion
pub const SIGMA_FLOOR: f64 = 1.0;

/// Fixed-capacity FIFO buffer of the most recent prices
#[derive(Clone, Debug)]
pub struct PriceWindow {
    /// Maximum number of prices held
    capacity: usize,
    /// Prices, oldest at the front
    buffer: VecDeque<f64>,
}

impl PriceWindow {
    /// Create an empty window
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Build a window holding the last `capacity` prices of `history`
    pub fn from_history(history: &[f64], capacity: usize) -> Self {
        let start = history.len().saturating_sub(capacity);
        let mut window = Self::new(capacity);
        window.buffer.extend(&history[start..]);
        window
    }

    /// Append a price, evicting the oldest one when full
    pub fn push(&mut self, price: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(price);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Most recent price
    pub fn latest(&self) -> Option<f64> {
        self.buffer.back().copied()
    }

    /// Contiguous copy of the window, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.buffer.iter().copied().collect()
    }

    /// True when every price in the window is identical
    pub fn is_constant(&self) -> bool {
        match self.buffer.front() {
            Some(&first) => self.buffer.iter().all(|&x| x == first),
            None => true,
        }
    }

    /// Arithmetic mean, 0 for an empty window
    pub fn mean(&self) -> f64 {
        match self.buffer.front() {
            None => 0.0,
            // Summation rounding must not turn a flat window into a tiny spread
            Some(&first) if self.is_constant() => first,
            Some(_) => {
                let n = self.buffer.len() as f64;
                let mean = self.buffer.iter().sum::<f64>() / n;
                if mean.is_finite() {
                    return mean;
                }
                // The sum overflowed: average the values scaled into range
                let scale = max_abs(self.buffer.iter().copied());
                scale * (self.buffer.iter().map(|x| x / scale).sum::<f64>() / n)
            }
        }
    }

    /// Population standard deviation (divisor n), without flooring
    pub fn raw_std(&self) -> f64 {
        if self.is_constant() {
            return 0.0;
        }
        let mean = self.mean();
        let n = self.buffer.len() as f64;
        let variance = self
            .buffer
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / n;
        if variance.is_finite() {
            return variance.sqrt();
        }

        let scale = max_abs(self.buffer.iter().map(|x| x - mean));
        let scaled = self
            .buffer
            .iter()
            .map(|x| ((x - mean) / scale).powi(2))
            .sum::<f64>()
            / n;
        scale * scaled.sqrt()
    }

    /// Summary statistics of the window relative to its latest price
    pub fn stats(&self) -> RollingStats {
        let mu = self.mean();
        let sigma = floor_sigma(self.raw_std());
        let zscore = self
            .latest()
            .map(|x| (x - mu) / sigma)
            .filter(|z| z.is_finite())
            .unwrap_or(0.0);

        RollingStats { mu, sigma, zscore }
    }
}

/// Mean, floored standard deviation and latest z-score of a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub mu: f64,
    pub sigma: f64,
    pub zscore: f64,
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Replace a zero (or non-finite) standard deviation with [`SIGMA_FLOOR`]
pub fn floor_sigma(sigma: f64) -> f64 {
    if sigma > 0.0 && sigma.is_finite() {
        sigma
    } else {
        SIGMA_FLOOR
    }
}
