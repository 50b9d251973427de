//! Anomaly detection algorithms
//!
//! This module provides the three signals fused every cycle:
//! - Change-point: two-sided CUSUM over standardized prices
//! - Volatility regime: variance-ratio F-test between window halves
//! - Point outliers: Isolation Forest, retrained in batch

mod cusum;
mod isolation_forest;
mod outlier;
mod variance;

pub use cusum::*;
pub use isolation_forest::*;
pub use outlier::*;
pub use variance::*;

/// Per-sample flags and scores from one detection pass
#[derive(Debug, Clone)]
pub struct AnomalyResult {
    /// Binary flags indicating anomalies
    pub is_anomaly: Vec<bool>,
    /// Continuous anomaly scores (higher = more anomalous)
    pub scores: Vec<f64>,
}

impl AnomalyResult {
    pub fn new(is_anomaly: Vec<bool>, scores: Vec<f64>) -> Self {
        Self { is_anomaly, scores }
    }
}

/// Trait for multivariate anomaly detectors
pub trait MultivariateDetector {
    /// Fit the detector to training data
    fn fit(&mut self, data: &ndarray::Array2<f64>);

    /// Detect anomalies in the given data
    fn detect(&self, data: &ndarray::Array2<f64>) -> AnomalyResult;
}
