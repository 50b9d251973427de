//! Configuration management
//!
//! Every tunable has a default, so an empty config file (or none at all)
//! yields a working monitor.

use crate::anomaly::{CusumDetector, OutlierParams, VarianceRegimeTest};
use crate::error::{Error, Result};
use crate::fusion::FusionRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Shared state document
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Number of recent prices in the rolling window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Trades required before a cycle produces a decision
    #[serde(default = "default_min_history")]
    pub min_history: usize,

    #[serde(default)]
    pub cusum: CusumSettings,

    #[serde(default)]
    pub variance: VarianceSettings,

    #[serde(default)]
    pub outlier: OutlierSettings,

    /// Maximum alert log length
    #[serde(default = "default_alert_capacity")]
    pub alert_capacity: usize,

    /// Delay between cycles, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/state.json")
}

fn default_window_size() -> usize {
    120
}

fn default_min_history() -> usize {
    10
}

fn default_alert_capacity() -> usize {
    crate::fusion::DEFAULT_ALERT_CAPACITY
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            window_size: default_window_size(),
            min_history: default_min_history(),
            cusum: CusumSettings::default(),
            variance: VarianceSettings::default(),
            outlier: OutlierSettings::default(),
            alert_capacity: default_alert_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// CUSUM parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CusumSettings {
    /// Slack `k`
    #[serde(default = "default_cusum_slack")]
    pub slack: f64,
    /// Trigger threshold `h`
    #[serde(default = "default_cusum_threshold")]
    pub threshold: f64,
}

fn default_cusum_slack() -> f64 {
    0.5
}

fn default_cusum_threshold() -> f64 {
    4.0
}

impl Default for CusumSettings {
    fn default() -> Self {
        Self {
            slack: default_cusum_slack(),
            threshold: default_cusum_threshold(),
        }
    }
}

/// Variance regime test parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceSettings {
    /// Minimum prices per window half
    #[serde(default = "default_min_half_len")]
    pub min_half_len: usize,
    /// p-values below this flag a regime change
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_min_half_len() -> usize {
    6
}

fn default_alpha() -> f64 {
    0.01
}

impl Default for VarianceSettings {
    fn default() -> Self {
        Self {
            min_half_len: default_min_half_len(),
            alpha: default_alpha(),
        }
    }
}

/// Isolation Forest parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSettings {
    #[serde(default = "default_retrain_window")]
    pub retrain_window: usize,
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_retrain_window() -> usize {
    500
}

fn default_contamination() -> f64 {
    0.01
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_seed() -> u64 {
    42
}

impl Default for OutlierSettings {
    fn default() -> Self {
        Self {
            retrain_window: default_retrain_window(),
            contamination: default_contamination(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            seed: default_seed(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cusum_detector(&self) -> CusumDetector {
        CusumDetector::new(self.cusum.slack, self.cusum.threshold)
    }

    pub fn variance_test(&self) -> VarianceRegimeTest {
        VarianceRegimeTest::new(self.variance.min_half_len)
    }

    pub fn fusion_rule(&self) -> FusionRule {
        FusionRule::new(self.variance.alpha)
    }

    pub fn outlier_params(&self) -> OutlierParams {
        OutlierParams {
            retrain_window: self.outlier.retrain_window,
            contamination: self.outlier.contamination,
            n_estimators: self.outlier.n_estimators,
            max_samples: self.outlier.max_samples,
            seed: self.outlier.seed,
        }
    }

    /// Reject parameter combinations the analysis cannot run with
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: &str) -> Result<()> {
            Err(Error::Config(msg.to_string()))
        }

        if self.window_size < 2 {
            return invalid("window_size must be at least 2");
        }
        if self.min_history == 0 {
            return invalid("min_history must be positive");
        }
        if !(self.cusum.threshold > 0.0) {
            return invalid("cusum.threshold must be positive");
        }
        if !(self.cusum.slack >= 0.0) {
            return invalid("cusum.slack must not be negative");
        }
        if !(self.variance.alpha > 0.0 && self.variance.alpha < 1.0) {
            return invalid("variance.alpha must be in (0, 1)");
        }
        if !(self.outlier.contamination > 0.0 && self.outlier.contamination <= 0.5) {
            return invalid("outlier.contamination must be in (0, 0.5]");
        }
        if self.outlier.retrain_window < 2 {
            return invalid("outlier.retrain_window must be at least 2");
        }
        if self.outlier.n_estimators == 0 || self.outlier.max_samples == 0 {
            return invalid("outlier.n_estimators and outlier.max_samples must be positive");
        }
        if self.alert_capacity == 0 {
            return invalid("alert_capacity must be positive");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be positive");
        }
        Ok(())
    }
}

/// Load configuration from a JSON or TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MonitorConfig> {
    let content = std::fs::read_to_string(path)?;

    if content.trim_start().starts_with('{') {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(toml::from_str(&content)?)
    }
}
