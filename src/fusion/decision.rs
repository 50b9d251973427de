//! Fused per-cycle anomaly decision
//!
//! `anomaly = cusum_count > 0 || variance_pval < alpha || isolation_flag`.
//! Any single signal is enough; there is no weighting or quorum.

use crate::anomaly::{CusumResult, VarianceTestResult};
use crate::data::RollingStats;
use serde::{Deserialize, Serialize};

/// Note attached to every anomalous decision
pub const ANOMALY_NOTE: &str = "ANOMALY_DETECTED";

/// Full diagnostic record of one analysis cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub ts: i64,
    pub price: f64,
    pub mu: f64,
    pub sigma: f64,
    pub zscore: f64,
    pub cusum_count: usize,
    pub variance_pval: f64,
    pub isolation_flag: bool,
    pub anomaly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Lightweight chart point kept for non-anomalous cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub ts: i64,
    pub price: f64,
    pub anomaly: bool,
}

/// One alert log entry as stored in the shared document.
///
/// Full decisions are tried first when reading, since a decision also
/// carries every sample-point field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertEntry {
    Decision(Decision),
    Sample(SamplePoint),
}

impl AlertEntry {
    pub fn ts(&self) -> i64 {
        match self {
            AlertEntry::Decision(d) => d.ts,
            AlertEntry::Sample(s) => s.ts,
        }
    }

    pub fn is_anomaly(&self) -> bool {
        match self {
            AlertEntry::Decision(d) => d.anomaly,
            AlertEntry::Sample(s) => s.anomaly,
        }
    }
}

/// Combines the cycle's signals into a [`Decision`]
#[derive(Debug, Clone)]
pub struct FusionRule {
    /// Variance-test p-values below this count as a regime change
    pub variance_alpha: f64,
}

impl FusionRule {
    pub fn new(variance_alpha: f64) -> Self {
        Self { variance_alpha }
    }

    pub fn fuse(
        &self,
        ts: i64,
        price: f64,
        stats: &RollingStats,
        cusum: &CusumResult,
        variance: &VarianceTestResult,
        isolation_flag: bool,
    ) -> Decision {
        let cusum_count = cusum.count();
        let anomaly =
            cusum_count > 0 || variance.is_significant(self.variance_alpha) || isolation_flag;

        Decision {
            ts,
            price,
            mu: stats.mu,
            sigma: stats.sigma,
            zscore: stats.zscore,
            cusum_count,
            variance_pval: variance.p_value,
            isolation_flag,
            anomaly,
            note: anomaly.then(|| ANOMALY_NOTE.to_string()),
        }
    }
}

impl Default for FusionRule {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Decision {
    /// Entry to append to the alert log: the full record for anomalies,
    /// a sample point otherwise
    pub fn to_entry(&self) -> AlertEntry {
        if self.anomaly {
            AlertEntry::Decision(self.clone())
        } else {
            AlertEntry::Sample(SamplePoint {
                ts: self.ts,
                price: self.price,
                anomaly: false,
            })
        }
    }
}
