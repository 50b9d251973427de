//! Periodically retrained point-outlier classifier
//!
//! Wraps an [`IsolationForest`] that is rebuilt from scratch on the most
//! recent `retrain_window` prices whenever that much history exists. The
//! model lives only in memory; a restart starts over without one.

use super::IsolationForest;
use tracing::debug;

/// Hyperparameters of the outlier model
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierParams {
    /// Number of most recent prices used for training
    pub retrain_window: usize,
    /// Expected fraction of anomalies
    pub contamination: f64,
    /// Number of isolation trees
    pub n_estimators: usize,
    /// Subsample size per tree
    pub max_samples: usize,
    /// Fixed RNG seed so retrains are reproducible
    pub seed: u64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            retrain_window: 500,
            contamination: 0.01,
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// Owned outlier model state, held by the monitor across cycles
#[derive(Debug, Clone)]
pub struct OutlierModel {
    params: OutlierParams,
    forest: Option<IsolationForest>,
    retrain_count: u64,
}

impl OutlierModel {
    pub fn new(params: OutlierParams) -> Self {
        Self {
            params,
            forest: None,
            retrain_count: 0,
        }
    }

    pub fn params(&self) -> &OutlierParams {
        &self.params
    }

    /// Whether a model has been trained since startup
    pub fn is_trained(&self) -> bool {
        self.forest.is_some()
    }

    /// Number of retrains performed since startup
    pub fn retrain_count(&self) -> u64 {
        self.retrain_count
    }

    /// Retrain on the tail of `history` if it holds at least `retrain_window`
    /// prices. The previous model is discarded. Returns whether a retrain ran.
    pub fn maybe_retrain(&mut self, history: &[f64]) -> bool {
        let window = self.params.retrain_window;
        if window == 0 || history.len() < window {
            return false;
        }

        let training = &history[history.len() - window..];
        let mut forest = IsolationForest::new(self.params.n_estimators, self.params.contamination)
            .with_max_samples(self.params.max_samples)
            .with_seed(self.params.seed);
        forest.fit_values(training);

        debug!(
            samples = training.len(),
            threshold = ?forest.threshold(),
            "outlier model retrained"
        );

        self.forest = Some(forest);
        self.retrain_count += 1;
        true
    }

    /// Classify a single price; false while no model exists
    pub fn is_outlier(&self, price: f64) -> bool {
        self.forest
            .as_ref()
            .map_or(false, |forest| forest.predict_value(price))
    }
}

impl Default for OutlierModel {
    fn default() -> Self {
        Self::new(OutlierParams::default())
    }
}
