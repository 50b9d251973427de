//! Poll loop and per-cycle analysis
//!
//! Each cycle reads the shared document, rebuilds the price window, runs the
//! three detectors, fuses them into a [`Decision`] and writes the engine's
//! fields back. Only the outlier model survives between cycles.

use crate::anomaly::{
    CusumDetector, CusumResult, OutlierModel, VarianceRegimeTest, VarianceTestResult,
};
use crate::config::MonitorConfig;
use crate::data::{PriceWindow, RollingStats, StateStore, StateUpdate};
use crate::error::{Error, Result};
use crate::fusion::{AlertLog, Decision, FusionRule};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep, so shutdown requests are seen promptly
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Everything computed in one cycle
#[derive(Debug, Clone)]
pub struct Analysis {
    pub stats: RollingStats,
    pub cusum: CusumResult,
    pub variance: VarianceTestResult,
    pub decision: Decision,
    /// Whether the outlier model was retrained this cycle
    pub retrained: bool,
}

/// Stateless per-cycle analysis over a price history
#[derive(Debug, Clone)]
pub struct Analyzer {
    pub window_size: usize,
    pub min_history: usize,
    pub cusum: CusumDetector,
    pub variance: VarianceRegimeTest,
    pub fusion: FusionRule,
}

impl Analyzer {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            window_size: config.window_size,
            min_history: config.min_history,
            cusum: config.cusum_detector(),
            variance: config.variance_test(),
            fusion: config.fusion_rule(),
        }
    }

    /// Run all detectors on one snapshot of the price history.
    ///
    /// The outlier model is retrained first when enough history exists, then
    /// used to classify the latest price.
    pub fn analyze(&self, prices: &[f64], ts: i64, model: &mut OutlierModel) -> Result<Analysis> {
        if prices.len() < self.min_history.max(1) {
            return Err(Error::InsufficientData {
                required: self.min_history.max(1),
                available: prices.len(),
            });
        }

        let window = PriceWindow::from_history(prices, self.window_size);
        let price = window.latest().unwrap_or_default();

        let stats = window.stats();
        let cusum = self.cusum.detect(&window);
        let variance = self.variance.test(&window);

        let retrained = model.maybe_retrain(prices);
        let isolation_flag = model.is_outlier(price);

        let decision = self
            .fusion
            .fuse(ts, price, &stats, &cusum, &variance, isolation_flag);

        Ok(Analysis {
            stats,
            cusum,
            variance,
            decision,
            retrained,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub decisions: usize,
    pub anomalies: usize,
    pub failed_cycles: usize,
}

/// Owns the loop state: detectors, the outlier model and the state store
#[derive(Debug)]
pub struct Monitor {
    config: MonitorConfig,
    analyzer: Analyzer,
    model: OutlierModel,
    store: StateStore,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: Analyzer::from_config(&config),
            model: OutlierModel::new(config.outlier_params()),
            store: StateStore::new(config.state_path.clone()),
            config,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn model(&self) -> &OutlierModel {
        &self.model
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// One read-compute-write cycle.
    ///
    /// Returns `Ok(None)` when there is not enough history yet; nothing is
    /// written in that case.
    pub fn run_cycle(&mut self, now_ms: i64) -> Result<Option<Decision>> {
        let snapshot = self.store.load();
        let prices = snapshot.prices();

        let analysis = match self.analyzer.analyze(&prices, now_ms, &mut self.model) {
            Ok(analysis) => analysis,
            Err(e) if e.is_skip() => {
                debug!("{}, skipping cycle", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let decision = analysis.decision;

        if decision.anomaly {
            warn!(
                price = decision.price,
                zscore = decision.zscore,
                cusum_count = decision.cusum_count,
                variance_pval = decision.variance_pval,
                isolation_flag = decision.isolation_flag,
                "ALERT: anomaly detected"
            );
        }

        let mut alerts =
            AlertLog::from_entries(snapshot.alerts.clone(), self.config.alert_capacity);
        alerts.push(decision.to_entry());

        let update = StateUpdate {
            stats: analysis.stats,
            alerts: alerts.into_entries(),
            last_update: now_ms,
        };
        self.store.publish(&snapshot, &update)?;

        debug!(
            trades = prices.len(),
            mu = analysis.stats.mu,
            sigma = analysis.stats.sigma,
            retrained = analysis.retrained,
            anomaly = decision.anomaly,
            "cycle complete"
        );

        Ok(Some(decision))
    }

    /// Poll until `running` is cleared or `max_cycles` cycles have run
    pub fn run(&mut self, running: &AtomicBool, max_cycles: Option<usize>) -> RunSummary {
        let mut summary = RunSummary::default();
        let interval = self.config.poll_interval();

        info!(
            path = %self.store.path().display(),
            interval_ms = self.config.poll_interval_ms,
            window = self.config.window_size,
            "monitor started"
        );

        while running.load(Ordering::SeqCst) {
            if max_cycles.map_or(false, |max| summary.cycles >= max) {
                break;
            }

            summary.cycles += 1;
            match self.run_cycle(Utc::now().timestamp_millis()) {
                Ok(Some(decision)) => {
                    summary.decisions += 1;
                    if decision.anomaly {
                        summary.anomalies += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    summary.failed_cycles += 1;
                    warn!(error = %e, "cycle failed, retrying next interval");
                }
            }

            if max_cycles.map_or(false, |max| summary.cycles >= max) {
                break;
            }
            sleep_while_running(interval, running);
        }

        info!(
            cycles = summary.cycles,
            decisions = summary.decisions,
            anomalies = summary.anomalies,
            "monitor stopped"
        );
        summary
    }
}

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
