//! Anomaly Detection for a Live Trade Stream
//!
//! This library watches the price history an ingester appends to a shared
//! JSON document and fuses three statistical signals into one verdict per
//! poll cycle.
//!
//! # Modules
//!
//! - `data`: Trades, the rolling price window and the shared state file
//! - `anomaly`: CUSUM, variance-ratio F-test and Isolation Forest
//! - `fusion`: Decision fusion and the bounded alert log
//! - `monitor`: The read-compute-write poll loop
//! - `config`: Tunable parameters with defaults
//!
//! # Example
//!
//! ```no_run
//! use rust_anomaly_stream::{anomaly::OutlierModel, monitor::Analyzer};
//!
//! let prices: Vec<f64> = (0..200).map(|i| 100.0 + (i as f64 * 0.1).sin()).collect();
//! let mut model = OutlierModel::default();
//! let analysis = Analyzer::default().analyze(&prices, 0, &mut model).unwrap();
//! println!("anomaly: {}", analysis.decision.anomaly);
//! ```

pub mod anomaly;
pub mod config;
pub mod data;
pub mod error;
pub mod fusion;
pub mod monitor;

pub use config::{load_config, MonitorConfig};
pub use error::{Error, Result};
pub use monitor::{Analysis, Analyzer, Monitor, RunSummary};
