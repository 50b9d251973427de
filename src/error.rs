//! Error types for the anomaly stream library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Not enough trades to run an analysis cycle
    #[error("Insufficient data: need {required} trades, have {available}")]
    InsufficientData { required: usize, available: usize },

    /// Numerical failure inside a statistical routine
    #[error("Numerical error: {0}")]
    Numerical(String),
}

impl Error {
    /// Whether the monitor should just skip the cycle instead of reporting it
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }
}
