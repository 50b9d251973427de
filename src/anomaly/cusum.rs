//! CUSUM change-point detection
//!
//! Two-sided cumulative sum over standardized increments of the window.
//! The accumulators start from zero on every call: a drift that began before
//! the window's first price is not seen.

use crate::data::{floor_sigma, PriceWindow};

/// Direction of a detected mean shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

/// A single CUSUM trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CusumTrigger {
    /// Position within the window, 0 = oldest
    pub index: usize,
    pub direction: Direction,
}

/// Triggers found in one pass, plus the accumulators at the end of the pass
#[derive(Debug, Clone, PartialEq)]
pub struct CusumResult {
    pub triggers: Vec<CusumTrigger>,
    pub s_pos: f64,
    pub s_neg: f64,
}

impl CusumResult {
    pub fn count(&self) -> usize {
        self.triggers.len()
    }

    /// Number of triggers in the given direction
    pub fn count_direction(&self, direction: Direction) -> usize {
        self.triggers
            .iter()
            .filter(|t| t.direction == direction)
            .count()
    }
}

/// CUSUM detector
///
/// `s_pos = max(0, s_pos + z - k)` and `s_neg = min(0, s_neg + z + k)`; an
/// accumulator beyond `h` records a trigger and is reset to zero.
#[derive(Clone, Debug)]
pub struct CusumDetector {
    /// Slack `k` absorbing small fluctuations
    pub slack: f64,
    /// Trigger threshold `h`
    pub threshold: f64,
}

impl CusumDetector {
    /// Create a new CUSUM detector
    ///
    /// # Arguments
    /// * `slack` - Allowance per standardized step (default: 0.5)
    /// * `threshold` - Decision interval (default: 4.0)
    pub fn new(slack: f64, threshold: f64) -> Self {
        Self { slack, threshold }
    }

    /// Create with default parameters (slack=0.5, threshold=4.0)
    pub fn default_params() -> Self {
        Self::new(0.5, 4.0)
    }

    /// Run one full pass over the window
    pub fn detect(&self, window: &PriceWindow) -> CusumResult {
        let mu = window.mean();
        let sigma = floor_sigma(window.raw_std());

        let mut s_pos = 0.0_f64;
        let mut s_neg = 0.0_f64;
        let mut triggers = Vec::new();

        for (index, x) in window.to_vec().into_iter().enumerate() {
            let z = (x - mu) / sigma;
            if !z.is_finite() {
                continue;
            }
            s_pos = (s_pos + z - self.slack).max(0.0);
            s_neg = (s_neg + z + self.slack).min(0.0);

            if s_pos > self.threshold {
                triggers.push(CusumTrigger {
                    index,
                    direction: Direction::Positive,
                });
                s_pos = 0.0;
            }
            if s_neg.abs() > self.threshold {
                triggers.push(CusumTrigger {
                    index,
                    direction: Direction::Negative,
                });
                s_neg = 0.0;
            }
        }

        CusumResult {
            triggers,
            s_pos,
            s_neg,
        }
    }
}

impl Default for CusumDetector {
    fn default() -> Self {
        Self::default_params()
    }
}
