//! Volatility regime detection via a variance-ratio F-test
//!
//! Compares the sample variance of the older half of the window with the
//! newer half. Every degenerate case returns a p-value of 1.0 ("no change").

use crate::data::PriceWindow;
use crate::error::{Error, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::debug;

/// Outcome of the variance regime test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceTestResult {
    /// Two-sided p-value that both halves share one variance
    pub p_value: f64,
}

impl VarianceTestResult {
    /// Result used when the test cannot be run
    pub fn no_change() -> Self {
        Self { p_value: 1.0 }
    }

    /// Whether the p-value is below the significance level
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Splits the window into two equal halves and F-tests their variances
#[derive(Clone, Debug)]
pub struct VarianceRegimeTest {
    /// Minimum number of prices in each half
    pub min_half_len: usize,
}

impl VarianceRegimeTest {
    pub fn new(min_half_len: usize) -> Self {
        Self { min_half_len }
    }

    /// Create with default parameters (min_half_len=6)
    pub fn default_params() -> Self {
        Self::new(6)
    }

    /// Test the window. With an odd length the oldest price is left out so
    /// both halves have the same size.
    pub fn test(&self, window: &PriceWindow) -> VarianceTestResult {
        let prices = window.to_vec();
        let half = prices.len() / 2;

        if half < self.min_half_len.max(2) {
            return VarianceTestResult::no_change();
        }

        let older = &prices[prices.len() - 2 * half..prices.len() - half];
        let newer = &prices[prices.len() - half..];

        VarianceTestResult {
            p_value: variance_ratio_test(older, newer),
        }
    }
}

impl Default for VarianceRegimeTest {
    fn default() -> Self {
        Self::default_params()
    }
}

/// Two-sided F-test p-value for equal variances of two samples.
///
/// The larger variance is always the numerator, so the result does not
/// depend on argument order. Returns 1.0 when either sample has fewer than
/// two points, zero variance, or the distribution cannot be evaluated.
pub fn variance_ratio_test(first: &[f64], second: &[f64]) -> f64 {
    let (v1, v2) = match (sample_variance(first), sample_variance(second)) {
        (Some(v1), Some(v2)) => (v1, v2),
        _ => return 1.0,
    };
    if v1 == 0.0 || v2 == 0.0 {
        return 1.0;
    }

    let (ratio, df_num, df_den) = if v2 > v1 {
        (v2 / v1, second.len() - 1, first.len() - 1)
    } else {
        (v1 / v2, first.len() - 1, second.len() - 1)
    };

    match f_cdf(ratio, df_num as f64, df_den as f64) {
        Ok(p) => (2.0 * p.min(1.0 - p)).clamp(0.0, 1.0),
        Err(e) => {
            debug!("variance test failed open: {}", e);
            1.0
        }
    }
}

/// Bessel-corrected sample variance, `None` for fewer than two points
pub fn sample_variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    if data.iter().all(|&x| x == data[0]) {
        return Some(0.0);
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let ss = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    Some(ss / (n - 1.0))
}

fn f_cdf(x: f64, df_num: f64, df_den: f64) -> Result<f64> {
    if !x.is_finite() {
        return Err(Error::Numerical(format!("non-finite variance ratio {}", x)));
    }
    let dist = FisherSnedecor::new(df_num, df_den)
        .map_err(|e| Error::Numerical(format!("F({}, {}): {}", df_num, df_den, e)))?;
    let p = dist.cdf(x);
    if p.is_finite() {
        Ok(p)
    } else {
        Err(Error::Numerical(format!("F cdf at {} is {}", x, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn alternating(n: usize, center: f64, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| center + if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_constant_window_is_no_change() {
        let window = PriceWindow::from_history(&vec![100.0; 120], 120);
        assert_eq!(VarianceRegimeTest::default().test(&window).p_value, 1.0);
    }

    #[test]
    fn test_constant_window_with_inexact_mean() {
        let window = PriceWindow::from_history(&vec![0.1; 120], 120);
        assert_eq!(VarianceRegimeTest::default().test(&window).p_value, 1.0);
    }

    #[test]
    fn test_short_window_is_skipped() {
        // 11 prices -> halves of 5
        let window = PriceWindow::from_history(&alternating(11, 100.0, 3.0), 120);
        assert_eq!(VarianceRegimeTest::default().test(&window).p_value, 1.0);
    }

    #[test]
    fn test_volatility_jump_is_significant() {
        let mut prices = alternating(60, 100.0, 1.0);
        prices.extend(alternating(60, 100.0, 10.0));
        let window = PriceWindow::from_history(&prices, 120);

        let result = VarianceRegimeTest::default().test(&window);
        assert!(result.p_value < 0.01);
        assert!(result.is_significant(0.01));
    }

    #[test]
    fn test_similar_volatility_is_not_significant() {
        let mut prices = alternating(60, 100.0, 1.0);
        prices.extend(alternating(60, 100.0, 1.05));
        let window = PriceWindow::from_history(&prices, 120);

        assert!(VarianceRegimeTest::default().test(&window).p_value > 0.5);
    }

    #[test]
    fn test_symmetric_in_argument_order() {
        let a = alternating(60, 100.0, 1.0);
        let b: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();

        assert_abs_diff_eq!(
            variance_ratio_test(&a, &b),
            variance_ratio_test(&b, &a),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_variance_half_fails_open() {
        let a = vec![100.0; 60];
        let b = alternating(60, 100.0, 5.0);
        assert_eq!(variance_ratio_test(&a, &b), 1.0);
    }

    #[test]
    fn test_sample_variance() {
        assert_eq!(sample_variance(&[1.0]), None);
        assert_abs_diff_eq!(sample_variance(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 5.0 / 3.0);
    }
}
