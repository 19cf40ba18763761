//! VaR backtesting: violation counting and coverage tests.
//!
//! Given a rolling window of realized portfolio losses and a fixed VaR
//! estimate, the validator counts violations (realized loss exceeding VaR)
//! and runs two likelihood-ratio tests against a chi-square(1) distribution:
//!
//! - **Kupiec** (unconditional coverage): does the observed violation rate
//!   match the expected rate `1 − confidence`?
//! - **Christoffersen** (independence): are violations serially independent,
//!   or do they cluster?
//!
//! Both tests are diagnostics. A rejection is surfaced through the `reject`
//! flag (and a `warn!` log line), never as an error.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::backtest::BacktestValidator;
//!
//! // 300 observations with exactly 15 evenly spaced violations of a
//! // 95% VaR of 1000: a well-calibrated model.
//! let losses: Vec<f64> = (0..300)
//!     .map(|i| if i % 20 == 10 { 1500.0 } else { 100.0 })
//!     .collect();
//!
//! let result = BacktestValidator::new().validate(&losses, 1000.0, 0.95).unwrap();
//! assert_eq!(result.violations, 15);
//! assert!(!result.kupiec.reject);
//! assert!(!result.christoffersen.reject);
//! ```

use crate::types::error::{RiskError, RiskResult};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum loss observations required for a backtest.
pub const MIN_BACKTEST_OBSERVATIONS: usize = 250;

/// Default significance level for both tests.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Outcome of a single likelihood-ratio test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TestOutcome {
    /// Likelihood-ratio statistic (chi-square(1) distributed under H0).
    pub statistic: f64,
    /// Right-tail p-value.
    pub p_value: f64,
    /// True when the test rejects at the configured significance level.
    pub reject: bool,
}

/// Result of a VaR backtest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BacktestResult {
    /// Number of loss observations examined.
    pub observations: usize,
    /// Observed violations (loss strictly greater than VaR).
    pub violations: usize,
    /// Expected violations `N × (1 − confidence)`.
    pub expected_violations: f64,
    /// Observed violation rate.
    pub violation_rate: f64,
    /// Kupiec unconditional-coverage test.
    pub kupiec: TestOutcome,
    /// Christoffersen independence test.
    pub christoffersen: TestOutcome,
}

impl BacktestResult {
    /// True when either test rejects its null hypothesis.
    #[must_use]
    pub fn any_rejection(&self) -> bool {
        self.kupiec.reject || self.christoffersen.reject
    }
}

/// Rolling VaR-versus-realized-loss validator.
#[derive(Debug, Clone, Copy)]
pub struct BacktestValidator {
    significance: f64,
}

impl Default for BacktestValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl BacktestValidator {
    /// Creates a validator with the default 5% significance level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            significance: DEFAULT_SIGNIFICANCE,
        }
    }

    /// Creates a validator with a custom significance level.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when `significance` is
    /// outside (0, 1).
    pub fn with_significance(significance: f64) -> RiskResult<Self> {
        if !(0.0..1.0).contains(&significance) || significance == 0.0 {
            return Err(RiskError::InvalidParameter(format!(
                "significance must be in (0, 1), got {}",
                significance
            )));
        }
        Ok(Self { significance })
    }

    /// Runs the backtest.
    ///
    /// `losses` is the series of realized portfolio losses (positive values
    /// are losses) over the lookback window; `var` is the VaR estimate being
    /// validated at `confidence`.
    ///
    /// # Errors
    ///
    /// - [`RiskError::InvalidParameter`] when confidence is outside (0, 1).
    /// - [`RiskError::InsufficientData`] when fewer than
    ///   [`MIN_BACKTEST_OBSERVATIONS`] losses are supplied.
    pub fn validate(&self, losses: &[f64], var: f64, confidence: f64) -> RiskResult<BacktestResult> {
        if !(0.0..1.0).contains(&confidence) || confidence == 0.0 {
            return Err(RiskError::InvalidParameter(format!(
                "confidence must be in (0, 1), got {}",
                confidence
            )));
        }
        if losses.len() < MIN_BACKTEST_OBSERVATIONS {
            return Err(RiskError::InsufficientData(format!(
                "backtest requires at least {} observations, got {}",
                MIN_BACKTEST_OBSERVATIONS,
                losses.len()
            )));
        }

        let hits: Vec<bool> = losses.iter().map(|l| *l > var).collect();
        let n = hits.len();
        let violations = hits.iter().filter(|h| **h).count();
        let expected_violations = n as f64 * (1.0 - confidence);
        let violation_rate = violations as f64 / n as f64;

        let kupiec = self.kupiec_test(n, violations, 1.0 - confidence);
        let christoffersen = self.christoffersen_test(&hits);

        if kupiec.reject {
            warn!(
                violations,
                expected = expected_violations,
                p_value = kupiec.p_value,
                "Kupiec test rejects VaR coverage"
            );
        }
        if christoffersen.reject {
            warn!(
                p_value = christoffersen.p_value,
                "Christoffersen test rejects violation independence"
            );
        }

        Ok(BacktestResult {
            observations: n,
            violations,
            expected_violations,
            violation_rate,
            kupiec,
            christoffersen,
        })
    }

    /// Kupiec proportion-of-failures likelihood ratio.
    fn kupiec_test(&self, n: usize, violations: usize, expected_rate: f64) -> TestOutcome {
        let observed_rate = violations as f64 / n as f64;
        let misses = (n - violations) as f64;
        let hits = violations as f64;

        let log_null = xlogy(misses, 1.0 - expected_rate) + xlogy(hits, expected_rate);
        let log_alt = xlogy(misses, 1.0 - observed_rate) + xlogy(hits, observed_rate);

        self.outcome((-2.0 * (log_null - log_alt)).max(0.0))
    }

    /// Christoffersen independence likelihood ratio over the 2×2 transition
    /// table of consecutive violation states.
    fn christoffersen_test(&self, hits: &[bool]) -> TestOutcome {
        let mut n00 = 0.0;
        let mut n01 = 0.0;
        let mut n10 = 0.0;
        let mut n11 = 0.0;

        for pair in hits.windows(2) {
            match (pair[0], pair[1]) {
                (false, false) => n00 += 1.0,
                (false, true) => n01 += 1.0,
                (true, false) => n10 += 1.0,
                (true, true) => n11 += 1.0,
            }
        }

        let transitions = n00 + n01 + n10 + n11;
        if transitions == 0.0 {
            return self.outcome(0.0);
        }

        let pi = (n01 + n11) / transitions;
        let pi01 = if n00 + n01 > 0.0 { n01 / (n00 + n01) } else { 0.0 };
        let pi11 = if n10 + n11 > 0.0 { n11 / (n10 + n11) } else { 0.0 };

        let log_null = xlogy(n00 + n10, 1.0 - pi) + xlogy(n01 + n11, pi);
        let log_alt = xlogy(n00, 1.0 - pi01)
            + xlogy(n01, pi01)
            + xlogy(n10, 1.0 - pi11)
            + xlogy(n11, pi11);

        self.outcome((-2.0 * (log_null - log_alt)).max(0.0))
    }

    fn outcome(&self, statistic: f64) -> TestOutcome {
        let p_value = crate::math::stats::chi_square_1df_survival(statistic);
        TestOutcome {
            statistic,
            p_value,
            reject: p_value < self.significance,
        }
    }
}

/// `x · ln(y)` with the `0 · ln(0) = 0` convention used by both tests.
fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x * y.ln() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced_losses(n: usize, every: usize, var: f64) -> Vec<f64> {
        (0..n)
            .map(|i| if i % every == every / 2 { var * 1.5 } else { var * 0.1 })
            .collect()
    }

    #[test]
    fn test_requires_minimum_observations() {
        let validator = BacktestValidator::new();
        let losses = vec![1.0; 100];
        assert!(matches!(
            validator.validate(&losses, 10.0, 0.95),
            Err(RiskError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_rejects_bad_confidence() {
        let validator = BacktestValidator::new();
        let losses = vec![1.0; 300];
        assert!(validator.validate(&losses, 10.0, 1.5).is_err());
        assert!(validator.validate(&losses, 10.0, 0.0).is_err());
    }

    #[test]
    fn test_well_calibrated_model_passes() {
        // 300 observations, 15 violations evenly spaced: exactly the
        // expected count at 95%, non-clustered.
        let losses = spaced_losses(300, 20, 1000.0);
        let result = BacktestValidator::new()
            .validate(&losses, 1000.0, 0.95)
            .unwrap();

        assert_eq!(result.observations, 300);
        assert_eq!(result.violations, 15);
        assert!((result.expected_violations - 15.0).abs() < 1e-9);
        assert!(result.kupiec.statistic < 1e-9);
        assert!(result.kupiec.p_value >= 0.05);
        assert!(!result.kupiec.reject);
        assert!(result.christoffersen.p_value >= 0.05);
        assert!(!result.christoffersen.reject);
        assert!(!result.any_rejection());
    }

    #[test]
    fn test_excessive_violations_fail_kupiec() {
        // 60 violations out of 300 at 95% confidence is far too many.
        let losses = spaced_losses(300, 5, 1000.0);
        let result = BacktestValidator::new()
            .validate(&losses, 1000.0, 0.95)
            .unwrap();

        assert_eq!(result.violations, 60);
        assert!(result.kupiec.reject);
    }

    #[test]
    fn test_clustered_violations_fail_christoffersen() {
        // Correct total count but all violations consecutive.
        let losses: Vec<f64> = (0..300)
            .map(|i| if i < 15 { 1500.0 } else { 100.0 })
            .collect();
        let result = BacktestValidator::new()
            .validate(&losses, 1000.0, 0.95)
            .unwrap();

        assert_eq!(result.violations, 15);
        assert!(!result.kupiec.reject);
        assert!(result.christoffersen.reject);
    }

    #[test]
    fn test_zero_violations_does_not_panic() {
        let losses = vec![1.0; 300];
        let result = BacktestValidator::new()
            .validate(&losses, 1000.0, 0.95)
            .unwrap();
        assert_eq!(result.violations, 0);
        assert!(result.kupiec.statistic.is_finite());
        assert!(result.christoffersen.statistic.is_finite());
    }

    #[test]
    fn test_custom_significance() {
        assert!(BacktestValidator::with_significance(0.01).is_ok());
        assert!(BacktestValidator::with_significance(0.0).is_err());
        assert!(BacktestValidator::with_significance(1.0).is_err());
    }
}
