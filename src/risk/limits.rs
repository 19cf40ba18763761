//! Portfolio risk limit configuration.
//!
//! Every limit is optional: an unset limit is never checked, so a default
//! [`RiskLimits`] accepts anything. The alert manager evaluates a metrics
//! snapshot against these thresholds and raises alerts for breaches.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::risk::RiskLimits;
//!
//! let limits = RiskLimits::none()
//!     .with_max_var(50_000.0, 0.95, 1)
//!     .unwrap()
//!     .with_max_concentration(0.40)
//!     .unwrap()
//!     .with_max_drawdown(0.25)
//!     .unwrap();
//!
//! assert!(limits.max_var.is_some());
//! assert!(limits.max_leverage.is_none());
//! ```

use crate::types::error::{RiskError, RiskResult};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A VaR ceiling, bound to the confidence and horizon it was set for.
///
/// The check only fires against a VaR estimate with the same confidence and
/// horizon; comparing a 1-day 95% limit against a 10-day 99% number would be
/// meaningless.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VaRLimit {
    /// Maximum VaR in portfolio currency.
    pub max_value: f64,
    /// Confidence level the limit applies to.
    pub confidence: f64,
    /// Horizon in days the limit applies to.
    pub horizon_days: u32,
}

/// Optional portfolio risk thresholds.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskLimits {
    /// VaR ceiling, checked against estimates at the matching confidence
    /// and horizon.
    pub max_var: Option<VaRLimit>,
    /// Maximum gross leverage (gross exposure / net value).
    pub max_leverage: Option<f64>,
    /// Maximum single-position weight in (0, 1].
    pub max_concentration: Option<f64>,
    /// Maximum peak-to-trough drawdown in (0, 1].
    pub max_drawdown: Option<f64>,
    /// Per-scenario stress loss caps, keyed by scenario name.
    pub max_stress_loss: HashMap<String, f64>,
}

impl RiskLimits {
    /// Limits with nothing set; no check ever fires.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the VaR ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when `max_value` is not
    /// positive, `confidence` is outside (0, 1), or `horizon_days` is zero.
    pub fn with_max_var(
        mut self,
        max_value: f64,
        confidence: f64,
        horizon_days: u32,
    ) -> RiskResult<Self> {
        if max_value <= 0.0 {
            return Err(RiskError::InvalidParameter(
                "max_var must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&confidence) || confidence == 0.0 {
            return Err(RiskError::InvalidParameter(format!(
                "confidence must be in (0, 1), got {}",
                confidence
            )));
        }
        if horizon_days == 0 {
            return Err(RiskError::InvalidParameter(
                "horizon_days must be positive".to_string(),
            ));
        }
        self.max_var = Some(VaRLimit {
            max_value,
            confidence,
            horizon_days,
        });
        Ok(self)
    }

    /// Sets the maximum gross leverage.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when `max_leverage` is not
    /// positive.
    pub fn with_max_leverage(mut self, max_leverage: f64) -> RiskResult<Self> {
        if max_leverage <= 0.0 {
            return Err(RiskError::InvalidParameter(
                "max_leverage must be positive".to_string(),
            ));
        }
        self.max_leverage = Some(max_leverage);
        Ok(self)
    }

    /// Sets the maximum single-position weight.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when `max_concentration` is
    /// outside (0, 1].
    pub fn with_max_concentration(mut self, max_concentration: f64) -> RiskResult<Self> {
        if !(0.0..=1.0).contains(&max_concentration) || max_concentration == 0.0 {
            return Err(RiskError::InvalidParameter(format!(
                "max_concentration must be in (0, 1], got {}",
                max_concentration
            )));
        }
        self.max_concentration = Some(max_concentration);
        Ok(self)
    }

    /// Sets the maximum drawdown.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when `max_drawdown` is
    /// outside (0, 1].
    pub fn with_max_drawdown(mut self, max_drawdown: f64) -> RiskResult<Self> {
        if !(0.0..=1.0).contains(&max_drawdown) || max_drawdown == 0.0 {
            return Err(RiskError::InvalidParameter(format!(
                "max_drawdown must be in (0, 1], got {}",
                max_drawdown
            )));
        }
        self.max_drawdown = Some(max_drawdown);
        Ok(self)
    }

    /// Caps the loss of a named stress scenario.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when `max_loss` is not
    /// positive.
    pub fn with_stress_loss_cap(
        mut self,
        scenario: impl Into<String>,
        max_loss: f64,
    ) -> RiskResult<Self> {
        if max_loss <= 0.0 {
            return Err(RiskError::InvalidParameter(
                "stress loss cap must be positive".to_string(),
            ));
        }
        self.max_stress_loss.insert(scenario.into(), max_loss);
        Ok(self)
    }

    /// True when no limit of any kind is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_var.is_none()
            && self.max_leverage.is_none()
            && self.max_concentration.is_none()
            && self.max_drawdown.is_none()
            && self.max_stress_loss.is_empty()
    }

    /// VaR utilization (`value / limit`) when the limit applies to the given
    /// confidence and horizon; `None` otherwise.
    #[must_use]
    pub fn var_utilization(&self, value: f64, confidence: f64, horizon_days: u32) -> Option<f64> {
        let limit = self.max_var?;
        if (limit.confidence - confidence).abs() > 1e-9 || limit.horizon_days != horizon_days {
            return None;
        }
        Some(value / limit.max_value)
    }

    /// The loss cap for a stress scenario, when configured.
    #[must_use]
    pub fn stress_cap(&self, scenario: &str) -> Option<f64> {
        self.max_stress_loss.get(scenario).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_limits() {
        let limits = RiskLimits::none();
        assert!(limits.is_empty());
        assert!(limits.var_utilization(1_000.0, 0.95, 1).is_none());
        assert!(limits.stress_cap("crash").is_none());
    }

    #[test]
    fn test_builder_validation() {
        assert!(RiskLimits::none().with_max_var(0.0, 0.95, 1).is_err());
        assert!(RiskLimits::none().with_max_var(100.0, 1.5, 1).is_err());
        assert!(RiskLimits::none().with_max_var(100.0, 0.95, 0).is_err());
        assert!(RiskLimits::none().with_max_leverage(-1.0).is_err());
        assert!(RiskLimits::none().with_max_concentration(0.0).is_err());
        assert!(RiskLimits::none().with_max_concentration(1.1).is_err());
        assert!(RiskLimits::none().with_max_drawdown(2.0).is_err());
        assert!(RiskLimits::none().with_stress_loss_cap("x", 0.0).is_err());
    }

    #[test]
    fn test_builder_chains() {
        let limits = RiskLimits::none()
            .with_max_var(50_000.0, 0.95, 1)
            .unwrap()
            .with_max_leverage(3.0)
            .unwrap()
            .with_max_concentration(0.4)
            .unwrap()
            .with_max_drawdown(0.25)
            .unwrap()
            .with_stress_loss_cap("financial_crisis_2008", 200_000.0)
            .unwrap();

        assert!(!limits.is_empty());
        assert_eq!(limits.max_leverage, Some(3.0));
        assert_eq!(limits.stress_cap("financial_crisis_2008"), Some(200_000.0));
    }

    #[test]
    fn test_var_utilization_requires_matching_parameters() {
        let limits = RiskLimits::none().with_max_var(10_000.0, 0.95, 1).unwrap();

        let utilization = limits.var_utilization(5_000.0, 0.95, 1).unwrap();
        assert!((utilization - 0.5).abs() < 1e-12);

        // Different confidence or horizon: not comparable.
        assert!(limits.var_utilization(5_000.0, 0.99, 1).is_none());
        assert!(limits.var_utilization(5_000.0, 0.95, 10).is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialization_round_trip() {
        let limits = RiskLimits::none()
            .with_max_var(10_000.0, 0.95, 1)
            .unwrap()
            .with_max_drawdown(0.2)
            .unwrap();

        let json = serde_json::to_string(&limits).unwrap();
        let back: RiskLimits = serde_json::from_str(&json).unwrap();
        assert_eq!(limits, back);
    }
}
