//! Portfolio-level risk and performance metrics.
//!
//! # Mathematical Background
//!
//! ## Portfolio Volatility
//!
//! ```text
//! σ_p = √(wᵗ Σ w)
//! ```
//!
//! ## Sharpe / Sortino
//!
//! ```text
//! Sharpe  = (annualized return − risk-free rate) / annualized volatility
//! Sortino = same numerator / annualized downside volatility
//! ```
//!
//! Annualization uses 252 trading days. Sortino returns `f64::INFINITY` when
//! the return series has no negative observations.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, PortfolioModel, Position};
//! use portfolio_risk_rs::risk::RiskCalculator;
//!
//! let portfolio = Portfolio::new(
//!     vec![Position::new(AssetId::new("AAPL"), 10.0, 100.0).with_volatility(0.02)],
//!     "USD",
//!     0,
//! );
//! let model = PortfolioModel::build(&portfolio).unwrap();
//! let calculator = RiskCalculator::new(0.04);
//!
//! let vol = calculator.portfolio_volatility(&model).unwrap();
//! assert!((vol - 0.02).abs() < 1e-12);
//! ```

use crate::math::matrix::quadratic_form;
use crate::math::stats::{mean, std_dev};
use crate::portfolio::model::PortfolioModel;
use crate::types::error::RiskResult;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minimum return observations for Sharpe/Sortino; below this both return 0.
pub const MIN_RATIO_OBSERVATIONS: usize = 30;

/// Peak-to-trough drawdown statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DrawdownStats {
    /// Largest peak-to-trough relative decline observed.
    pub max_drawdown: f64,
    /// Decline from the running peak to the latest value.
    pub current_drawdown: f64,
}

/// Calculator for volatility, beta, performance ratios and drawdowns.
///
/// Stateless apart from the configured risk-free rate; every method operates
/// on a caller-supplied [`PortfolioModel`].
#[derive(Debug, Clone, Copy)]
pub struct RiskCalculator {
    risk_free_rate: f64,
}

impl RiskCalculator {
    /// Creates a calculator with the given annualized risk-free rate.
    #[must_use]
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    /// The configured annualized risk-free rate.
    #[must_use]
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Daily portfolio volatility `√(wᵗ Σ w)`.
    ///
    /// # Errors
    ///
    /// Propagates dimension mismatches from the quadratic form.
    pub fn portfolio_volatility(&self, model: &PortfolioModel) -> RiskResult<f64> {
        let variance = quadratic_form(model.weights(), model.covariance())?;
        // Quadratic form of a PSD matrix can only go negative through
        // floating-point error.
        Ok(variance.max(0.0).sqrt())
    }

    /// Weight-averaged portfolio beta (individual betas default to 1).
    #[must_use]
    pub fn portfolio_beta(&self, model: &PortfolioModel) -> f64 {
        model
            .weights()
            .iter()
            .zip(model.betas())
            .map(|(w, b)| w * b)
            .sum()
    }

    /// Historical portfolio returns over the minimum overlapping length of
    /// all position series, aligned on the most recent observations.
    ///
    /// Returns an empty series when the overlap is shorter than
    /// `horizon_days + 1`; callers fall back to another method in that case.
    #[must_use]
    pub fn historical_portfolio_returns(
        &self,
        model: &PortfolioModel,
        horizon_days: u32,
    ) -> Vec<f64> {
        let min_len = model
            .asset_returns()
            .iter()
            .map(Vec::len)
            .min()
            .unwrap_or(0);

        if min_len < horizon_days as usize + 1 {
            return Vec::new();
        }

        let weights = model.weights();
        (0..min_len)
            .map(|t| {
                model
                    .asset_returns()
                    .iter()
                    .zip(weights)
                    .map(|(series, w)| w * series[series.len() - min_len + t])
                    .sum()
            })
            .collect()
    }

    /// Annualized Sharpe ratio.
    ///
    /// Returns 0 when fewer than [`MIN_RATIO_OBSERVATIONS`] returns are
    /// available or the volatility is zero.
    #[must_use]
    pub fn sharpe_ratio(&self, returns: &[f64]) -> f64 {
        if returns.len() < MIN_RATIO_OBSERVATIONS {
            return 0.0;
        }
        let annualized_return = mean(returns) * TRADING_DAYS_PER_YEAR;
        let annualized_vol = std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt();
        if annualized_vol == 0.0 {
            return 0.0;
        }
        (annualized_return - self.risk_free_rate) / annualized_vol
    }

    /// Annualized Sortino ratio (downside deviation in the denominator).
    ///
    /// Returns `f64::INFINITY` when the series contains no negative returns,
    /// and 0 when fewer than [`MIN_RATIO_OBSERVATIONS`] returns are available.
    #[must_use]
    pub fn sortino_ratio(&self, returns: &[f64]) -> f64 {
        if returns.len() < MIN_RATIO_OBSERVATIONS {
            return 0.0;
        }
        let negative: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        if negative.is_empty() {
            return f64::INFINITY;
        }

        let annualized_return = mean(returns) * TRADING_DAYS_PER_YEAR;
        let downside_vol = std_dev(&negative) * TRADING_DAYS_PER_YEAR.sqrt();
        if downside_vol == 0.0 {
            return f64::INFINITY;
        }
        (annualized_return - self.risk_free_rate) / downside_vol
    }

    /// Maximum and current drawdown of the cumulative value path implied by
    /// the return series.
    #[must_use]
    pub fn drawdown(&self, returns: &[f64]) -> DrawdownStats {
        let mut value = 1.0;
        let mut peak = 1.0;
        let mut max_drawdown: f64 = 0.0;

        for r in returns {
            value *= 1.0 + r;
            if value > peak {
                peak = value;
            }
            let decline = (peak - value) / peak;
            max_drawdown = max_drawdown.max(decline);
        }

        let current_drawdown = if peak > 0.0 { (peak - value) / peak } else { 0.0 };

        DrawdownStats {
            max_drawdown,
            current_drawdown,
        }
    }
}
