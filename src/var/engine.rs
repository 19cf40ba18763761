//! Value-at-Risk estimation.
//!
//! Three estimation methods share one loss convention (values are
//! non-negative currency losses):
//!
//! - **Parametric**: normal quantile of the covariance-implied portfolio
//!   distribution, `pv × −(μ·h + z₁₋c·σ·√h)`. Needs no history, assumes
//!   normality.
//! - **Historical**: empirical quantile of `√h`-scaled historical portfolio
//!   returns; requires at least 100 observations.
//! - **Monte Carlo**: quantile of the simulated terminal-value distribution.
//!
//! When at least 250 historical portfolio returns are available, every
//! estimate automatically embeds a [`BacktestResult`] validating the number
//! against realized losses.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, PortfolioModel, Position};
//! use portfolio_risk_rs::var::ValueAtRiskEngine;
//!
//! let portfolio = Portfolio::new(
//!     vec![Position::new(AssetId::new("AAPL"), 100.0, 100.0).with_volatility(0.02)],
//!     "USD",
//!     0,
//! );
//! let model = PortfolioModel::build(&portfolio).unwrap();
//!
//! let engine = ValueAtRiskEngine::new(0.95, 1).unwrap();
//! let var = engine.parametric(&model).unwrap();
//!
//! // 10_000 × 1.645 × 0.02 ≈ 329
//! assert!((var.value - 329.0).abs() < 1.0);
//! ```

use crate::backtest::{BacktestResult, BacktestValidator, MIN_BACKTEST_OBSERVATIONS};
use crate::math::stats::inverse_normal_cdf;
use crate::portfolio::model::PortfolioModel;
use crate::risk::metrics::RiskCalculator;
use crate::simulation::monte_carlo::{MonteCarloSimulator, Scenario};
use crate::types::error::{RiskError, RiskResult};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum historical observations for the historical method.
pub const MIN_HISTORICAL_OBSERVATIONS: usize = 100;

/// VaR estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VaRMethod {
    /// Closed-form normal quantile from the covariance matrix.
    Parametric,
    /// Empirical quantile of historical portfolio returns.
    Historical,
    /// Quantile of the Monte Carlo terminal-value distribution.
    MonteCarlo,
}

impl fmt::Display for VaRMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parametric => write!(f, "parametric"),
            Self::Historical => write!(f, "historical"),
            Self::MonteCarlo => write!(f, "montecarlo"),
        }
    }
}

impl FromStr for VaRMethod {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parametric" => Ok(Self::Parametric),
            "historical" => Ok(Self::Historical),
            "montecarlo" | "monte_carlo" => Ok(Self::MonteCarlo),
            other => Err(RiskError::InvalidParameter(format!(
                "unknown VaR method '{}'",
                other
            ))),
        }
    }
}

/// A Value-at-Risk estimate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VaRResult {
    /// Confidence level in (0, 1).
    pub confidence: f64,
    /// Horizon in days.
    pub horizon_days: u32,
    /// Estimation method.
    pub method: VaRMethod,
    /// Loss amount in portfolio currency (non-negative).
    pub value: f64,
    /// Loss as a fraction of portfolio value.
    pub percentage: f64,
    /// Automatic backtest, present when enough history was available.
    pub backtest: Option<BacktestResult>,
}

/// Value-at-Risk engine.
///
/// Instantiated per evaluation with a fixed confidence level and horizon;
/// every method operates on a caller-supplied [`PortfolioModel`].
#[derive(Debug, Clone)]
pub struct ValueAtRiskEngine {
    confidence: f64,
    horizon_days: u32,
    calculator: RiskCalculator,
    validator: BacktestValidator,
}

impl ValueAtRiskEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when confidence is outside
    /// (0, 1) or the horizon is zero.
    pub fn new(confidence: f64, horizon_days: u32) -> RiskResult<Self> {
        Self::with_calculator(confidence, horizon_days, RiskCalculator::new(0.0))
    }

    /// Creates an engine that shares the caller's [`RiskCalculator`].
    ///
    /// # Errors
    ///
    /// Same validation as [`Self::new`].
    pub fn with_calculator(
        confidence: f64,
        horizon_days: u32,
        calculator: RiskCalculator,
    ) -> RiskResult<Self> {
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
        Ok(Self {
            confidence,
            horizon_days,
            calculator,
            validator: BacktestValidator::new(),
        })
    }

    /// The configured confidence level.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// The configured horizon in days.
    #[must_use]
    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Computes VaR with the requested method.
    ///
    /// # Errors
    ///
    /// Propagates method-specific errors; see [`Self::parametric`],
    /// [`Self::historical`] and [`Self::monte_carlo`].
    pub fn compute(
        &self,
        model: &PortfolioModel,
        method: VaRMethod,
        simulator: &MonteCarloSimulator,
    ) -> RiskResult<VaRResult> {
        match method {
            VaRMethod::Parametric => self.parametric(model),
            VaRMethod::Historical => self.historical(model),
            VaRMethod::MonteCarlo => self.monte_carlo(model, simulator),
        }
    }

    /// Parametric (variance-covariance) VaR.
    ///
    /// # Errors
    ///
    /// Propagates covariance dimension errors.
    pub fn parametric(&self, model: &PortfolioModel) -> RiskResult<VaRResult> {
        let horizon = f64::from(self.horizon_days);
        let portfolio_mean: f64 = model
            .weights()
            .iter()
            .zip(model.daily_means())
            .map(|(w, m)| w * m)
            .sum();
        let portfolio_vol = self.calculator.portfolio_volatility(model)?;

        let z = inverse_normal_cdf(1.0 - self.confidence)?;
        let quantile_return = portfolio_mean * horizon + z * portfolio_vol * horizon.sqrt();

        let value = (-quantile_return).max(0.0) * model.total_value();
        Ok(self.finish(model, VaRMethod::Parametric, value))
    }

    /// Historical-simulation VaR.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InsufficientData`] when fewer than
    /// [`MIN_HISTORICAL_OBSERVATIONS`] overlapping portfolio returns exist.
    pub fn historical(&self, model: &PortfolioModel) -> RiskResult<VaRResult> {
        let returns = self
            .calculator
            .historical_portfolio_returns(model, self.horizon_days);
        if returns.len() < MIN_HISTORICAL_OBSERVATIONS {
            return Err(RiskError::InsufficientData(format!(
                "historical VaR requires at least {} returns, got {}",
                MIN_HISTORICAL_OBSERVATIONS,
                returns.len()
            )));
        }

        let scale = f64::from(self.horizon_days).sqrt();
        let mut scaled: Vec<f64> = returns.iter().map(|r| r * scale).collect();
        scaled.sort_by(|a, b| a.total_cmp(b));

        let index = ((1.0 - self.confidence) * scaled.len() as f64).floor() as usize;
        let quantile = scaled[index.min(scaled.len() - 1)];

        let value = (-quantile).max(0.0) * model.total_value();
        Ok(self.finish(model, VaRMethod::Historical, value))
    }

    /// Monte Carlo VaR over a fresh scenario set.
    ///
    /// # Errors
    ///
    /// Propagates simulation errors ([`RiskError::NumericalInstability`],
    /// [`RiskError::Cancelled`]).
    pub fn monte_carlo(
        &self,
        model: &PortfolioModel,
        simulator: &MonteCarloSimulator,
    ) -> RiskResult<VaRResult> {
        let scenarios = simulator.simulate(model)?;
        self.monte_carlo_from_scenarios(model, &scenarios)
    }

    /// Monte Carlo VaR reusing an existing scenario set (e.g. shared with
    /// the expected-shortfall engine).
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InsufficientData`] for an empty scenario set.
    pub fn monte_carlo_from_scenarios(
        &self,
        model: &PortfolioModel,
        scenarios: &[Scenario],
    ) -> RiskResult<VaRResult> {
        if scenarios.is_empty() {
            return Err(RiskError::InsufficientData(
                "Monte Carlo VaR requires a non-empty scenario set".to_string(),
            ));
        }

        let mut values: Vec<f64> = scenarios.iter().map(|s| s.value).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        let index = ((1.0 - self.confidence) * values.len() as f64).floor() as usize;
        let quantile_value = values[index.min(values.len() - 1)];

        let value = (model.total_value() - quantile_value).max(0.0);
        Ok(self.finish(model, VaRMethod::MonteCarlo, value))
    }

    fn finish(&self, model: &PortfolioModel, method: VaRMethod, value: f64) -> VaRResult {
        let total = model.total_value();
        VaRResult {
            confidence: self.confidence,
            horizon_days: self.horizon_days,
            method,
            value,
            percentage: value / total,
            backtest: self.auto_backtest(model, value),
        }
    }

    /// Runs the embedded backtest when the history is long enough.
    fn auto_backtest(&self, model: &PortfolioModel, var_value: f64) -> Option<BacktestResult> {
        let returns = self
            .calculator
            .historical_portfolio_returns(model, self.horizon_days);
        if returns.len() < MIN_BACKTEST_OBSERVATIONS {
            return None;
        }

        let scale = f64::from(self.horizon_days).sqrt();
        let total = model.total_value();
        let losses: Vec<f64> = returns.iter().map(|r| -r * scale * total).collect();

        self.validator
            .validate(&losses, var_value, self.confidence)
            .ok()
    }
}
