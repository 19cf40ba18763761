//! Expected shortfall (conditional VaR).
//!
//! Where VaR answers "how bad is the loss at the cut-off", expected
//! shortfall averages over the tail beyond it: the mean loss across the
//! worst `(1 − confidence)` fraction of scenarios. ES is coherent
//! (sub-additive) where VaR is not, and by construction `ES ≥ VaR` on the
//! same scenario set.
//!
//! The engine operates on a Monte Carlo scenario set, ideally the same set
//! the VaR engine consumed so both numbers describe one distribution.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, PortfolioModel, Position};
//! use portfolio_risk_rs::simulation::{MonteCarloSimulator, SimulationConfig};
//! use portfolio_risk_rs::var::ExpectedShortfallEngine;
//!
//! let portfolio = Portfolio::new(
//!     vec![Position::new(AssetId::new("AAPL"), 100.0, 100.0).with_volatility(0.02)],
//!     "USD",
//!     0,
//! );
//! let model = PortfolioModel::build(&portfolio).unwrap();
//!
//! let config = SimulationConfig {
//!     simulations: 5_000,
//!     seed: Some(11),
//!     ..SimulationConfig::default()
//! };
//! let scenarios = MonteCarloSimulator::new(config).unwrap().simulate(&model).unwrap();
//!
//! let engine = ExpectedShortfallEngine::new(0.95, 1).unwrap();
//! let es = engine.from_scenarios(&model, &scenarios).unwrap();
//! assert!(es.value >= es.var);
//! ```

use crate::portfolio::model::PortfolioModel;
use crate::simulation::monte_carlo::{MonteCarloSimulator, Scenario};
use crate::types::error::{RiskError, RiskResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of worst scenarios retained in [`ESResult::worst_scenarios`].
pub const DEFAULT_WORST_SCENARIOS: usize = 10;

/// An expected-shortfall estimate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ESResult {
    /// Confidence level in (0, 1).
    pub confidence: f64,
    /// Horizon in days.
    pub horizon_days: u32,
    /// Mean tail loss in portfolio currency (non-negative, `>= var`).
    pub value: f64,
    /// Mean tail loss as a fraction of portfolio value.
    pub percentage: f64,
    /// The VaR cut-off implied by the same scenario set.
    pub var: f64,
    /// The worst scenarios in the tail, sorted worst first.
    pub worst_scenarios: Vec<Scenario>,
}

/// Expected-shortfall engine over Monte Carlo scenario sets.
#[derive(Debug, Clone)]
pub struct ExpectedShortfallEngine {
    confidence: f64,
    horizon_days: u32,
    worst_count: usize,
}

impl ExpectedShortfallEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when confidence is outside
    /// (0, 1) or the horizon is zero.
    pub fn new(confidence: f64, horizon_days: u32) -> RiskResult<Self> {
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
            worst_count: DEFAULT_WORST_SCENARIOS,
        })
    }

    /// Sets how many worst scenarios the result retains.
    #[must_use]
    pub fn with_worst_count(mut self, worst_count: usize) -> Self {
        self.worst_count = worst_count;
        self
    }

    /// Runs a fresh simulation and computes expected shortfall over it.
    ///
    /// # Errors
    ///
    /// Propagates simulation errors.
    pub fn compute(
        &self,
        model: &PortfolioModel,
        simulator: &MonteCarloSimulator,
    ) -> RiskResult<ESResult> {
        let scenarios = simulator.simulate(model)?;
        self.from_scenarios(model, &scenarios)
    }

    /// Computes expected shortfall over an existing scenario set.
    ///
    /// The tail is every scenario at or below the VaR quantile of the sorted
    /// terminal values; its size is `floor((1 − confidence) × N) + 1`, so
    /// the tail is never empty and `value >= var` always holds.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InsufficientData`] for an empty scenario set.
    pub fn from_scenarios(
        &self,
        model: &PortfolioModel,
        scenarios: &[Scenario],
    ) -> RiskResult<ESResult> {
        if scenarios.is_empty() {
            return Err(RiskError::InsufficientData(
                "expected shortfall requires a non-empty scenario set".to_string(),
            ));
        }

        let mut sorted: Vec<&Scenario> = scenarios.iter().collect();
        sorted.sort_by(|a, b| a.value.total_cmp(&b.value));

        let n = sorted.len();
        let cutoff = (((1.0 - self.confidence) * n as f64).floor() as usize).min(n - 1);
        let total = model.total_value();

        let var = (total - sorted[cutoff].value).max(0.0);

        let tail = &sorted[..=cutoff];
        let tail_mean = tail.iter().map(|s| s.value).sum::<f64>() / tail.len() as f64;
        let value = (total - tail_mean).max(var);

        let worst_scenarios: Vec<Scenario> = tail
            .iter()
            .take(self.worst_count)
            .map(|s| (*s).clone())
            .collect();

        Ok(ESResult {
            confidence: self.confidence,
            horizon_days: self.horizon_days,
            value,
            percentage: value / total,
            var,
            worst_scenarios,
        })
    }
}
