//! Deterministic stress testing.
//!
//! A stress scenario is a set of price shocks (portfolio-wide, per asset or
//! per asset class), optionally combined with a volatility multiplier and a
//! correlation override. Running a scenario clones the portfolio, applies
//! every applicable shock to each position's price and revalues; nothing is
//! simulated, so a scenario with no shocks produces exactly zero loss.
//!
//! When the shocked portfolio still supports a parametric model, the result
//! also carries a stressed 1-day 99% VaR computed under the scenario's
//! volatility multiplier and correlation override.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, Position};
//! use portfolio_risk_rs::stress::{MarketShock, ShockScope, StressScenario, StressTester};
//!
//! let portfolio = Portfolio::new(
//!     vec![Position::new(AssetId::new("AAPL"), 100.0, 100.0).with_volatility(0.02)],
//!     "USD",
//!     0,
//! );
//!
//! let crash = StressScenario::new("crash", "broad 20% drawdown")
//!     .with_shock(MarketShock::new(ShockScope::All, -0.20));
//!
//! let tester = StressTester::new(vec![crash]);
//! let results = tester.run(&portfolio).unwrap();
//! assert!((results[0].loss - 2_000.0).abs() < 1e-9);
//! ```

use crate::math::stats::inverse_normal_cdf;
use crate::portfolio::position::{AssetId, Portfolio, Position};
use crate::types::error::{RiskError, RiskResult};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Confidence level used for the embedded stressed VaR.
const STRESSED_VAR_CONFIDENCE: f64 = 0.99;

/// Which positions a shock applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShockScope {
    /// Every position.
    All,
    /// A single asset.
    Asset(AssetId),
    /// Every position tagged with this asset class.
    AssetClass(String),
}

/// A relative price shock.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarketShock {
    /// Positions the shock applies to.
    pub scope: ShockScope,
    /// Relative price change, e.g. `-0.20` for a 20% drop.
    pub price_change_pct: f64,
}

impl MarketShock {
    /// Creates a shock.
    #[must_use]
    pub fn new(scope: ShockScope, price_change_pct: f64) -> Self {
        Self {
            scope,
            price_change_pct,
        }
    }

    fn applies_to(&self, position: &Position) -> bool {
        match &self.scope {
            ShockScope::All => true,
            ShockScope::Asset(asset) => *asset == position.asset,
            ShockScope::AssetClass(class) => position.asset_class.as_deref() == Some(class),
        }
    }
}

/// A named stress scenario.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StressScenario {
    /// Scenario name, unique within a tester.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Price shocks applied in order.
    pub shocks: Vec<MarketShock>,
    /// Multiplier applied to every volatility for the stressed VaR.
    pub volatility_multiplier: f64,
    /// When set, every pairwise correlation is replaced by this value for
    /// the stressed VaR (crisis correlation convergence).
    pub correlation_override: Option<f64>,
    /// Custom per-position price change, composed after the listed shocks.
    /// Not serialized.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub custom_shock: Option<fn(&Position) -> f64>,
}

impl StressScenario {
    /// Creates an empty scenario (no shocks, multiplier 1).
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            shocks: Vec::new(),
            volatility_multiplier: 1.0,
            correlation_override: None,
            custom_shock: None,
        }
    }

    /// Adds a price shock.
    #[must_use]
    pub fn with_shock(mut self, shock: MarketShock) -> Self {
        self.shocks.push(shock);
        self
    }

    /// Sets the volatility multiplier.
    #[must_use]
    pub fn with_volatility_multiplier(mut self, multiplier: f64) -> Self {
        self.volatility_multiplier = multiplier;
        self
    }

    /// Replaces every pairwise correlation for the stressed VaR.
    #[must_use]
    pub fn with_correlation_override(mut self, correlation: f64) -> Self {
        self.correlation_override = Some(correlation);
        self
    }

    /// Sets a custom per-position shock function.
    #[must_use]
    pub fn with_custom_shock(mut self, shock: fn(&Position) -> f64) -> Self {
        self.custom_shock = Some(shock);
        self
    }

    /// Validates the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] for a shock at or below
    /// -100%, a non-positive volatility multiplier, or a correlation
    /// override outside [-1, 1].
    pub fn validate(&self) -> RiskResult<()> {
        for shock in &self.shocks {
            if shock.price_change_pct <= -1.0 {
                return Err(RiskError::InvalidParameter(format!(
                    "scenario '{}': price shock must be greater than -100%, got {}",
                    self.name, shock.price_change_pct
                )));
            }
        }
        if self.volatility_multiplier <= 0.0 {
            return Err(RiskError::InvalidParameter(format!(
                "scenario '{}': volatility multiplier must be positive, got {}",
                self.name, self.volatility_multiplier
            )));
        }
        if let Some(rho) = self.correlation_override {
            if !(-1.0..=1.0).contains(&rho) {
                return Err(RiskError::InvalidParameter(format!(
                    "scenario '{}': correlation override must be in [-1, 1], got {}",
                    self.name, rho
                )));
            }
        }
        Ok(())
    }

    /// Total relative price change for a position, shocks composed
    /// multiplicatively.
    fn price_factor(&self, position: &Position) -> f64 {
        let mut factor = 1.0;
        for shock in &self.shocks {
            if shock.applies_to(position) {
                factor *= 1.0 + shock.price_change_pct;
            }
        }
        if let Some(custom) = self.custom_shock {
            factor *= 1.0 + custom(position);
        }
        factor
    }
}

/// Per-position outcome of a scenario.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionImpact {
    /// The position's asset.
    pub asset: AssetId,
    /// Value before the shock.
    pub initial_value: f64,
    /// Value after the shock.
    pub stressed_value: f64,
    /// `initial − stressed` (positive is a loss).
    pub loss: f64,
}

/// Outcome of one scenario against one portfolio.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StressTestResult {
    /// Scenario name.
    pub scenario: String,
    /// Portfolio value before the shock.
    pub initial_value: f64,
    /// Portfolio value after the shock.
    pub stressed_value: f64,
    /// Total loss (positive is a loss, negative a gain).
    pub loss: f64,
    /// Loss as a fraction of initial value.
    pub loss_pct: f64,
    /// Per-position breakdown, portfolio order.
    pub position_impacts: Vec<PositionImpact>,
    /// Parametric 1-day 99% VaR of the shocked portfolio under the
    /// scenario's volatility multiplier and correlation override, when the
    /// shocked portfolio still supports a model.
    pub stressed_var: Option<f64>,
}

/// Deterministic scenario runner.
#[derive(Debug, Clone, Default)]
pub struct StressTester {
    scenarios: Vec<StressScenario>,
}

impl StressTester {
    /// Creates a tester over a fixed scenario list.
    #[must_use]
    pub fn new(scenarios: Vec<StressScenario>) -> Self {
        Self { scenarios }
    }

    /// Creates a tester preloaded with standard historical scenarios.
    #[must_use]
    pub fn with_standard_scenarios() -> Self {
        Self::new(vec![
            StressScenario::new("black_monday_1987", "October 1987 one-day equity crash")
                .with_shock(MarketShock::new(ShockScope::All, -0.22))
                .with_volatility_multiplier(3.0)
                .with_correlation_override(0.9),
            StressScenario::new("financial_crisis_2008", "2008 peak-to-trough drawdown")
                .with_shock(MarketShock::new(ShockScope::All, -0.40))
                .with_volatility_multiplier(2.5)
                .with_correlation_override(0.8),
            StressScenario::new("covid_crash_2020", "February-March 2020 pandemic selloff")
                .with_shock(MarketShock::new(ShockScope::All, -0.30))
                .with_volatility_multiplier(2.0)
                .with_correlation_override(0.85),
            StressScenario::new("rate_shock", "parallel 300bp rate rise hitting bonds")
                .with_shock(MarketShock::new(
                    ShockScope::AssetClass("bond".to_string()),
                    -0.15,
                ))
                .with_shock(MarketShock::new(
                    ShockScope::AssetClass("equity".to_string()),
                    -0.10,
                )),
        ])
    }

    /// Adds a scenario.
    pub fn add_scenario(&mut self, scenario: StressScenario) {
        self.scenarios.push(scenario);
    }

    /// The configured scenarios.
    #[must_use]
    pub fn scenarios(&self) -> &[StressScenario] {
        &self.scenarios
    }

    /// Runs every scenario against the portfolio, in order.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidPortfolio`] for an invalid portfolio and
    /// [`RiskError::InvalidParameter`] for an invalid scenario.
    pub fn run(&self, portfolio: &Portfolio) -> RiskResult<Vec<StressTestResult>> {
        portfolio.validate()?;
        self.scenarios
            .iter()
            .map(|s| self.run_scenario(portfolio, s))
            .collect()
    }

    /// Runs a single scenario.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::run`].
    pub fn run_scenario(
        &self,
        portfolio: &Portfolio,
        scenario: &StressScenario,
    ) -> RiskResult<StressTestResult> {
        portfolio.validate()?;
        scenario.validate()?;

        let initial_value = portfolio.total_value();
        let mut shocked = portfolio.clone();
        let mut position_impacts = Vec::with_capacity(portfolio.positions.len());

        for position in &mut shocked.positions {
            let before = position.market_value();
            let factor = scenario.price_factor(position);
            position.price *= factor;
            if let Some(vol) = position.volatility {
                position.volatility = Some(vol * scenario.volatility_multiplier);
            }
            if let Some(rho) = scenario.correlation_override {
                for value in position.correlation_overrides.values_mut() {
                    *value = rho;
                }
            }
            let after = position.market_value();
            position_impacts.push(PositionImpact {
                asset: position.asset.clone(),
                initial_value: before,
                stressed_value: after,
                loss: before - after,
            });
        }

        let stressed_value = shocked.total_value();
        let loss = initial_value - stressed_value;
        let stressed_var = self.stressed_var(&shocked, scenario);

        debug!(
            scenario = %scenario.name,
            loss,
            loss_pct = loss / initial_value,
            "stress scenario evaluated"
        );

        Ok(StressTestResult {
            scenario: scenario.name.clone(),
            initial_value,
            stressed_value,
            loss,
            loss_pct: loss / initial_value,
            position_impacts,
            stressed_var,
        })
    }

    /// Parametric VaR of the shocked portfolio. Returns `None` when the
    /// shocked portfolio no longer supports a model (e.g. value wiped out).
    fn stressed_var(&self, shocked: &Portfolio, scenario: &StressScenario) -> Option<f64> {
        let mut with_correlation = shocked.clone();
        if let Some(rho) = scenario.correlation_override {
            let assets: Vec<AssetId> = with_correlation
                .positions
                .iter()
                .map(|p| p.asset.clone())
                .collect();
            for (i, position) in with_correlation.positions.iter_mut().enumerate() {
                for other in assets.iter().skip(i + 1) {
                    position.correlation_overrides.insert(other.clone(), rho);
                }
            }
        }

        let model = crate::portfolio::model::PortfolioModel::build(&with_correlation).ok()?;
        let weights = model.weights();
        let variance = crate::math::matrix::quadratic_form(weights, model.covariance()).ok()?;
        let sigma = variance.max(0.0).sqrt();
        let z = inverse_normal_cdf(1.0 - STRESSED_VAR_CONFIDENCE).ok()?;
        Some((-(z * sigma)).max(0.0) * model.total_value())
    }
}
