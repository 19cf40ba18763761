//! The top-level risk engine facade.
//!
//! [`RiskEngine`] wires the calculators, the VaR and expected-shortfall
//! engines, the Monte Carlo simulator, the stress tester and the alert
//! manager into a single evaluation entry point. One call to
//! [`RiskEngine::evaluate`] produces a [`RiskReport`]: a full
//! [`RiskMetrics`] snapshot plus any alerts the snapshot raised against the
//! configured limits.
//!
//! The engine is constructed explicitly from a [`RiskEngineConfig`]; there
//! is no global instance, and concurrent evaluations can run on independent
//! engines.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::engine::{RiskEngine, RiskEngineConfig};
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, Position};
//! use portfolio_risk_rs::simulation::SimulationConfig;
//!
//! let portfolio = Portfolio::new(
//!     vec![
//!         Position::new(AssetId::new("AAPL"), 100.0, 180.0).with_volatility(0.02),
//!         Position::new(AssetId::new("MSFT"), 50.0, 400.0).with_volatility(0.018),
//!     ],
//!     "USD",
//!     1_700_000_000_000,
//! );
//!
//! let config = RiskEngineConfig {
//!     simulation: SimulationConfig {
//!         simulations: 2_000,
//!         seed: Some(42),
//!         ..SimulationConfig::default()
//!     },
//!     ..RiskEngineConfig::default()
//! };
//! let mut engine = RiskEngine::new(config).unwrap();
//!
//! let report = engine.evaluate(&portfolio).unwrap();
//! assert!(report.metrics.var.value > 0.0);
//! assert!(report.metrics.expected_shortfall.unwrap().value >= report.metrics.var.value);
//! ```

use crate::portfolio::model::PortfolioModel;
use crate::portfolio::position::{AssetId, Portfolio};
use crate::risk::alerts::{RiskAlert, RiskAlertManager};
use crate::risk::limits::RiskLimits;
use crate::risk::metrics::RiskCalculator;
use crate::simulation::monte_carlo::{CancellationToken, MonteCarloSimulator, SimulationConfig};
use crate::stress::{StressTestResult, StressTester};
use crate::types::error::RiskResult;
use crate::var::component::{ComponentRiskAllocator, ComponentVaRResult};
use crate::var::engine::{VaRMethod, VaRResult, ValueAtRiskEngine};
use crate::var::shortfall::{ESResult, ExpectedShortfallEngine};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskEngineConfig {
    /// Confidence level for VaR and expected shortfall.
    pub confidence: f64,
    /// Horizon in days for VaR and expected shortfall.
    pub horizon_days: u32,
    /// Primary VaR method reported in the metrics snapshot.
    pub var_method: VaRMethod,
    /// Annualized risk-free rate for Sharpe and Sortino ratios.
    pub risk_free_rate: f64,
    /// Monte Carlo configuration shared by ES and Monte Carlo VaR.
    pub simulation: SimulationConfig,
    /// Limits checked after every evaluation.
    pub limits: RiskLimits,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            horizon_days: 1,
            var_method: VaRMethod::Parametric,
            risk_free_rate: 0.0,
            simulation: SimulationConfig::default(),
            limits: RiskLimits::none(),
        }
    }
}

/// A complete metrics snapshot for one portfolio evaluation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskMetrics {
    /// Portfolio snapshot timestamp in milliseconds.
    pub timestamp: u64,
    /// Total portfolio value.
    pub total_value: f64,
    /// Daily portfolio volatility.
    pub volatility: f64,
    /// Weighted portfolio beta.
    pub beta: f64,
    /// Annualized Sharpe ratio (0 when history is too short).
    pub sharpe_ratio: f64,
    /// Annualized Sortino ratio (0 when history is too short).
    pub sortino_ratio: f64,
    /// Maximum peak-to-trough drawdown over the available history.
    pub max_drawdown: f64,
    /// Drawdown from the running peak at the end of the history.
    pub current_drawdown: f64,
    /// Gross exposure divided by net value.
    pub leverage: f64,
    /// Per-asset portfolio weights by absolute exposure.
    pub concentrations: Vec<(AssetId, f64)>,
    /// True when the correlation matrix fell back to defaults anywhere.
    pub correlation_low_confidence: bool,
    /// VaR estimate for the configured method, confidence and horizon.
    pub var: VaRResult,
    /// Expected shortfall over the shared Monte Carlo scenario set.
    pub expected_shortfall: Option<ESResult>,
    /// Component VaR decomposition.
    pub component_var: Option<ComponentVaRResult>,
    /// Stress test results, scenario order.
    pub stress_results: Vec<StressTestResult>,
}

/// Metrics plus the alerts the evaluation raised.
#[derive(Debug, Clone)]
pub struct RiskReport {
    /// The metrics snapshot.
    pub metrics: RiskMetrics,
    /// Alerts raised against the configured limits.
    pub alerts: Vec<RiskAlert>,
}

/// Top-level evaluation facade.
#[derive(Debug)]
pub struct RiskEngine {
    config: RiskEngineConfig,
    calculator: RiskCalculator,
    var_engine: ValueAtRiskEngine,
    es_engine: ExpectedShortfallEngine,
    allocator: ComponentRiskAllocator,
    simulator: MonteCarloSimulator,
    stress_tester: StressTester,
    alert_manager: RiskAlertManager,
}

impl RiskEngine {
    /// Creates an engine with the standard stress scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`crate::types::RiskError::InvalidParameter`] when the
    /// confidence, horizon or simulation configuration is invalid.
    pub fn new(config: RiskEngineConfig) -> RiskResult<Self> {
        Self::with_stress_tester(config, StressTester::with_standard_scenarios())
    }

    /// Creates an engine with a custom stress scenario set.
    ///
    /// # Errors
    ///
    /// Same validation as [`Self::new`].
    pub fn with_stress_tester(
        config: RiskEngineConfig,
        stress_tester: StressTester,
    ) -> RiskResult<Self> {
        let calculator = RiskCalculator::new(config.risk_free_rate);
        let var_engine = ValueAtRiskEngine::with_calculator(
            config.confidence,
            config.horizon_days,
            calculator.clone(),
        )?;
        let es_engine = ExpectedShortfallEngine::new(config.confidence, config.horizon_days)?;
        let allocator = ComponentRiskAllocator::new(config.confidence, config.horizon_days)?;
        let simulator = MonteCarloSimulator::new(SimulationConfig {
            horizon_days: config.horizon_days,
            ..config.simulation.clone()
        })?;

        Ok(Self {
            config,
            calculator,
            var_engine,
            es_engine,
            allocator,
            simulator,
            stress_tester,
            alert_manager: RiskAlertManager::new(),
        })
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &RiskEngineConfig {
        &self.config
    }

    /// The alert manager, holding the full alert history.
    #[must_use]
    pub fn alert_manager(&self) -> &RiskAlertManager {
        &self.alert_manager
    }

    /// Mutable access to the alert manager, for acknowledgment and sinks.
    pub fn alert_manager_mut(&mut self) -> &mut RiskAlertManager {
        &mut self.alert_manager
    }

    /// Evaluates a portfolio snapshot.
    ///
    /// # Errors
    ///
    /// Propagates portfolio validation, model construction and simulation
    /// errors.
    pub fn evaluate(&mut self, portfolio: &Portfolio) -> RiskResult<RiskReport> {
        self.evaluate_with_cancellation(portfolio, &CancellationToken::new())
    }

    /// Evaluates a portfolio snapshot, checking `token` during simulation.
    ///
    /// # Errors
    ///
    /// In addition to [`Self::evaluate`]'s errors, returns
    /// [`crate::types::RiskError::Cancelled`] when the token fires.
    pub fn evaluate_with_cancellation(
        &mut self,
        portfolio: &Portfolio,
        token: &CancellationToken,
    ) -> RiskResult<RiskReport> {
        let model = PortfolioModel::build(portfolio)?;

        let volatility = self.calculator.portfolio_volatility(&model)?;
        let beta = self.calculator.portfolio_beta(&model);

        let daily_returns = self.calculator.historical_portfolio_returns(&model, 1);
        let sharpe_ratio = self.calculator.sharpe_ratio(&daily_returns);
        let sortino_ratio = self.calculator.sortino_ratio(&daily_returns);
        let drawdown = self.calculator.drawdown(&daily_returns);

        let scenarios = self.simulator.simulate_with_cancellation(&model, token)?;

        let var = match self.config.var_method {
            VaRMethod::Parametric => self.var_engine.parametric(&model)?,
            VaRMethod::Historical => self.var_engine.historical(&model)?,
            VaRMethod::MonteCarlo => self.var_engine.monte_carlo_from_scenarios(&model, &scenarios)?,
        };
        let expected_shortfall = Some(self.es_engine.from_scenarios(&model, &scenarios)?);

        let component_var = match self.config.var_method {
            VaRMethod::MonteCarlo => self.allocator.monte_carlo(portfolio, &self.simulator).ok(),
            _ => self.allocator.parametric(&model).ok(),
        };

        let stress_results = self.stress_tester.run(portfolio)?;

        let gross: f64 = portfolio
            .positions
            .iter()
            .map(|p| p.market_value().abs())
            .sum();
        let total_value = model.total_value();
        let concentrations: Vec<(AssetId, f64)> = portfolio
            .positions
            .iter()
            .map(|p| (p.asset.clone(), p.market_value().abs() / gross))
            .collect();

        let metrics = RiskMetrics {
            timestamp: portfolio.last_updated,
            total_value,
            volatility,
            beta,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown: drawdown.max_drawdown,
            current_drawdown: drawdown.current_drawdown,
            leverage: gross / total_value,
            concentrations,
            correlation_low_confidence: model.correlation().is_low_confidence(),
            var,
            expected_shortfall,
            component_var,
            stress_results,
        };

        let alerts = self.alert_manager.evaluate(&metrics, &self.config.limits);
        debug!(
            total_value = metrics.total_value,
            var = metrics.var.value,
            alerts = alerts.len(),
            "portfolio evaluated"
        );

        Ok(RiskReport { metrics, alerts })
    }
}
