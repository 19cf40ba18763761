//! Correlated Monte Carlo path simulation.
//!
//! The simulator draws independent standard-normal vectors per time step
//! (Box–Muller), correlates them through the Cholesky lower factor of the
//! correlation matrix, applies per-step returns
//! `rᵢ = μᵢ·dt + σᵢ·√dt·(L·Z)ᵢ` with `dt = horizon / time_steps` (in days),
//! and accumulates multiplicative price paths into terminal portfolio-value
//! scenarios.
//!
//! Each path owns an independent generator seeded as `base_seed + path
//! index`, so a seeded run is bit-for-bit reproducible regardless of the
//! order paths are executed in. Cancellation is checked between path
//! batches; a cancelled run discards all partial results.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, PortfolioModel, Position};
//! use portfolio_risk_rs::simulation::{MonteCarloSimulator, SimulationConfig};
//!
//! let portfolio = Portfolio::new(
//!     vec![Position::new(AssetId::new("AAPL"), 10.0, 100.0).with_volatility(0.02)],
//!     "USD",
//!     0,
//! );
//! let model = PortfolioModel::build(&portfolio).unwrap();
//!
//! let config = SimulationConfig {
//!     simulations: 1_000,
//!     seed: Some(7),
//!     ..SimulationConfig::default()
//! };
//! let simulator = MonteCarloSimulator::new(config).unwrap();
//! let scenarios = simulator.simulate(&model).unwrap();
//! assert_eq!(scenarios.len(), 1_000);
//! ```

use crate::math::matrix::cholesky_lower;
use crate::portfolio::model::PortfolioModel;
use crate::simulation::rng::{Lcg64, entropy_seed};
use crate::types::error::{RiskError, RiskResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooperative cancellation signal for long simulation runs.
///
/// Cloning the token shares the underlying flag, so a caller can hand one
/// clone to the simulator and keep another to trigger cancellation from a
/// timeout watchdog or user action.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Monte Carlo run configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Total number of scenarios to produce. With antithetic variates
    /// enabled each mirrored pair counts as two.
    pub simulations: usize,
    /// Time increments per path.
    pub time_steps: usize,
    /// Horizon in days.
    pub horizon_days: u32,
    /// Base seed; `None` draws one from system entropy.
    pub seed: Option<u64>,
    /// Mirror each draw (`2·initial − terminal`) to halve variance.
    pub antithetic: bool,
    /// Paths per batch between cancellation checks.
    pub batch_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulations: 10_000,
            time_steps: 1,
            horizon_days: 1,
            seed: None,
            antithetic: false,
            batch_size: 1_000,
        }
    }
}

impl SimulationConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] for zero simulations, zero
    /// time steps, a zero horizon, a zero batch size, or an odd simulation
    /// count with antithetic variates enabled.
    pub fn validate(&self) -> RiskResult<()> {
        if self.simulations == 0 {
            return Err(RiskError::InvalidParameter(
                "simulations must be positive".to_string(),
            ));
        }
        if self.time_steps == 0 {
            return Err(RiskError::InvalidParameter(
                "time_steps must be positive".to_string(),
            ));
        }
        if self.horizon_days == 0 {
            return Err(RiskError::InvalidParameter(
                "horizon_days must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RiskError::InvalidParameter(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.antithetic && self.simulations % 2 != 0 {
            return Err(RiskError::InvalidParameter(
                "antithetic mode requires an even simulation count".to_string(),
            ));
        }
        Ok(())
    }
}

/// One Monte Carlo draw: a terminal portfolio state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scenario {
    /// Probability weight (`1 / simulations`).
    pub probability: f64,
    /// Terminal portfolio value.
    pub value: f64,
    /// Loss relative to the initial value (`initial − value`).
    pub loss: f64,
    /// Per-position value change, matrix order.
    pub position_changes: Vec<f64>,
}

/// Cholesky-based correlated path generator.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: SimulationConfig,
}

impl MonteCarloSimulator {
    /// Creates a simulator with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when the configuration is
    /// invalid.
    pub fn new(config: SimulationConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The simulator configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Runs the full scenario set without a cancellation signal.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::NumericalInstability`] when the correlation
    /// matrix is not positive-definite.
    pub fn simulate(&self, model: &PortfolioModel) -> RiskResult<Vec<Scenario>> {
        self.simulate_with_cancellation(model, &CancellationToken::new())
    }

    /// Runs the full scenario set, checking `token` between path batches.
    ///
    /// # Errors
    ///
    /// - [`RiskError::NumericalInstability`] when the correlation matrix is
    ///   not positive-definite.
    /// - [`RiskError::Cancelled`] when the token fires; no partial scenario
    ///   set is returned.
    pub fn simulate_with_cancellation(
        &self,
        model: &PortfolioModel,
        token: &CancellationToken,
    ) -> RiskResult<Vec<Scenario>> {
        let lower = cholesky_lower(&model.correlation().to_matrix())?;

        let n_assets = model.asset_count();
        let dt = f64::from(self.config.horizon_days) / self.config.time_steps as f64;
        let sqrt_dt = dt.sqrt();
        let base_seed = self.config.seed.unwrap_or_else(entropy_seed);

        let initial_values = model.market_values();
        let initial_total = model.total_value();

        let paths = if self.config.antithetic {
            self.config.simulations / 2
        } else {
            self.config.simulations
        };
        let probability = 1.0 / self.config.simulations as f64;

        let mut scenarios = Vec::with_capacity(self.config.simulations);
        let mut z = vec![0.0; n_assets];
        let mut factors = vec![0.0; n_assets];

        let mut path = 0usize;
        while path < paths {
            if token.is_cancelled() {
                debug!(completed = path, total = paths, "simulation cancelled");
                return Err(RiskError::Cancelled(format!(
                    "Monte Carlo run cancelled after {} of {} paths",
                    path, paths
                )));
            }

            let batch_end = (path + self.config.batch_size).min(paths);
            for p in path..batch_end {
                let mut rng = Lcg64::new(base_seed.wrapping_add(p as u64));
                factors.iter_mut().for_each(|f| *f = 1.0);

                for _ in 0..self.config.time_steps {
                    rng.fill_standard_normal(&mut z);
                    for i in 0..n_assets {
                        // Correlated shock (L·Z)ᵢ: lower-triangular row dot Z.
                        let mut shock = 0.0;
                        for k in 0..=i {
                            shock += lower[i][k] * z[k];
                        }
                        let step_return =
                            model.daily_means()[i] * dt + model.daily_volatilities()[i] * sqrt_dt * shock;
                        factors[i] *= 1.0 + step_return;
                    }
                }

                let position_changes: Vec<f64> = initial_values
                    .iter()
                    .zip(&factors)
                    .map(|(v, f)| v * (f - 1.0))
                    .collect();
                let terminal = initial_total + position_changes.iter().sum::<f64>();

                scenarios.push(Scenario {
                    probability,
                    value: terminal,
                    loss: initial_total - terminal,
                    position_changes: position_changes.clone(),
                });

                if self.config.antithetic {
                    let mirrored = 2.0 * initial_total - terminal;
                    scenarios.push(Scenario {
                        probability,
                        value: mirrored,
                        loss: initial_total - mirrored,
                        position_changes: position_changes.iter().map(|c| -c).collect(),
                    });
                }
            }
            path = batch_end;
        }

        debug!(
            scenarios = scenarios.len(),
            seed = base_seed,
            "simulation complete"
        );
        Ok(scenarios)
    }
}
