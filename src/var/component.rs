//! Component and marginal VaR decomposition.
//!
//! Marginal VaR is the sensitivity of portfolio VaR to a position's weight;
//! component VaR is the position's weight times its marginal, an Euler
//! allocation of the total. Because parametric VaR is homogeneous of degree
//! one in the weights, the parametric components sum to the total exactly.
//!
//! For Monte Carlo VaR no closed form exists, so the allocator uses a
//! finite difference: bump each position's quantity by 1%, re-run the
//! simulation with the same seed, and divide the VaR change by the bump.
//! The residual between the component sum and the total is reported as a
//! diagnostic.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, PortfolioModel, Position};
//! use portfolio_risk_rs::var::ComponentRiskAllocator;
//!
//! let portfolio = Portfolio::new(
//!     vec![
//!         Position::new(AssetId::new("AAPL"), 100.0, 100.0).with_volatility(0.02),
//!         Position::new(AssetId::new("MSFT"), 50.0, 200.0).with_volatility(0.03),
//!     ],
//!     "USD",
//!     0,
//! );
//! let model = PortfolioModel::build(&portfolio).unwrap();
//!
//! let allocator = ComponentRiskAllocator::new(0.95, 1).unwrap();
//! let decomposition = allocator.parametric(&model).unwrap();
//!
//! let sum: f64 = decomposition.components.iter().map(|c| c.component_var).sum();
//! assert!((sum - decomposition.total_var).abs() < 1e-9);
//! ```

use crate::math::matrix::{mat_vec, quadratic_form};
use crate::math::stats::inverse_normal_cdf;
use crate::portfolio::model::PortfolioModel;
use crate::portfolio::position::{AssetId, Portfolio};
use crate::simulation::monte_carlo::{MonteCarloSimulator, SimulationConfig};
use crate::simulation::rng::entropy_seed;
use crate::types::error::{RiskError, RiskResult};
use crate::var::engine::{VaRMethod, ValueAtRiskEngine};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative quantity bump for the finite-difference allocation.
const QUANTITY_BUMP: f64 = 0.01;

/// One position's share of portfolio VaR.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentVaR {
    /// The position's asset.
    pub asset: AssetId,
    /// Normalized portfolio weight.
    pub weight: f64,
    /// Sensitivity of total VaR to this position's weight.
    pub marginal_var: f64,
    /// Euler allocation `weight × marginal`.
    pub component_var: f64,
    /// Share of total VaR (`component / total`), 0 when total is 0.
    pub contribution_pct: f64,
}

/// A full VaR decomposition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentVaRResult {
    /// Method used for the underlying VaR.
    pub method: VaRMethod,
    /// Total portfolio VaR being decomposed.
    pub total_var: f64,
    /// Per-position allocations, matrix order.
    pub components: Vec<ComponentVaR>,
    /// `total_var − Σ component_var`. Exactly zero for the parametric
    /// method; a finite-difference diagnostic for Monte Carlo.
    pub residual: f64,
}

/// Euler allocator for component and marginal VaR.
#[derive(Debug, Clone)]
pub struct ComponentRiskAllocator {
    confidence: f64,
    horizon_days: u32,
}

impl ComponentRiskAllocator {
    /// Creates an allocator.
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
        })
    }

    /// Closed-form parametric decomposition.
    ///
    /// Uses the gradient `∂σ/∂wᵢ = (Σw)ᵢ / σ` of portfolio volatility, so
    /// the components sum to the parametric total exactly.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::NumericalInstability`] when portfolio volatility
    /// is zero (the gradient is undefined).
    pub fn parametric(&self, model: &PortfolioModel) -> RiskResult<ComponentVaRResult> {
        let weights = model.weights();
        let variance = quadratic_form(weights, model.covariance())?;
        let sigma = variance.max(0.0).sqrt();
        if sigma <= 0.0 {
            return Err(RiskError::NumericalInstability(
                "component VaR is undefined for a zero-volatility portfolio".to_string(),
            ));
        }

        let horizon = f64::from(self.horizon_days);
        let z = inverse_normal_cdf(1.0 - self.confidence)?;
        let total = model.total_value();

        // ∂σ/∂wᵢ = (Σw)ᵢ / σ
        let sigma_w = mat_vec(model.covariance(), weights)?;

        let mut components = Vec::with_capacity(weights.len());
        let mut component_sum = 0.0;
        for (i, asset) in model.assets().iter().enumerate() {
            let marginal_return =
                -(model.daily_means()[i] * horizon + z * horizon.sqrt() * sigma_w[i] / sigma);
            let marginal_var = marginal_return * total;
            let component_var = weights[i] * marginal_var;
            component_sum += component_var;
            components.push(ComponentVaR {
                asset: asset.clone(),
                weight: weights[i],
                marginal_var,
                component_var,
                contribution_pct: 0.0,
            });
        }

        let total_var = component_sum.max(0.0);
        for c in &mut components {
            c.contribution_pct = if total_var > 0.0 {
                c.component_var / total_var
            } else {
                0.0
            };
        }

        Ok(ComponentVaRResult {
            method: VaRMethod::Parametric,
            total_var,
            components,
            residual: total_var - component_sum,
        })
    }

    /// Finite-difference decomposition of Monte Carlo VaR.
    ///
    /// Each position's quantity is bumped by 1% and the simulation re-run
    /// with the same seed, so the difference isolates the position change
    /// from sampling noise. When the simulator has no fixed seed one is
    /// drawn once and shared across all runs.
    ///
    /// # Errors
    ///
    /// Propagates portfolio, model and simulation errors.
    pub fn monte_carlo(
        &self,
        portfolio: &Portfolio,
        simulator: &MonteCarloSimulator,
    ) -> RiskResult<ComponentVaRResult> {
        let config = SimulationConfig {
            seed: Some(simulator.config().seed.unwrap_or_else(entropy_seed)),
            horizon_days: self.horizon_days,
            ..simulator.config().clone()
        };
        let seeded = MonteCarloSimulator::new(config)?;
        let engine = ValueAtRiskEngine::new(self.confidence, self.horizon_days)?;

        let base_model = PortfolioModel::build(portfolio)?;
        let base_var = engine.monte_carlo(&base_model, &seeded)?.value;

        let mut components = Vec::with_capacity(portfolio.positions.len());
        let mut component_sum = 0.0;
        for (i, position) in portfolio.positions.iter().enumerate() {
            let mut bumped = portfolio.clone();
            bumped.positions[i].quantity *= 1.0 + QUANTITY_BUMP;

            let bumped_model = PortfolioModel::build(&bumped)?;
            let bumped_var = engine.monte_carlo(&bumped_model, &seeded)?.value;

            // VaR is close to homogeneous of degree one in position size,
            // so the scaled difference approximates the Euler allocation.
            let component_var = (bumped_var - base_var) / QUANTITY_BUMP;
            let weight = base_model.weights()[i];
            let marginal_var = if weight > 0.0 {
                component_var / weight
            } else {
                0.0
            };
            component_sum += component_var;
            components.push(ComponentVaR {
                asset: position.asset.clone(),
                weight,
                marginal_var,
                component_var,
                contribution_pct: 0.0,
            });
        }

        for c in &mut components {
            c.contribution_pct = if base_var > 0.0 {
                c.component_var / base_var
            } else {
                0.0
            };
        }

        Ok(ComponentVaRResult {
            method: VaRMethod::MonteCarlo,
            total_var: base_var,
            components,
            residual: base_var - component_sum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::position::Position;

    fn two_asset_portfolio() -> Portfolio {
        let b = AssetId::new("B");
        Portfolio::new(
            vec![
                Position::new(AssetId::new("A"), 100.0, 100.0)
                    .with_volatility(0.02)
                    .with_correlation(b.clone(), 0.3),
                Position::new(b, 50.0, 200.0).with_volatility(0.03),
            ],
            "USD",
            0,
        )
    }

    #[test]
    fn test_validates_parameters() {
        assert!(ComponentRiskAllocator::new(0.0, 1).is_err());
        assert!(ComponentRiskAllocator::new(0.95, 0).is_err());
        assert!(ComponentRiskAllocator::new(0.95, 1).is_ok());
    }

    #[test]
    fn test_parametric_components_sum_to_total() {
        let model = PortfolioModel::build(&two_asset_portfolio()).unwrap();
        let allocator = ComponentRiskAllocator::new(0.95, 1).unwrap();
        let result = allocator.parametric(&model).unwrap();

        let sum: f64 = result.components.iter().map(|c| c.component_var).sum();
        assert!((sum - result.total_var).abs() < 1e-9);
        assert!(result.residual.abs() < 1e-9);

        let pct_sum: f64 = result.components.iter().map(|c| c.contribution_pct).sum();
        assert!((pct_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parametric_matches_engine_total() {
        let model = PortfolioModel::build(&two_asset_portfolio()).unwrap();
        let allocator = ComponentRiskAllocator::new(0.95, 10).unwrap();
        let engine = ValueAtRiskEngine::new(0.95, 10).unwrap();

        let decomposition = allocator.parametric(&model).unwrap();
        let total = engine.parametric(&model).unwrap();
        assert!((decomposition.total_var - total.value).abs() < 1e-9);
    }

    #[test]
    fn test_riskier_position_contributes_more() {
        // Equal market values; B has higher volatility.
        let portfolio = Portfolio::new(
            vec![
                Position::new(AssetId::new("A"), 100.0, 100.0).with_volatility(0.01),
                Position::new(AssetId::new("B"), 100.0, 100.0).with_volatility(0.04),
            ],
            "USD",
            0,
        );
        let model = PortfolioModel::build(&portfolio).unwrap();
        let result = ComponentRiskAllocator::new(0.95, 1)
            .unwrap()
            .parametric(&model)
            .unwrap();
        assert!(result.components[1].component_var > result.components[0].component_var);
    }

    #[test]
    fn test_zero_volatility_rejected() {
        let portfolio = Portfolio::new(
            vec![Position::new(AssetId::new("A"), 1.0, 100.0).with_volatility(0.0)],
            "USD",
            0,
        );
        let model = PortfolioModel::build(&portfolio).unwrap();
        let allocator = ComponentRiskAllocator::new(0.95, 1).unwrap();
        assert!(matches!(
            allocator.parametric(&model),
            Err(RiskError::NumericalInstability(_))
        ));
    }

    #[test]
    fn test_monte_carlo_components_approximate_total() {
        let portfolio = two_asset_portfolio();
        let config = SimulationConfig {
            simulations: 20_000,
            seed: Some(17),
            ..SimulationConfig::default()
        };
        let simulator = MonteCarloSimulator::new(config).unwrap();

        let result = ComponentRiskAllocator::new(0.95, 1)
            .unwrap()
            .monte_carlo(&portfolio, &simulator)
            .unwrap();

        let sum: f64 = result.components.iter().map(|c| c.component_var).sum();
        let rel = (sum - result.total_var).abs() / result.total_var;
        assert!(rel < 0.05, "relative residual {}", rel);
        assert!((result.residual - (result.total_var - sum)).abs() < 1e-9);
    }
}
