//! Normalized portfolio model used by all risk calculators.
//!
//! [`PortfolioModel::build`] takes a raw [`Portfolio`] snapshot and resolves
//! everything the calculators need into matrix order: normalized weights,
//! per-asset daily means and volatilities, betas, the correlation matrix and
//! the covariance matrix `cov(i,j) = ρ(i,j)·σᵢ·σⱼ`.
//!
//! The model is built fresh per evaluation call and is immutable afterwards;
//! nothing in it is cached across calls.

use crate::math::stats::{mean, std_dev};
use crate::portfolio::position::{AssetId, Portfolio};
use crate::risk::correlation::CorrelationMatrix;
use crate::types::error::{RiskError, RiskResult};
use std::collections::HashMap;

/// A portfolio resolved into the vectors and matrices used by the risk
/// calculators.
#[derive(Debug, Clone)]
pub struct PortfolioModel {
    assets: Vec<AssetId>,
    weights: Vec<f64>,
    market_values: Vec<f64>,
    total_value: f64,
    daily_means: Vec<f64>,
    daily_volatilities: Vec<f64>,
    betas: Vec<f64>,
    asset_returns: Vec<Vec<f64>>,
    correlation: CorrelationMatrix,
    covariance: Vec<Vec<f64>>,
}

impl PortfolioModel {
    /// Builds the model from a portfolio snapshot.
    ///
    /// Position weights are normalized by the weight sum so they total 1.
    /// Volatility comes from the position when provided, otherwise it is
    /// estimated from the historical return series. Correlations come from
    /// explicit pairwise overrides, then from overlapping return history,
    /// then fall back to the default (marking the matrix low-confidence).
    ///
    /// # Errors
    ///
    /// - [`RiskError::InvalidPortfolio`] when the portfolio is empty or has
    ///   non-positive total value.
    /// - [`RiskError::InsufficientData`] when a position has neither an
    ///   explicit volatility nor enough history to estimate one.
    pub fn build(portfolio: &Portfolio) -> RiskResult<Self> {
        portfolio.validate()?;

        let total_value = portfolio.total_value();
        let assets: Vec<AssetId> = portfolio.positions.iter().map(|p| p.asset.clone()).collect();
        let market_values: Vec<f64> = portfolio
            .positions
            .iter()
            .map(|p| p.market_value())
            .collect();

        // Normalize by the weight sum rather than assuming the raw weights
        // already total 1.
        let weight_sum: f64 = market_values.iter().sum();
        let weights: Vec<f64> = market_values.iter().map(|v| v / weight_sum).collect();

        let asset_returns: Vec<Vec<f64>> = portfolio
            .positions
            .iter()
            .map(|p| p.historical_returns())
            .collect();

        let mut daily_means = Vec::with_capacity(assets.len());
        let mut daily_volatilities = Vec::with_capacity(assets.len());
        let mut betas = Vec::with_capacity(assets.len());

        for (position, returns) in portfolio.positions.iter().zip(&asset_returns) {
            daily_means.push(mean(returns));
            betas.push(position.beta.unwrap_or(1.0));

            let vol = match position.volatility {
                Some(v) if v >= 0.0 => v,
                Some(v) => {
                    return Err(RiskError::InvalidParameter(format!(
                        "volatility for {} must be non-negative, got {}",
                        position.asset, v
                    )));
                }
                None => {
                    if returns.len() < 2 {
                        return Err(RiskError::InsufficientData(format!(
                            "position {} has no volatility and only {} historical returns",
                            position.asset,
                            returns.len()
                        )));
                    }
                    std_dev(returns)
                }
            };
            daily_volatilities.push(vol);
        }

        let mut overrides: HashMap<(AssetId, AssetId), f64> = HashMap::new();
        for position in &portfolio.positions {
            for (other, &rho) in &position.correlation_overrides {
                overrides.insert((position.asset.clone(), other.clone()), rho);
            }
        }

        let returns_by_asset: HashMap<AssetId, Vec<f64>> = assets
            .iter()
            .cloned()
            .zip(asset_returns.iter().cloned())
            .collect();

        let correlation =
            CorrelationMatrix::from_pairwise(assets.clone(), &overrides, &returns_by_asset)?;
        let covariance = correlation.covariance_matrix(&daily_volatilities)?;

        Ok(Self {
            assets,
            weights,
            market_values,
            total_value,
            daily_means,
            daily_volatilities,
            betas,
            asset_returns,
            correlation,
            covariance,
        })
    }

    /// Assets in matrix order.
    #[must_use]
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// Normalized weights (sum to 1), matrix order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Market values, matrix order.
    #[must_use]
    pub fn market_values(&self) -> &[f64] {
        &self.market_values
    }

    /// Total portfolio value.
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    /// Mean daily return per asset, matrix order.
    #[must_use]
    pub fn daily_means(&self) -> &[f64] {
        &self.daily_means
    }

    /// Daily volatility per asset, matrix order.
    #[must_use]
    pub fn daily_volatilities(&self) -> &[f64] {
        &self.daily_volatilities
    }

    /// Beta per asset (1.0 when unknown), matrix order.
    #[must_use]
    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    /// Historical return series per asset, matrix order.
    #[must_use]
    pub fn asset_returns(&self) -> &[Vec<f64>] {
        &self.asset_returns
    }

    /// The resolved correlation matrix.
    #[must_use]
    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    /// The covariance matrix (variance on the diagonal).
    #[must_use]
    pub fn covariance(&self) -> &[Vec<f64>] {
        &self.covariance
    }

    /// Number of assets in the model.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::position::{Position, PricePoint};

    fn history(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(i as u64, p))
            .collect()
    }

    #[test]
    fn test_build_with_explicit_volatility() {
        let portfolio = Portfolio::new(
            vec![
                Position::new(AssetId::new("A"), 10.0, 100.0).with_volatility(0.02),
                Position::new(AssetId::new("B"), 10.0, 100.0).with_volatility(0.03),
            ],
            "USD",
            0,
        );

        let model = PortfolioModel::build(&portfolio).unwrap();
        assert_eq!(model.asset_count(), 2);
        assert_eq!(model.daily_volatilities(), &[0.02, 0.03]);
        assert!((model.weights().iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // Variance on the diagonal.
        assert!((model.covariance()[0][0] - 0.0004).abs() < 1e-12);
        assert!((model.covariance()[1][1] - 0.0009).abs() < 1e-12);
    }

    #[test]
    fn test_build_estimates_volatility_from_history() {
        let prices: Vec<f64> = (0..50)
            .map(|i| 100.0 * (1.0 + 0.01 * (i as f64 * 0.9).sin()))
            .collect();
        let portfolio = Portfolio::new(
            vec![Position::new(AssetId::new("A"), 1.0, 100.0).with_history(history(&prices))],
            "USD",
            0,
        );

        let model = PortfolioModel::build(&portfolio).unwrap();
        assert!(model.daily_volatilities()[0] > 0.0);
    }

    #[test]
    fn test_build_requires_volatility_or_history() {
        let portfolio = Portfolio::new(
            vec![Position::new(AssetId::new("A"), 1.0, 100.0)],
            "USD",
            0,
        );
        assert!(matches!(
            PortfolioModel::build(&portfolio),
            Err(RiskError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_build_rejects_negative_volatility() {
        let portfolio = Portfolio::new(
            vec![Position::new(AssetId::new("A"), 1.0, 100.0).with_volatility(-0.1)],
            "USD",
            0,
        );
        assert!(matches!(
            PortfolioModel::build(&portfolio),
            Err(RiskError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_correlation_override_applied_to_covariance() {
        let a = AssetId::new("A");
        let b = AssetId::new("B");
        let portfolio = Portfolio::new(
            vec![
                Position::new(a.clone(), 10.0, 100.0)
                    .with_volatility(0.1)
                    .with_correlation(b.clone(), 1.0),
                Position::new(b.clone(), 10.0, 100.0).with_volatility(0.2),
            ],
            "USD",
            0,
        );

        let model = PortfolioModel::build(&portfolio).unwrap();
        assert_eq!(model.correlation().get_correlation(&a, &b), Some(1.0));
        // cov = 1.0 * 0.1 * 0.2
        assert!((model.covariance()[0][1] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_default_beta_is_one() {
        let portfolio = Portfolio::new(
            vec![
                Position::new(AssetId::new("A"), 1.0, 100.0).with_volatility(0.1),
                Position::new(AssetId::new("B"), 1.0, 100.0)
                    .with_volatility(0.1)
                    .with_beta(1.4),
            ],
            "USD",
            0,
        );
        let model = PortfolioModel::build(&portfolio).unwrap();
        assert_eq!(model.betas(), &[1.0, 1.4]);
    }

    #[test]
    fn test_short_history_marks_low_confidence() {
        let portfolio = Portfolio::new(
            vec![
                Position::new(AssetId::new("A"), 1.0, 100.0)
                    .with_volatility(0.1)
                    .with_history(history(&[100.0, 101.0, 102.0])),
                Position::new(AssetId::new("B"), 1.0, 100.0)
                    .with_volatility(0.1)
                    .with_history(history(&[100.0, 99.0, 98.0])),
            ],
            "USD",
            0,
        );
        let model = PortfolioModel::build(&portfolio).unwrap();
        assert!(model.correlation().is_low_confidence());
    }
}
