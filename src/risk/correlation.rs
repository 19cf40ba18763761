//! Symmetric correlation matrix with validation.
//!
//! Stores pairwise correlations for the portfolio's assets using only the
//! upper triangle of the matrix.
//!
//! # Invariants
//!
//! - Diagonal elements are always 1.0 (self-correlation)
//! - Off-diagonal elements are in range \[-1, 1\]
//! - Matrix is symmetric: ρ(A,B) = ρ(B,A)
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::AssetId;
//! use portfolio_risk_rs::risk::CorrelationMatrix;
//!
//! let aapl = AssetId::new("AAPL");
//! let msft = AssetId::new("MSFT");
//!
//! let mut matrix = CorrelationMatrix::identity(vec![aapl.clone(), msft.clone()]);
//! matrix.set_correlation(&aapl, &msft, 0.8).unwrap();
//!
//! assert_eq!(matrix.get_correlation(&aapl, &msft), Some(0.8));
//! assert_eq!(matrix.get_correlation(&msft, &aapl), Some(0.8));
//! assert_eq!(matrix.get_correlation(&aapl, &aapl), Some(1.0));
//! ```

use crate::math::stats::pearson_correlation;
use crate::portfolio::position::AssetId;
use crate::types::error::{RiskError, RiskResult};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum overlapping return observations for a pairwise estimate.
pub const MIN_CORRELATION_OBSERVATIONS: usize = 30;

/// Fallback correlation used when a pair has too little overlapping history.
pub const DEFAULT_CORRELATION: f64 = 0.5;

/// Symmetric correlation matrix for the portfolio's assets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelationMatrix {
    /// Assets in matrix order.
    assets: Vec<AssetId>,
    /// Flat upper triangle (including diagonal).
    /// Index formula: i * n - i * (i + 1) / 2 + j for i <= j.
    correlations: Vec<f64>,
    /// True when at least one entry fell back to [`DEFAULT_CORRELATION`]
    /// because of insufficient overlapping history.
    low_confidence: bool,
}

impl CorrelationMatrix {
    /// Creates an identity matrix: self-correlations 1.0, cross-correlations 0.0.
    #[must_use]
    pub fn identity(assets: Vec<AssetId>) -> Self {
        let n = assets.len();
        let size = n * (n + 1) / 2;
        let mut correlations = vec![0.0; size];
        for i in 0..n {
            correlations[Self::index_for(i, i, n)] = 1.0;
        }
        Self {
            assets,
            correlations,
            low_confidence: false,
        }
    }

    /// Builds a matrix from pairwise overrides and historical return series.
    ///
    /// For each asset pair, the explicit override wins when present;
    /// otherwise the correlation is estimated from the overlapping tail of
    /// the two return series. Pairs with fewer than
    /// [`MIN_CORRELATION_OBSERVATIONS`] overlapping observations fall back
    /// to [`DEFAULT_CORRELATION`] and mark the matrix low-confidence.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when an override is outside
    /// \[-1, 1\].
    pub fn from_pairwise(
        assets: Vec<AssetId>,
        overrides: &HashMap<(AssetId, AssetId), f64>,
        returns: &HashMap<AssetId, Vec<f64>>,
    ) -> RiskResult<Self> {
        let mut matrix = Self::identity(assets.clone());

        for i in 0..assets.len() {
            for j in (i + 1)..assets.len() {
                let a = &assets[i];
                let b = &assets[j];

                let rho = if let Some(&r) = overrides
                    .get(&(a.clone(), b.clone()))
                    .or_else(|| overrides.get(&(b.clone(), a.clone())))
                {
                    if !(-1.0..=1.0).contains(&r) {
                        return Err(RiskError::InvalidParameter(format!(
                            "correlation override for ({}, {}) must be in [-1, 1], got {}",
                            a, b, r
                        )));
                    }
                    r
                } else {
                    let ra = returns.get(a).map(Vec::as_slice).unwrap_or(&[]);
                    let rb = returns.get(b).map(Vec::as_slice).unwrap_or(&[]);
                    let overlap = ra.len().min(rb.len());
                    if overlap < MIN_CORRELATION_OBSERVATIONS {
                        matrix.low_confidence = true;
                        DEFAULT_CORRELATION
                    } else {
                        // Align by the most recent `overlap` observations.
                        pearson_correlation(&ra[ra.len() - overlap..], &rb[rb.len() - overlap..])
                    }
                };

                matrix.set_correlation(a, b, rho)?;
            }
        }

        Ok(matrix)
    }

    /// Returns the number of assets.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Returns the assets in matrix order.
    #[must_use]
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// True when any entry fell back to the default correlation.
    #[must_use]
    pub fn is_low_confidence(&self) -> bool {
        self.low_confidence
    }

    fn index_for(i: usize, j: usize, n: usize) -> usize {
        let (row, col) = if i <= j { (i, j) } else { (j, i) };
        row * n - row * (row + 1) / 2 + col
    }

    fn asset_index(&self, asset: &AssetId) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// Gets the correlation between two assets, or `None` when either asset
    /// is not in the matrix.
    #[must_use]
    pub fn get_correlation(&self, asset1: &AssetId, asset2: &AssetId) -> Option<f64> {
        let i = self.asset_index(asset1)?;
        let j = self.asset_index(asset2)?;
        Some(self.correlations[Self::index_for(i, j, self.assets.len())])
    }

    /// Sets the correlation between two assets.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] if either asset is unknown,
    /// the value is outside \[-1, 1\], or a self-correlation is set to a
    /// value other than 1.0.
    pub fn set_correlation(
        &mut self,
        asset1: &AssetId,
        asset2: &AssetId,
        correlation: f64,
    ) -> RiskResult<()> {
        if !(-1.0..=1.0).contains(&correlation) {
            return Err(RiskError::InvalidParameter(format!(
                "correlation must be in [-1, 1], got {}",
                correlation
            )));
        }

        let i = self.asset_index(asset1).ok_or_else(|| {
            RiskError::InvalidParameter(format!("asset {} not in matrix", asset1))
        })?;
        let j = self.asset_index(asset2).ok_or_else(|| {
            RiskError::InvalidParameter(format!("asset {} not in matrix", asset2))
        })?;

        if i == j && correlation != 1.0 {
            return Err(RiskError::InvalidParameter(
                "self-correlation must be 1.0".to_string(),
            ));
        }

        self.correlations[Self::index_for(i, j, self.assets.len())] = correlation;
        Ok(())
    }

    /// Validates the matrix invariants (unit diagonal, entries in \[-1, 1\]).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let n = self.assets.len();
        for i in 0..n {
            for j in i..n {
                let corr = self.correlations[Self::index_for(i, j, n)];
                if i == j {
                    if corr != 1.0 {
                        return false;
                    }
                } else if !(-1.0..=1.0).contains(&corr) {
                    return false;
                }
            }
        }
        true
    }

    /// Exports the matrix as a dense 2D vector.
    #[must_use]
    pub fn to_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.assets.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.correlations[Self::index_for(i, j, n)];
            }
        }
        matrix
    }

    /// Builds the covariance matrix `cov(i,j) = ρ(i,j)·σᵢ·σⱼ` from per-asset
    /// volatilities given in matrix order.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidParameter`] when the volatility vector
    /// length does not match the asset count.
    pub fn covariance_matrix(&self, volatilities: &[f64]) -> RiskResult<Vec<Vec<f64>>> {
        let n = self.assets.len();
        if volatilities.len() != n {
            return Err(RiskError::InvalidParameter(format!(
                "expected {} volatilities, got {}",
                n,
                volatilities.len()
            )));
        }

        let mut cov = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                let rho = self.correlations[Self::index_for(i, j, n)];
                cov[i][j] = rho * volatilities[i] * volatilities[j];
            }
        }
        Ok(cov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets2() -> (AssetId, AssetId) {
        (AssetId::new("AAPL"), AssetId::new("MSFT"))
    }

    #[test]
    fn test_identity_matrix() {
        let (a, b) = assets2();
        let matrix = CorrelationMatrix::identity(vec![a.clone(), b.clone()]);

        assert_eq!(matrix.asset_count(), 2);
        assert_eq!(matrix.get_correlation(&a, &a), Some(1.0));
        assert_eq!(matrix.get_correlation(&a, &b), Some(0.0));
        assert!(matrix.is_valid());
        assert!(!matrix.is_low_confidence());
    }

    #[test]
    fn test_set_get_symmetric() {
        let (a, b) = assets2();
        let mut matrix = CorrelationMatrix::identity(vec![a.clone(), b.clone()]);
        matrix.set_correlation(&a, &b, 0.8).unwrap();

        assert_eq!(matrix.get_correlation(&a, &b), Some(0.8));
        assert_eq!(matrix.get_correlation(&b, &a), Some(0.8));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let (a, b) = assets2();
        let mut matrix = CorrelationMatrix::identity(vec![a.clone(), b.clone()]);
        assert!(matrix.set_correlation(&a, &b, 1.5).is_err());
        assert!(matrix.set_correlation(&a, &b, -1.5).is_err());
    }

    #[test]
    fn test_self_correlation_must_be_one() {
        let (a, _) = assets2();
        let mut matrix = CorrelationMatrix::identity(vec![a.clone()]);
        assert!(matrix.set_correlation(&a, &a, 0.5).is_err());
        assert!(matrix.set_correlation(&a, &a, 1.0).is_ok());
    }

    #[test]
    fn test_to_matrix_dense() {
        let (a, b) = assets2();
        let mut matrix = CorrelationMatrix::identity(vec![a.clone(), b.clone()]);
        matrix.set_correlation(&a, &b, 0.7).unwrap();

        let dense = matrix.to_matrix();
        assert_eq!(dense[0][0], 1.0);
        assert_eq!(dense[1][1], 1.0);
        assert_eq!(dense[0][1], 0.7);
        assert_eq!(dense[1][0], 0.7);
    }

    #[test]
    fn test_covariance_matrix() {
        let (a, b) = assets2();
        let mut matrix = CorrelationMatrix::identity(vec![a.clone(), b.clone()]);
        matrix.set_correlation(&a, &b, 0.5).unwrap();

        let cov = matrix.covariance_matrix(&[0.1, 0.2]).unwrap();
        assert!((cov[0][0] - 0.01).abs() < 1e-12);
        assert!((cov[1][1] - 0.04).abs() < 1e-12);
        assert!((cov[0][1] - 0.01).abs() < 1e-12);
        assert_eq!(cov[0][1], cov[1][0]);
    }

    #[test]
    fn test_from_pairwise_override_wins() {
        let (a, b) = assets2();
        let mut overrides = HashMap::new();
        overrides.insert((a.clone(), b.clone()), 0.9);

        let matrix =
            CorrelationMatrix::from_pairwise(vec![a.clone(), b.clone()], &overrides, &HashMap::new())
                .unwrap();
        assert_eq!(matrix.get_correlation(&a, &b), Some(0.9));
        // Overrides do not mark the matrix low-confidence.
        assert!(!matrix.is_low_confidence());
    }

    #[test]
    fn test_from_pairwise_estimates_from_returns() {
        let (a, b) = assets2();
        let series: Vec<f64> = (0..60).map(|i| (i as f64 * 0.7).sin() * 0.01).collect();

        let mut returns = HashMap::new();
        returns.insert(a.clone(), series.clone());
        returns.insert(b.clone(), series);

        let matrix =
            CorrelationMatrix::from_pairwise(vec![a.clone(), b.clone()], &HashMap::new(), &returns)
                .unwrap();
        let rho = matrix.get_correlation(&a, &b).unwrap();
        assert!((rho - 1.0).abs() < 1e-9);
        assert!(!matrix.is_low_confidence());
    }

    #[test]
    fn test_from_pairwise_short_history_defaults() {
        let (a, b) = assets2();
        let mut returns = HashMap::new();
        returns.insert(a.clone(), vec![0.01; 10]);
        returns.insert(b.clone(), vec![0.02; 10]);

        let matrix =
            CorrelationMatrix::from_pairwise(vec![a.clone(), b.clone()], &HashMap::new(), &returns)
                .unwrap();
        assert_eq!(matrix.get_correlation(&a, &b), Some(DEFAULT_CORRELATION));
        assert!(matrix.is_low_confidence());
    }

    #[test]
    fn test_from_pairwise_rejects_bad_override() {
        let (a, b) = assets2();
        let mut overrides = HashMap::new();
        overrides.insert((a.clone(), b.clone()), 2.0);

        let result =
            CorrelationMatrix::from_pairwise(vec![a, b], &overrides, &HashMap::new());
        assert!(result.is_err());
    }
}
