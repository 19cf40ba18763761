//! Dense matrix helpers for risk aggregation.
//!
//! The engine works with small per-portfolio matrices (one row per asset),
//! so a plain `Vec<Vec<f64>>` representation is sufficient. The two
//! operations that matter are the covariance quadratic form `wᵗ Σ w` and the
//! Cholesky factorization used to correlate Monte Carlo shocks.

use crate::types::error::{RiskError, RiskResult};

/// Computes the quadratic form `wᵗ M w`.
///
/// # Errors
///
/// Returns [`RiskError::InvalidParameter`] if the matrix is not square or
/// its dimension does not match the weight vector.
pub fn quadratic_form(weights: &[f64], matrix: &[Vec<f64>]) -> RiskResult<f64> {
    let n = weights.len();
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(RiskError::InvalidParameter(format!(
            "matrix dimension does not match weight vector of length {}",
            n
        )));
    }

    let mut total = 0.0;
    for (i, row) in matrix.iter().enumerate() {
        for (j, &m_ij) in row.iter().enumerate() {
            total += weights[i] * m_ij * weights[j];
        }
    }
    Ok(total)
}

/// Computes the matrix-vector product `M v`.
///
/// # Errors
///
/// Returns [`RiskError::InvalidParameter`] on a dimension mismatch.
pub fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> RiskResult<Vec<f64>> {
    let n = v.len();
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(RiskError::InvalidParameter(format!(
            "matrix dimension does not match vector of length {}",
            n
        )));
    }

    Ok(matrix
        .iter()
        .map(|row| row.iter().zip(v).map(|(m, x)| m * x).sum())
        .collect())
}

/// Cholesky factorization of a symmetric positive-definite matrix.
///
/// Returns the lower-triangular factor `L` such that `L·Lᵗ = M`, computed
/// with the Cholesky–Banachiewicz recurrence.
///
/// # Errors
///
/// Returns [`RiskError::NumericalInstability`] when the matrix is not
/// positive-definite (a diagonal pivot becomes non-positive). This is
/// preferred over letting NaNs propagate into the simulation.
pub fn cholesky_lower(matrix: &[Vec<f64>]) -> RiskResult<Vec<Vec<f64>>> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return Err(RiskError::InvalidParameter(
            "Cholesky factorization requires a square matrix".to_string(),
        ));
    }

    let mut lower = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += lower[i][k] * lower[j][k];
            }

            if i == j {
                let pivot = matrix[i][i] - sum;
                if pivot <= 0.0 || !pivot.is_finite() {
                    return Err(RiskError::NumericalInstability(format!(
                        "correlation matrix is not positive-definite (pivot {} at row {})",
                        pivot, i
                    )));
                }
                lower[i][j] = pivot.sqrt();
            } else {
                lower[i][j] = (matrix[i][j] - sum) / lower[j][j];
            }
        }
    }

    Ok(lower)
}
