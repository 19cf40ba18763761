//! Error types for the risk engine.
//!
//! All fallible operations in this crate return [`RiskResult`], built on a
//! single [`RiskError`] enum. Data-sufficiency and parameter-validity
//! failures are raised immediately; statistical-test rejections are never
//! errors and surface inside result structures instead.

use thiserror::Error;

/// Errors produced by the risk engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    /// Portfolio cannot be evaluated (empty, or non-positive total value).
    #[error("invalid portfolio: {0}")]
    InvalidPortfolio(String),

    /// A calculation parameter is out of range (confidence outside (0,1),
    /// non-positive horizon, unknown method, malformed configuration).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Historical data is shorter than the method's minimum.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A numerical procedure broke down (e.g. Cholesky factorization of a
    /// correlation matrix that is not positive-definite).
    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    /// A long-running computation was cancelled before completion.
    /// Partial results are discarded.
    #[error("computation cancelled: {0}")]
    Cancelled(String),
}

/// Result type alias used throughout the crate.
pub type RiskResult<T> = Result<T, RiskError>;
