//! Portfolio and position snapshot types.
//!
//! A [`Portfolio`] is an ordered collection of [`Position`]s supplied fresh
//! for each evaluation call. Derived quantities (total value, weights) are
//! always recomputed at the point of use and never cached across calls, so a
//! snapshot can be mutated by the caller between evaluations without stale
//! state leaking into risk numbers.
//!
//! # Example
//!
//! ```rust
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, Position};
//!
//! let portfolio = Portfolio::new(
//!     vec![
//!         Position::new(AssetId::new("AAPL"), 100.0, 180.0),
//!         Position::new(AssetId::new("MSFT"), 50.0, 400.0),
//!     ],
//!     "USD",
//!     1_700_000_000_000,
//! );
//!
//! assert_eq!(portfolio.total_value(), 38_000.0);
//! let weights = portfolio.weights().unwrap();
//! assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
//! ```

use crate::types::error::{RiskError, RiskResult};
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for an asset.
///
/// # Example
///
/// ```rust
/// use portfolio_risk_rs::portfolio::AssetId;
///
/// let aapl = AssetId::new("AAPL");
/// let msft = AssetId::from("MSFT");
/// assert_ne!(aapl, msft);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssetId(pub String);

impl AssetId {
    /// Creates a new asset ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the asset ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single observation in a historical price series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PricePoint {
    /// Observation timestamp in milliseconds.
    pub timestamp: u64,
    /// Observed price.
    pub price: f64,
}

impl PricePoint {
    /// Creates a new price point.
    #[must_use]
    pub fn new(timestamp: u64, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// A single portfolio position.
///
/// Volatility, beta and pairwise correlations are optional: when absent they
/// are estimated from `price_history` (or defaulted) by the portfolio model.
/// Volatility is a per-day return standard deviation; multi-day horizons are
/// scaled by `sqrt(horizon)` at calculation time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// Asset identifier.
    pub asset: AssetId,
    /// Number of units held (negative for short).
    pub quantity: f64,
    /// Current price per unit.
    pub price: f64,
    /// Optional asset-class tag, used for stress-shock scoping and
    /// concentration checks.
    pub asset_class: Option<String>,
    /// Historical price series, ascending by timestamp.
    pub price_history: Vec<PricePoint>,
    /// Daily return volatility, when known.
    pub volatility: Option<f64>,
    /// Beta against the reference market index, when known.
    pub beta: Option<f64>,
    /// Explicit pairwise correlation overrides against other assets.
    pub correlation_overrides: HashMap<AssetId, f64>,
}

impl Position {
    /// Creates a position with the minimum required fields.
    #[must_use]
    pub fn new(asset: AssetId, quantity: f64, price: f64) -> Self {
        Self {
            asset,
            quantity,
            price,
            asset_class: None,
            price_history: Vec::new(),
            volatility: None,
            beta: None,
            correlation_overrides: HashMap::new(),
        }
    }

    /// Attaches a historical price series (ascending by timestamp).
    #[must_use]
    pub fn with_history(mut self, history: Vec<PricePoint>) -> Self {
        self.price_history = history;
        self
    }

    /// Sets the daily volatility.
    #[must_use]
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    /// Sets the beta.
    #[must_use]
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = Some(beta);
        self
    }

    /// Sets the asset-class tag.
    #[must_use]
    pub fn with_asset_class(mut self, class: impl Into<String>) -> Self {
        self.asset_class = Some(class.into());
        self
    }

    /// Adds an explicit pairwise correlation override.
    #[must_use]
    pub fn with_correlation(mut self, other: AssetId, correlation: f64) -> Self {
        self.correlation_overrides.insert(other, correlation);
        self
    }

    /// Current market value (`quantity × price`).
    #[must_use]
    pub fn market_value(&self) -> f64 {
        self.quantity * self.price
    }

    /// Simple returns derived from the price history.
    ///
    /// An observation is skipped when the preceding price is non-positive.
    #[must_use]
    pub fn historical_returns(&self) -> Vec<f64> {
        self.price_history
            .windows(2)
            .filter_map(|w| {
                if w[0].price > 0.0 {
                    Some((w[1].price - w[0].price) / w[0].price)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// An immutable portfolio snapshot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Portfolio {
    /// Ordered positions.
    pub positions: Vec<Position>,
    /// Reporting currency for all monetary results.
    pub base_currency: String,
    /// Snapshot timestamp in milliseconds.
    pub last_updated: u64,
}

impl Portfolio {
    /// Creates a portfolio snapshot.
    #[must_use]
    pub fn new(positions: Vec<Position>, base_currency: impl Into<String>, timestamp: u64) -> Self {
        Self {
            positions,
            base_currency: base_currency.into(),
            last_updated: timestamp,
        }
    }

    /// Total market value, recomputed from the constituent positions.
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.positions.iter().map(Position::market_value).sum()
    }

    /// Returns the number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when the portfolio holds no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Validates that the portfolio can be evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidPortfolio`] when the portfolio is empty or
    /// its total value is not strictly positive.
    pub fn validate(&self) -> RiskResult<()> {
        if self.positions.is_empty() {
            return Err(RiskError::InvalidPortfolio(
                "portfolio has no positions".to_string(),
            ));
        }
        let total = self.total_value();
        if total <= 0.0 || !total.is_finite() {
            return Err(RiskError::InvalidPortfolio(format!(
                "portfolio total value must be positive, got {}",
                total
            )));
        }
        Ok(())
    }

    /// Position weights by market value, normalized to sum to 1.
    ///
    /// Weights are recomputed from current market values on every call.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::InvalidPortfolio`] when [`Self::validate`] fails.
    pub fn weights(&self) -> RiskResult<Vec<f64>> {
        self.validate()?;
        let total = self.total_value();
        Ok(self
            .positions
            .iter()
            .map(|p| p.market_value() / total)
            .collect())
    }

    /// Looks up a position by asset ID.
    #[must_use]
    pub fn position(&self, asset: &AssetId) -> Option<&Position> {
        self.positions.iter().find(|p| &p.asset == asset)
    }
}
