//! Portfolio snapshot types and the normalized model consumed by the risk
//! calculators.

pub mod model;
pub mod position;

pub use model::PortfolioModel;
pub use position::{AssetId, Portfolio, Position, PricePoint};
