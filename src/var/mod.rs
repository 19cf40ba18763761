//! Value-at-Risk, expected shortfall and risk decomposition.

pub mod component;
pub mod engine;
pub mod shortfall;

pub use component::{ComponentRiskAllocator, ComponentVaR, ComponentVaRResult};
pub use engine::{MIN_HISTORICAL_OBSERVATIONS, VaRMethod, VaRResult, ValueAtRiskEngine};
pub use shortfall::{ESResult, ExpectedShortfallEngine};
