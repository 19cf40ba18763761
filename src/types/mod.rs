//! Shared crate-level types.

pub mod error;

pub use error::{RiskError, RiskResult};
