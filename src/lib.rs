//! # portfolio-risk-rs
//!
//! A quantitative portfolio risk engine: volatility and performance ratios,
//! Value-at-Risk by three methods, expected shortfall, Euler risk
//! decomposition, deterministic stress testing, VaR backtesting and
//! limit-driven alerting.
//!
//! ## Overview
//!
//! - **Portfolio model** ([`portfolio`]): position snapshots resolved into
//!   weights, return statistics and a correlation/covariance matrix.
//! - **Risk metrics** ([`risk`]): portfolio volatility, beta, Sharpe and
//!   Sortino ratios, drawdown, plus limits and the alert manager.
//! - **Value-at-Risk** ([`var`]): parametric, historical and Monte Carlo
//!   VaR with automatic backtesting, expected shortfall, and component /
//!   marginal VaR.
//! - **Simulation** ([`simulation`]): seeded, cancellable, correlated Monte
//!   Carlo scenario generation with optional antithetic variates.
//! - **Stress testing** ([`stress`]): deterministic revaluation under named
//!   shock scenarios.
//! - **Backtesting** ([`backtest`]): Kupiec and Christoffersen coverage
//!   tests.
//!
//! All monetary results are in the portfolio's base currency; losses are
//! reported as non-negative values. Volatilities and means are daily and
//! scaled by `sqrt(horizon)` / `horizon` internally.
//!
//! ## Quick start
//!
//! ```rust
//! use portfolio_risk_rs::engine::{RiskEngine, RiskEngineConfig};
//! use portfolio_risk_rs::portfolio::{AssetId, Portfolio, Position};
//! use portfolio_risk_rs::simulation::SimulationConfig;
//!
//! let portfolio = Portfolio::new(
//!     vec![
//!         Position::new(AssetId::new("AAPL"), 100.0, 180.0).with_volatility(0.02),
//!         Position::new(AssetId::new("TLT"), 200.0, 95.0)
//!             .with_volatility(0.008)
//!             .with_asset_class("bond"),
//!     ],
//!     "USD",
//!     1_700_000_000_000,
//! );
//!
//! let config = RiskEngineConfig {
//!     confidence: 0.95,
//!     horizon_days: 1,
//!     simulation: SimulationConfig {
//!         simulations: 2_000,
//!         seed: Some(42),
//!         ..SimulationConfig::default()
//!     },
//!     ..RiskEngineConfig::default()
//! };
//!
//! let mut engine = RiskEngine::new(config).unwrap();
//! let report = engine.evaluate(&portfolio).unwrap();
//!
//! println!(
//!     "1-day 95% VaR: {:.2} {} ({:.2}%)",
//!     report.metrics.var.value,
//!     portfolio.base_currency,
//!     report.metrics.var.percentage * 100.0,
//! );
//! ```
//!
//! ## Determinism
//!
//! A [`simulation::SimulationConfig`] with a fixed seed makes every Monte
//! Carlo result bit-for-bit reproducible; each path owns an independent
//! generator derived from the base seed, so results do not depend on
//! execution order.

pub mod backtest;
pub mod engine;
pub mod math;
pub mod portfolio;
pub mod risk;
pub mod simulation;
pub mod stress;
pub mod types;
pub mod var;

pub use engine::{RiskEngine, RiskEngineConfig, RiskMetrics, RiskReport};
pub use types::{RiskError, RiskResult};
