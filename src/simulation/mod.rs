//! Correlated Monte Carlo scenario generation.

pub mod monte_carlo;
pub mod rng;

pub use monte_carlo::{CancellationToken, MonteCarloSimulator, Scenario, SimulationConfig};
pub use rng::Lcg64;
