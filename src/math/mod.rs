//! Numerical building blocks: sample statistics, normal-distribution
//! approximations and small dense-matrix routines.

pub mod matrix;
pub mod stats;
