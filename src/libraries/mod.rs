//! Reusable building blocks shared across the mixer and calibration code

pub mod filter;
