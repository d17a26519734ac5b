//! Trellis Test Harness - fixtures and end-to-end validation
//!
//! This crate provides:
//! - A canned test device with readable and writable data elements
//! - Randomized tree growth for stress and benchmark setups
//! - Integration scenarios exercising the full request path
//! - Criterion benchmarks for tree and dispatch hot paths

pub mod fixture;

pub use fixture::*;

#[cfg(test)]
mod scenarios;
