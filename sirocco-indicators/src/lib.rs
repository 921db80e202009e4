//! # Sirocco Indicators
//!
//! Incremental technical-indicator engine.
//!
//! This crate provides:
//! - `IndicatorKind`: the symbolic indicator names a spec may request
//! - Streaming accumulators with O(1) amortized per-bar updates
//! - `IndicatorEngine`: per-ticker state (bar ring + accumulators) producing
//!   enriched bars
//!
//! Indicator values are absent (never a sentinel) until enough history has
//! been observed. All math is f64; invalid input bars are dropped without
//! mutating state.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod engine;
mod kind;

/// Streaming accumulators for the individual indicators.
pub mod state;

pub use engine::IndicatorEngine;
pub use kind::IndicatorKind;
