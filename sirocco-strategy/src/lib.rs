//! # Sirocco Strategy
//!
//! The declarative strategy artifact and its condition language.
//!
//! This crate provides:
//! - `StrategySpec` and its parts (`Signal`, `RiskParameters`,
//!   `DataRequirements`) with full invariant validation
//! - The condition compiler: a sandboxed lexer + recursive-descent parser
//!   producing a small AST evaluated against enriched bars
//! - The `SpecProducer` seam for the slow-path planner, plus a deterministic
//!   template producer for tests and the CLI

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Condition compilation and evaluation.
pub mod condition;

mod producer;
mod spec;

pub use producer::{SpecProducer, TemplateSpecProducer, TemplateStyle};
pub use spec::{DataRequirements, RiskParameters, Signal, SignalAction, StrategySpec};
