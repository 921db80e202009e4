//! # Sirocco Engine
//!
//! The fast-path execution engine.
//!
//! This crate provides:
//! - `ExecutionEngine`: the per-bar decision loop (ingest → enrich →
//!   evaluate signals by priority → risk gates → decision)
//! - `SpecStore`: the read-mostly spec map with copy-on-write replacement
//! - `Position` and `TradeDecision` data types
//!
//! The decision path is synchronous and never suspends; spec replacement by
//! the orchestrator's refresh task is observed atomically, one spec version
//! per bar.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod decision;
mod engine;
mod position;
mod store;

pub use decision::TradeDecision;
pub use engine::{EngineConfig, ExecutionEngine};
pub use position::{Position, PositionSide};
pub use store::{CompiledSignal, LoadedSpec, SpecStore};
