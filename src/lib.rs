//! # SignalWeave
//!
//! A small in-process dataflow engine: independent processing blocks
//! connected by typed channels, each consuming batches of structured records
//! ("signals") and optionally emitting transformed batches on named output
//! terminals.
//!
//! The heart of the crate is the stateful, group-keyed processing model: a
//! block partitions an incoming batch into independent correlation groups,
//! maintains per-group state across invocations, and applies its algorithm
//! per group while guaranteeing safe concurrent access to that state from
//! multiple input terminals. Everything else (channel plumbing, completion
//! acknowledgment, configuration parsing) is lifecycle scaffolding around
//! that core.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signalweave::block::Block;
//! use signalweave::blocks::CounterBlock;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), signalweave::error::ConfigError> {
//! let mut counter = CounterBlock::new();
//! counter.configure(json!({
//!   "type": "Counter",
//!   "group_by": "{{ $group }}"
//! }))?;
//! // hand the block to the runtime: spawn `start`, feed it via `enqueue`
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Block lifecycle contract and terminal shells (channel plumbing).
pub mod block;
/// Built-in processing blocks.
pub mod blocks;
/// In-flight batch tracking and completion acknowledgment.
pub mod busy;
/// Raw configuration parsing and shared configuration types.
pub mod config;
/// Error taxonomy for configuration, evaluation and processing.
pub mod error;
/// Expression evaluation seam and configured expression bindings.
pub mod eval;
/// Group-keyed dispatch and per-group state tables.
pub mod group;
/// Signal record and batch data model.
pub mod signal;
/// Named input/output ports.
pub mod terminal;
