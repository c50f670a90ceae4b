//! # Built-in Block Library
//!
//! The standard processing blocks shipped with this crate. Each block is a
//! self-contained [`Block`](crate::block::Block) implementation over one of
//! the terminal shells in [`crate::block`].
//!
//! ## Grouped stateful blocks
//!
//! - [`CounterBlock`]: counts signals per batch and cumulatively, per group
//! - [`DebounceBlock`]: suppresses signals inside a per-group quiet interval
//! - [`AppendStateBlock`]: stores state via `setter`, annotates via `getter`
//! - [`MergeStreamsBlock`]: joins the latest signals of two input streams
//! - [`SwitchBlock`]: routes batches by a per-group boolean gate
//! - [`FilterBlock`]: splits signals on ALL/ANY condition evaluation
//!
//! ## Stateless and utility blocks
//!
//! - [`ModifierBlock`]: attaches computed attributes to each signal
//! - [`AttributeSelectorBlock`]: whitelists or blacklists attributes
//! - [`NoopBlock`]: forwards batches unchanged
//! - [`LoggerBlock`]: sink that logs every signal
//! - [`IdentityIntervalSimulatorBlock`] / [`CounterIntervalSimulatorBlock`]:
//!   ticker-driven sources for synthetic traffic

pub mod append_state;
#[cfg(test)]
mod append_state_test;
pub mod attribute_selector;
pub mod counter;
#[cfg(test)]
mod counter_test;
pub mod debounce;
#[cfg(test)]
mod debounce_test;
pub mod filter;
pub mod logger;
#[cfg(test)]
mod logger_test;
pub mod merge_streams;
pub mod modifier;
pub mod noop;
pub mod simulator;
pub mod switch;

pub use append_state::AppendStateBlock;
pub use attribute_selector::AttributeSelectorBlock;
pub use counter::CounterBlock;
pub use debounce::DebounceBlock;
pub use filter::FilterBlock;
pub use logger::{LogLevel, LoggerBlock};
pub use merge_streams::MergeStreamsBlock;
pub use modifier::ModifierBlock;
pub use noop::NoopBlock;
pub use simulator::{CounterIntervalSimulatorBlock, IdentityIntervalSimulatorBlock};
pub use switch::SwitchBlock;
