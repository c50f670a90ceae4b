//! # Error Taxonomy
//!
//! Errors are split by when they occur and who handles them:
//!
//! - [`ConfigError`]: raised synchronously from `configure`; fatal, the block
//!   never starts.
//! - [`EvalError`]: an expression failed against a specific signal. Usually
//!   non-fatal; the affected signal is dropped or the step is skipped,
//!   depending on the block's documented semantics.
//! - [`ProcessError`]: returned from a dispatch handler to the run loop,
//!   which decides batch-level disposition. The core never retries.
//! - [`EnqueueError`]: synchronous rejection of a delivery to an unknown or
//!   unsupported input terminal.

use crate::terminal::Terminal;
use thiserror::Error;

/// Fatal configuration error raised while a block is being configured.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The raw configuration document could not be deserialized.
  #[error("malformed block configuration: {0}")]
  Malformed(#[from] serde_json::Error),
  /// A required configuration field is absent.
  #[error("configuration error: missing required field `{0}`")]
  MissingField(&'static str),
  /// A field is present but carries an unusable value.
  #[error("configuration error: {0}")]
  Invalid(String),
}

/// An expression failed to evaluate against a signal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
  /// The expression references an attribute the signal does not carry.
  #[error("attribute `{0}` is not present in the signal")]
  MissingAttribute(String),
  /// The expression evaluated, but not to the type the caller needs.
  #[error("expression `{expr}` evaluated to {found}, expected {expected}")]
  Type {
    /// The offending expression.
    expr: String,
    /// The type the call site required.
    expected: &'static str,
    /// A short rendering of the value actually produced.
    found: String,
  },
  /// The expression text itself is not something the evaluator understands.
  #[error("unsupported expression syntax: `{0}`")]
  Syntax(String),
}

/// Error surfaced from a dispatch handler or an emission.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// An expression failed against a signal during processing.
  #[error(transparent)]
  Eval(#[from] EvalError),
  /// A handler tried to emit on a terminal the block does not own.
  #[error("block has no output terminal `{0}`")]
  UnknownTerminal(Terminal),
  /// The channel behind an output terminal is gone.
  #[error("output channel for terminal `{0}` is closed")]
  ChannelClosed(Terminal),
  /// The block was started without a successful `configure` call.
  #[error("block is not configured")]
  NotConfigured,
}

/// Synchronous rejection of a batch delivered to an input terminal.
#[derive(Debug, Error)]
pub enum EnqueueError {
  /// The block has no input terminal with this name.
  #[error("block has no input terminal `{0}`")]
  UnknownTerminal(Terminal),
  /// The block never accepts input (a pure producer).
  #[error("block does not accept input on terminal `{0}`")]
  Unsupported(Terminal),
  /// The channel behind the input terminal is gone.
  #[error("input channel for terminal `{0}` is closed")]
  Closed(Terminal),
}
