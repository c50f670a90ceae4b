//! # Terminals
//!
//! A [`Terminal`] is a named port through which batches enter or leave a
//! block. Each block declares a small fixed set of terminals (for example
//! `"getter"`/`"setter"` or `"true"`/`"false"`); the hosting pipeline may
//! override the names, and blocks fill in sensible defaults for any name
//! left unset.

use std::fmt;

/// Name of the framework-wide default terminal, used by blocks with a single
/// input or output port.
pub const DEFAULT_TERMINAL: &str = "__default_terminal_value";

/// A named input or output port on a block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Terminal(String);

impl Terminal {
  /// Creates a terminal with the given name.
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  /// An unset terminal. Blocks replace these with their defaults during
  /// configuration, see [`Terminal::or_default`].
  pub fn unset() -> Self {
    Self(String::new())
  }

  /// The terminal's name.
  pub fn name(&self) -> &str {
    &self.0
  }

  /// Fills in `default` if no name has been assigned yet.
  pub fn or_default(&mut self, default: &str) {
    if self.0.is_empty() {
      self.0 = default.to_string();
    }
  }
}

impl Default for Terminal {
  fn default() -> Self {
    Self(DEFAULT_TERMINAL.to_string())
  }
}

impl fmt::Display for Terminal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Terminal {
  fn from(name: &str) -> Self {
    Self::new(name)
  }
}

impl PartialEq<str> for Terminal {
  fn eq(&self, other: &str) -> bool {
    self.0 == other
  }
}
