//! # Signal Data Model
//!
//! A [`Signal`] is one structured record: an attribute-to-value mapping whose
//! values are arbitrary JSON data (numbers, booleans, strings, null, nested
//! structures). A [`SignalGroup`] is an ordered sequence of signals delivered
//! atomically between blocks; it is the unit of work a block processes per
//! invocation.
//!
//! Signals are immutable by convention: a block that wants to change a signal
//! clones it first (or takes ownership of the batch, which amounts to the
//! same thing). [`Signal::merged`] produces the union of two signals, with the
//! other signal's attributes winning on key conflicts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One structured record: a mapping from attribute name to value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signal(Map<String, Value>);

/// An ordered batch of signals, delivered atomically to a block terminal.
pub type SignalGroup = Vec<Signal>;

impl Signal {
  /// Creates an empty signal.
  pub fn new() -> Self {
    Self(Map::new())
  }

  /// Returns the value of an attribute, if present.
  pub fn get(&self, attr: &str) -> Option<&Value> {
    self.0.get(attr)
  }

  /// Sets an attribute, returning the previous value if one existed.
  pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
    self.0.insert(attr.into(), value.into())
  }

  /// Removes an attribute, returning its value if it was present.
  pub fn remove(&mut self, attr: &str) -> Option<Value> {
    self.0.remove(attr)
  }

  /// Returns true if the signal carries the given attribute.
  pub fn contains(&self, attr: &str) -> bool {
    self.0.contains_key(attr)
  }

  /// Number of attributes in the signal.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Returns true if the signal has no attributes.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Iterates over the signal's attributes.
  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  /// Clones this signal and unions in `other`'s attributes. On a key
  /// conflict, `other`'s value wins.
  pub fn merged(&self, other: &Signal) -> Signal {
    let mut out = self.clone();
    for (attr, value) in other.iter() {
      out.insert(attr.clone(), value.clone());
    }
    out
  }
}

impl fmt::Display for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", Value::Object(self.0.clone()))
  }
}

impl From<Map<String, Value>> for Signal {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}

impl FromIterator<(String, Value)> for Signal {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}
