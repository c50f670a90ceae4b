//! # Block Configuration
//!
//! Every block is configured from a raw JSON document before it starts.
//! Unrecognized fields are ignored; absent required fields are a
//! configuration-time fatal error, never deferred to run time.

use crate::error::ConfigError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Raw, not-yet-validated block configuration.
pub type RawBlockConfig = Value;

/// Deserializes a typed configuration out of a raw document.
pub fn parse_config<T: for<'de> Deserialize<'de>>(
  config: &RawBlockConfig,
) -> Result<T, ConfigError> {
  serde_json::from_value(config.clone()).map_err(ConfigError::from)
}

/// Fields common to every block's configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BlockConfigAtom {
  /// Unique block instance id assigned by the host.
  #[serde(default)]
  pub id: String,
  /// Block type name.
  #[serde(default, rename = "type")]
  pub kind: String,
  /// Human-readable instance name.
  #[serde(default)]
  pub name: String,
}

/// A duration expressed as a JSON object of calendar-free components, for
/// example `{"seconds": 1}` or `{"milliseconds": 50}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct TimeDelta {
  /// Whole or fractional days.
  #[serde(default)]
  pub days: f64,
  /// Whole or fractional hours.
  #[serde(default)]
  pub hours: f64,
  /// Whole or fractional minutes.
  #[serde(default)]
  pub minutes: f64,
  /// Whole or fractional seconds.
  #[serde(default)]
  pub seconds: f64,
  /// Whole or fractional milliseconds.
  #[serde(default)]
  pub milliseconds: f64,
  /// Whole or fractional microseconds.
  #[serde(default)]
  pub microseconds: f64,
}

impl TimeDelta {
  /// Collapses the components into a [`Duration`]. Negative totals clamp to
  /// zero.
  pub fn to_duration(&self) -> Duration {
    let secs = self.days * 86_400.0
      + self.hours * 3_600.0
      + self.minutes * 60.0
      + self.seconds
      + self.milliseconds / 1_000.0
      + self.microseconds / 1_000_000.0;
    Duration::from_secs_f64(secs.max(0.0))
  }
}
