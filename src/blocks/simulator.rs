//! # Interval Simulator Blocks
//!
//! Source blocks that emit batches on a fixed ticker, used to drive
//! pipelines with synthetic traffic.
//!
//! Both simulators share the ticker contract: the first batch is emitted one
//! full interval after start (never immediately), each tick emits
//! `num_signals` signals, and a positive `limit` caps the total ever emitted.
//! When the cap would be exceeded the tick emits only the remainder and the
//! block completes on its own.

use crate::block::{Block, Notifier, Producer};
use crate::config::{BlockConfigAtom, RawBlockConfig, TimeDelta, parse_config};
use crate::error::{ConfigError, EnqueueError};
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Deserialize)]
struct TickerConfig {
  #[serde(default)]
  interval: Option<TimeDelta>,
  #[serde(default)]
  limit: Option<i64>,
  #[serde(default)]
  num_signals: Option<i64>,
}

/// Shared per-tick accounting for both simulators.
struct Ticker {
  interval: Duration,
  limit: i64,
  count: i64,
  total: i64,
}

impl Ticker {
  fn from_config(config: &TickerConfig) -> Self {
    let interval = config
      .interval
      .map(|delta| delta.to_duration())
      .filter(|interval| !interval.is_zero())
      .unwrap_or(DEFAULT_INTERVAL);
    Self {
      interval,
      limit: config.limit.unwrap_or(-1),
      count: config.num_signals.unwrap_or(1).max(0),
      total: 0,
    }
  }

  /// Signals to emit this tick, and whether this tick is the last.
  fn tick(&mut self) -> (i64, bool) {
    let mut num = self.count;
    let complete = self.limit > 0 && self.total + num > self.limit;
    if complete {
      num = self.limit - self.total;
    }
    self.total += num;
    (num, complete)
  }
}

/// A source block that emits empty signals on a fixed interval.
pub struct IdentityIntervalSimulatorBlock {
  base: Producer,
  config: TickerConfig,
}

impl IdentityIntervalSimulatorBlock {
  /// Creates an unconfigured simulator.
  pub fn new() -> Self {
    Self {
      base: Producer::new(),
      config: TickerConfig::default(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Producer {
    &self.base
  }
}

impl Default for IdentityIntervalSimulatorBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for IdentityIntervalSimulatorBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    let _: BlockConfigAtom = parse_config(&config)?;
    self.config = parse_config(&config)?;
    Ok(())
  }

  async fn start(&self, cancel: CancellationToken) {
    let mut ticker = Ticker::from_config(&self.config);
    let mut clock = time::interval_at(Instant::now() + ticker.interval, ticker.interval);
    loop {
      tokio::select! {
        _ = clock.tick() => {
          let (num, complete) = ticker.tick();
          let out: SignalGroup = (0..num).map(|_| Signal::new()).collect();
          if let Err(err) = self.base.notify(self.base.output.terminal(), out).await {
            tracing::error!(%err, "emission was not delivered");
            return;
          }
          if complete {
            return;
          }
        }
        _ = cancel.cancelled() => return,
      }
    }
  }

  async fn enqueue(&self, terminal: &Terminal, _signals: SignalGroup) -> Result<(), EnqueueError> {
    self.base.no_enqueue(terminal)
  }
}

#[derive(Debug, Default, Deserialize)]
struct CounterRange {
  #[serde(default)]
  start: Option<i64>,
  #[serde(default)]
  end: Option<i64>,
  #[serde(default)]
  step: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CounterSimulatorConfig {
  #[serde(flatten)]
  ticker: TickerConfig,
  #[serde(default)]
  attr_name: Option<String>,
  #[serde(default)]
  attr_value: CounterRange,
}

/// A source block that emits signals carrying a counter attribute cycling
/// through a configured range.
pub struct CounterIntervalSimulatorBlock {
  base: Producer,
  config: CounterSimulatorConfig,
}

impl CounterIntervalSimulatorBlock {
  /// Creates an unconfigured simulator.
  pub fn new() -> Self {
    Self {
      base: Producer::new(),
      config: CounterSimulatorConfig::default(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Producer {
    &self.base
  }
}

impl Default for CounterIntervalSimulatorBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for CounterIntervalSimulatorBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    let _: BlockConfigAtom = parse_config(&config)?;
    self.config = parse_config(&config)?;
    Ok(())
  }

  async fn start(&self, cancel: CancellationToken) {
    let mut ticker = Ticker::from_config(&self.config.ticker);
    let key = self.config.attr_name.clone().unwrap_or_else(|| "sim".into());
    let start = self.config.attr_value.start.unwrap_or(0);
    let end = self.config.attr_value.end.unwrap_or(1);
    let step = self.config.attr_value.step.unwrap_or(1);

    let mut counter: i64 = 0;
    let mut clock = time::interval_at(Instant::now() + ticker.interval, ticker.interval);
    loop {
      tokio::select! {
        _ = clock.tick() => {
          let (num, complete) = ticker.tick();
          let mut out = SignalGroup::with_capacity(num.max(0) as usize);
          for _ in 0..num {
            let mut signal = Signal::new();
            signal.insert(key.clone(), Value::from(counter + start));
            out.push(signal);
            counter += step;
            // The counter wraps once it walks past the range in the
            // direction of the step.
            if (step > 0 && counter > end - start) || (step < 0 && counter < end - start) {
              counter = 0;
            }
          }
          if let Err(err) = self.base.notify(self.base.output.terminal(), out).await {
            tracing::error!(%err, "emission was not delivered");
            return;
          }
          if complete {
            return;
          }
        }
        _ = cancel.cancelled() => return,
      }
    }
  }

  async fn enqueue(&self, terminal: &Terminal, _signals: SignalGroup) -> Result<(), EnqueueError> {
    self.base.no_enqueue(terminal)
  }
}
