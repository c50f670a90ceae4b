//! # Debounce Block
//!
//! A transform block that enforces a minimum interval between successive
//! emissions per correlation group.
//!
//! ## Behavior
//!
//! The first batch a group ever sees passes through. After that, a batch
//! passes only when strictly more than the configured interval has elapsed
//! since the group's last emission. A passing batch is coalesced to its
//! **last** signal; the rest are dropped. Batches inside the window emit
//! nothing.

use crate::block::{Block, Transformer, deliver};
use crate::config::{BlockConfigAtom, RawBlockConfig, TimeDelta, parse_config};
use crate::error::{ConfigError, EnqueueError, ProcessError};
use crate::eval::{Evaluator, TemplateEvaluator};
use crate::group::{Emitter, Group, GroupBy, GroupedState};
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Deserialize)]
struct DebounceConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  interval: Option<TimeDelta>,
}

/// A block that time-gates each group's throughput, keeping the newest
/// signal of each passing burst.
pub struct DebounceBlock {
  base: Transformer,
  evaluator: Arc<dyn Evaluator>,
  group_by: GroupBy,
  interval: Duration,
  last_notify: GroupedState<Instant>,
}

impl DebounceBlock {
  /// Creates an unconfigured debounce with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured debounce with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: Transformer::new(),
      group_by: GroupBy::ungrouped(evaluator.clone()),
      evaluator,
      interval: DEFAULT_INTERVAL,
      last_notify: GroupedState::new(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Transformer {
    &self.base
  }

  fn process(
    &self,
    group: &Group,
    emit: &mut Emitter,
    signals: SignalGroup,
  ) -> Result<(), ProcessError> {
    let now = Instant::now();
    let pass = self.last_notify.with(group, |slot| {
      let pass = match slot {
        Some(prev) => now.duration_since(*prev) > self.interval,
        None => true,
      };
      if pass {
        *slot = Some(now);
      }
      pass
    });

    if pass && let Some(last) = signals.into_iter().next_back() {
      emit.emit(self.base.output.terminal(), vec![last]);
    }
    Ok(())
  }
}

impl Default for DebounceBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for DebounceBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    let parsed: DebounceConfig = parse_config(&config)?;
    self.group_by = GroupBy::configure(&config, self.evaluator.clone())?;
    self.interval = parsed
      .interval
      .map(|delta| delta.to_duration())
      .unwrap_or(DEFAULT_INTERVAL);
    Ok(())
  }

  async fn start(&self, cancel: CancellationToken) {
    let Some(mut rx) = self.base.input.receiver() else {
      return;
    };
    loop {
      tokio::select! {
        maybe = rx.recv() => {
          let Some(signals) = maybe else { return };
          let outcome = self
            .group_by
            .dispatch(signals, |group, emit, sub| self.process(group, emit, sub));
          deliver(&self.base, outcome).await;
          self.base.busy.done();
        }
        _ = cancel.cancelled() => return,
      }
    }
  }

  async fn enqueue(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), EnqueueError> {
    self.base.enqueue(terminal, signals).await
  }
}
