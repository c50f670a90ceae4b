//! # Counter Block
//!
//! A transform block that keeps a cumulative per-group tally.
//!
//! ## Terminals
//!
//! - **Input**: default terminal - receives batches to count
//! - **Output**: default terminal - one signal per dispatched group carrying
//!   `count` (size of this sub-batch) and `cumulative_count` (running total)
//!
//! ## Behavior
//!
//! Counts never reset except by block restart; there is no windowing. When
//! grouping is configured the group key is merged into the output signal.

use crate::block::{Block, Transformer, deliver};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError, ProcessError};
use crate::eval::{Evaluator, TemplateEvaluator};
use crate::group::{Emitter, Group, GroupBy, GroupedState};
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A block that emits batch and cumulative counts per correlation group.
pub struct CounterBlock {
  base: Transformer,
  evaluator: Arc<dyn Evaluator>,
  group_by: GroupBy,
  cumulative: GroupedState<i64>,
}

impl CounterBlock {
  /// Creates an unconfigured counter with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured counter with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: Transformer::new(),
      group_by: GroupBy::ungrouped(evaluator.clone()),
      evaluator,
      cumulative: GroupedState::new(),
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
    let count = signals.len() as i64;
    let next = self.cumulative.with(group, |slot| {
      let next = slot.unwrap_or(0) + count;
      *slot = Some(next);
      next
    });

    let mut out = Signal::new();
    out.insert("count", count);
    out.insert("cumulative_count", next);
    self.group_by.annotate(group, &mut out);

    emit.emit(self.base.output.terminal(), vec![out]);
    Ok(())
  }
}

impl Default for CounterBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for CounterBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    let _atom: BlockConfigAtom = parse_config(&config)?;
    self.group_by = GroupBy::configure(&config, self.evaluator.clone())?;
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
