//! # MergeStreams Block
//!
//! Correlates two input streams per group, merging the newest signal of one
//! side with the cached signal of the other.
//!
//! ## Terminals
//!
//! - **Input** `"input_1"` / `"input_2"`: each side keeps a single-slot
//!   per-group cache of the last signal seen and not yet merged.
//! - **Output**: default terminal.
//!
//! ## Behavior
//!
//! When a sub-batch arrives on one side and the other side has a cached
//! signal for the group, the streams merge; otherwise the sub-batch's last
//! signal replaces the arriving side's cache and nothing is emitted.
//!
//! The `notify_once` flag (default true) picks the delivery cardinality:
//!
//! - **once**: the other side's cache is consumed and only the first
//!   arriving signal is merged; one merged signal is emitted. Additional
//!   signals in the triggering sub-batch are discarded and not re-cached.
//! - **every**: the other side's cache is retained and every arriving signal
//!   is merged against it, one merged signal each, in one output batch; the
//!   arriving side's cache then advances to the sub-batch's last signal.
//!
//! On attribute conflicts `input_2`'s attributes win in both directions,
//! matching the historical behavior downstream consumers rely on.

use crate::block::{Block, Joiner, deliver};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError, ProcessError};
use crate::eval::{Evaluator, TemplateEvaluator};
use crate::group::{Emitter, Group, GroupBy, GroupedState};
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
struct MergeStreamsConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  notify_once: Option<bool>,
}

/// Per-group cache slots, one per side, guarded together so a merge sees a
/// consistent pair.
#[derive(Default)]
struct SideCache {
  left: Option<Signal>,
  right: Option<Signal>,
}

/// A block that joins two streams with once/every delivery semantics.
pub struct MergeStreamsBlock {
  base: Joiner,
  evaluator: Arc<dyn Evaluator>,
  group_by: GroupBy,
  once: bool,
  cache: GroupedState<SideCache>,
}

impl MergeStreamsBlock {
  /// Creates an unconfigured block with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured block with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: Joiner::new(),
      group_by: GroupBy::ungrouped(evaluator.clone()),
      evaluator,
      once: true,
      cache: GroupedState::new(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Joiner {
    &self.base
  }

  fn process_left(
    &self,
    group: &Group,
    emit: &mut Emitter,
    signals: SignalGroup,
  ) -> Result<(), ProcessError> {
    let out_terminal = self.base.output.terminal();
    self.cache.with(group, |slot| {
      let cache = slot.get_or_insert_with(SideCache::default);

      if self.once {
        if let Some(right) = cache.right.take() {
          if let Some(first) = signals.first() {
            emit.emit(out_terminal, vec![first.merged(&right)]);
          }
          // Consumed merge: the rest of the sub-batch is dropped and the
          // left slot is left untouched.
          return;
        }
      } else if let Some(right) = &cache.right {
        let merged: SignalGroup = signals.iter().map(|signal| signal.merged(right)).collect();
        emit.emit(out_terminal, merged);
      }

      if let Some(last) = signals.into_iter().next_back() {
        cache.left = Some(last);
      }
    });
    Ok(())
  }

  fn process_right(
    &self,
    group: &Group,
    emit: &mut Emitter,
    signals: SignalGroup,
  ) -> Result<(), ProcessError> {
    let out_terminal = self.base.output.terminal();
    self.cache.with(group, |slot| {
      let cache = slot.get_or_insert_with(SideCache::default);

      if self.once {
        if let Some(left) = cache.left.take() {
          if let Some(first) = signals.first() {
            emit.emit(out_terminal, vec![left.merged(first)]);
          }
          return;
        }
      } else if let Some(left) = &cache.left {
        let merged: SignalGroup = signals.iter().map(|signal| left.merged(signal)).collect();
        emit.emit(out_terminal, merged);
      }

      if let Some(last) = signals.into_iter().next_back() {
        cache.right = Some(last);
      }
    });
    Ok(())
  }
}

impl Default for MergeStreamsBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for MergeStreamsBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    self.base.left.terminal_mut().or_default("input_1");
    self.base.right.terminal_mut().or_default("input_2");

    let parsed: MergeStreamsConfig = parse_config(&config)?;
    self.group_by = GroupBy::configure(&config, self.evaluator.clone())?;
    self.once = parsed.notify_once.unwrap_or(true);
    Ok(())
  }

  async fn start(&self, cancel: CancellationToken) {
    let (Some(mut left_rx), Some(mut right_rx)) =
      (self.base.left.receiver(), self.base.right.receiver())
    else {
      return;
    };
    loop {
      tokio::select! {
        maybe = left_rx.recv() => {
          let Some(signals) = maybe else { return };
          let outcome = self
            .group_by
            .dispatch(signals, |group, emit, sub| self.process_left(group, emit, sub));
          deliver(&self.base, outcome).await;
          self.base.busy.done();
        }
        maybe = right_rx.recv() => {
          let Some(signals) = maybe else { return };
          let outcome = self
            .group_by
            .dispatch(signals, |group, emit, sub| self.process_right(group, emit, sub));
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
