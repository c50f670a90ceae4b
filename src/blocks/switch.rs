//! # Switch Block
//!
//! A boolean-routed gate: a per-group flag decides which of two output
//! terminals a getter batch leaves through.
//!
//! ## Terminals
//!
//! - **Input** `"getter"`: the whole sub-batch is routed unmodified to the
//!   `"true"` terminal when the group's state is true, else to `"false"`.
//!   Exactly one terminal receives output per getter dispatch per group.
//! - **Input** `"setter"`: the required boolean `state_expr` is evaluated
//!   against the **last** signal of the sub-batch and stored as the group's
//!   state. An evaluation failure here is a processing error, not a silent
//!   drop.
//! - **Output** `"true"` / `"false"`.
//!
//! A group that was never set routes by `initial_state` (default false).

use crate::block::{Block, DualTransformer, deliver};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError, ProcessError};
use crate::eval::{Evaluator, Expr, TemplateEvaluator};
use crate::group::{Emitter, Group, GroupBy, GroupedState};
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
struct SwitchConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  state_expr: Option<Expr>,
  #[serde(default)]
  initial_state: Option<bool>,
}

/// A block that routes getter batches by a per-group boolean flag.
pub struct SwitchBlock {
  base: DualTransformer,
  evaluator: Arc<dyn Evaluator>,
  group_by: GroupBy,
  state_expr: Option<Expr>,
  initial_state: bool,
  state: GroupedState<bool>,
}

impl SwitchBlock {
  /// Creates an unconfigured switch with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured switch with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: DualTransformer::new(),
      group_by: GroupBy::ungrouped(evaluator.clone()),
      evaluator,
      state_expr: None,
      initial_state: false,
      state: GroupedState::new(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &DualTransformer {
    &self.base
  }

  fn process_getter(
    &self,
    group: &Group,
    emit: &mut Emitter,
    signals: SignalGroup,
  ) -> Result<(), ProcessError> {
    let state = self
      .state
      .peek(group, |value| value.copied())
      .unwrap_or(self.initial_state);

    let terminal = if state {
      self.base.out_left.terminal()
    } else {
      self.base.out_right.terminal()
    };
    emit.emit(terminal, signals);
    Ok(())
  }

  fn process_setter(
    &self,
    group: &Group,
    _emit: &mut Emitter,
    signals: SignalGroup,
  ) -> Result<(), ProcessError> {
    let expr = self.state_expr.as_ref().ok_or(ProcessError::NotConfigured)?;
    let Some(last) = signals.last() else {
      return Ok(());
    };

    let value = expr.invoke_bool(self.evaluator.as_ref(), last)?;
    self.state.with(group, |slot| *slot = Some(value));
    Ok(())
  }
}

impl Default for SwitchBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for SwitchBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    self.base.in_left.terminal_mut().or_default("getter");
    self.base.in_right.terminal_mut().or_default("setter");
    self.base.out_left.terminal_mut().or_default("true");
    self.base.out_right.terminal_mut().or_default("false");

    let parsed: SwitchConfig = parse_config(&config)?;
    self.group_by = GroupBy::configure(&config, self.evaluator.clone())?;

    self.state_expr = Some(
      parsed
        .state_expr
        .ok_or(ConfigError::MissingField("state_expr"))?,
    );
    self.initial_state = parsed.initial_state.unwrap_or(false);
    Ok(())
  }

  async fn start(&self, cancel: CancellationToken) {
    let (Some(mut getter_rx), Some(mut setter_rx)) =
      (self.base.in_left.receiver(), self.base.in_right.receiver())
    else {
      return;
    };
    loop {
      tokio::select! {
        maybe = getter_rx.recv() => {
          let Some(signals) = maybe else { return };
          let outcome = self
            .group_by
            .dispatch(signals, |group, emit, sub| self.process_getter(group, emit, sub));
          deliver(&self.base, outcome).await;
          self.base.busy.done();
        }
        maybe = setter_rx.recv() => {
          let Some(signals) = maybe else { return };
          let outcome = self
            .group_by
            .dispatch(signals, |group, emit, sub| self.process_setter(group, emit, sub));
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
