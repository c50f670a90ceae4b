//! # AppendState Block
//!
//! An external state store with getter and setter input terminals, keyed by
//! correlation group.
//!
//! ## Terminals
//!
//! - **Input** `"getter"`: every signal is cloned and annotated with the
//!   group's current state, then the batch is re-emitted in order.
//! - **Input** `"setter"`: the configured `state_expr` is evaluated against
//!   the **last** signal of the sub-batch and stored as the group's state.
//!   Emits nothing.
//! - **Output**: default terminal.
//!
//! Both paths share one read/write lock per state table: setters take
//! exclusive access, getters shared access. A group that has never been set
//! reads the configured `initial_state` (default null). `state_expr` is
//! required; its absence fails configuration.

use crate::block::{Block, Joiner, deliver};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError, ProcessError};
use crate::eval::{Evaluator, Expr, TemplateEvaluator};
use crate::group::{Emitter, Group, GroupBy, GroupedState};
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_STATE_ATTR: &str = "state";

#[derive(Debug, Default, Deserialize)]
struct AppendStateConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  state_expr: Option<Expr>,
  #[serde(default)]
  initial_state: Option<Value>,
  #[serde(default)]
  state_name: Option<String>,
}

/// A block that stores an arbitrary per-group value and attaches it to
/// signals on demand.
pub struct AppendStateBlock {
  base: Joiner,
  evaluator: Arc<dyn Evaluator>,
  group_by: GroupBy,
  state_expr: Option<Expr>,
  initial_state: Value,
  state_name: String,
  state: GroupedState<Value>,
}

impl AppendStateBlock {
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
      state_expr: None,
      initial_state: Value::Null,
      state_name: DEFAULT_STATE_ATTR.to_string(),
      state: GroupedState::new(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Joiner {
    &self.base
  }

  fn process_getter(
    &self,
    group: &Group,
    emit: &mut Emitter,
    signals: SignalGroup,
  ) -> Result<(), ProcessError> {
    // Shared lock: lookups run concurrently with each other, never with a
    // setter.
    let state = self
      .state
      .peek(group, |value| value.cloned())
      .unwrap_or_else(|| self.initial_state.clone());

    let out: SignalGroup = signals
      .into_iter()
      .map(|mut signal| {
        signal.insert(self.state_name.clone(), state.clone());
        signal
      })
      .collect();

    emit.emit(self.base.output.terminal(), out);
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

    let value = expr.invoke(self.evaluator.as_ref(), last)?;
    self.state.with(group, |slot| *slot = Some(value));
    Ok(())
  }
}

impl Default for AppendStateBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for AppendStateBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    self.base.left.terminal_mut().or_default("getter");
    self.base.right.terminal_mut().or_default("setter");

    let parsed: AppendStateConfig = parse_config(&config)?;
    self.group_by = GroupBy::configure(&config, self.evaluator.clone())?;

    self.state_expr = Some(
      parsed
        .state_expr
        .ok_or(ConfigError::MissingField("state_expr"))?,
    );
    self.initial_state = parsed.initial_state.unwrap_or(Value::Null);
    self.state_name = parsed
      .state_name
      .unwrap_or_else(|| DEFAULT_STATE_ATTR.to_string());
    Ok(())
  }

  async fn start(&self, cancel: CancellationToken) {
    let (Some(mut getter_rx), Some(mut setter_rx)) =
      (self.base.left.receiver(), self.base.right.receiver())
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
