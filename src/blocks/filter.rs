//! # Filter Block
//!
//! A stateless, ungrouped splitter that tests each signal against a
//! configured list of boolean conditions and fans it out to a `"true"` or
//! `"false"` terminal.
//!
//! ## Behavior
//!
//! The `operator` combines the conditions: `ALL` (logical AND, the default)
//! or `ANY` (logical OR). Conditions are evaluated per signal, in order; a
//! signal whose evaluation fails on any condition is dropped entirely and
//! routed to neither side. Each terminal receives all of its signals as one
//! batch per dispatch, and only if it has at least one signal.
//!
//! An empty condition list or an unrecognized operator fails configuration.

use crate::block::{Block, Notifier, Splitter};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError};
use crate::eval::{Evaluator, Expr, TemplateEvaluator};
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a filter combines its condition results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub enum FilterOperator {
  /// Every condition must hold (logical AND).
  #[default]
  #[serde(rename = "ALL")]
  All,
  /// At least one condition must hold (logical OR).
  #[serde(rename = "ANY")]
  Any,
}

#[derive(Debug, Deserialize)]
struct FilterCondition {
  expr: Expr,
}

#[derive(Debug, Default, Deserialize)]
struct FilterConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  operator: Option<FilterOperator>,
  #[serde(default)]
  conditions: Vec<FilterCondition>,
}

/// A block that routes each signal by a boolean combination of conditions.
pub struct FilterBlock {
  base: Splitter,
  evaluator: Arc<dyn Evaluator>,
  operator: FilterOperator,
  conditions: Vec<Expr>,
}

impl FilterBlock {
  /// Creates an unconfigured filter with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured filter with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: Splitter::new(),
      evaluator,
      operator: FilterOperator::All,
      conditions: Vec::new(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Splitter {
    &self.base
  }

  async fn process(&self, signals: SignalGroup) {
    let mut passing = SignalGroup::with_capacity(signals.len());
    let mut failing = SignalGroup::with_capacity(signals.len());

    'signals: for signal in signals {
      let mut test = matches!(self.operator, FilterOperator::All);

      for condition in &self.conditions {
        let held = match condition.invoke_bool(self.evaluator.as_ref(), &signal) {
          Ok(held) => held,
          Err(err) => {
            tracing::warn!(%err, "condition failed to evaluate, dropping signal");
            continue 'signals;
          }
        };
        test = match self.operator {
          FilterOperator::All => test && held,
          FilterOperator::Any => test || held,
        };
      }

      if test {
        passing.push(signal);
      } else {
        failing.push(signal);
      }
    }

    for (outlet, batch) in [(&self.base.left, passing), (&self.base.right, failing)] {
      if batch.is_empty() {
        continue;
      }
      if let Err(err) = self.base.notify(outlet.terminal(), batch).await {
        tracing::error!(%err, "emission was not delivered");
      }
    }
  }
}

impl Default for FilterBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for FilterBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    self.base.left.terminal_mut().or_default("true");
    self.base.right.terminal_mut().or_default("false");

    let parsed: FilterConfig = parse_config(&config)?;
    if parsed.conditions.is_empty() {
      return Err(ConfigError::MissingField("conditions"));
    }
    self.operator = parsed.operator.unwrap_or_default();
    self.conditions = parsed
      .conditions
      .into_iter()
      .map(|condition| condition.expr)
      .collect();
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
          self.process(signals).await;
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
