//! # Modifier Block
//!
//! A stateless transform that adds computed fields to every signal.
//!
//! ## Behavior
//!
//! For each signal, the block starts from either a clone of the input or an
//! empty signal (when `exclude` evaluates true), then evaluates each
//! configured field's `title` and `formula` against the original input and
//! writes the result. Evaluation failures degrade rather than drop: the
//! signal built so far is emitted as-is (on an `exclude` failure, the
//! original input passes through untouched). One output batch per input
//! batch, order preserved.

use crate::block::{Block, Notifier, Transformer};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError};
use crate::eval::{Evaluator, Expr, TemplateEvaluator, invoke_bool_or, invoke_or};
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ModifierField {
  title: Expr,
  #[serde(default)]
  formula: Option<Expr>,
}

#[derive(Debug, Default, Deserialize)]
struct ModifierConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  exclude: Option<Expr>,
  #[serde(default)]
  fields: Vec<ModifierField>,
}

/// A block that attaches computed attributes to passing signals.
pub struct ModifierBlock {
  base: Transformer,
  evaluator: Arc<dyn Evaluator>,
  config: ModifierConfig,
}

impl ModifierBlock {
  /// Creates an unconfigured modifier with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured modifier with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: Transformer::new(),
      evaluator,
      config: ModifierConfig::default(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Transformer {
    &self.base
  }

  fn modify(&self, input: &Signal) -> Signal {
    let evaluator = self.evaluator.as_ref();

    let mut next = match invoke_bool_or(self.config.exclude.as_ref(), evaluator, input, false) {
      // An exclude failure passes the input through untouched.
      Err(err) => {
        tracing::warn!(%err, "exclude failed to evaluate");
        return input.clone();
      }
      Ok(true) => Signal::new(),
      Ok(false) => input.clone(),
    };

    for field in &self.config.fields {
      let title = match field.title.invoke_string(evaluator, input) {
        Ok(title) => title,
        Err(err) => {
          tracing::warn!(%err, "field title failed to evaluate");
          break;
        }
      };
      let value = match invoke_or(field.formula.as_ref(), evaluator, input, Value::Null) {
        Ok(value) => value,
        Err(err) => {
          tracing::warn!(%err, field = %title, "field formula failed to evaluate");
          break;
        }
      };
      next.insert(title, value);
    }

    next
  }

  async fn process(&self, signals: SignalGroup) {
    let out: SignalGroup = signals.iter().map(|signal| self.modify(signal)).collect();
    if let Err(err) = self.base.notify(self.base.output.terminal(), out).await {
      tracing::error!(%err, "emission was not delivered");
    }
  }
}

impl Default for ModifierBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for ModifierBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    self.config = parse_config(&config)?;
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
