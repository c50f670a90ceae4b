//! # Attribute Selector Block
//!
//! Projects each signal down to (or away from) a configured attribute set.
//!
//! `mode` and every entry of `attributes` are expressions evaluated per
//! signal. When `mode` is true the listed attributes are kept and everything
//! else dropped; when false the listed attributes are removed instead. A
//! signal whose expressions fail to evaluate is dropped from the batch.

use crate::block::{Block, Notifier, Transformer};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError};
use crate::eval::{Evaluator, Expr, TemplateEvaluator, invoke_bool_or};
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
struct AttributeSelectorConfig {
  #[serde(flatten)]
  _atom: BlockConfigAtom,
  #[serde(default)]
  mode: Option<Expr>,
  #[serde(default)]
  attributes: Vec<Expr>,
}

/// A block that whitelists or blacklists signal attributes.
pub struct AttributeSelectorBlock {
  base: Transformer,
  evaluator: Arc<dyn Evaluator>,
  config: AttributeSelectorConfig,
}

impl AttributeSelectorBlock {
  /// Creates an unconfigured selector with the built-in evaluator.
  pub fn new() -> Self {
    Self::with_evaluator(Arc::new(TemplateEvaluator))
  }

  /// Creates an unconfigured selector with an injected evaluator.
  pub fn with_evaluator(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      base: Transformer::new(),
      evaluator,
      config: AttributeSelectorConfig::default(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Transformer {
    &self.base
  }

  fn select(&self, signal: &Signal) -> Option<Signal> {
    let evaluator = self.evaluator.as_ref();

    let keep = invoke_bool_or(self.config.mode.as_ref(), evaluator, signal, false).ok()?;

    let mut selection = HashSet::with_capacity(self.config.attributes.len());
    for attr in &self.config.attributes {
      selection.insert(attr.invoke_string(evaluator, signal).ok()?);
    }

    Some(
      signal
        .iter()
        .filter(|(key, _)| selection.contains(key.as_str()) == keep)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect(),
    )
  }

  async fn process(&self, signals: SignalGroup) {
    let out: SignalGroup = signals
      .iter()
      .filter_map(|signal| self.select(signal))
      .collect();
    if let Err(err) = self.base.notify(self.base.output.terminal(), out).await {
      tracing::error!(%err, "emission was not delivered");
    }
  }
}

impl Default for AttributeSelectorBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for AttributeSelectorBlock {
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
