//! # Noop Block
//!
//! Forwards every batch unchanged. Useful as a placeholder while wiring a
//! pipeline and as the smallest possible lifecycle exercise in tests.

use crate::block::{Block, Notifier, Transformer};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError};
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A block that passes batches through untouched.
pub struct NoopBlock {
  base: Transformer,
}

impl NoopBlock {
  /// Creates an unconfigured noop.
  pub fn new() -> Self {
    Self {
      base: Transformer::new(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Transformer {
    &self.base
  }
}

impl Default for NoopBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for NoopBlock {
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError> {
    let _: BlockConfigAtom = parse_config(&config)?;
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
          if let Err(err) = self.base.notify(self.base.output.terminal(), signals).await {
            tracing::error!(%err, "emission was not delivered");
          }
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
