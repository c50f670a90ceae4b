//! # Logger Block
//!
//! A sink that writes each incoming signal to the tracing subscriber. The
//! `log_at` level controls the severity of per-signal lines; batches can be
//! logged as one list line instead with `log_as_list`.

use crate::block::{Block, Consumer};
use crate::config::{BlockConfigAtom, RawBlockConfig, parse_config};
use crate::error::{ConfigError, EnqueueError};
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Severity for emitted log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum LogLevel {
  /// `tracing::debug!`
  #[serde(rename = "DEBUG")]
  Debug,
  /// `tracing::info!`
  #[serde(rename = "INFO")]
  #[default]
  Info,
  /// `tracing::warn!`
  #[serde(rename = "WARNING")]
  Warning,
  /// `tracing::error!`
  #[serde(rename = "ERROR")]
  Error,
}

#[derive(Debug, Default, Deserialize)]
struct LoggerConfig {
  #[serde(flatten)]
  atom: BlockConfigAtom,
  #[serde(default)]
  log_at: LogLevel,
  #[serde(default)]
  log_as_list: bool,
}

/// A sink block that logs every signal it receives.
pub struct LoggerBlock {
  base: Consumer,
  config: LoggerConfig,
}

impl LoggerBlock {
  /// Creates an unconfigured logger.
  pub fn new() -> Self {
    Self {
      base: Consumer::new(),
      config: LoggerConfig::default(),
    }
  }

  /// The terminal shell, for host wiring and tests.
  pub fn base(&self) -> &Consumer {
    &self.base
  }

  fn emit(&self, line: &str) {
    let name = match self.config.atom.name.as_str() {
      "" => "logger",
      name => name,
    };
    match self.config.log_at {
      LogLevel::Debug => tracing::debug!(block = name, "{line}"),
      LogLevel::Info => tracing::info!(block = name, "{line}"),
      LogLevel::Warning => tracing::warn!(block = name, "{line}"),
      LogLevel::Error => tracing::error!(block = name, "{line}"),
    }
  }

  fn process(&self, signals: SignalGroup) {
    if self.config.log_as_list {
      let joined = signals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
      self.emit(&format!("[{joined}]"));
    } else {
      for signal in &signals {
        self.emit(&signal.to_string());
      }
    }
  }
}

impl Default for LoggerBlock {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Block for LoggerBlock {
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
          self.process(signals);
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
