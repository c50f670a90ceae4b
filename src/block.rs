//! # Block Lifecycle and Terminal Shells
//!
//! A [`Block`] is one dataflow processing unit. The hosting pipeline drives
//! it through a fixed contract: `configure` parses and validates the raw
//! configuration (fatal on malformed or missing required fields), `start`
//! runs the event loop until cancelled, and `enqueue` delivers a batch to a
//! named input terminal (unknown or unsupported terminals are rejected
//! synchronously).
//!
//! The terminal shells in this module own the channel plumbing so block
//! implementations only contain their algorithm. One shell exists per port
//! shape:
//!
//! - [`Transformer`]: 1 input, 1 output
//! - [`Joiner`]: 2 inputs, 1 output
//! - [`Splitter`]: 1 input, 2 outputs
//! - [`DualTransformer`]: 2 inputs, 2 outputs
//! - [`Producer`]: no inputs, 1 output
//! - [`Consumer`]: 1 input, no outputs
//!
//! Each shell routes `enqueue` by terminal name, tracks in-flight batches on
//! its [`Busy`] counter, and exposes `notify` for outbound emissions. Batches
//! on the same terminal are processed in delivery order; a block with two
//! input terminals races them at its receive point and there is no ordering
//! guarantee between terminals.

use crate::busy::Busy;
use crate::config::RawBlockConfig;
use crate::error::{ConfigError, EnqueueError, ProcessError};
use crate::group::DispatchOutcome;
use crate::signal::SignalGroup;
use crate::terminal::Terminal;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Depth of each terminal's channel.
const CHANNEL_CAPACITY: usize = 64;

/// The lifecycle contract every block implements.
#[async_trait]
pub trait Block: Send + Sync {
  /// Parses and validates the raw configuration. Fatal errors here prevent
  /// the block from ever starting.
  fn configure(&mut self, config: RawBlockConfig) -> Result<(), ConfigError>;

  /// Runs the event loop until the token is cancelled. In-flight processing
  /// of an already-dequeued batch completes before the loop exits.
  async fn start(&self, cancel: CancellationToken);

  /// Delivers a batch to a named input terminal.
  async fn enqueue(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), EnqueueError>;
}

/// Anything with named output terminals that can carry an emission.
pub trait Notifier {
  /// Sends a batch out of the named terminal.
  fn notify(
    &self,
    terminal: &Terminal,
    signals: SignalGroup,
  ) -> impl Future<Output = Result<(), ProcessError>> + Send;
}

/// Sends a dispatch outcome's emissions through a shell and logs whatever
/// the dispatch dropped or failed on. Delivery failures are terminal for the
/// emission only, never for the block.
pub(crate) async fn deliver<N: Notifier + Sync>(shell: &N, outcome: DispatchOutcome) {
  for (terminal, signals) in outcome.emissions {
    if let Err(err) = shell.notify(&terminal, signals).await {
      tracing::error!(%terminal, %err, "emission was not delivered");
    }
  }
  for err in outcome.errors {
    tracing::warn!(%err, "dispatch dropped work");
  }
}

/// Receiving end of one input terminal.
pub struct Inlet {
  terminal: Terminal,
  tx: mpsc::Sender<SignalGroup>,
  rx: Mutex<Option<mpsc::Receiver<SignalGroup>>>,
}

impl Inlet {
  fn with_terminal(terminal: Terminal) -> Self {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    Self {
      terminal,
      tx,
      rx: Mutex::new(Some(rx)),
    }
  }

  /// The terminal this inlet answers to.
  pub fn terminal(&self) -> &Terminal {
    &self.terminal
  }

  /// Mutable access for terminal-name overrides and defaulting during
  /// configuration.
  pub fn terminal_mut(&mut self) -> &mut Terminal {
    &mut self.terminal
  }

  /// Takes the receiving end. The run loop claims it once at startup;
  /// subsequent calls return `None`.
  pub fn receiver(&self) -> Option<mpsc::Receiver<SignalGroup>> {
    self
      .rx
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .take()
  }

  async fn send(&self, signals: SignalGroup) -> Result<(), EnqueueError> {
    self
      .tx
      .send(signals)
      .await
      .map_err(|_| EnqueueError::Closed(self.terminal.clone()))
  }
}

/// Sending end of one output terminal.
pub struct Outlet {
  terminal: Terminal,
  tx: mpsc::Sender<SignalGroup>,
  rx: Mutex<Option<mpsc::Receiver<SignalGroup>>>,
}

impl Outlet {
  fn with_terminal(terminal: Terminal) -> Self {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    Self {
      terminal,
      tx,
      rx: Mutex::new(Some(rx)),
    }
  }

  /// The terminal this outlet emits on.
  pub fn terminal(&self) -> &Terminal {
    &self.terminal
  }

  /// Mutable access for terminal-name overrides and defaulting during
  /// configuration.
  pub fn terminal_mut(&mut self) -> &mut Terminal {
    &mut self.terminal
  }

  /// Takes the receiving end so the host (or a test) can consume this
  /// block's output. Subsequent calls return `None`.
  pub fn take(&self) -> Option<mpsc::Receiver<SignalGroup>> {
    self
      .rx
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
      .take()
  }

  async fn send(&self, signals: SignalGroup) -> Result<(), ProcessError> {
    self
      .tx
      .send(signals)
      .await
      .map_err(|_| ProcessError::ChannelClosed(self.terminal.clone()))
  }
}

async fn accept(busy: &Busy, inlet: &Inlet, signals: SignalGroup) -> Result<(), EnqueueError> {
  busy.add(1);
  match inlet.send(signals).await {
    Ok(()) => Ok(()),
    Err(err) => {
      busy.done();
      Err(err)
    }
  }
}

/// Shell for blocks with one input and one output terminal.
pub struct Transformer {
  /// The single input terminal.
  pub input: Inlet,
  /// The single output terminal.
  pub output: Outlet,
  /// In-flight batch tracking.
  pub busy: Busy,
}

impl Transformer {
  /// Creates the shell with default terminal names on both ports.
  pub fn new() -> Self {
    Self {
      input: Inlet::with_terminal(Terminal::default()),
      output: Outlet::with_terminal(Terminal::default()),
      busy: Busy::new(),
    }
  }

  /// Routes a batch to the input terminal.
  pub async fn enqueue(
    &self,
    terminal: &Terminal,
    signals: SignalGroup,
  ) -> Result<(), EnqueueError> {
    if terminal != self.input.terminal() {
      return Err(EnqueueError::UnknownTerminal(terminal.clone()));
    }
    accept(&self.busy, &self.input, signals).await
  }
}

impl Default for Transformer {
  fn default() -> Self {
    Self::new()
  }
}

impl Notifier for Transformer {
  async fn notify(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), ProcessError> {
    if terminal != self.output.terminal() {
      return Err(ProcessError::UnknownTerminal(terminal.clone()));
    }
    self.output.send(signals).await
  }
}

/// Shell for blocks with two input terminals and one output terminal.
///
/// The input terminals start unset; the owning block assigns its defaults
/// during configuration (for example `"getter"`/`"setter"`).
pub struct Joiner {
  /// First input terminal.
  pub left: Inlet,
  /// Second input terminal.
  pub right: Inlet,
  /// The single output terminal.
  pub output: Outlet,
  /// In-flight batch tracking.
  pub busy: Busy,
}

impl Joiner {
  /// Creates the shell; input terminal names are filled in by the block.
  pub fn new() -> Self {
    Self {
      left: Inlet::with_terminal(Terminal::unset()),
      right: Inlet::with_terminal(Terminal::unset()),
      output: Outlet::with_terminal(Terminal::default()),
      busy: Busy::new(),
    }
  }

  /// Routes a batch to whichever input terminal matches.
  pub async fn enqueue(
    &self,
    terminal: &Terminal,
    signals: SignalGroup,
  ) -> Result<(), EnqueueError> {
    if terminal == self.left.terminal() {
      accept(&self.busy, &self.left, signals).await
    } else if terminal == self.right.terminal() {
      accept(&self.busy, &self.right, signals).await
    } else {
      Err(EnqueueError::UnknownTerminal(terminal.clone()))
    }
  }
}

impl Default for Joiner {
  fn default() -> Self {
    Self::new()
  }
}

impl Notifier for Joiner {
  async fn notify(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), ProcessError> {
    if terminal != self.output.terminal() {
      return Err(ProcessError::UnknownTerminal(terminal.clone()));
    }
    self.output.send(signals).await
  }
}

/// Shell for blocks with one input terminal and two output terminals.
pub struct Splitter {
  /// The single input terminal.
  pub input: Inlet,
  /// First output terminal.
  pub left: Outlet,
  /// Second output terminal.
  pub right: Outlet,
  /// In-flight batch tracking.
  pub busy: Busy,
}

impl Splitter {
  /// Creates the shell; output terminal names are filled in by the block.
  pub fn new() -> Self {
    Self {
      input: Inlet::with_terminal(Terminal::default()),
      left: Outlet::with_terminal(Terminal::unset()),
      right: Outlet::with_terminal(Terminal::unset()),
      busy: Busy::new(),
    }
  }

  /// Routes a batch to the input terminal.
  pub async fn enqueue(
    &self,
    terminal: &Terminal,
    signals: SignalGroup,
  ) -> Result<(), EnqueueError> {
    if terminal != self.input.terminal() {
      return Err(EnqueueError::UnknownTerminal(terminal.clone()));
    }
    accept(&self.busy, &self.input, signals).await
  }
}

impl Default for Splitter {
  fn default() -> Self {
    Self::new()
  }
}

impl Notifier for Splitter {
  async fn notify(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), ProcessError> {
    if terminal == self.left.terminal() {
      self.left.send(signals).await
    } else if terminal == self.right.terminal() {
      self.right.send(signals).await
    } else {
      Err(ProcessError::UnknownTerminal(terminal.clone()))
    }
  }
}

/// Shell for blocks with two input and two output terminals.
pub struct DualTransformer {
  /// First input terminal.
  pub in_left: Inlet,
  /// Second input terminal.
  pub in_right: Inlet,
  /// First output terminal.
  pub out_left: Outlet,
  /// Second output terminal.
  pub out_right: Outlet,
  /// In-flight batch tracking.
  pub busy: Busy,
}

impl DualTransformer {
  /// Creates the shell; all terminal names are filled in by the block.
  pub fn new() -> Self {
    Self {
      in_left: Inlet::with_terminal(Terminal::unset()),
      in_right: Inlet::with_terminal(Terminal::unset()),
      out_left: Outlet::with_terminal(Terminal::unset()),
      out_right: Outlet::with_terminal(Terminal::unset()),
      busy: Busy::new(),
    }
  }

  /// Routes a batch to whichever input terminal matches.
  pub async fn enqueue(
    &self,
    terminal: &Terminal,
    signals: SignalGroup,
  ) -> Result<(), EnqueueError> {
    if terminal == self.in_left.terminal() {
      accept(&self.busy, &self.in_left, signals).await
    } else if terminal == self.in_right.terminal() {
      accept(&self.busy, &self.in_right, signals).await
    } else {
      Err(EnqueueError::UnknownTerminal(terminal.clone()))
    }
  }
}

impl Default for DualTransformer {
  fn default() -> Self {
    Self::new()
  }
}

impl Notifier for DualTransformer {
  async fn notify(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), ProcessError> {
    if terminal == self.out_left.terminal() {
      self.out_left.send(signals).await
    } else if terminal == self.out_right.terminal() {
      self.out_right.send(signals).await
    } else {
      Err(ProcessError::UnknownTerminal(terminal.clone()))
    }
  }
}

/// Shell for source blocks: no inputs, one output terminal.
pub struct Producer {
  /// The single output terminal.
  pub output: Outlet,
}

impl Producer {
  /// Creates the shell with a default-named output terminal.
  pub fn new() -> Self {
    Self {
      output: Outlet::with_terminal(Terminal::default()),
    }
  }

  /// Producers never accept input; every enqueue is rejected.
  pub fn no_enqueue(&self, terminal: &Terminal) -> Result<(), EnqueueError> {
    Err(EnqueueError::Unsupported(terminal.clone()))
  }
}

impl Default for Producer {
  fn default() -> Self {
    Self::new()
  }
}

impl Notifier for Producer {
  async fn notify(&self, terminal: &Terminal, signals: SignalGroup) -> Result<(), ProcessError> {
    if terminal != self.output.terminal() {
      return Err(ProcessError::UnknownTerminal(terminal.clone()));
    }
    self.output.send(signals).await
  }
}

/// Shell for sink blocks: one input terminal, no outputs.
pub struct Consumer {
  /// The single input terminal.
  pub input: Inlet,
  /// In-flight batch tracking.
  pub busy: Busy,
}

impl Consumer {
  /// Creates the shell with a default-named input terminal.
  pub fn new() -> Self {
    Self {
      input: Inlet::with_terminal(Terminal::default()),
      busy: Busy::new(),
    }
  }

  /// Routes a batch to the input terminal.
  pub async fn enqueue(
    &self,
    terminal: &Terminal,
    signals: SignalGroup,
  ) -> Result<(), EnqueueError> {
    if terminal != self.input.terminal() {
      return Err(EnqueueError::UnknownTerminal(terminal.clone()));
    }
    accept(&self.busy, &self.input, signals).await
  }
}

impl Default for Consumer {
  fn default() -> Self {
    Self::new()
  }
}
