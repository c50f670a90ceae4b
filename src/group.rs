//! # Group-Keyed Dispatch and State
//!
//! Blocks partition each incoming batch into independent correlation groups
//! and keep per-group state across invocations. The pieces here are shared by
//! every grouped block:
//!
//! - [`Group`]: an opaque, comparable correlation key derived from a signal.
//! - [`GroupBy`]: the configured key resolver plus the dispatcher that
//!   partitions a batch, invokes a handler once per distinct group, and
//!   aggregates the handler's emissions into a single outbound batch per
//!   target terminal.
//! - [`GroupedState`]: an owned, lock-guarded per-group table with a
//!   read/write split. Lookups may run concurrently with each other but
//!   never with a writer, and state belonging to one group is never touched
//!   as a side effect of another group's work.
//!
//! When no key expression is configured every signal maps to the fixed
//! default group, so the block behaves ungrouped.

use crate::config::{RawBlockConfig, parse_config};
use crate::error::{ConfigError, EvalError, ProcessError};
use crate::eval::{Evaluator, Expr};
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

/// Attribute the group key is written back under when none is configured.
const DEFAULT_GROUP_ATTR: &str = "group";

/// An opaque correlation key. Two signals whose key expressions evaluate
/// equal belong to the same group; all signals of an ungrouped block share
/// the default group.
#[derive(Clone, Debug)]
pub struct Group {
  // Canonical JSON rendering of the key value; `None` marks the default
  // group so it can never collide with an evaluated null.
  key: Option<String>,
  value: Value,
}

impl Group {
  /// Creates the key for an evaluated group value.
  pub fn keyed(value: Value) -> Self {
    Self {
      key: Some(value.to_string()),
      value,
    }
  }

  /// True for the fixed group of ungrouped blocks.
  pub fn is_default(&self) -> bool {
    self.key.is_none()
  }

  /// The evaluated key value (null for the default group).
  pub fn value(&self) -> &Value {
    &self.value
  }
}

impl Default for Group {
  fn default() -> Self {
    Self {
      key: None,
      value: Value::Null,
    }
  }
}

impl PartialEq for Group {
  fn eq(&self, other: &Self) -> bool {
    self.key == other.key
  }
}

impl Eq for Group {}

impl Hash for Group {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.key.hash(state);
  }
}

/// Grouping-related configuration fields shared by every grouped block.
#[derive(Clone, Debug, Default, Deserialize)]
struct GroupByConfig {
  #[serde(default)]
  group_by: Option<Expr>,
  #[serde(default)]
  group_attr: Option<String>,
}

/// The configured group-key resolver and batch dispatcher.
pub struct GroupBy {
  group_by: Option<Expr>,
  group_attr: String,
  evaluator: Arc<dyn Evaluator>,
}

impl GroupBy {
  /// A resolver that maps every signal to the default group.
  pub fn ungrouped(evaluator: Arc<dyn Evaluator>) -> Self {
    Self {
      group_by: None,
      group_attr: DEFAULT_GROUP_ATTR.to_string(),
      evaluator,
    }
  }

  /// Reads the `group_by` and `group_attr` fields out of a raw block
  /// configuration.
  pub fn configure(
    config: &RawBlockConfig,
    evaluator: Arc<dyn Evaluator>,
  ) -> Result<Self, ConfigError> {
    let parsed: GroupByConfig = parse_config(config)?;
    Ok(Self {
      group_by: parsed.group_by,
      group_attr: parsed
        .group_attr
        .unwrap_or_else(|| DEFAULT_GROUP_ATTR.to_string()),
      evaluator,
    })
  }

  /// Resolves the group a signal belongs to. Evaluation failure is a
  /// per-signal error; the dispatcher skips the signal without touching any
  /// state.
  pub fn resolve(&self, signal: &Signal) -> Result<Group, EvalError> {
    match &self.group_by {
      None => Ok(Group::default()),
      Some(expr) => Ok(Group::keyed(expr.invoke(self.evaluator.as_ref(), signal)?)),
    }
  }

  /// Writes the group key back into an outgoing signal under the configured
  /// attribute name, so downstream consumers can see which partition
  /// produced a result. No-op for the default group.
  pub fn annotate(&self, group: &Group, signal: &mut Signal) {
    if group.is_default() {
      return;
    }
    signal.insert(self.group_attr.clone(), group.value().clone());
  }

  /// Partitions a batch by group and invokes `handler` once per distinct
  /// group, in first-encounter order. Every signal lands in exactly one
  /// group's sub-batch and sub-batches preserve the batch's relative order.
  ///
  /// The handler emits through the [`Emitter`]; emissions for the same
  /// terminal are aggregated across groups into one outbound batch. Handler
  /// and resolution errors are collected in the outcome without aborting the
  /// remaining groups. The dispatcher holds no state of its own.
  pub fn dispatch<F>(&self, signals: SignalGroup, mut handler: F) -> DispatchOutcome
  where
    F: FnMut(&Group, &mut Emitter, SignalGroup) -> Result<(), ProcessError>,
  {
    let mut order: Vec<Group> = Vec::new();
    let mut buckets: HashMap<Group, SignalGroup> = HashMap::new();
    let mut errors: Vec<ProcessError> = Vec::new();

    for signal in signals {
      match self.resolve(&signal) {
        Ok(group) => {
          let bucket = buckets.entry(group.clone()).or_insert_with(|| {
            order.push(group);
            SignalGroup::new()
          });
          bucket.push(signal);
        }
        Err(err) => errors.push(ProcessError::Eval(err)),
      }
    }

    let mut emitter = Emitter::default();
    for group in &order {
      let sub_batch = buckets.remove(group).unwrap_or_default();
      if let Err(err) = handler(group, &mut emitter, sub_batch) {
        errors.push(err);
      }
    }

    DispatchOutcome {
      emissions: emitter.buffered,
      errors,
    }
  }
}

/// Buffered emissions of one dispatch call. Batches emitted to the same
/// terminal are concatenated so each terminal receives at most one batch per
/// dispatch.
#[derive(Default)]
pub struct Emitter {
  buffered: Vec<(Terminal, SignalGroup)>,
}

impl Emitter {
  /// Queues a batch for the named output terminal. Empty batches are
  /// ignored.
  pub fn emit(&mut self, terminal: &Terminal, signals: SignalGroup) {
    if signals.is_empty() {
      return;
    }
    if let Some((_, existing)) = self.buffered.iter_mut().find(|(t, _)| t == terminal) {
      existing.extend(signals);
    } else {
      self.buffered.push((terminal.clone(), signals));
    }
  }
}

/// Result of dispatching one batch: aggregated emissions per terminal plus
/// the errors encountered along the way.
pub struct DispatchOutcome {
  /// One entry per terminal that received at least one signal.
  pub emissions: Vec<(Terminal, SignalGroup)>,
  /// Per-signal resolution failures and per-group handler failures.
  pub errors: Vec<ProcessError>,
}

/// An owned, lock-guarded table of per-group state.
///
/// Entries are created lazily on first reference, live for the lifetime of
/// the owning block, and are only ever reached through a group key, which
/// keeps groups isolated from one another. [`GroupedState::with`] takes the
/// exclusive lock for mutations; [`GroupedState::peek`] takes the shared
/// lock, so pure lookups may run concurrently with each other but never with
/// a writer.
pub struct GroupedState<V> {
  table: RwLock<HashMap<Group, V>>,
}

impl<V> GroupedState<V> {
  /// Creates an empty table.
  pub fn new() -> Self {
    Self {
      table: RwLock::new(HashMap::new()),
    }
  }

  /// Runs `f` with exclusive access to the group's slot. The slot is `None`
  /// on first reference; leaving `None` behind removes the entry.
  pub fn with<R>(&self, group: &Group, f: impl FnOnce(&mut Option<V>) -> R) -> R {
    let mut table = self
      .table
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    let mut slot = table.remove(group);
    let out = f(&mut slot);
    if let Some(value) = slot {
      table.insert(group.clone(), value);
    }
    out
  }

  /// Runs `f` with shared access to the group's current value, if any.
  pub fn peek<R>(&self, group: &Group, f: impl FnOnce(Option<&V>) -> R) -> R {
    let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
    f(table.get(group))
  }
}

impl<V> Default for GroupedState<V> {
  fn default() -> Self {
    Self::new()
  }
}
