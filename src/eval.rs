//! # Expression Evaluation
//!
//! Blocks are configured with small formula and condition expressions that
//! are evaluated against individual signals at run time: group keys, state
//! expressions, filter conditions, computed fields. The concrete expression
//! language is an external collaborator behind the narrow [`Evaluator`]
//! trait; the core only ever calls `evaluate(expr, signal)` and coerces the
//! result.
//!
//! [`Expr`] is the configuration-side binding. A configuration field may hold
//! either a plain JSON constant (`"initial_state": true`) or an expression
//! string (`"state_expr": "{{ $state }}"`); [`Expr`] deserializes both and
//! routes strings through the evaluator.
//!
//! [`TemplateEvaluator`] is the built-in implementation. It intentionally
//! covers only the `{{ $attr }}` placeholder form the stock blocks use; hosts
//! with a real expression engine inject their own [`Evaluator`].

use crate::error::EvalError;
use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Narrow interface to the expression engine collaborator.
pub trait Evaluator: Send + Sync {
  /// Evaluates `expr` against `signal`, producing a value or a per-signal
  /// error. Implementations must not mutate the signal.
  fn evaluate(&self, expr: &str, signal: &Signal) -> Result<Value, EvalError>;
}

/// A configured formula or condition: either a JSON constant or an
/// expression string bound to the block's [`Evaluator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expr(Value);

impl Expr {
  /// Wraps a raw configuration value as an expression binding.
  pub fn new(value: impl Into<Value>) -> Self {
    Self(value.into())
  }

  /// Evaluates against a signal. Constants pass through untouched; strings
  /// go through the evaluator.
  pub fn invoke(&self, evaluator: &dyn Evaluator, signal: &Signal) -> Result<Value, EvalError> {
    match &self.0 {
      Value::String(expr) => evaluator.evaluate(expr, signal),
      constant => Ok(constant.clone()),
    }
  }

  /// Evaluates and requires a boolean result.
  pub fn invoke_bool(&self, evaluator: &dyn Evaluator, signal: &Signal) -> Result<bool, EvalError> {
    match self.invoke(evaluator, signal)? {
      Value::Bool(b) => Ok(b),
      other => Err(self.type_error("boolean", &other)),
    }
  }

  /// Evaluates and requires a string result.
  pub fn invoke_string(
    &self,
    evaluator: &dyn Evaluator,
    signal: &Signal,
  ) -> Result<String, EvalError> {
    match self.invoke(evaluator, signal)? {
      Value::String(s) => Ok(s),
      other => Err(self.type_error("string", &other)),
    }
  }

  /// Evaluates and requires an integer result.
  pub fn invoke_i64(&self, evaluator: &dyn Evaluator, signal: &Signal) -> Result<i64, EvalError> {
    let value = self.invoke(evaluator, signal)?;
    value
      .as_i64()
      .ok_or_else(|| self.type_error("integer", &value))
  }

  fn type_error(&self, expected: &'static str, found: &Value) -> EvalError {
    EvalError::Type {
      expr: self.0.to_string(),
      expected,
      found: found.to_string(),
    }
  }
}

/// Evaluates an optional expression, substituting `default` when the field
/// was not configured.
pub fn invoke_or(
  expr: Option<&Expr>,
  evaluator: &dyn Evaluator,
  signal: &Signal,
  default: Value,
) -> Result<Value, EvalError> {
  match expr {
    Some(expr) => expr.invoke(evaluator, signal),
    None => Ok(default),
  }
}

/// Like [`invoke_or`] for boolean fields.
pub fn invoke_bool_or(
  expr: Option<&Expr>,
  evaluator: &dyn Evaluator,
  signal: &Signal,
  default: bool,
) -> Result<bool, EvalError> {
  match expr {
    Some(expr) => expr.invoke_bool(evaluator, signal),
    None => Ok(default),
  }
}

/// Built-in evaluator for the `{{ $attr }}` placeholder form.
///
/// Rules:
/// - An expression that is exactly one placeholder yields the attribute's
///   raw value (an absent attribute is a [`EvalError::MissingAttribute`]).
/// - Mixed text interpolates placeholder values into a string.
/// - Text without placeholders evaluates to itself as a string.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
  fn lookup(signal: &Signal, attr: &str) -> Result<Value, EvalError> {
    signal
      .get(attr)
      .cloned()
      .ok_or_else(|| EvalError::MissingAttribute(attr.to_string()))
  }

  fn placeholder_attr(inner: &str) -> Result<&str, EvalError> {
    let inner = inner.trim();
    let attr = inner
      .strip_prefix('$')
      .ok_or_else(|| EvalError::Syntax(inner.to_string()))?;
    if attr.is_empty() || !attr.chars().all(|c| c.is_alphanumeric() || c == '_') {
      return Err(EvalError::Syntax(inner.to_string()));
    }
    Ok(attr)
  }

  fn render(value: &Value) -> String {
    match value {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }
}

impl Evaluator for TemplateEvaluator {
  fn evaluate(&self, expr: &str, signal: &Signal) -> Result<Value, EvalError> {
    let trimmed = expr.trim();

    // Whole-expression placeholder: produce the attribute's raw value.
    if let Some(inner) = trimmed
      .strip_prefix("{{")
      .and_then(|rest| rest.strip_suffix("}}"))
    {
      if !inner.contains("{{") {
        let attr = Self::placeholder_attr(inner)?;
        return Self::lookup(signal, attr);
      }
    }

    if !expr.contains("{{") {
      return Ok(Value::String(expr.to_string()));
    }

    // Interpolate each placeholder into the surrounding text.
    let mut out = String::new();
    let mut rest = expr;
    while let Some(open) = rest.find("{{") {
      out.push_str(&rest[..open]);
      let after = &rest[open + 2..];
      let close = after
        .find("}}")
        .ok_or_else(|| EvalError::Syntax(expr.to_string()))?;
      let attr = Self::placeholder_attr(&after[..close])?;
      out.push_str(&Self::render(&Self::lookup(signal, attr)?));
      rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
  }
}
