#![allow(unused_imports, dead_code, unused, clippy::type_complexity)]

use super::append_state::AppendStateBlock;
use crate::block::Block;
use crate::busy::Busy;
use crate::error::ConfigError;
use crate::signal::{Signal, SignalGroup};
use crate::terminal::Terminal;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn sig(value: Value) -> Signal {
  match value {
    Value::Object(map) => Signal::from(map),
    other => panic!("expected an object, got {other}"),
  }
}

fn run(block: &Arc<AppendStateBlock>) -> CancellationToken {
  let cancel = CancellationToken::new();
  let block = block.clone();
  let token = cancel.clone();
  tokio::spawn(async move { block.start(token).await });
  cancel
}

async fn put(block: &AppendStateBlock, terminal: &str, signals: SignalGroup) {
  block
    .enqueue(&Terminal::new(terminal), signals)
    .await
    .expect("enqueue failed");
}

async fn take_one(rx: &mut mpsc::Receiver<SignalGroup>, busy: &Busy) -> SignalGroup {
  busy.wait().await;
  match rx.try_recv() {
    Ok(signals) => signals,
    Err(_) => panic!("channel has no signals"),
  }
}

async fn take_none(rx: &mut mpsc::Receiver<SignalGroup>, busy: &Busy) {
  busy.wait().await;
  if let Ok(signals) = rx.try_recv() {
    panic!("channel has {} signals", signals.len());
  }
}

#[tokio::test]
async fn test_append_state_round_trip() {
  let mut block = AppendStateBlock::new();
  block
    .configure(json!({
      "type": "AppendState",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "state_expr": "{{ $state }}"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  // Before any setter runs the getter annotates with the initial state.
  put(&block, "getter", vec![sig(json!({"n": 1}))]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"n": 1, "state": null}))]);

  // Setters emit nothing.
  put(&block, "setter", vec![sig(json!({"state": 42}))]).await;
  take_none(&mut out, &block.base().busy).await;

  put(
    &block,
    "getter",
    vec![sig(json!({"n": 2})), sig(json!({"n": 3}))],
  )
  .await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(
    signals,
    vec![
      sig(json!({"n": 2, "state": 42})),
      sig(json!({"n": 3, "state": 42})),
    ]
  );
}

#[tokio::test]
async fn test_append_state_setter_uses_last_signal() {
  let mut block = AppendStateBlock::new();
  block
    .configure(json!({
      "type": "AppendState",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "state_expr": "{{ $state }}"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(
    &block,
    "setter",
    vec![
      sig(json!({"state": "first"})),
      sig(json!({"state": "last"})),
    ],
  )
  .await;
  take_none(&mut out, &block.base().busy).await;

  put(&block, "getter", vec![Signal::new()]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"state": "last"}))]);
}

#[tokio::test]
async fn test_append_state_initial_state_and_name() {
  let mut block = AppendStateBlock::new();
  block
    .configure(json!({
      "type": "AppendState",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "state_expr": "{{ $state }}",
      "initial_state": "quux",
      "state_name": "latched"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(&block, "getter", vec![Signal::new()]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"latched": "quux"}))]);
}

#[tokio::test]
async fn test_append_state_grouped() {
  let mut block = AppendStateBlock::new();
  block
    .configure(json!({
      "type": "AppendState",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "state_expr": "{{ $state }}",
      "group_by": "{{ $group }}"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(
    &block,
    "setter",
    vec![sig(json!({"group": "a", "state": 1}))],
  )
  .await;
  take_none(&mut out, &block.base().busy).await;

  put(
    &block,
    "getter",
    vec![sig(json!({"group": "a"})), sig(json!({"group": "b"}))],
  )
  .await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(
    signals,
    vec![
      sig(json!({"group": "a", "state": 1})),
      sig(json!({"group": "b", "state": null})),
    ]
  );
}

#[tokio::test]
async fn test_append_state_requires_state_expr() {
  let mut block = AppendStateBlock::new();
  let err = block
    .configure(json!({
      "type": "AppendState",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB"
    }))
    .unwrap_err();
  assert!(matches!(err, ConfigError::MissingField("state_expr")));
}
