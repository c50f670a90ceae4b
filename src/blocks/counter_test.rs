#![allow(unused_imports, dead_code, unused, clippy::type_complexity)]

use super::counter::CounterBlock;
use crate::block::Block;
use crate::busy::Busy;
use crate::signal::{Signal, SignalGroup};
use crate::terminal::{DEFAULT_TERMINAL, Terminal};
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

fn run(block: &Arc<CounterBlock>) -> CancellationToken {
  let cancel = CancellationToken::new();
  let block = block.clone();
  let token = cancel.clone();
  tokio::spawn(async move { block.start(token).await });
  cancel
}

async fn put(block: &CounterBlock, terminal: &str, signals: SignalGroup) {
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
async fn test_counter_basic() {
  let mut block = CounterBlock::new();
  block
    .configure(json!({
      "type": "Counter",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(&block, DEFAULT_TERMINAL, vec![Signal::new(); 3]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"count": 3, "cumulative_count": 3}))]);

  put(&block, DEFAULT_TERMINAL, vec![Signal::new()]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"count": 1, "cumulative_count": 4}))]);

  put(&block, DEFAULT_TERMINAL, vec![Signal::new(); 2]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"count": 2, "cumulative_count": 6}))]);
}

#[tokio::test]
async fn test_counter_grouped() {
  let mut block = CounterBlock::new();
  block
    .configure(json!({
      "type": "Counter",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "group_by": "{{ $group }}"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  let sig_a = sig(json!({"group": "a"}));
  let sig_b = sig(json!({"group": "b"}));

  put(
    &block,
    DEFAULT_TERMINAL,
    vec![sig_a.clone(), sig_b.clone(), sig_a.clone()],
  )
  .await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(
    signals,
    vec![
      sig(json!({"group": "a", "count": 2, "cumulative_count": 2})),
      sig(json!({"group": "b", "count": 1, "cumulative_count": 1})),
    ]
  );

  put(&block, DEFAULT_TERMINAL, vec![sig_b.clone()]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(
    signals,
    vec![sig(json!({"group": "b", "count": 1, "cumulative_count": 2}))]
  );

  put(&block, DEFAULT_TERMINAL, vec![sig_a.clone(), sig_a.clone()]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(
    signals,
    vec![sig(json!({"group": "a", "count": 2, "cumulative_count": 4}))]
  );
}

#[tokio::test]
async fn test_counter_group_key_failure_skips_signal() {
  let mut block = CounterBlock::new();
  block
    .configure(json!({
      "type": "Counter",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "group_by": "{{ $group }}"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  // The middle signal has no group attribute and is skipped; the other two
  // still count.
  put(
    &block,
    DEFAULT_TERMINAL,
    vec![
      sig(json!({"group": "a"})),
      sig(json!({"other": 1})),
      sig(json!({"group": "a"})),
    ],
  )
  .await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(
    signals,
    vec![sig(json!({"group": "a", "count": 2, "cumulative_count": 2}))]
  );
}

#[tokio::test]
async fn test_counter_unknown_terminal() {
  let mut block = CounterBlock::new();
  block.configure(json!({"type": "Counter"})).unwrap();

  let err = block
    .enqueue(&Terminal::new("bogus"), vec![Signal::new()])
    .await;
  assert!(err.is_err());
}
