#![allow(unused_imports, dead_code, unused, clippy::type_complexity)]

use super::debounce::DebounceBlock;
use crate::block::Block;
use crate::busy::Busy;
use crate::signal::{Signal, SignalGroup};
use crate::terminal::{DEFAULT_TERMINAL, Terminal};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn sig(value: Value) -> Signal {
  match value {
    Value::Object(map) => Signal::from(map),
    other => panic!("expected an object, got {other}"),
  }
}

fn run(block: &Arc<DebounceBlock>) -> CancellationToken {
  let cancel = CancellationToken::new();
  let block = block.clone();
  let token = cancel.clone();
  tokio::spawn(async move { block.start(token).await });
  cancel
}

async fn put(block: &DebounceBlock, signals: SignalGroup) {
  block
    .enqueue(&Terminal::new(DEFAULT_TERMINAL), signals)
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

#[tokio::test(start_paused = true)]
async fn test_debounce_first_batch_passes_with_last_signal() {
  let mut block = DebounceBlock::new();
  block
    .configure(json!({
      "type": "Debounce",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(
    &block,
    vec![sig(json!({"n": 1})), sig(json!({"n": 2})), sig(json!({"n": 3}))],
  )
  .await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"n": 3}))]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_window_is_strict() {
  let mut block = DebounceBlock::new();
  block
    .configure(json!({
      "type": "Debounce",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "interval": {"seconds": 1}
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"n": 1}))]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"n": 1}))]);

  // Inside the window: suppressed, and the suppression does not extend the
  // window.
  put(&block, vec![sig(json!({"n": 2}))]).await;
  take_none(&mut out, &block.base().busy).await;

  // Exactly the interval is still inside the window.
  tokio::time::advance(Duration::from_secs(1)).await;
  put(&block, vec![sig(json!({"n": 3}))]).await;
  take_none(&mut out, &block.base().busy).await;

  tokio::time::advance(Duration::from_millis(1)).await;
  put(&block, vec![sig(json!({"n": 4}))]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"n": 4}))]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_groups_are_independent() {
  let mut block = DebounceBlock::new();
  block
    .configure(json!({
      "type": "Debounce",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "group_by": "{{ $group }}"
    }))
    .unwrap();

  let block = Arc::new(block);
  let mut out = block.base().output.take().unwrap();
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"group": "a", "n": 1}))]).await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"group": "a", "n": 1}))]);

  // Group a is inside its window, but group b has never emitted.
  put(
    &block,
    vec![
      sig(json!({"group": "a", "n": 2})),
      sig(json!({"group": "b", "n": 1})),
    ],
  )
  .await;
  let signals = take_one(&mut out, &block.base().busy).await;
  assert_eq!(signals, vec![sig(json!({"group": "b", "n": 1}))]);
}
