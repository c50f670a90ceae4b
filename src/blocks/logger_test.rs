#![allow(unused_imports, dead_code, unused, clippy::type_complexity)]

use super::logger::{LogLevel, LoggerBlock};
use crate::block::Block;
use crate::error::EnqueueError;
use crate::signal::{Signal, SignalGroup};
use crate::terminal::{DEFAULT_TERMINAL, Terminal};
use serde_json::{Value, json};
use std::io;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

fn sig(value: Value) -> Signal {
  match value {
    Value::Object(map) => Signal::from(map),
    other => panic!("expected an object, got {other}"),
  }
}

/// In-memory log sink shared between the subscriber and the assertions.
#[derive(Clone, Default)]
struct Capture {
  buf: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
  fn contents(&self) -> String {
    String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
  }
}

impl io::Write for Capture {
  fn write(&mut self, data: &[u8]) -> io::Result<usize> {
    self.buf.lock().unwrap().extend_from_slice(data);
    Ok(data.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for Capture {
  type Writer = Capture;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

fn capture_logs() -> (Capture, tracing::subscriber::DefaultGuard) {
  let capture = Capture::default();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(capture.clone())
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .without_time()
    .finish();
  let guard = tracing::subscriber::set_default(subscriber);
  (capture, guard)
}

fn run(block: &Arc<LoggerBlock>) -> CancellationToken {
  let cancel = CancellationToken::new();
  let block = block.clone();
  let token = cancel.clone();
  tokio::spawn(async move { block.start(token).await });
  cancel
}

async fn put(block: &LoggerBlock, signals: SignalGroup) {
  block
    .enqueue(&Terminal::new(DEFAULT_TERMINAL), signals)
    .await
    .expect("enqueue failed");
}

#[tokio::test]
async fn test_logger_logs_each_signal() {
  let (capture, _guard) = capture_logs();

  let mut block = LoggerBlock::new();
  block
    .configure(json!({
      "type": "Logger",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "name": "pipeline-tap"
    }))
    .unwrap();

  let block = Arc::new(block);
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"foo": 1})), sig(json!({"bar": 2}))]).await;
  block.base().busy.wait().await;

  let logs = capture.contents();
  assert!(logs.contains(r#"{"foo":1}"#));
  assert!(logs.contains(r#"{"bar":2}"#));
  assert!(logs.contains("INFO"));
  assert!(logs.contains(r#""pipeline-tap""#));
}

#[tokio::test]
async fn test_logger_as_list_logs_one_line() {
  let (capture, _guard) = capture_logs();

  let mut block = LoggerBlock::new();
  block
    .configure(json!({
      "type": "Logger",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "log_as_list": true
    }))
    .unwrap();

  let block = Arc::new(block);
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"a": 1})), sig(json!({"a": 2}))]).await;
  block.base().busy.wait().await;

  let logs = capture.contents();
  assert!(logs.contains(r#"[{"a":1}, {"a":2}]"#));
}

#[tokio::test]
async fn test_logger_level_mapping() {
  let (capture, _guard) = capture_logs();

  let mut block = LoggerBlock::new();
  block
    .configure(json!({
      "type": "Logger",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "log_at": "WARNING"
    }))
    .unwrap();

  let block = Arc::new(block);
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"n": 1}))]).await;
  block.base().busy.wait().await;
  assert!(capture.contents().contains("WARN"));

  let mut block = LoggerBlock::new();
  block
    .configure(json!({
      "type": "Logger",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
      "log_at": "DEBUG"
    }))
    .unwrap();

  let block = Arc::new(block);
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"n": 2}))]).await;
  block.base().busy.wait().await;
  assert!(capture.contents().contains("DEBUG"));
}

#[tokio::test]
async fn test_logger_name_falls_back() {
  let (capture, _guard) = capture_logs();

  let mut block = LoggerBlock::new();
  block
    .configure(json!({
      "type": "Logger",
      "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB"
    }))
    .unwrap();

  let block = Arc::new(block);
  let _cancel = run(&block);

  put(&block, vec![sig(json!({"n": 1}))]).await;
  block.base().busy.wait().await;

  // The block field carries the fallback name when none is configured.
  assert!(capture.contents().contains(r#""logger""#));
}

#[tokio::test]
async fn test_logger_rejects_unknown_log_level() {
  let mut block = LoggerBlock::new();
  let err = block.configure(json!({
    "type": "Logger",
    "id": "0787AD0A-456D-46D5-AD47-5BFE2D8CA8BB",
    "log_at": "SILLY"
  }));
  assert!(err.is_err());
}

#[tokio::test]
async fn test_logger_rejects_unknown_terminal() {
  let mut block = LoggerBlock::new();
  block.configure(json!({"type": "Logger"})).unwrap();

  let err = block
    .enqueue(&Terminal::new("bogus"), vec![Signal::new()])
    .await
    .unwrap_err();
  assert!(matches!(err, EnqueueError::UnknownTerminal(_)));
}
