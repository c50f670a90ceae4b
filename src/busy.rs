//! # Completion Acknowledgment
//!
//! [`Busy`] tracks batches that have been enqueued but not yet fully
//! processed. A delivery adds one, the run loop acknowledges one after the
//! batch's emissions have been sent, and synchronous orchestration or test
//! code awaits [`Busy::wait`] to know that every accepted batch has been
//! fully processed before inspecting outputs.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counter of in-flight batches with an awaitable zero state.
#[derive(Debug, Default)]
pub struct Busy {
  count: AtomicUsize,
  notify: Notify,
}

impl Busy {
  /// Creates an idle tracker.
  pub fn new() -> Self {
    Self::default()
  }

  /// Records `n` newly accepted batches.
  pub fn add(&self, n: usize) {
    self.count.fetch_add(n, Ordering::AcqRel);
  }

  /// Acknowledges one fully processed batch.
  pub fn done(&self) {
    let prev = self.count.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(prev > 0, "done() without matching add()");
    if prev == 1 {
      self.notify.notify_waiters();
    }
  }

  /// Number of batches currently in flight.
  pub fn in_flight(&self) -> usize {
    self.count.load(Ordering::Acquire)
  }

  /// Resolves once every accepted batch has been acknowledged.
  pub async fn wait(&self) {
    loop {
      let notified = self.notify.notified();
      if self.count.load(Ordering::Acquire) == 0 {
        return;
      }
      notified.await;
    }
  }
}
