//! Serialization primitive for cart mutations.
//!
//! The remote cart is addressed by a single mutable token; concurrent
//! mutations against it race on the server and can silently drop updates.
//! All mutations therefore flow through one queue drained by a single
//! worker, strictly FIFO, one operation fully completing before the next
//! starts. One operation's failure resolves only its own caller.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

/// The queue worker has shut down; the operation never ran (or its result
/// was dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

#[derive(Clone)]
pub struct OperationQueue {
  tx: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl OperationQueue {
  /// Create the queue and spawn its worker task.
  pub fn new() -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();

    tokio::spawn(async move {
      while let Some(op) = rx.recv().await {
        op.await;
      }
    });

    Self { tx }
  }

  /// Enqueue an operation and wait for its result.
  ///
  /// The operation starts only after every previously-enqueued operation
  /// has completed, successfully or not.
  pub async fn run<T, F>(&self, op: F) -> Result<T, QueueClosed>
  where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
  {
    let (done_tx, done_rx) = oneshot::channel();

    let wrapped: BoxFuture<'static, ()> = Box::pin(async move {
      let _ = done_tx.send(op.await);
    });

    self.tx.send(wrapped).map_err(|_| QueueClosed)?;
    done_rx.await.map_err(|_| QueueClosed)
  }
}

impl Default for OperationQueue {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq, Eq)]
  enum Mark {
    Start(u32),
    End(u32),
  }

  #[tokio::test]
  async fn test_operations_never_overlap() {
    let queue = OperationQueue::new();
    let marks: Arc<Mutex<Vec<Mark>>> = Arc::new(Mutex::new(Vec::new()));

    // Enqueue both without awaiting the first: the slow first operation
    // must still fully complete before the second starts.
    let slow = {
      let marks = Arc::clone(&marks);
      queue.run(async move {
        marks.lock().unwrap().push(Mark::Start(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        marks.lock().unwrap().push(Mark::End(1));
      })
    };
    let fast = {
      let marks = Arc::clone(&marks);
      queue.run(async move {
        marks.lock().unwrap().push(Mark::Start(2));
        marks.lock().unwrap().push(Mark::End(2));
      })
    };

    let (first, second) = tokio::join!(slow, fast);
    first.unwrap();
    second.unwrap();

    let marks = marks.lock().unwrap().clone();
    assert_eq!(
      marks,
      vec![Mark::Start(1), Mark::End(1), Mark::Start(2), Mark::End(2)]
    );
  }

  #[tokio::test]
  async fn test_failure_does_not_block_subsequent_operations() {
    let queue = OperationQueue::new();

    let failing = queue.run(async { Err::<u32, &str>("boom") });
    let succeeding = queue.run(async { Ok::<u32, &str>(7) });

    let (first, second) = tokio::join!(failing, succeeding);
    assert_eq!(first.unwrap(), Err("boom"));
    assert_eq!(second.unwrap(), Ok(7));
  }

  #[tokio::test]
  async fn test_results_resolve_independently() {
    let queue = OperationQueue::new();
    let a = queue.run(async { 1 }).await.unwrap();
    let b = queue.run(async { 2 }).await.unwrap();
    assert_eq!((a, b), (1, 2));
  }
}
