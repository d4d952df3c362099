//! Queued call.

use crate::{Error, Result};
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A parked call, type-erased so calls with different result types share one queue.
pub trait QueuedJob: Send {
    fn call_id(&self) -> &str;
    fn estimated_tokens(&self) -> u64;
    fn enqueued_at(&self) -> Instant;
    /// Execute the deferred work and resolve the caller's future.
    fn run(self: Box<Self>) -> BoxFuture<'static, ()>;
    /// Resolve the caller's future with `err` without running anything.
    fn reject(self: Box<Self>, err: Error);
}

type Work<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>;

/// Deferred work plus the channel its caller is waiting on.
pub struct PendingCall<T> {
    id: String,
    estimated_tokens: u64,
    enqueued_at: Instant,
    work: Work<T>,
    tx: oneshot::Sender<Result<T>>,
}

impl<T: Send + 'static> PendingCall<T> {
    pub fn new<F>(
        id: impl Into<String>,
        estimated_tokens: u64,
        work: F,
    ) -> (Self, oneshot::Receiver<Result<T>>)
    where
        F: FnOnce() -> BoxFuture<'static, Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let call = Self {
            id: id.into(),
            estimated_tokens,
            enqueued_at: Instant::now(),
            work: Box::new(work),
            tx,
        };
        (call, rx)
    }
}

impl<T: Send + 'static> QueuedJob for PendingCall<T> {
    fn call_id(&self) -> &str {
        &self.id
    }

    fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    fn run(self: Box<Self>) -> BoxFuture<'static, ()> {
        let PendingCall { work, tx, .. } = *self;
        Box::pin(async move {
            let result = work().await;
            // The caller may have stopped waiting; the outcome is still recorded by the work itself.
            let _ = tx.send(result);
        })
    }

    fn reject(self: Box<Self>, err: Error) {
        let _ = self.tx.send(Err(err));
    }
}
