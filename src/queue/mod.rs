//! 请求队列：缓存被限流拒绝的调用，并在预算恢复后按提交顺序执行。
//!
//! # Request Queue
//!
//! Calls refused by the [`RateLimiter`] wait here. A single drain task services
//! them in strict submission order: it asks the limiter to admit the head of
//! the queue, sleeps for the poll interval while the limiter refuses, and runs
//! the head to completion once admitted. A later call is never serviced before
//! an earlier one, even if it would fit the remaining budget.
//!
//! Closing the queue rejects every pending call with [`Error::ShuttingDown`].

mod job;

pub use job::{PendingCall, QueuedJob};

use crate::resilience::RateLimiter;
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

pub struct RequestQueue {
    pending: Mutex<VecDeque<Box<dyn QueuedJob>>>,
    draining: AtomicBool,
    closed: AtomicBool,
    poll_interval: Duration,
}

impl RequestQueue {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            poll_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Box<dyn QueuedJob>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Park `work` behind every call already queued and return the future of its result.
    ///
    /// Must be called from within a Tokio runtime; the first enqueue starts the drain task.
    pub fn submit<T, F>(
        self: &Arc<Self>,
        limiter: &Arc<RateLimiter>,
        call_id: impl Into<String>,
        estimated_tokens: u64,
        work: F,
    ) -> oneshot::Receiver<Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<T>> + Send + 'static,
    {
        let (call, rx) = PendingCall::new(call_id, estimated_tokens, work);
        self.enqueue(limiter, Box::new(call));
        rx
    }

    pub fn enqueue(self: &Arc<Self>, limiter: &Arc<RateLimiter>, job: Box<dyn QueuedJob>) {
        if self.is_closed() {
            job.reject(Error::ShuttingDown);
            return;
        }
        {
            let mut pending = self.lock();
            debug!(call_id = job.call_id(), position = pending.len(), "call queued");
            pending.push_back(job);
        }
        self.ensure_draining(limiter);
    }

    fn ensure_draining(self: &Arc<Self>, limiter: &Arc<RateLimiter>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let queue = Arc::clone(self);
            let limiter = Arc::clone(limiter);
            tokio::spawn(async move { queue.drain(limiter).await });
        }
    }

    async fn drain(&self, limiter: Arc<RateLimiter>) {
        loop {
            if self.is_closed() {
                self.draining.store(false, Ordering::Release);
                return;
            }
            let head_cost = {
                let pending = self.lock();
                match pending.front() {
                    Some(job) => job.estimated_tokens(),
                    None => {
                        // Cleared under the lock so a concurrent enqueue either sees
                        // this loop running or starts a new one.
                        self.draining.store(false, Ordering::Release);
                        return;
                    }
                }
            };

            if !limiter.admit(head_cost) {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let job = self.lock().pop_front();
            match job {
                Some(job) => {
                    debug!(
                        call_id = job.call_id(),
                        waited_ms = job.enqueued_at().elapsed().as_millis() as u64,
                        "draining queued call"
                    );
                    job.run().await;
                }
                // Closed between admission and dequeue.
                None => limiter.release(head_cost),
            }
        }
    }

    /// Refuse new calls and reject every pending one. Returns how many were rejected.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let rejected: Vec<Box<dyn QueuedJob>> = self.lock().drain(..).collect();
        let count = rejected.len();
        for job in rejected {
            job.reject(Error::ShuttingDown);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RateLimiterConfig;
    use futures::FutureExt;

    fn setup(requests: u64) -> (Arc<RequestQueue>, Arc<RateLimiter>) {
        let limiter = Arc::new(RateLimiter::new(
            RateLimiterConfig::new()
                .with_requests_per_window(requests)
                .with_tokens_per_window(10_000),
        ));
        (Arc::new(RequestQueue::new(Duration::from_secs(1))), limiter)
    }

    fn charged(limiter: &Arc<RateLimiter>, value: u32) -> BoxFuture<'static, Result<u32>> {
        let limiter = Arc::clone(limiter);
        async move {
            limiter.consume(10);
            Ok(value)
        }
        .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_immediately_when_budget_available() {
        let (queue, limiter) = setup(5);
        let l = limiter.clone();
        let rx = queue.submit(&limiter, "a", 10, move || charged(&l, 1));
        assert_eq!(rx.await.unwrap().unwrap(), 1);
        assert_eq!(limiter.snapshot().request_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_window_reset_in_fifo_order() {
        let (queue, limiter) = setup(1);
        limiter.consume(10);
        assert!(!limiter.admit(10));

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut receivers = Vec::new();
        for i in 0..3u32 {
            let l = limiter.clone();
            let o = order.clone();
            receivers.push(queue.submit(&limiter, format!("call-{}", i), 10, move || {
                async move {
                    o.lock().unwrap().push(i);
                    l.consume(10);
                    Ok(i)
                }
                .boxed()
            }));
        }
        assert_eq!(queue.len(), 3);

        let start = tokio::time::Instant::now();
        for (i, rx) in receivers.into_iter().enumerate() {
            assert_eq!(rx.await.unwrap().unwrap(), i as u32);
        }
        // One call per 60s window.
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_pending_calls() {
        let (queue, limiter) = setup(1);
        limiter.consume(10);
        let l = limiter.clone();
        let rx = queue.submit(&limiter, "a", 10, move || charged(&l, 1));
        tokio::task::yield_now().await;

        assert_eq!(queue.close(), 1);
        assert!(matches!(rx.await.unwrap(), Err(Error::ShuttingDown)));

        let l = limiter.clone();
        let late = queue.submit(&limiter, "b", 10, move || charged(&l, 2));
        assert!(matches!(late.await.unwrap(), Err(Error::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admitted_head_holds_reservation_until_charged() {
        let (queue, limiter) = setup(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let l = limiter.clone();
        let rx = queue.submit(&limiter, "a", 10, move || {
            async move {
                let _ = release_rx.await;
                l.consume(10);
                Ok(1u32)
            }
            .boxed()
        });
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        // Running, not yet charged, but the window is already spoken for.
        let snap = limiter.snapshot();
        assert_eq!(snap.request_count, 0);
        assert_eq!(snap.in_flight_requests, 1);
        assert!(!limiter.admit(10));

        release_tx.send(()).unwrap();
        assert_eq!(rx.await.unwrap().unwrap(), 1);
        assert_eq!(limiter.snapshot().in_flight_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_task_stops_when_empty() {
        let (queue, limiter) = setup(5);
        let l = limiter.clone();
        let rx = queue.submit(&limiter, "a", 10, move || charged(&l, 1));
        rx.await.unwrap().unwrap();
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(!queue.is_draining());

        let l = limiter.clone();
        let rx = queue.submit(&limiter, "b", 10, move || charged(&l, 2));
        assert_eq!(rx.await.unwrap().unwrap(), 2);
    }
}
