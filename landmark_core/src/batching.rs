//! Prioritized, paced request queue
//!
//! Outbound calls that do not need an immediate answer are queued and run
//! by a single worker task in small batches, with a pause between requests
//! and a longer pause between batches. This keeps bursts (for example a
//! directory of photos) under upstream rate limits.
//!
//! - `High` requests bypass the queue and start immediately
//! - `Medium` requests run before `Low` ones, FIFO within a priority

use crate::error::{InternalError, Result};
use log::{debug, trace};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Scheduling priority of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RequestPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs taken per batch
    pub batch_size: usize,
    /// Pause between jobs of one batch
    pub inter_request_delay: Duration,
    /// Pause between batches while work remains
    pub inter_batch_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            inter_request_delay: Duration::from_millis(200),
            inter_batch_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct Pending {
    medium: VecDeque<Job>,
    low: VecDeque<Job>,
    closed: bool,
}

impl Pending {
    fn len(&self) -> usize {
        self.medium.len() + self.low.len()
    }

    fn take_batch(&mut self, size: usize) -> Vec<Job> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.medium.pop_front().or_else(|| self.low.pop_front()) {
                Some(job) => batch.push(job),
                None => break,
            }
        }
        batch
    }
}

struct Shared {
    config: QueueConfig,
    pending: Mutex<Pending>,
    wake: Notify,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the eventual output of a queued request
pub struct QueuedRequest<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> QueuedRequest<T> {
    /// Wait for the request to run and return its output
    pub async fn wait(self) -> Result<T> {
        self.rx.await.map_err(|_| InternalError::QueueClosed.into())
    }
}

/// Paced queue for outbound requests
pub struct RequestQueue {
    shared: Arc<Shared>,
    worker_started: AtomicBool,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl RequestQueue {
    pub fn new(config: QueueConfig) -> Self {
        let config = QueueConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            shared: Arc::new(Shared {
                config,
                pending: Mutex::new(Pending::default()),
                wake: Notify::new(),
            }),
            worker_started: AtomicBool::new(false),
        }
    }

    /// Number of requests waiting for the worker
    pub fn pending(&self) -> usize {
        self.shared.pending().len()
    }

    /// Queue `request` without waiting for it
    ///
    /// Must be called from within a tokio runtime; otherwise the request is
    /// dropped and [`QueuedRequest::wait`] reports the queue as closed.
    pub fn enqueue<F, T>(&self, priority: RequestPriority, request: F) -> QueuedRequest<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(request.await);
        });

        let Ok(handle) = Handle::try_current() else {
            debug!("No runtime available, dropping queued request");
            return QueuedRequest { rx };
        };

        match priority {
            RequestPriority::High => {
                trace!("High priority request bypasses the queue");
                handle.spawn(job);
            }
            RequestPriority::Medium | RequestPriority::Low => {
                {
                    let mut pending = self.shared.pending();
                    if priority == RequestPriority::Medium {
                        pending.medium.push_back(job);
                    } else {
                        pending.low.push_back(job);
                    }
                }
                self.ensure_worker(&handle);
                self.shared.wake.notify_one();
            }
        }
        QueuedRequest { rx }
    }

    /// Queue `request` and wait for its output
    ///
    /// `High` requests run inline on the caller's task.
    pub async fn submit<F, T>(&self, priority: RequestPriority, request: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if priority == RequestPriority::High {
            return Ok(request.await);
        }
        self.enqueue(priority, request).wait().await
    }

    fn ensure_worker(&self, handle: &Handle) {
        if self.worker_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        handle.spawn(run_worker(shared));
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.shared.pending().closed = true;
        self.shared.wake.notify_one();
    }
}

async fn run_worker(shared: Arc<Shared>) {
    let config = shared.config.clone();
    loop {
        let batch = loop {
            {
                let mut pending = shared.pending();
                let batch = pending.take_batch(config.batch_size);
                if !batch.is_empty() {
                    break batch;
                }
                if pending.closed {
                    debug!("Request queue closed, worker exiting");
                    return;
                }
            }
            shared.wake.notified().await;
        };

        trace!("Running a batch of {} queued requests", batch.len());
        for (index, job) in batch.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(config.inter_request_delay).await;
            }
            job.await;
        }

        if shared.pending().len() > 0 {
            tokio::time::sleep(config.inter_batch_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_medium_runs_before_low() {
        let queue = RequestQueue::default();
        let order = recorder();

        let mut handles = Vec::new();
        for (priority, name) in [
            (RequestPriority::Low, "low-1"),
            (RequestPriority::Medium, "medium-1"),
            (RequestPriority::Low, "low-2"),
            (RequestPriority::Medium, "medium-2"),
        ] {
            let order = Arc::clone(&order);
            handles.push(queue.enqueue(priority, async move {
                order.lock().unwrap().push(name);
            }));
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(
            *order.lock().unwrap(),
            vec!["medium-1", "medium-2", "low-1", "low-2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_requests_and_batches() {
        let queue = RequestQueue::default();
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| queue.enqueue(RequestPriority::Medium, async move { Instant::now() }))
            .collect();
        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.wait().await.unwrap() - start);
        }

        // batch one: 0, 200ms, 400ms; batch two starts after the 1s pause
        assert!(finished[1] >= Duration::from_millis(200));
        assert!(finished[2] >= Duration::from_millis(400));
        assert!(finished[3] >= Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_bypasses_queue() {
        let queue = RequestQueue::default();
        let start = Instant::now();
        let backlog: Vec<_> = (0..6)
            .map(|i| queue.enqueue(RequestPriority::Low, async move { i }))
            .collect();

        let value = queue
            .submit(RequestPriority::High, async { "urgent" })
            .await
            .unwrap();
        assert_eq!(value, "urgent");
        assert_eq!(Instant::now() - start, Duration::ZERO);

        for (i, handle) in backlog.into_iter().enumerate() {
            assert_eq!(handle.wait().await.unwrap(), i);
        }
    }

    #[tokio::test]
    async fn test_submit_returns_output() {
        let queue = RequestQueue::new(QueueConfig {
            batch_size: 1,
            inter_request_delay: Duration::ZERO,
            inter_batch_delay: Duration::ZERO,
        });
        let value = queue
            .submit(RequestPriority::Medium, async { 40 + 2 })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_enqueue_without_runtime_reports_closed() {
        let queue = RequestQueue::default();
        let handle = queue.enqueue(RequestPriority::Low, async {});
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = runtime.block_on(handle.wait()).unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
