//! Bounded pool for best-effort background work.
//!
//! Cache hits record access statistics without making the reader wait. The
//! work is queued on a bounded channel and drained by a fixed number of
//! workers. When the queue is full the task is dropped, and both drops and
//! failures are handed to an error observer instead of the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};
use waypoint_core::StorageError;

/// Boxed future executed by a side task worker.
pub type SideTaskFuture = Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + 'static>>;

/// Callback invoked for every dropped or failed side task.
pub type ErrorObserver = Arc<dyn Fn(&SideTaskError) + Send + Sync>;

/// Why a side task did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideTaskError {
    /// The queue was full or the pool was shut down; the task never ran.
    Rejected { task: &'static str },
    /// The task ran and returned an error.
    Failed { task: &'static str, error: StorageError },
}

impl SideTaskError {
    pub fn task(&self) -> &'static str {
        match self {
            Self::Rejected { task } | Self::Failed { task, .. } => task,
        }
    }
}

/// Observer that logs with `tracing`.
pub fn log_observer() -> ErrorObserver {
    Arc::new(|err: &SideTaskError| match err {
        SideTaskError::Rejected { task } => {
            tracing::warn!(task = %task, "Side task queue full, dropping task");
        }
        SideTaskError::Failed { task, error } => {
            tracing::warn!(task = %task, error = %error, "Side task failed");
        }
    })
}

struct SideTask {
    name: &'static str,
    future: SideTaskFuture,
}

/// Counters for side task execution.
#[derive(Debug, Default)]
pub struct SideTaskMetrics {
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
}

impl SideTaskMetrics {
    pub fn snapshot(&self) -> SideTaskMetricsSnapshot {
        SideTaskMetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SideTaskMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideTaskMetricsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

struct Shared {
    pending: AtomicUsize,
    idle: Notify,
    observer: ErrorObserver,
    metrics: SideTaskMetrics,
}

impl Shared {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Fixed-size worker pool over a bounded queue.
///
/// Must be created inside a Tokio runtime. Workers exit once the pool is
/// dropped and the queue is drained.
pub struct SideTaskPool {
    sender: mpsc::Sender<SideTask>,
    shared: Arc<Shared>,
}

impl SideTaskPool {
    /// Spawn `workers` workers sharing a queue of `capacity` tasks.
    pub fn new(workers: usize, capacity: usize, observer: ErrorObserver) -> Self {
        let (sender, receiver) = mpsc::channel::<SideTask>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared {
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            observer,
            metrics: SideTaskMetrics::default(),
        });

        for worker_id in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                loop {
                    let next = { receiver.lock().await.recv().await };
                    let Some(task) = next else {
                        tracing::debug!(worker_id, "Side task worker stopping");
                        break;
                    };
                    match task.future.await {
                        Ok(()) => {
                            shared.metrics.completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(error) => {
                            shared.metrics.failed.fetch_add(1, Ordering::Relaxed);
                            (shared.observer)(&SideTaskError::Failed {
                                task: task.name,
                                error,
                            });
                        }
                    }
                    shared.finish_one();
                }
            });
        }

        Self { sender, shared }
    }

    /// Pool with the default `tracing` observer.
    pub fn with_logging(workers: usize, capacity: usize) -> Self {
        Self::new(workers, capacity, log_observer())
    }

    /// Queue a task. Returns false when the task was dropped.
    pub fn submit<F>(&self, name: &'static str, future: F) -> bool
    where
        F: Future<Output = Result<(), StorageError>> + Send + 'static,
    {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.metrics.submitted.fetch_add(1, Ordering::Relaxed);

        let task = SideTask {
            name,
            future: Box::pin(future),
        };
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) | Err(TrySendError::Closed(task)) => {
                self.shared.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                (self.shared.observer)(&SideTaskError::Rejected { task: task.name });
                self.shared.finish_one();
                false
            }
        }
    }

    /// Tasks queued or running.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Wait until every submitted task has finished or been dropped.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn metrics(&self) -> SideTaskMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl std::fmt::Debug for SideTaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideTaskPool")
            .field("pending", &self.pending())
            .field("metrics", &self.metrics())
            .finish()
    }
}
