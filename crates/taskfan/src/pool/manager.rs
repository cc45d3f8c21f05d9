//! Bounded worker pool with fan-in of task results.
//!
//! This module defines the [`WorkerPool`] struct, which runs a fixed number of
//! workers over a shared, bounded task queue and publishes every task's output
//! into a bounded results channel. Coordinated shutdown goes through
//! [`WorkerPool::close`] (stop admitting, let queued work finish) or
//! [`WorkerPool::cancel`] (stop workers between tasks).
//!
//! ## Lifecycle
//!
//! - **Active**: workers are running and `submit` admits tasks.
//! - **Closing**: `close` was called; `submit` returns `false` but queued and
//!   in-flight tasks are still processed.
//! - **Draining**: workers finish the queue, observe its closure and exit.
//! - **Terminated**: every worker exited and the results channel is closed;
//!   [`WorkerPool::next_result`] returns `None`.
//!
//! ## Admission
//!
//! `submit` reserves queue capacity *before* taking the admission lock and
//! then performs the closed check and the (now non-blocking) enqueue inside a
//! single critical section. `close` therefore never waits behind a submitter
//! that is stuck on a full queue, while a task can still never be admitted
//! after `close` has returned.

use super::worker::{SharedTaskReceiver, worker_loop};
use crate::{Error, Result, task::Task};
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;

/// A fixed-size pool of workers executing [`Task`]s and collecting their
/// results.
///
/// Both the task queue and the results channel hold `2 × pool_size` entries.
/// Submitting to a full queue waits for capacity, and workers wait when the
/// results channel is full, so results must be drained (through
/// [`next_result`] or [`shutdown`]) for the pool to make progress.
///
/// The pool is typically shared with a submitter through an [`Arc`] while the
/// owner drains results.
///
/// The pool is only reachable from the crate root:
///
/// ```compile_fail
/// use taskfan::pool::manager::WorkerPool;
/// ```
///
/// [`next_result`]: WorkerPool::next_result
/// [`shutdown`]: WorkerPool::shutdown
pub struct WorkerPool<T> {
    pool_size: usize,
    /// Admission state. `None` once the pool is closed; taking the sender out
    /// is what closes the task queue.
    task_tx: Mutex<Option<mpsc::Sender<Task<T>>>>,
    results: tokio::sync::Mutex<mpsc::Receiver<Option<T>>>,
    live_workers: Arc<AtomicUsize>,
    cancel_token: CancellationToken,
}

impl<T> WorkerPool<T>
where
    T: Send + 'static,
{
    /// Spawns a pool of `pool_size` workers on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPoolSize`] if `pool_size` is zero.
    /// - [`Error::RuntimeUnavailable`] if called outside a Tokio runtime.
    pub fn new(pool_size: usize) -> Result<Self> {
        Self::spawn(pool_size, CancellationToken::new())
    }

    /// Spawns a pool whose workers also stop when `parent` is cancelled.
    ///
    /// The pool owns a child token of `parent`, so [`WorkerPool::cancel`]
    /// never propagates upward.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerPool::new`].
    pub fn with_cancellation(pool_size: usize, parent: &CancellationToken) -> Result<Self> {
        Self::spawn(pool_size, parent.child_token())
    }

    fn spawn(pool_size: usize, cancel_token: CancellationToken) -> Result<Self> {
        if pool_size == 0 {
            return Err(Error::InvalidPoolSize { size: pool_size });
        }
        let runtime = Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;

        let capacity = pool_size.saturating_mul(2);
        let (task_tx, task_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);
        let task_rx: SharedTaskReceiver<T> = Arc::new(tokio::sync::Mutex::new(task_rx));
        let live_workers = Arc::new(AtomicUsize::new(pool_size));

        let handles: Vec<_> = (0..pool_size)
            .map(|worker_id| {
                runtime.spawn(worker_loop(
                    worker_id,
                    Arc::clone(&task_rx),
                    result_tx.clone(),
                    cancel_token.clone(),
                    Arc::clone(&live_workers),
                ))
            })
            .collect();

        // The finalizer holds the last result sender: results close only once
        // every worker has been joined.
        runtime.spawn(async move {
            for _joined in futures::future::join_all(handles).await {
                #[cfg(feature = "tracing")]
                if let Err(e) = _joined {
                    tracing::error!("Worker terminated abnormally: {e}");
                }
            }
            drop(result_tx);

            #[cfg(feature = "tracing")]
            tracing::debug!("All workers exited, results closed");
        });

        #[cfg(feature = "tracing")]
        tracing::debug!("Started worker pool with {pool_size} workers");

        Ok(Self {
            pool_size,
            task_tx: Mutex::new(Some(task_tx)),
            results: tokio::sync::Mutex::new(result_rx),
            live_workers,
            cancel_token,
        })
    }

    /// Submits a task for execution.
    ///
    /// Returns `false` if the pool is closed (or every worker has already
    /// exited after cancellation); the task is dropped without running.
    /// Otherwise the task is admitted and `true` is returned. If the queue is
    /// full this waits for a worker to free a slot.
    ///
    /// Dropping the returned future before it completes abandons the
    /// submission; the task is not admitted.
    pub async fn submit(&self, task: Task<T>) -> bool {
        let Some(sender) = self.admission_sender() else {
            return false;
        };

        // Wait for capacity without holding the admission lock.
        let Ok(permit) = sender.reserve().await else {
            return false;
        };

        let admission = self.task_tx.lock();
        if admission.is_none() {
            // Closed while we waited; the reserved slot is released on drop.
            return false;
        }
        permit.send(task);
        true
    }

    /// Closes the pool to new submissions.
    ///
    /// Idempotent and safe to call concurrently: only the first call closes
    /// the task queue. Tasks already admitted still run; workers exit once the
    /// queue is drained.
    pub fn close(&self) {
        let sender = self.task_tx.lock().take();
        if sender.is_some() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker pool closed to new submissions");
        }
    }

    /// Closes the pool and waits for it to terminate, discarding any results
    /// that were not consumed.
    ///
    /// Returns immediately if the results were already drained to the end.
    pub async fn shutdown(&self) {
        self.close();
        while self.next_result().await.is_some() {}
    }

    /// Signals every worker to stop after its current task.
    ///
    /// Running tasks are never interrupted; tasks still queued are dropped
    /// without running. This does not close the pool by itself, but once all
    /// workers are gone, `submit` returns `false`.
    pub fn cancel(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling worker pool");
        self.cancel_token.cancel();
    }

    /// Receives the next published task output, in completion order.
    ///
    /// - `Some(Some(value))`: a task produced `value`.
    /// - `Some(None)`: a task produced the absent marker.
    /// - `None`: every worker has exited and the results channel is closed.
    pub async fn next_result(&self) -> Option<Option<T>> {
        self.results.lock().await.recv().await
    }

    /// Returns the number of workers this pool was built with.
    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of workers that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Returns `true` once [`close`](WorkerPool::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.task_tx.lock().is_none()
    }

    /// Returns `true` once the pool (or its parent token) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    fn admission_sender(&self) -> Option<mpsc::Sender<Task<T>>> {
        self.task_tx.lock().clone()
    }
}

impl<T> core::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pool_size", &self.pool_size)
            .field("live_workers", &self.live_workers.load(Ordering::Relaxed))
            .field("closed", &self.task_tx.lock().is_none())
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}
