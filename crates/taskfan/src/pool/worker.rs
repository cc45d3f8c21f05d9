use crate::task::Task;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Receiving half of the task queue, shared by every worker in a pool.
pub(crate) type SharedTaskReceiver<T> = Arc<Mutex<mpsc::Receiver<Task<T>>>>;

/// Worker task draining the shared task queue into the results channel.
///
/// Each iteration waits for either the next queued task or the pool's
/// cancellation token. Dequeued tasks run on Tokio's blocking thread pool and
/// their output, including the absent marker, is published to `results`.
///
/// The worker exits when:
///
/// - the task queue is closed and drained (normal shutdown),
/// - the cancellation token fires (queued tasks are left behind), or
/// - the results receiver is gone (the pool was dropped).
///
/// Cancellation is only observed between tasks; a running task is never
/// interrupted. A task that panics ends that iteration without publishing a
/// result and the worker moves on to the next task.
#[allow(clippy::used_underscore_binding)]
pub(crate) async fn worker_loop<T>(
    _worker_id: usize,
    tasks: SharedTaskReceiver<T>,
    results: mpsc::Sender<Option<T>>,
    cancel_token: CancellationToken,
    live_workers: Arc<AtomicUsize>,
) where
    T: Send + 'static,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {_worker_id} started");

    loop {
        let next = tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {_worker_id} observed cancellation");
                break;
            }
            task = async { tasks.lock().await.recv().await } => task,
        };

        let Some(task) = next else {
            // Queue closed and fully drained.
            break;
        };

        let output = match tokio::task::spawn_blocking(move || task.run()).await {
            Ok(output) => output,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Worker {_worker_id} task failed: {_e}");
                continue;
            }
        };

        if results.send(output).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} exiting, results receiver dropped");
            break;
        }
    }

    // Release our handle on the queue first so that a pool reporting zero
    // live workers has already dropped its receiver.
    drop(tasks);
    live_workers.fetch_sub(1, Ordering::AcqRel);

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {_worker_id} stopped");
}
