//! Run a finite batch of tasks through a right-sized [`WorkerPool`].
//!
//! Each helper sizes a pool to `min(pool_size, tasks.len())`, hands the tasks
//! to a dedicated submitter task, and drains results on the caller's task
//! until the pool terminates. Only produced values are returned, in completion
//! order; absent markers (`None`) are filtered out. A `T` that is itself an
//! `Option` is returned as produced, inner `None`s included.

use crate::{Error, Result, WorkerPool, task::Task};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{Instant, sleep_until};
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

/// Executes every task and returns the produced values in completion order.
///
/// An empty batch returns immediately without spawning any workers.
///
/// # Errors
///
/// - [`Error::InvalidPoolSize`] if `pool_size` is zero and `tasks` is not
///   empty.
/// - [`Error::RuntimeUnavailable`] if called outside a Tokio runtime.
/// - [`Error::Submitter`] if the submitter task panicked.
pub async fn execute_batch<T>(tasks: Vec<Task<T>>, pool_size: usize) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    run_batch(tasks, pool_size, Admission::default()).await
}

/// Executes tasks, admitting new ones only until `timeout` elapses.
///
/// When the deadline passes, the remaining tasks are dropped without running
/// and the pool is closed. Tasks admitted before the deadline still run to
/// completion and their values are returned, so this returns no earlier than
/// the slowest admitted task: `timeout` bounds admission, not total time.
///
/// # Errors
///
/// Same as [`execute_batch`].
pub async fn execute_batch_with_timeout<T>(
    tasks: Vec<Task<T>>,
    pool_size: usize,
    timeout: Duration,
) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let admission = Admission {
        deadline: Instant::now().checked_add(timeout),
        ..Admission::default()
    };
    run_batch(tasks, pool_size, admission).await
}

/// Executes tasks on a pool that stops when `cancel_token` is cancelled.
///
/// Cancellation stops admission and makes each worker exit after its current
/// task; running tasks are not interrupted. Values published before the
/// workers exited are returned.
///
/// # Errors
///
/// Same as [`execute_batch`].
pub async fn execute_batch_with_cancellation<T>(
    tasks: Vec<Task<T>>,
    pool_size: usize,
    cancel_token: &CancellationToken,
) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let admission = Admission {
        cancel_token: Some(cancel_token.clone()),
        ..Admission::default()
    };
    run_batch(tasks, pool_size, admission).await
}

/// Limits on how long the submitter keeps admitting tasks.
#[derive(Default)]
struct Admission {
    deadline: Option<Instant>,
    cancel_token: Option<CancellationToken>,
}

async fn run_batch<T>(
    tasks: Vec<Task<T>>,
    pool_size: usize,
    admission: Admission,
) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let total = tasks.len();
    let pool_size = pool_size.min(total);
    let pool = Arc::new(match &admission.cancel_token {
        Some(token) => WorkerPool::with_cancellation(pool_size, token)?,
        None => WorkerPool::new(pool_size)?,
    });

    // Declared after the pool so that, if this future is dropped mid-batch,
    // the submitter is aborted first and the pool is then stopped.
    let mut abandon = AbandonGuard::new(&pool);
    let submitter = AbortOnDropHandle::new(tokio::spawn(submit_all(
        Arc::clone(&pool),
        tasks,
        admission,
    )));

    let mut values = Vec::with_capacity(total);
    while let Some(output) = pool.next_result().await {
        if let Some(value) = output {
            values.push(value);
        }
    }

    let joined = submitter.await;
    pool.shutdown().await;
    abandon.disarm();
    let _admitted = joined.map_err(|e| Error::Submitter {
        context: e.to_string(),
    })?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Batch finished: {_admitted}/{total} tasks admitted, {} values collected",
        values.len()
    );

    Ok(values)
}

/// Feeds `tasks` into `pool` in order, then closes it.
///
/// Stops early once the pool rejects a task, the deadline passes, or the
/// cancellation token fires; a submission still waiting for queue capacity at
/// that moment is abandoned. Returns how many tasks were admitted.
async fn submit_all<T>(
    pool: Arc<WorkerPool<T>>,
    tasks: Vec<Task<T>>,
    admission: Admission,
) -> usize
where
    T: Send + 'static,
{
    // Closes the pool however this function exits, so the drain loop in
    // `run_batch` always terminates.
    let _close = CloseOnDrop(&pool);

    let deadline = async {
        match admission.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => core::future::pending().await,
        }
    };
    let cancelled = async {
        match &admission.cancel_token {
            Some(token) => token.cancelled().await,
            None => core::future::pending().await,
        }
    };
    tokio::pin!(deadline, cancelled);

    let mut admitted = 0;
    for task in tasks {
        // The timer only fires once the runtime observes it; an expired
        // deadline must stop admission before the next submit is attempted.
        if admission.deadline.is_some_and(|d| Instant::now() >= d) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Admission deadline reached after {admitted} tasks");
            break;
        }

        let accepted = tokio::select! {
            biased;
            () = &mut deadline => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Admission deadline reached after {admitted} tasks");
                break;
            }
            () = &mut cancelled => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Admission cancelled after {admitted} tasks");
                break;
            }
            accepted = pool.submit(task) => accepted,
        };

        if !accepted {
            break;
        }
        admitted += 1;
    }

    admitted
}

/// Stops a pool whose batch was abandoned before it terminated.
///
/// Closing and cancelling makes every worker exit after its current task, so
/// queued tasks are dropped instead of waiting on a results channel nobody
/// drains.
struct AbandonGuard<'a, T: Send + 'static> {
    pool: &'a WorkerPool<T>,
    armed: bool,
}

impl<'a, T: Send + 'static> AbandonGuard<'a, T> {
    fn new(pool: &'a WorkerPool<T>) -> Self {
        Self { pool, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T: Send + 'static> Drop for AbandonGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            #[cfg(feature = "tracing")]
            tracing::debug!("Batch dropped before completion, stopping its pool");
            self.pool.close();
            self.pool.cancel();
        }
    }
}

struct CloseOnDrop<'a, T: Send + 'static>(&'a WorkerPool<T>);

impl<T: Send + 'static> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests;
