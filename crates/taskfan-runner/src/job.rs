use crate::{
    config::RunnerConfig,
    telemetry::{increment_tasks_executed, record_batch},
};
use core::time::Duration;
use std::{thread, time::Instant};
use taskfan::{Task, TraceContext, execute_batch_with_cancellation, execute_batch_with_timeout};
use tokio_util::sync::CancellationToken;

/// Outcome of one job run.
#[derive(Debug)]
pub struct JobReport {
    pub trace_id: String,
    /// Item values in completion order; skipped items are absent.
    pub values: Vec<usize>,
    pub elapsed: Duration,
}

/// Fans the configured items out over a worker pool and collects the results.
///
/// Each item becomes one task running inside a span tagged with a child trace
/// id of the run. Every `skip_every`-th item produces no value.
///
/// With a submit timeout, admission stops at the deadline and admitted items
/// finish; cancelling `shutdown` then abandons the run. Without one, the pool
/// itself follows `shutdown`: admission stops and workers exit after their
/// current item, and the values gathered so far are reported.
pub async fn run(
    config: &RunnerConfig,
    shutdown: &CancellationToken,
) -> anyhow::Result<JobReport> {
    let root = match &config.trace_id {
        Some(trace_id) => TraceContext::with_trace_id(trace_id.clone()),
        None => TraceContext::root(),
    };
    let started = Instant::now();
    tracing::info!(
        trace_id = %root,
        "Start job with {} items on {} workers",
        config.batch_items,
        config.num_workers
    );

    let tasks = build_tasks(config, &root);

    let values = match config.submit_timeout {
        Some(timeout) => {
            let batch = execute_batch_with_timeout(tasks, config.num_workers, timeout);
            tokio::select! {
                biased;
                () = shutdown.cancelled() => anyhow::bail!("job {root} interrupted"),
                values = batch => values?,
            }
        }
        None => execute_batch_with_cancellation(tasks, config.num_workers, shutdown).await?,
    };

    let elapsed = started.elapsed();
    record_batch(
        elapsed.as_secs_f64() * 1_000.0,
        u64::try_from(values.len()).unwrap_or(u64::MAX),
    );
    tracing::info!(
        trace_id = %root,
        "End job, {} values in {:?}: {:?}",
        values.len(),
        elapsed,
        values
    );

    Ok(JobReport {
        trace_id: root.trace_id().to_owned(),
        values,
        elapsed,
    })
}

fn build_tasks(config: &RunnerConfig, root: &TraceContext) -> Vec<Task<usize>> {
    let delay = config.task_delay;
    let skip_every = config.skip_every;

    (1..=config.batch_items)
        .map(|item| {
            let ctx = root.child();
            Task::new(move || {
                tracing::info!("Process item {item}");
                thread::sleep(delay);
                increment_tasks_executed();
                let skipped = skip_every > 0 && item % skip_every == 0;
                (!skipped).then_some(item)
            })
            .instrument(ctx.span())
        })
        .collect()
}
