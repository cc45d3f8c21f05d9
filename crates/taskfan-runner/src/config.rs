use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `taskfan-runner` binary.
///
/// These settings control how the demo job fans its items out over the worker
/// pool. All values are parsed from CLI arguments or environment variables
/// (a `.env` file is loaded first, if present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskfan-runner",
    version,
    about = "Runs a batch job through a bounded worker pool"
)]
pub struct CliArgs {
    /// Number of workers processing items concurrently.
    ///
    /// Defaults to the number of logical CPUs. Batches smaller than this use
    /// one worker per item.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Number of items the job fans out, one task per item.
    ///
    /// Environment variable: `BATCH_ITEMS`
    #[arg(long, env = "BATCH_ITEMS", default_value_t = 10)]
    pub batch_items: usize,

    /// Simulated work per item, in milliseconds.
    ///
    /// Environment variable: `TASK_DELAY_MS`
    #[arg(long, env = "TASK_DELAY_MS", default_value_t = 1_000)]
    pub task_delay_ms: u64,

    /// Stop admitting new items once this many milliseconds have passed.
    ///
    /// Items admitted before the deadline still run to completion. When
    /// unset, every item is admitted.
    ///
    /// Environment variable: `SUBMIT_TIMEOUT_MS`
    #[arg(long, env = "SUBMIT_TIMEOUT_MS")]
    pub submit_timeout_ms: Option<u64>,

    /// Every n-th item produces no value (0 disables skipping).
    ///
    /// Environment variable: `SKIP_EVERY`
    #[arg(long, env = "SKIP_EVERY", default_value_t = 0)]
    pub skip_every: usize,

    /// Trace id for the run. A random one is generated when unset.
    ///
    /// Environment variable: `TRACE_ID`
    #[arg(long, env = "TRACE_ID")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub num_workers: usize,
    pub batch_items: usize,
    pub task_delay: Duration,
    pub submit_timeout: Option<Duration>,
    pub skip_every: usize,
    pub trace_id: Option<String>,
}

impl TryFrom<CliArgs> for RunnerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let num_workers = args.num_workers.unwrap_or_else(num_cpus::get);
        if num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.submit_timeout_ms == Some(0) {
            bail!("SUBMIT_TIMEOUT_MS must be greater than 0 when set");
        }

        if args.trace_id.as_deref().is_some_and(str::is_empty) {
            bail!("TRACE_ID must not be empty when set");
        }

        Ok(Self {
            num_workers,
            batch_items: args.batch_items,
            task_delay: Duration::from_millis(args.task_delay_ms),
            submit_timeout: args.submit_timeout_ms.map(Duration::from_millis),
            skip_every: args.skip_every,
            trace_id: args.trace_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<RunnerConfig> {
        let argv = core::iter::once("taskfan-runner").chain(args.iter().copied());
        RunnerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn explicit_flags_are_applied() {
        let config = parse(&[
            "--num-workers",
            "3",
            "--batch-items",
            "7",
            "--task-delay-ms",
            "25",
            "--submit-timeout-ms",
            "1500",
            "--skip-every",
            "2",
            "--trace-id",
            "nightly",
        ])
        .unwrap();

        assert_eq!(
            config,
            RunnerConfig {
                num_workers: 3,
                batch_items: 7,
                task_delay: Duration::from_millis(25),
                submit_timeout: Some(Duration::from_millis(1500)),
                skip_every: 2,
                trace_id: Some("nightly".to_string()),
            }
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = parse(&["--num-workers", "0"]).unwrap_err();
        assert_eq!(err.to_string(), "NUM_WORKERS must be greater than 0");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = parse(&["--num-workers", "1", "--submit-timeout-ms", "0"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "SUBMIT_TIMEOUT_MS must be greater than 0 when set"
        );
    }

    #[test]
    fn empty_trace_id_is_rejected() {
        let err = parse(&["--num-workers", "1", "--trace-id", ""]).unwrap_err();
        assert_eq!(err.to_string(), "TRACE_ID must not be empty when set");
    }
}
