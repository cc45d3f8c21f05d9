//! Error types for the worker pool and batch helpers.
//!
//! Submitting to a closed pool is not an error: [`WorkerPool::submit`]
//! reports it by returning `false`, and the caller decides whether to drop or
//! re-route the task. Task failures are not errors either; the pool only
//! observes whether a value was produced.
//!
//! ## Error Cases
//! - `InvalidPoolSize`: A pool was requested with zero workers.
//! - `RuntimeUnavailable`: A pool was constructed outside a Tokio runtime.
//! - `Submitter`: The batch submitter task ended abnormally.
//!
//! [`WorkerPool::submit`]: crate::WorkerPool::submit

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for pool construction and batch execution.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A pool needs at least one worker, otherwise submitted tasks would sit
    /// in the queue forever.
    #[error("Invalid pool size: {size} (must be at least 1)")]
    InvalidPoolSize { size: usize },

    /// Workers are spawned onto the current Tokio runtime.
    #[error("No Tokio runtime available to spawn workers on")]
    RuntimeUnavailable,

    /// The task feeding a batch into its pool panicked or was aborted.
    #[error("Submitter error: {context}")]
    Submitter { context: String },
}
