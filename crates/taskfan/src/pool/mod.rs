//! Worker pool and worker loop.
//!
//! ## Structure
//!
//! - `manager` - the [`WorkerPool`] handle: construction, admission,
//!   closing, cancellation and result draining.
//! - `worker` - the loop each worker runs over the shared task queue.

mod manager;
mod worker;

pub use manager::WorkerPool;
