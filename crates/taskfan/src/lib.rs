#![doc = include_str!("../README.md")]

mod batch;
mod error;
mod pool;
mod task;
mod trace;

pub use crate::batch::*;
pub use crate::error::*;
pub use crate::pool::WorkerPool;
pub use crate::task::*;
pub use crate::trace::*;
