use core::fmt;
use portable_atomic::{AtomicUsize, Ordering};

/// Correlation id shared by a job run and the tasks it fans out.
///
/// A root context gets a random 64-bit id. Each call to [`child`] derives the
/// next child id, `<parent>_<n>` with `n` counting from 1, so every task's log
/// lines can be tied back to the run that spawned it.
///
/// ```
/// use taskfan::TraceContext;
///
/// let root = TraceContext::with_trace_id("job");
/// assert_eq!(root.child().trace_id(), "job_1");
/// assert_eq!(root.child().trace_id(), "job_2");
/// ```
///
/// [`child`]: TraceContext::child
#[derive(Debug)]
pub struct TraceContext {
    trace_id: String,
    children: AtomicUsize,
}

impl TraceContext {
    /// Creates a root context with a random trace id.
    pub fn root() -> Self {
        Self::with_trace_id(format!("{:016x}", rand::random::<u64>()))
    }

    /// Creates a root context with a caller-provided trace id, e.g. one taken
    /// from an incoming request header.
    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            children: AtomicUsize::new(0),
        }
    }

    /// Derives the next child context. Safe to call from many threads.
    pub fn child(&self) -> Self {
        let n = self.children.fetch_add(1, Ordering::Relaxed) + 1;
        Self::with_trace_id(format!("{}_{n}", self.trace_id))
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Returns an `info` span carrying this trace id.
    #[cfg(feature = "tracing")]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("task", trace_id = %self.trace_id)
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace_id)
    }
}
