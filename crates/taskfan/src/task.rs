use core::fmt;

/// A parameterless unit of work producing an optional result.
///
/// `Some(value)` is a produced result and `None` is the absent marker: the
/// task ran but had nothing to report. The pool never inspects the value, so
/// a task that can fail should encode that in `T`, e.g. `Task<Result<U, E>>`.
///
/// Task bodies are synchronous and run on Tokio's blocking thread pool, so
/// they may block or sleep freely. They must be `Send + 'static` since they
/// are moved onto another thread.
pub struct Task<T> {
    body: Box<dyn FnOnce() -> Option<T> + Send + 'static>,
}

impl<T> Task<T> {
    /// Wraps a closure as a task.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() -> Option<T> + Send + 'static,
    {
        Self {
            body: Box::new(body),
        }
    }

    /// Runs the task body to completion on the calling thread.
    pub(crate) fn run(self) -> Option<T> {
        (self.body)()
    }
}

#[cfg(feature = "tracing")]
impl<T: 'static> Task<T> {
    /// Runs the task body inside `span`, so events it emits are attributed to
    /// the span (typically one carrying a child trace id).
    #[must_use]
    pub fn instrument(self, span: tracing::Span) -> Self {
        Self::new(move || {
            let _entered = span.enter();
            self.run()
        })
    }
}

impl<T, F> From<F> for Task<T>
where
    F: FnOnce() -> Option<T> + Send + 'static,
{
    fn from(body: F) -> Self {
        Self::new(body)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_body_output() {
        let task = Task::new(|| Some(7));
        assert_eq!(task.run(), Some(7));

        let task: Task<u8> = Task::new(|| None);
        assert_eq!(task.run(), None);
    }

    #[test]
    fn closures_convert_into_tasks() {
        let captured = String::from("item");
        let task: Task<usize> = (move || Some(captured.len())).into();
        assert_eq!(task.run(), Some(4));
    }
}
