use thiserror::Error;

/// Error type returned by a failing coroutine step.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// The classifier could not give safe suspension semantics to a yielded directive.
    /// The offending coroutine is dropped; others keep running.
    #[error("{kind} is not supported by the tick scheduler: {reason}")]
    UnsupportedDirective {
        kind: &'static str,
        reason: &'static str,
    },

    /// The coroutine's own step failed.
    #[error("coroutine step failed: {0}")]
    CoroutineFault(#[source] BoxError),

    /// The scheduler or pump owning the work was dropped before it finished.
    #[error("abandoned before completion")]
    Abandoned,

    /// Nothing left to drive, but the awaited future has not finished.
    #[error("no active coroutine or queued continuation can complete the future")]
    Stalled,

    #[error("tick limit of {0} reached")]
    TickLimit(u64),
}

impl Error {
    pub fn is_unsupported_directive(&self) -> bool {
        matches!(self, Error::UnsupportedDirective { .. })
    }
}
