use crate::realtime::{Clock, WaitRealtime};
use core::any::{type_name, Any};
use core::fmt;
use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Predicate-style wait: the coroutine stays suspended while this returns true.
///
/// This is the extension point for custom waits. It is polled at most once per tick.
pub trait KeepWaiting {
    fn keep_waiting(&mut self) -> bool;
}

/// Externally driven asynchronous operation (I/O, resource loading, ...).
///
/// Not owned by the scheduler: completion is flipped by whoever runs the operation, possibly on another thread.
/// `is_done` must be monotone: once true, it stays true.
pub trait AsyncOperation: Send + Sync {
    fn is_done(&self) -> bool;
}

/// Value yielded by a coroutine step, describing when it should be resumed.
pub enum Directive {
    /// Resume on the next tick.
    Tick,
    /// Resume once [`KeepWaiting::keep_waiting`] returns false.
    KeepWaiting(Box<dyn KeepWaiting>),
    /// Resume once the operation reports completion.
    Operation(Arc<dyn AsyncOperation>),
    /// Fixed duration wait measured on the host's simulated clock.
    /// Rejected: that clock may not advance between ticks.
    Seconds(Duration),
    /// Fixed duration wait measured on the host's own realtime counter.
    /// Rejected: use [`WaitRealtime`] which measures with a monotonic clock.
    SecondsRealtime(Duration),
    /// Anything else, tagged with its type name.
    Other {
        kind: &'static str,
        value: Box<dyn Any>,
    },
}

impl Directive {
    /// Resume once `condition` returns true.
    pub fn wait_until<F: FnMut() -> bool + 'static>(mut condition: F) -> Self {
        Directive::KeepWaiting(Box::new(Predicate(move || !condition())))
    }

    /// Resume once `condition` returns false.
    pub fn wait_while<F: FnMut() -> bool + 'static>(condition: F) -> Self {
        Directive::KeepWaiting(Box::new(Predicate(condition)))
    }

    pub fn operation<O: AsyncOperation + 'static>(operation: O) -> Self {
        Directive::Operation(Arc::new(operation))
    }

    /// Wrap an arbitrary value. How it is treated depends on [`UnknownDirectives`](crate::UnknownDirectives).
    pub fn other<T: Any>(value: T) -> Self {
        Directive::Other {
            kind: type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Name of the concrete directive kind, used in error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Tick => "Tick",
            Directive::KeepWaiting(_) => "KeepWaiting",
            Directive::Operation(_) => "Operation",
            Directive::Seconds(_) => "Seconds",
            Directive::SecondsRealtime(_) => "SecondsRealtime",
            Directive::Other { kind, .. } => *kind,
        }
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Seconds(d) | Directive::SecondsRealtime(d) => {
                write!(f, "{}({:?})", self.kind(), d)
            }
            _ => f.write_str(self.kind()),
        }
    }
}

impl<C: Clock + 'static> From<WaitRealtime<C>> for Directive {
    fn from(wait: WaitRealtime<C>) -> Self {
        Directive::KeepWaiting(Box::new(wait))
    }
}

impl From<OperationFlag> for Directive {
    fn from(flag: OperationFlag) -> Self {
        Directive::operation(flag)
    }
}

struct Predicate<F>(F);

impl<F: FnMut() -> bool> KeepWaiting for Predicate<F> {
    fn keep_waiting(&mut self) -> bool {
        (self.0)()
    }
}

/// Shared done flag for an external operation.
///
/// Clones share the flag: hand one to the worker, yield the other.
/// ```
/// use tickbridge::{Directive, OperationFlag, Scheduler};
/// let scheduler = Scheduler::new();
/// let flag = OperationFlag::new();
/// let handle = scheduler.wait_for(flag.clone().into());
/// scheduler.tick();
/// assert!(!handle.is_finished());
/// std::thread::spawn(move || flag.complete()).join().unwrap();
/// scheduler.tick();
/// assert!(handle.is_finished());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationFlag(Arc<AtomicBool>);

impl OperationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl AsyncOperation for OperationFlag {
    fn is_done(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
