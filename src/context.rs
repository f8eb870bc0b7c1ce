use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Deferred unit of work queued on an [`ExecutionContext`].
pub(crate) type Continuation = Box<dyn FnOnce() + Send>;

/// Handle to a single-threaded execution context: the thread that owns it and its continuation queue.
///
/// The handle is cheap to clone and can be sent to any thread, which may then [`post`](Self::post) work.
/// Queued work only runs when the owning thread drains the queue with a [`Pump`](crate::Pump).
/// ```
/// use tickbridge::{ExecutionContext, Pump};
/// let context = ExecutionContext::capture();
/// let pump = Pump::new(context.clone());
/// let remote = context.clone();
/// std::thread::spawn(move || {
///     assert!(!remote.is_owning_thread());
///     remote.post(|| println!("running on the owning thread"));
/// })
/// .join()
/// .unwrap();
/// assert_eq!(context.pending(), 1);
/// pump.pump();
/// assert_eq!(context.pending(), 0);
/// ```
#[derive(Clone)]
pub struct ExecutionContext {
    shared: Arc<Shared>,
}

struct Shared {
    owner: ThreadId,
    queue: Mutex<VecDeque<Continuation>>,
}

impl ExecutionContext {
    /// Capture the current thread as owner of a new, empty context.
    pub fn capture() -> Self {
        ExecutionContext {
            shared: Arc::new(Shared {
                owner: thread::current().id(),
                queue: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.shared.owner
    }

    pub fn is_owning_thread(&self) -> bool {
        thread::current().id() == self.shared.owner
    }

    /// Queue `f` to run on the owning thread at the next pump.
    pub fn post<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.queue().push_back(Box::new(f))
    }

    /// Number of queued continuations.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Take everything queued so far. Work posted afterwards waits for the next call.
    pub(crate) fn take_queued(&self) -> VecDeque<Continuation> {
        std::mem::take(&mut *self.queue())
    }

    /// Whether both handles refer to the same context.
    pub fn same_context(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The lock is never held while running user code, so a poisoned queue is still consistent.
    fn queue(&self) -> MutexGuard<'_, VecDeque<Continuation>> {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("owner", &self.shared.owner)
            .field("pending", &self.pending())
            .finish()
    }
}
