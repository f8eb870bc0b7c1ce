use crate::context::ExecutionContext;
use crate::utils::{JoinHandle, JoinSlot};
use core::cell::{Cell, RefCell};
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Wake;

/// Identifier of a task spawned on a [`Pump`]. Unique per pump.
type TaskId = u64;

/// Tasks of one pump woken since its last drain.
///
/// Filled by wake continuations, which any pump of the context may run: the pump owning the tasks
/// polls them at its next drain.
#[derive(Default)]
struct Woken {
    ids: Mutex<Vec<TaskId>>,
}

impl Woken {
    fn ids(&self) -> MutexGuard<'_, Vec<TaskId>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of one [`Pump::pump`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpReport {
    /// Continuations executed.
    Drained(usize),
    /// The host's own dispatch loop is running and drains the queue itself.
    Skipped,
    /// Draining is not possible from this thread. Work stays queued.
    Unavailable,
}

/// Task frame: the future of a spawned task, with the waker used to poll it.
struct LocalTask {
    future: Pin<Box<dyn Future<Output = ()>>>,
    waker: Arc<TaskWaker>,
}

/// Thread-safe waker of a local task: it only posts a wake continuation to the context.
struct TaskWaker {
    id: TaskId,
    /// Prevents multiple references in the queue.
    in_queue: AtomicBool,
    woken: Arc<Woken>,
    context: ExecutionContext,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref()
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if !self.in_queue.swap(true, Ordering::AcqRel) {
            let (id, woken) = (self.id, self.woken.clone());
            self.context.post(move || woken.ids().push(id))
        }
    }
}

/// Drains the continuation queue of an [`ExecutionContext`] on its owning thread.
///
/// Used when the host's own dispatch loop is not running: call [`pump`](Pump::pump) once per tick.
/// The pump also owns the tasks [`spawn`](Pump::spawn)ed on the context; they are polled when woken.
/// ```
/// use tickbridge::{Directive, ExecutionContext, Pump, PumpReport, Scheduler};
/// let pump = Pump::new(ExecutionContext::capture());
/// let scheduler = Scheduler::new();
/// let waiting = scheduler.wait_for(Directive::Tick);
/// let task = pump.spawn(async move { waiting.await.map(|()| "resumed") });
/// assert_eq!(pump.pump(), PumpReport::Drained(1)); // First poll: awaits the coroutine
/// scheduler.tick(); // Coroutine completes, waking the task
/// assert_eq!(pump.pump(), PumpReport::Drained(1));
/// assert_eq!(task.try_join().unwrap().unwrap(), "resumed");
/// ```
#[derive(Clone)]
pub struct Pump {
    inner: Rc<Inner>,
}

struct Inner {
    context: ExecutionContext,
    tasks: RefCell<HashMap<TaskId, LocalTask>>,
    woken: Arc<Woken>,
    next_task_id: Cell<TaskId>,
    host_dispatch: Option<Box<dyn Fn() -> bool>>,
}

impl Pump {
    pub fn new(context: ExecutionContext) -> Self {
        Self::build(context, None)
    }

    /// `active` tells whether the host's own dispatch loop is currently draining the queue.
    /// While it returns true, [`pump`](Pump::pump) does nothing.
    pub fn with_host_dispatch<F>(context: ExecutionContext, active: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Self::build(context, Some(Box::new(active)))
    }

    fn build(context: ExecutionContext, host_dispatch: Option<Box<dyn Fn() -> bool>>) -> Self {
        Pump {
            inner: Rc::new(Inner {
                context,
                tasks: RefCell::new(HashMap::new()),
                woken: Arc::default(),
                next_task_id: Cell::new(0),
                host_dispatch,
            }),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }

    /// Number of spawned tasks not yet finished.
    pub fn tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Continuations queued on the context, plus tasks of this pump already woken and not yet polled.
    pub fn pending(&self) -> usize {
        self.inner.context.pending() + self.inner.woken.ids().len()
    }

    /// Run the continuations queued so far, on the calling thread.
    ///
    /// Continuations queued while draining run at the next call. Safe to call redundantly.
    pub fn pump(&self) -> PumpReport {
        if self.inner.host_dispatch.as_ref().is_some_and(|active| active()) {
            return PumpReport::Skipped;
        }
        if !self.inner.context.is_owning_thread() {
            log::warn!(
                "cannot drain continuations of {:?} from {:?}",
                self.inner.context,
                std::thread::current().id()
            );
            return PumpReport::Unavailable;
        }
        let queued = self.inner.context.take_queued();
        let drained = queued.len();
        for continuation in queued {
            continuation()
        }
        // Includes wakes delivered by other pumps of the context since our last drain.
        let woken = std::mem::take(&mut *self.inner.woken.ids());
        for id in woken {
            self.poll_task(id)
        }
        PumpReport::Drained(drained)
    }

    /// Creates a new task on the context and returns a struct representing completion.
    ///
    /// The future does not need to be `Send`: it is only ever polled by this pump, on the owning thread.
    /// Its first poll happens at the next [`pump`](Pump::pump).
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
    {
        let slot = Rc::new(JoinSlot::new());
        let output = slot.clone();
        self.insert(Box::pin(async move { output.complete(future.await) }));
        JoinHandle::new(slot)
    }

    /// Spawn a task whose result nobody awaits. An error result is logged.
    pub fn spawn_detached<F, E>(&self, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Display,
    {
        self.insert(Box::pin(async move {
            if let Err(error) = future.await {
                log::error!("detached task failed: {}", error)
            }
        }))
    }

    fn insert(&self, future: Pin<Box<dyn Future<Output = ()>>>) {
        let id = self.inner.next_task_id.get();
        self.inner.next_task_id.set(id + 1);
        let waker = Arc::new(TaskWaker {
            id,
            in_queue: AtomicBool::new(false),
            woken: self.inner.woken.clone(),
            context: self.inner.context.clone(),
        });
        waker.wake_by_ref();
        self.inner.tasks.borrow_mut().insert(id, LocalTask { future, waker });
    }

    fn poll_task(&self, id: TaskId) {
        // Removed while polling: the task may spawn, or wake itself.
        let Some(mut task) = self.inner.tasks.borrow_mut().remove(&id) else {
            log::trace!("wake for finished task {}", id);
            return;
        };
        task.waker.in_queue.store(false, Ordering::Release);
        let waker = Waker::from(task.waker.clone());
        match task.future.as_mut().poll(&mut Context::from_waker(&waker)) {
            Poll::Ready(()) => (),
            Poll::Pending => {
                self.inner.tasks.borrow_mut().insert(id, task);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tasks = std::mem::take(self.tasks.get_mut());
        if !tasks.is_empty() {
            log::debug!("dropping {} unfinished tasks", tasks.len());
        }
    }
}
