use crate::classify::{classify, UnknownDirectives, Unsupported, Verdict};
use crate::coroutine::{self, Coroutine, CoroutineState};
use crate::directive::Directive;
use crate::error::Error;
use crate::utils::{JoinHandle, JoinSlot};
use core::cell::{Cell, RefCell};
use std::rc::Rc;

/// Coroutine frame: the coroutine, its last yielded directive, and its completion slot.
struct Frame<C: Coroutine> {
    id: u64,
    coroutine: C,
    pending: Directive,
    slot: Rc<JoinSlot<Result<C::Output, Error>>>,
}

/// Outcome of one coroutine step.
enum Stepped {
    Suspended,
    Completed,
    Faulted,
}

/// Internal trait: advance a frame. For type erasure of the coroutine and its output.
trait Resumable {
    fn id(&self) -> u64;
    fn pending(&mut self) -> &mut Directive;
    fn step(&mut self) -> Stepped;
    /// End the coroutine with an error, without stepping it.
    fn fail(&mut self, error: Error);
}

impl<C: Coroutine> Resumable for Frame<C> {
    fn id(&self) -> u64 {
        self.id
    }

    fn pending(&mut self) -> &mut Directive {
        &mut self.pending
    }

    fn step(&mut self) -> Stepped {
        match self.coroutine.resume() {
            Ok(CoroutineState::Yielded(directive)) => {
                self.pending = directive;
                Stepped::Suspended
            }
            Ok(CoroutineState::Complete(value)) => {
                self.slot.complete(Ok(value));
                Stepped::Completed
            }
            Err(error) => {
                log::debug!("coroutine #{} faulted: {}", self.id, error);
                self.slot.complete(Err(Error::CoroutineFault(error)));
                Stepped::Faulted
            }
        }
    }

    fn fail(&mut self, error: Error) {
        self.slot.complete(Err(error))
    }
}

impl<C: Coroutine> Drop for Frame<C> {
    fn drop(&mut self) {
        // No-op if already completed
        self.slot.complete(Err(Error::Abandoned))
    }
}

/// Counters for one [`Scheduler::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Coroutines stepped this tick.
    pub resumed: usize,
    /// Coroutines kept waiting on their directive, not stepped.
    pub held: usize,
    pub completed: usize,
    pub faulted: usize,
    /// Coroutines terminated on an unsupported directive.
    pub rejected: usize,
}

/// Cooperative scheduler for coroutines, advanced by explicit calls to [`tick`](Scheduler::tick).
///
/// The handle is cheap to clone; clones drive the same set of coroutines, so a coroutine step may
/// submit new coroutines. Single threaded: the scheduler is neither `Send` nor `Sync`.
/// ```
/// use tickbridge::{coroutine, Directive, Scheduler};
/// let scheduler = Scheduler::new();
/// let handle = scheduler.submit(coroutine::from_iter([Directive::Tick, Directive::Tick]));
/// assert_eq!(scheduler.len(), 1);
/// scheduler.tick();
/// scheduler.tick();
/// assert!(scheduler.is_empty());
/// assert!(handle.try_join().unwrap().is_ok());
/// ```
///
/// Ticks must not overlap: ticking from inside a coroutine step panics.
/// ```should_panic
/// use tickbridge::{coroutine, CoroutineState, Directive, Scheduler};
/// let scheduler = Scheduler::new();
/// let inner = scheduler.clone();
/// let mut first = true;
/// scheduler.submit(coroutine::from_fn(move || {
///     if !std::mem::replace(&mut first, false) {
///         inner.tick(); // panics !
///     }
///     Ok(CoroutineState::<()>::Yielded(Directive::Tick))
/// }));
/// scheduler.tick();
/// ```
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Active coroutines in submission order.
    /// Emptied during a tick: it then only receives submissions made by the coroutine steps.
    active: RefCell<Vec<Box<dyn Resumable>>>,
    ticking: Cell<bool>,
    next_id: Cell<u64>,
    unknown: UnknownDirectives,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(unknown: UnknownDirectives) -> Self {
        Scheduler {
            inner: Rc::new(Inner {
                unknown,
                ..Inner::default()
            }),
        }
    }

    /// Number of coroutines waiting for a tick.
    pub fn len(&self) -> usize {
        self.inner.active.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the first step of `coroutine` now, and keep it for the next ticks if it yielded.
    ///
    /// A coroutine finishing in its first step is never added. Submitting from inside a coroutine
    /// step during a tick is allowed: the new coroutine is first considered by the next tick.
    pub fn submit<C>(&self, coroutine: C) -> JoinHandle<Result<C::Output, Error>>
    where
        C: Coroutine + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let slot = Rc::new(JoinSlot::new());
        let mut frame = Frame {
            id,
            coroutine,
            pending: Directive::Tick,
            slot: slot.clone(),
        };
        // Not borrowing `active` while stepping: the step may submit too.
        match frame.step() {
            Stepped::Suspended => {
                log::debug!("coroutine #{} submitted, waiting on {:?}", id, frame.pending);
                self.inner.active.borrow_mut().push(Box::new(frame))
            }
            Stepped::Completed | Stepped::Faulted => {
                log::debug!("coroutine #{} finished during submission", id)
            }
        }
        JoinHandle::new(slot)
    }

    /// Suspend until `directive` is satisfied, as a one step coroutine.
    pub fn wait_for(&self, directive: Directive) -> JoinHandle<Result<(), Error>> {
        self.submit(coroutine::from_iter([directive]))
    }

    /// Advance every active coroutine by at most one step, in submission order.
    ///
    /// Each pending directive is classified and polled exactly once. Coroutines whose directive is
    /// satisfied are stepped; unsupported directives terminate only their own coroutine.
    pub fn tick(&self) -> TickReport {
        assert!(
            !self.inner.ticking.replace(true),
            "Scheduler::tick called from within a tick"
        );
        let active = std::mem::take(&mut *self.inner.active.borrow_mut());
        let mut tick = TickGuard {
            inner: &self.inner,
            retained: Vec::with_capacity(active.len()),
            remaining: active.into_iter(),
        };
        let mut report = TickReport::default();

        while let Some(mut frame) = tick.remaining.next() {
            match self.decide(frame.pending()) {
                Decision::Hold => {
                    report.held += 1;
                    tick.retained.push(frame);
                }
                Decision::Reject(unsupported) => {
                    log::error!(
                        "coroutine #{} terminated: {} is not supported ({})",
                        frame.id(),
                        unsupported.kind,
                        unsupported.reason
                    );
                    report.rejected += 1;
                    frame.fail(unsupported.into());
                }
                Decision::Step => {
                    report.resumed += 1;
                    match frame.step() {
                        Stepped::Suspended => tick.retained.push(frame),
                        Stepped::Completed => report.completed += 1,
                        Stepped::Faulted => report.faulted += 1,
                    }
                }
            }
        }
        drop(tick);
        log::trace!("tick: {:?}", report);
        report
    }

    /// Single dispatch point on the classifier verdict.
    fn decide(&self, directive: &mut Directive) -> Decision {
        match classify(directive, self.inner.unknown) {
            Verdict::Resume => Decision::Step,
            Verdict::PollUntilFlagTrue(waiting) => match waiting.keep_waiting() {
                true => Decision::Hold,
                false => Decision::Step,
            },
            Verdict::PollUntilDone(operation) => match operation.is_done() {
                true => Decision::Step,
                false => Decision::Hold,
            },
            Verdict::Unsupported(unsupported) => Decision::Reject(unsupported),
        }
    }
}

/// Puts the coroutines of a tick back in the active set when the tick ends, also when a coroutine step
/// panics. Order: retained, not yet processed, then submitted during the tick.
/// The frame whose step panicked is dropped, which abandons it.
struct TickGuard<'a> {
    inner: &'a Inner,
    retained: Vec<Box<dyn Resumable>>,
    remaining: std::vec::IntoIter<Box<dyn Resumable>>,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.inner.active.borrow_mut();
        let submitted = std::mem::take(&mut *active);
        active.append(&mut self.retained);
        active.extend(self.remaining.by_ref());
        active.extend(submitted);
        drop(active);
        self.inner.ticking.set(false)
    }
}

enum Decision {
    Step,
    Hold,
    Reject(Unsupported),
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("active", &self.len())
            .field("unknown", &self.inner.unknown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::OperationFlag;
    use crate::error::BoxError;

    /// Coroutine yielding `ticks` times, counting its steps.
    fn ticking(ticks: usize, steps: Rc<Cell<usize>>) -> impl Coroutine<Output = usize> {
        coroutine::from_fn(move || {
            let n = steps.get() + 1;
            steps.set(n);
            Ok(match n > ticks {
                true => CoroutineState::Complete(n),
                false => CoroutineState::Yielded(Directive::Tick),
            })
        })
    }

    /// Predicate asking to wait for its first `polls` evaluations.
    fn polled_wait(polls: usize, count: Rc<Cell<usize>>) -> Directive {
        Directive::wait_while(move || {
            count.set(count.get() + 1);
            count.get() <= polls
        })
    }

    #[test]
    fn tick_directives_complete_after_one_tick_each() {
        crate::utils::init_test_logger();
        for yields in 1..5 {
            let scheduler = Scheduler::new();
            let steps = Rc::new(Cell::new(0));
            let handle = scheduler.submit(ticking(yields, steps.clone()));
            let mut ticks = 0;
            while !scheduler.is_empty() {
                scheduler.tick();
                ticks += 1;
            }
            assert_eq!(ticks, yields);
            assert_eq!(handle.try_join().unwrap().unwrap(), yields + 1);
        }
    }

    #[test]
    fn immediate_completion_is_never_added() {
        let scheduler = Scheduler::new();
        scheduler.submit(coroutine::from_iter([Directive::Tick]));
        let handle = scheduler.submit(coroutine::from_fn(|| Ok(CoroutineState::Complete('x'))));
        assert_eq!(scheduler.len(), 1);
        assert_eq!(handle.try_join().unwrap().unwrap(), 'x');
    }

    #[test]
    fn predicate_held_then_resumed_once() {
        let scheduler = Scheduler::new();
        let polls = Rc::new(Cell::new(0));
        let steps = Rc::new(Cell::new(0));
        let directive = polled_wait(3, polls.clone());
        let mut directives = Some(directive);
        let counter = steps.clone();
        scheduler.submit(coroutine::from_fn(move || {
            counter.set(counter.get() + 1);
            Ok(match directives.take() {
                Some(directive) => CoroutineState::Yielded(directive),
                None => CoroutineState::Complete(()),
            })
        }));
        assert_eq!(steps.get(), 1);
        for tick in 1..=3 {
            let report = scheduler.tick();
            assert_eq!(report.held, 1, "tick {}", tick);
            assert_eq!(polls.get(), tick);
            assert_eq!(steps.get(), 1);
        }
        let report = scheduler.tick();
        assert_eq!(report.resumed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(steps.get(), 2);
        assert_eq!(polls.get(), 4);
        assert_eq!(scheduler.tick(), TickReport::default());
    }

    #[test]
    fn operation_resumes_when_done() {
        let scheduler = Scheduler::new();
        let flag = OperationFlag::new();
        let handle = scheduler.wait_for(flag.clone().into());
        for _ in 0..5 {
            assert_eq!(scheduler.tick().held, 1);
        }
        flag.complete();
        let report = scheduler.tick();
        assert_eq!((report.resumed, report.completed), (1, 1));
        assert!(handle.try_join().unwrap().is_ok());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn unsupported_directive_terminates_only_its_coroutine() {
        crate::utils::init_test_logger();
        let scheduler = Scheduler::new();
        let steps = Rc::new(Cell::new(0));
        let before = scheduler.submit(ticking(2, steps.clone()));
        let rejected = scheduler.wait_for(Directive::Seconds(core::time::Duration::from_secs(1)));
        let after_steps = Rc::new(Cell::new(0));
        let after = scheduler.submit(ticking(2, after_steps.clone()));

        let report = scheduler.tick();
        assert_eq!(report.rejected, 1);
        assert_eq!(report.resumed, 2);
        assert_eq!(scheduler.len(), 2);
        match rejected.try_join().unwrap() {
            Err(Error::UnsupportedDirective { kind, .. }) => assert_eq!(kind, "Seconds"),
            other => panic!("unexpected {:?}", other),
        }

        scheduler.tick();
        assert!(before.try_join().unwrap().is_ok());
        assert!(after.try_join().unwrap().is_ok());
    }

    #[test]
    fn reject_policy_applies_to_unknown_directives() {
        let scheduler = Scheduler::with_policy(UnknownDirectives::Reject);
        let handle = scheduler.wait_for(Directive::other(42_i64));
        assert_eq!(scheduler.tick().rejected, 1);
        assert!(handle.try_join().unwrap().unwrap_err().is_unsupported_directive());

        let scheduler = Scheduler::new();
        let handle = scheduler.wait_for(Directive::other(42_i64));
        assert_eq!(scheduler.tick().completed, 1);
        assert!(handle.try_join().unwrap().is_ok());
    }

    #[test]
    fn fault_is_delivered_to_the_handle() {
        let scheduler = Scheduler::new();
        let mut first = true;
        let handle = scheduler.submit(coroutine::from_fn(move || {
            if std::mem::replace(&mut first, false) {
                return Ok(CoroutineState::<()>::Yielded(Directive::Tick));
            }
            Err(BoxError::from("disk on fire"))
        }));
        let report = scheduler.tick();
        assert_eq!(report.faulted, 1);
        match handle.try_join().unwrap() {
            Err(Error::CoroutineFault(error)) => assert_eq!(error.to_string(), "disk on fire"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn submissions_during_tick_start_next_tick() {
        let scheduler = Scheduler::new();
        let inner = scheduler.clone();
        let spawned: Rc<RefCell<Option<JoinHandle<Result<(), Error>>>>> = Default::default();
        let slot = spawned.clone();
        let mut step = 0;
        scheduler.submit(coroutine::from_fn(move || {
            step += 1;
            if step == 2 {
                let handle = inner.submit(coroutine::from_iter([Directive::Tick]));
                *slot.borrow_mut() = Some(handle);
            }
            Ok(match step {
                3 => CoroutineState::Complete(()),
                _ => CoroutineState::Yielded(Directive::Tick),
            })
        }));

        let report = scheduler.tick();
        assert_eq!(report.resumed, 1);
        assert_eq!(scheduler.len(), 2);
        let report = scheduler.tick();
        assert_eq!((report.resumed, report.completed), (2, 2));
        let handle = spawned.borrow_mut().take().unwrap();
        assert!(handle.try_join().unwrap().is_ok());
    }

    #[test]
    fn processing_follows_submission_order() {
        let scheduler = Scheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let order = order.clone();
            let mut steps = 0;
            scheduler.submit(coroutine::from_fn(move || {
                steps += 1;
                order.borrow_mut().push(name);
                Ok(match steps {
                    3 => CoroutineState::Complete(()),
                    _ => CoroutineState::Yielded(Directive::Tick),
                })
            }));
        }
        scheduler.tick();
        scheduler.tick();
        assert_eq!(*order.borrow(), ["a", "b", "c", "a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn dropping_the_scheduler_abandons_coroutines() {
        let scheduler = Scheduler::new();
        let handle = scheduler.wait_for(Directive::wait_until(|| false));
        drop(scheduler);
        assert!(matches!(handle.try_join().unwrap(), Err(Error::Abandoned)));
    }

    #[test]
    fn panicking_step_leaves_other_coroutines_running() {
        let scheduler = Scheduler::new();
        let before = scheduler.wait_for(Directive::wait_until(|| false));
        let mut first = true;
        let panicking = scheduler.submit(coroutine::from_fn(move || {
            if !std::mem::replace(&mut first, false) {
                panic!("step blew up");
            }
            Ok(CoroutineState::<()>::Yielded(Directive::Tick))
        }));
        let after_steps = Rc::new(Cell::new(0));
        let after = scheduler.submit(ticking(1, after_steps.clone()));

        let tick = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler.tick()));
        assert!(tick.is_err());
        assert!(matches!(panicking.try_join().unwrap(), Err(Error::Abandoned)));
        assert!(!before.is_finished());
        assert_eq!(scheduler.len(), 2);
        assert_eq!(after_steps.get(), 1);

        let report = scheduler.tick();
        assert_eq!((report.held, report.completed), (1, 1));
        assert_eq!(after_steps.get(), 2);
        assert!(after.try_join().unwrap().is_ok());
        assert!(!before.is_finished());
    }

    #[test]
    fn two_coroutines_scenario() {
        let scheduler = Scheduler::new();
        let a_steps = Rc::new(Cell::new(0));
        let a = scheduler.submit(ticking(2, a_steps.clone()));
        let polls = Rc::new(Cell::new(0));
        let b_resumed = Rc::new(Cell::new(false));
        let resumed = b_resumed.clone();
        let mut wait = Some(Directive::wait_until({
            let polls = polls.clone();
            move || {
                polls.set(polls.get() + 1);
                polls.get() >= 3
            }
        }));
        let b = scheduler.submit(coroutine::from_fn(move || {
            Ok(match wait.take() {
                Some(directive) => CoroutineState::Yielded(directive),
                None => {
                    resumed.set(true);
                    CoroutineState::Complete(())
                }
            })
        }));

        scheduler.tick();
        assert_eq!(a_steps.get(), 2);
        assert!(!b_resumed.get());
        assert_eq!(scheduler.len(), 2);

        scheduler.tick();
        scheduler.tick();
        assert!(a.is_finished());
        assert!(b_resumed.get());
        assert!(b.is_finished());

        scheduler.tick();
        assert!(scheduler.is_empty());
    }
}
