pub use join_slot::{JoinHandle, JoinSlot};

mod join_slot {
    use core::cell::RefCell;
    use core::future::Future;
    use core::pin::Pin;
    use core::task::{Context, Poll, Waker};
    use std::rc::Rc;

    /// Completion slot shared by a producer (scheduler frame, spawned task) and its [`JoinHandle`].
    ///
    /// Starts pending, is completed at most once, and the value can be taken at most once.
    pub struct JoinSlot<T> {
        state: RefCell<SlotState<T>>,
    }

    enum SlotState<T> {
        Pending {
            /// [`Waker`] of the task blocked on our [`JoinHandle`].
            wake_on_completion: Option<Waker>,
        },
        Completed(Option<T>),
    }

    impl<T> JoinSlot<T> {
        pub fn new() -> Self {
            JoinSlot {
                state: RefCell::new(SlotState::Pending {
                    wake_on_completion: None,
                }),
            }
        }

        pub fn is_completed(&self) -> bool {
            matches!(&*self.state.borrow(), SlotState::Completed(_))
        }

        /// Store the value and wake the joiner. Completing twice keeps the first value.
        pub fn complete(&self, value: T) {
            let waker = {
                let mut state = self.state.borrow_mut();
                let waker = match &mut *state {
                    SlotState::Completed(_) => return,
                    SlotState::Pending { wake_on_completion } => wake_on_completion.take(),
                };
                *state = SlotState::Completed(Some(value));
                waker
            };
            // Outside of the borrow: the waker may run arbitrary code.
            if let Some(waker) = waker {
                waker.wake()
            }
        }

        /// Waker is optional: present for async wait, absent for a non-blocking test.
        fn poll_join(&self, waker: Option<&Waker>) -> Poll<T> {
            match &mut *self.state.borrow_mut() {
                SlotState::Pending { wake_on_completion } => {
                    update_waker(wake_on_completion, waker);
                    Poll::Pending
                }
                SlotState::Completed(value) => {
                    Poll::Ready(value.take().expect("poll_join: value already consumed"))
                }
            }
        }
    }

    /// Replace stored waker, only if not waking the same task
    fn update_waker(stored: &mut Option<Waker>, replacement: Option<&Waker>) {
        match replacement {
            Some(replacement) => match stored {
                Some(stored) if replacement.will_wake(stored) => (),
                stored => *stored = Some(replacement.clone()),
            },
            None => *stored = None,
        }
    }

    /// `JoinHandle<T>` represents the completion (and output) of a submitted coroutine or spawned task.
    ///
    /// It implements [`Future`] so that a task spawned on a [`Pump`](crate::Pump) can await it.
    /// Completion can also be tested without blocking:
    /// ```
    /// use tickbridge::{Directive, Scheduler};
    /// let scheduler = Scheduler::new();
    /// let handle = scheduler.wait_for(Directive::Tick);
    /// let handle = handle.try_join().unwrap_err(); // Still waiting for a tick
    /// scheduler.tick();
    /// assert!(handle.try_join().unwrap().is_ok());
    /// ```
    pub struct JoinHandle<T>(Rc<JoinSlot<T>>);

    impl<T> JoinHandle<T> {
        pub(crate) fn new(slot: Rc<JoinSlot<T>>) -> Self {
            JoinHandle(slot)
        }

        pub fn is_finished(&self) -> bool {
            self.0.is_completed()
        }

        /// Test completion.
        /// If complete, return the output, consuming the handle.
        /// If not complete, gives back the handle.
        pub fn try_join(self) -> Result<T, Self> {
            match self.0.poll_join(None) {
                Poll::Ready(value) => Ok(value),
                Poll::Pending => Err(self),
            }
        }
    }

    impl<T> Future for JoinHandle<T> {
        type Output = T;
        fn poll(self: Pin<&mut Self>, context: &mut Context) -> Poll<T> {
            self.0.poll_join(Some(context.waker()))
        }
    }

    impl<T> core::fmt::Debug for JoinHandle<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.debug_struct("JoinHandle")
                .field("finished", &self.is_finished())
                .finish()
        }
    }

    #[test]
    fn complete_once() {
        let slot = Rc::new(JoinSlot::new());
        let handle = JoinHandle::new(slot.clone());
        let handle = handle.try_join().unwrap_err();
        slot.complete(1);
        slot.complete(2);
        assert!(handle.is_finished());
        assert_eq!(handle.try_join().unwrap(), 1);
    }
}

#[cfg(test)]
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
