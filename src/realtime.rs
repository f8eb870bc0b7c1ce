use crate::directive::KeepWaiting;
use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;
use std::time::Instant;

/// Source of monotonic time for [`WaitRealtime`].
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock monotonic time. Unaffected by a paused host simulation clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// Wait for a real-time duration, measured on a monotonic clock.
///
/// Works the same whether or not the host's per-frame clock is advancing.
/// Time is accumulated only when polled: each poll adds the time since the previous poll (or construction).
/// ```
/// use tickbridge::{Directive, Scheduler, WaitRealtime};
/// use std::time::Duration;
/// let scheduler = Scheduler::new();
/// let handle = scheduler.wait_for(WaitRealtime::new(Duration::from_millis(20)).into());
/// while !handle.is_finished() {
///     scheduler.tick();
///     std::thread::sleep(Duration::from_millis(5));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WaitRealtime<C: Clock = MonotonicClock> {
    target: Duration,
    elapsed: Duration,
    last_poll: Instant,
    clock: C,
}

impl WaitRealtime<MonotonicClock> {
    pub fn new(target: Duration) -> Self {
        Self::with_clock(target, MonotonicClock)
    }

    /// Negative or NaN durations are treated as zero.
    pub fn from_secs_f32(seconds: f32) -> Self {
        Self::new(Duration::try_from_secs_f32(seconds).unwrap_or(Duration::ZERO))
    }
}

impl<C: Clock> WaitRealtime<C> {
    pub fn with_clock(target: Duration, clock: C) -> Self {
        WaitRealtime {
            target,
            elapsed: Duration::ZERO,
            last_poll: clock.now(),
            clock,
        }
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Accumulate time since the last poll, then test against the target.
    pub fn poll_waiting(&mut self) -> bool {
        let now = self.clock.now();
        self.elapsed += now.saturating_duration_since(self.last_poll);
        self.last_poll = now;
        self.elapsed < self.target
    }
}

impl<C: Clock> KeepWaiting for WaitRealtime<C> {
    fn keep_waiting(&mut self) -> bool {
        self.poll_waiting()
    }
}
