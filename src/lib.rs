//! # Tick Driven Coroutines and Continuations #
//!
//! Bridges generator-style coroutines and async tasks inside a host that only calls back on a periodic tick,
//! and has no event loop of its own running.
//!
//! - A [`Scheduler`] steps suspended [`Coroutine`]s once per tick, according to the [`Directive`] they last yielded.
//! - A [`Pump`] runs the continuations queued on a captured single-threaded [`ExecutionContext`], including the
//!   wake-ups of async tasks that await coroutines.
//! - [`WaitRealtime`] is a wait directive measured on a monotonic clock, independent of the host's simulated time.
//!
//! Everything is single threaded and driven by explicit calls: nothing runs between ticks.
//! Other threads can only post work to an [`ExecutionContext`], or complete an [`AsyncOperation`].
//!
//! # Examples #
//!
//! Coroutines are stepped by [`Scheduler::tick()`]:
//! ```
//! use tickbridge::{coroutine, Directive, Scheduler};
//! let scheduler = Scheduler::new();
//! let handle = scheduler.submit(coroutine::from_iter([Directive::Tick, Directive::Tick]));
//! scheduler.tick();
//! assert!(!handle.is_finished());
//! scheduler.tick();
//! assert!(handle.is_finished());
//! ```
//!
//! Async tasks awaiting coroutines run on the installed context, with a [`Driver`] ticking both:
//! ```
//! use tickbridge::{registry, Config, Directive, Driver};
//! let driver = Driver::new(registry::install(), Config::default());
//! let scheduler = driver.scheduler().clone();
//! let task = driver.pump().spawn(async move {
//!     scheduler.wait_for(Directive::wait_until(|| true)).await
//! });
//! driver.tick(); // Task starts and submits the coroutine
//! driver.tick(); // Coroutine resumes and completes, task finishes
//! assert!(task.try_join().unwrap().is_ok());
//! ```

mod utils;

/// Wait directives yielded by coroutines
mod directive;

/// Suspension classifier
mod classify;

mod realtime;

pub mod coroutine;

/// Coroutine scheduler
mod scheduler;

/// Execution context and its continuation queue
mod context;

/// Process-wide execution context
pub mod registry;

/// Continuation queue pump and local tasks
mod pump;

mod driver;

mod config;

mod error;

pub use classify::{classify, UnknownDirectives, Unsupported, Verdict};
pub use config::{Config, DEFAULT_TICK_INTERVAL};
pub use context::ExecutionContext;
pub use coroutine::{Coroutine, CoroutineState};
pub use directive::{AsyncOperation, Directive, KeepWaiting, OperationFlag};
pub use driver::{Driver, DriverReport};
pub use error::{BoxError, Error};
pub use pump::{Pump, PumpReport};
pub use realtime::{Clock, ManualClock, MonotonicClock, WaitRealtime};
pub use scheduler::{Scheduler, TickReport};
pub use utils::JoinHandle;
