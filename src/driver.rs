use crate::config::Config;
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::pump::{Pump, PumpReport};
use crate::scheduler::{Scheduler, TickReport};
use core::cell::Cell;
use core::future::Future;

/// What one [`Driver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverReport {
    pub scheduler: TickReport,
    pub pump: PumpReport,
}

/// Host integration: one [`Scheduler`] and one [`Pump`], driven together by the external tick.
///
/// Hosts call [`tick`](Driver::tick) from their periodic callback.
/// Tools and tests without such a callback can use [`block_on`](Driver::block_on).
pub struct Driver {
    scheduler: Scheduler,
    pump: Pump,
    config: Config,
    ticks: Cell<u64>,
}

impl Driver {
    pub fn new(context: ExecutionContext, config: Config) -> Self {
        Driver {
            scheduler: Scheduler::with_policy(config.unknown_directives),
            pump: Pump::new(context),
            config,
            ticks: Cell::new(0),
        }
    }

    /// Use an existing pump, for example one built with [`Pump::with_host_dispatch`].
    pub fn with_pump(pump: Pump, config: Config) -> Self {
        Driver {
            scheduler: Scheduler::with_policy(config.unknown_directives),
            pump,
            config,
            ticks: Cell::new(0),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn pump(&self) -> &Pump {
        &self.pump
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ticks performed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Advance coroutines, then run the continuations they (and other threads) queued.
    pub fn tick(&self) -> DriverReport {
        self.ticks.set(self.ticks.get() + 1);
        let scheduler = self.scheduler.tick();
        let pump = self.pump.pump();
        DriverReport { scheduler, pump }
    }

    /// Spawn `future` on the pump and tick until it finishes.
    ///
    /// Sleeps [`Config::tick_interval`] between ticks. Fails with [`Error::Stalled`] when no coroutine
    /// is active and no continuation is queued, so nothing known can wake the future. Also fails with
    /// [`Error::Stalled`] when the pump cannot drain, including while the host dispatch loop reports
    /// itself active. Fails with [`Error::TickLimit`] after [`Config::max_ticks`].
    /// ```
    /// use tickbridge::{registry, Config, Directive, Driver, WaitRealtime};
    /// use std::time::Duration;
    /// let driver = Driver::new(registry::install(), Config::default());
    /// let scheduler = driver.scheduler().clone();
    /// let value = driver.block_on(async move {
    ///     scheduler.wait_for(WaitRealtime::new(Duration::from_millis(30)).into()).await?;
    ///     Ok::<_, tickbridge::Error>("asdf")
    /// });
    /// assert_eq!(value.unwrap().unwrap(), "asdf");
    /// ```
    pub fn block_on<F>(&self, future: F) -> Result<F::Output, Error>
    where
        F: Future + 'static,
    {
        let mut handle = self.pump.spawn(future);
        let mut ticks = 0;
        loop {
            let report = self.tick();
            ticks += 1;
            handle = match handle.try_join() {
                Ok(value) => return Ok(value),
                Err(handle) => handle,
            };
            // Blocking holds the thread a host dispatch loop would drain on.
            if matches!(report.pump, PumpReport::Unavailable | PumpReport::Skipped)
                || (self.scheduler.is_empty() && self.pump.pending() == 0)
            {
                return Err(Error::Stalled);
            }
            if let Some(max_ticks) = self.config.max_ticks {
                if ticks >= max_ticks {
                    return Err(Error::TickLimit(max_ticks));
                }
            }
            if !self.config.tick_interval.is_zero() {
                std::thread::sleep(self.config.tick_interval)
            }
        }
    }
}

impl core::fmt::Debug for Driver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("scheduler", &self.scheduler)
            .field("context", self.pump.context())
            .field("ticks", &self.ticks.get())
            .finish()
    }
}
