use crate::classify::UnknownDirectives;
use core::time::Duration;

/// Default pause between two ticks of [`Driver::block_on`](crate::Driver::block_on).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Settings of a [`Driver`](crate::Driver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Treatment of directive kinds the classifier does not know.
    pub unknown_directives: UnknownDirectives,
    /// Pause between ticks when blocking. Zero spins.
    pub tick_interval: Duration,
    /// Give up blocking after this many ticks.
    pub max_ticks: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            unknown_directives: UnknownDirectives::PassThrough,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_ticks: None,
        }
    }
}

impl Config {
    pub fn with_unknown_directives(self, unknown_directives: UnknownDirectives) -> Self {
        Config {
            unknown_directives,
            ..self
        }
    }

    pub fn with_tick_interval(self, tick_interval: Duration) -> Self {
        Config {
            tick_interval,
            ..self
        }
    }

    pub fn with_max_ticks(self, max_ticks: u64) -> Self {
        Config {
            max_ticks: Some(max_ticks),
            ..self
        }
    }
}
