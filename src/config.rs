//! Runtime configuration.

use crate::alarm::RearmPolicy;
use crate::clock::SECONDS_PER_DAY;
use crate::cube::{CubeIdentity, LinkConfig};
use crate::input::InputConfig;
use crate::scheduler::POLL_WINDOW_SECONDS;

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The pre-alarm window is zero seconds long.
    ZeroPollWindow,

    /// The pre-alarm window is a day or longer.
    PollWindowTooLong,

    /// The hold threshold does not exceed the debounce window.
    HoldNotAfterDebounce,

    /// Hold repeats are enabled with a zero interval.
    ZeroRepeatInterval,

    /// Backoff is zero or its initial value exceeds the maximum.
    InvalidBackoff,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::ZeroPollWindow => write!(f, "poll window must be at least one second"),
            ConfigError::PollWindowTooLong => write!(f, "poll window must be shorter than a day"),
            ConfigError::HoldNotAfterDebounce => {
                write!(f, "hold threshold must be longer than the debounce window")
            }
            ConfigError::ZeroRepeatInterval => write!(f, "hold repeat interval must be non-zero"),
            ConfigError::InvalidBackoff => {
                write!(f, "backoff must be non-zero and initial must not exceed max")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Validated controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub identity: CubeIdentity,
    pub poll_window_secs: u32,
    pub input: InputConfig,
    pub link: LinkConfig,
    pub rearm: RearmPolicy,
}

impl Config {
    /// Starts a builder with default timing for the given cube.
    pub fn builder(identity: CubeIdentity) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                identity,
                poll_window_secs: POLL_WINDOW_SECONDS,
                input: InputConfig::default(),
                link: LinkConfig::default(),
                rearm: RearmPolicy::default(),
            },
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Length of the pre-alarm window. Default 10 s.
    pub fn poll_window_secs(mut self, secs: u32) -> Self {
        self.config.poll_window_secs = secs;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.input.debounce_ms = ms;
        self
    }

    pub fn hold_ms(mut self, ms: u64) -> Self {
        self.config.input.hold_ms = ms;
        self
    }

    /// Hold repeat interval, `None` disables repeats.
    pub fn repeat_ms(mut self, ms: Option<u64>) -> Self {
        self.config.input.repeat_ms = ms;
        self
    }

    pub fn backoff_ms(mut self, initial: u64, max: u64) -> Self {
        self.config.link.backoff_initial_ms = initial;
        self.config.link.backoff_max_ms = max;
        self
    }

    pub fn facelet_retries(mut self, retries: u8, interval_ms: u64) -> Self {
        self.config.link.facelet_retries = retries;
        self.config.link.facelet_retry_ms = interval_ms;
        self
    }

    /// Delay and minimum spacing of move-triggered facelets polls.
    pub fn facelet_polling(mut self, delay_ms: u64, rate_ms: u64) -> Self {
        self.config.link.facelet_poll_delay_ms = delay_ms;
        self.config.link.facelet_rate_ms = rate_ms;
        self
    }

    pub fn rearm(mut self, policy: RearmPolicy) -> Self {
        self.config.rearm = policy;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    /// * `ZeroPollWindow` / `PollWindowTooLong` - window outside 1 s to one day
    /// * `HoldNotAfterDebounce` - `hold_ms <= debounce_ms`
    /// * `ZeroRepeatInterval` - `repeat_ms == Some(0)`
    /// * `InvalidBackoff` - zero backoff or initial above max
    pub fn build(self) -> Result<Config, ConfigError> {
        let config = self.config;

        if config.poll_window_secs == 0 {
            return Err(ConfigError::ZeroPollWindow);
        }
        if config.poll_window_secs >= SECONDS_PER_DAY {
            return Err(ConfigError::PollWindowTooLong);
        }
        if config.input.hold_ms <= config.input.debounce_ms {
            return Err(ConfigError::HoldNotAfterDebounce);
        }
        if config.input.repeat_ms == Some(0) {
            return Err(ConfigError::ZeroRepeatInterval);
        }
        if config.link.backoff_initial_ms == 0
            || config.link.backoff_initial_ms > config.link.backoff_max_ms
        {
            return Err(ConfigError::InvalidBackoff);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CubeIdentity {
        CubeIdentity::from_mac([0xCF, 0xAA, 0x79, 0xC9, 0x96, 0x9C])
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::builder(identity()).build().unwrap();
        assert_eq!(config.poll_window_secs, 10);
        assert_eq!(config.input.debounce_ms, 30);
        assert_eq!(config.input.hold_ms, 800);
        assert_eq!(config.input.repeat_ms, Some(200));
        assert_eq!(config.link.backoff_initial_ms, 250);
        assert_eq!(config.link.backoff_max_ms, 2_000);
        assert_eq!(config.rearm, RearmPolicy::Once);
    }

    #[test]
    fn rejects_bad_windows() {
        let builder = Config::builder(identity());
        assert_eq!(builder.poll_window_secs(0).build(), Err(ConfigError::ZeroPollWindow));
        assert_eq!(
            builder.poll_window_secs(SECONDS_PER_DAY).build(),
            Err(ConfigError::PollWindowTooLong)
        );
    }

    #[test]
    fn rejects_bad_timing() {
        let builder = Config::builder(identity());
        assert_eq!(
            builder.debounce_ms(50).hold_ms(50).build(),
            Err(ConfigError::HoldNotAfterDebounce)
        );
        assert_eq!(builder.repeat_ms(Some(0)).build(), Err(ConfigError::ZeroRepeatInterval));
        assert_eq!(builder.backoff_ms(0, 100).build(), Err(ConfigError::InvalidBackoff));
        assert_eq!(builder.backoff_ms(500, 100).build(), Err(ConfigError::InvalidBackoff));
        assert!(builder.repeat_ms(None).build().is_ok());
    }
}
