//! Engine configuration.
//!
//! `EngineConfig` controls limits and channel sizes of an
//! [`AdvertolEngine`](crate::AdvertolEngine). It provides sensible defaults via [`Default`]
//! and a fluent [`EngineConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use advertol_engine::EngineConfig;
//! let cfg = EngineConfig::default();
//! assert_eq!(cfg.max_zones, 256);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use advertol_engine::EngineConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = EngineConfig::builder()
//!     .max_zones(32)
//!     .request_queue_capacity(4)
//!     .build()?; // returns Result<EngineConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `max_zones`: Maximum number of zones that can be registered (default: 256).
//! - `request_queue_capacity`: How many re-resolution requests may be queued before further
//!   requests are coalesced into the pending ones (default: 1).
//! - `event_channel_capacity`: Capacity of the [`EngineEvent`](crate::EngineEvent) broadcast bus
//!   (default: [`DEFAULT_CHANNEL_CAPACITY`]).
//!
//! # Errors
//!
//! Builder validation returns [`ConfigError`] if any of the values is zero.

use std::fmt;
use crate::engine::DEFAULT_CHANNEL_CAPACITY;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_zones: usize,
    pub request_queue_capacity: usize,
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_zones: 256,
            request_queue_capacity: 1,
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Checks a configuration that was put together without the builder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate(self)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    inner: EngineConfig,
}

impl EngineConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn max_zones(self, n: usize) -> Self { self.map(|c| c.max_zones = n) }
    pub fn request_queue_capacity(self, n: usize) -> Self { self.map(|c| c.request_queue_capacity = n) }
    pub fn event_channel_capacity(self, n: usize) -> Self { self.map(|c| c.event_channel_capacity = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut EngineConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroZones,
    ZeroRequestQueue,
    ZeroEventChannel,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroZones =>
                write!(f, "max_zones must be at least 1"),
            ConfigError::ZeroRequestQueue =>
                write!(f, "request_queue_capacity must be at least 1"),
            ConfigError::ZeroEventChannel =>
                write!(f, "event_channel_capacity must be at least 1"),
        }
    }
}
impl std::error::Error for ConfigError {}

pub(crate) fn validate(c: &EngineConfig) -> Result<(), ConfigError> {
    if c.max_zones == 0 {
        return Err(ConfigError::ZeroZones);
    }
    if c.request_queue_capacity == 0 {
        return Err(ConfigError::ZeroRequestQueue);
    }
    if c.event_channel_capacity == 0 {
        return Err(ConfigError::ZeroEventChannel);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.request_queue_capacity, 1);
        assert_eq!(cfg.event_channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn builder_applies_values() {
        let cfg = EngineConfig::builder()
            .max_zones(3)
            .request_queue_capacity(2)
            .with(|c| c.event_channel_capacity = 8)
            .build()
            .unwrap();
        assert_eq!(cfg.max_zones, 3);
        assert_eq!(cfg.request_queue_capacity, 2);
        assert_eq!(cfg.event_channel_capacity, 8);
    }

    #[test]
    fn builder_rejects_zero_values() {
        assert_eq!(EngineConfig::builder().max_zones(0).build().unwrap_err(), ConfigError::ZeroZones);
        assert_eq!(
            EngineConfig::builder().request_queue_capacity(0).build().unwrap_err(),
            ConfigError::ZeroRequestQueue
        );
        let err = EngineConfig::builder().event_channel_capacity(0).build().unwrap_err();
        assert_eq!(err.to_string(), "event_channel_capacity must be at least 1");
    }
}
