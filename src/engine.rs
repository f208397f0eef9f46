mod advertol;
mod builder;
mod config;
mod element;
mod errors;
mod single_flight;
mod viewport;

pub mod context;
pub mod control;
pub mod events;
pub mod service;
pub mod zone;

#[cfg(test)]
pub(crate) mod testing;

/// Default capacity for broadcast channels created by the engine.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

pub use advertol::AdvertolEngine;
pub use builder::EngineBuilder;
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use element::{Element, ElementId};
pub use errors::{EngineError, SharedError};
pub use single_flight::{Flight, SingleFlight};
pub use viewport::Viewport;

pub use context::{Context, ContextResolver, MediaQuery, MediaQueryContext, NoopContext, ResolveHandle, ZonePartition};
pub use control::{
    Control, ControlResolver, ControlTeardown, ElementClasses, ElementClassesControl, NoopControl, TriggerFlight,
    TriggerResult, ZoneArgs, ZoneCallbackArgs,
};
pub use events::EngineEvent;
pub use service::{DefaultService, Service, ServiceZone, SlotCommand, SlotService};
pub use zone::{Zone, ZoneFlags, ZoneId, Zones};
