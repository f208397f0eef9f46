//! Zone system: [`Zones`], [`Zone`], [`ZoneFlags`] and [`ZoneId`].

mod zone;
mod zones;

pub use zone::{Zone, ZoneFlags, ZoneId};
pub use zones::{Zones, ZonesFuture};
