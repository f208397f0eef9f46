//! Engine events.
//!
//! Events are published on a broadcast bus owned by the [`AdvertolEngine`](crate::AdvertolEngine).
//! Subscribe with [`AdvertolEngine::subscribe_events`](crate::AdvertolEngine::subscribe_events);
//! only events sent after subscribing are received.

use crate::engine::zone::ZoneId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    // ****************************************
    // ** Zone lifecycle
    /// A zone has been added to the engine
    ZoneRegistered { zone_id: ZoneId },
    /// Content for a zone has been written; `empty` is true when the service had nothing to show
    ZoneLoaded { zone_id: ZoneId, empty: bool },
    /// A loaded zone changed its visibility
    ZoneVisibilityChanged { zone_id: ZoneId, visible: bool },

    // ****************************************
    // ** Resolution
    /// The contexts have produced a partition and the resolution round has settled
    ResolveCompleted { visible: Vec<ZoneId>, hidden: Vec<ZoneId> },

    // ****************************************
    // ** Engine lifecycle
    /// The engine has been torn down
    EngineDestroyed,
}
