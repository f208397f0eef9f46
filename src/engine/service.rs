//! Content-loading service.
//!
//! A [`Service`] is the collaborator that actually writes content into zones (for instance an
//! ad-serving SDK). The engine tells it when zones are registered, brackets every batch of writes
//! with [`before_write_zones`](Service::before_write_zones) and
//! [`after_write_zones`](Service::after_write_zones), and asks it to write each zone once.
//!
//! Every method has a default implementation; [`DefaultService`] is the no-op service that reports
//! content for every zone.

mod slot;

use async_trait::async_trait;
use crate::engine::element::Element;
use crate::engine::zone::{Zone, ZoneId};

pub use slot::{SlotCommand, SlotService};

/// The part of a zone a service gets to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceZone {
    pub id: ZoneId,
    pub element: Element,
}

impl From<&Zone> for ServiceZone {
    fn from(zone: &Zone) -> Self {
        Self {
            id: zone.id().clone(),
            element: zone.element().clone(),
        }
    }
}

#[async_trait]
pub trait Service: Send + Sync {
    /// Called once for every zone added to the engine.
    fn after_zone_registered(&self, _zone: &ServiceZone) {}

    /// Called before the zones of a write batch are written.
    fn before_write_zones(&self, _zones: &[ServiceZone]) {}

    /// Writes content into a zone. Resolves to `true` when the zone received content and to
    /// `false` when it stays empty.
    async fn write_zone(&self, _zone: &ServiceZone) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Called once every write of a batch has been dispatched (not necessarily completed).
    fn after_write_zones(&self, _zones: &[ServiceZone]) {}

    fn destroy(&self) {}
}

/// Service that writes nothing and reports content for every zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultService;

impl Service for DefaultService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_service_reports_content() {
        let zone = Zone::new("becky", Element::new("zone-becky")).unwrap();
        let svc = DefaultService;
        let sz = ServiceZone::from(&zone);

        svc.after_zone_registered(&sz);
        svc.before_write_zones(std::slice::from_ref(&sz));
        assert!(futures::executor::block_on(svc.write_zone(&sz)).unwrap());
        svc.after_write_zones(std::slice::from_ref(&sz));
        svc.destroy();

        assert_eq!(sz.id.as_str(), "becky");
        assert_eq!(&sz.element, zone.element());
    }
}
