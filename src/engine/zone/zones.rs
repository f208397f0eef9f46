use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::broadcast;
use crate::engine::control::ControlResolver;
use crate::engine::errors::EngineError;
use crate::engine::events::EngineEvent;
use crate::engine::service::{Service, ServiceZone};
use crate::engine::single_flight::{settle_all, SingleFlight};
use crate::engine::zone::{Zone, ZoneId};

/// Resolves to the zones a call affected once all of them have settled.
pub type ZonesFuture = BoxFuture<'static, Result<Vec<Arc<Zone>>, EngineError>>;

/// Ordered collection of all zones of an engine.
///
/// `show` and `hide` only touch zones that have loaded; `write` only touches zones that have
/// not. A single resolution round can therefore issue all three for overlapping id lists
/// without doing any work twice. Each operation flips flags and notifies the service when it is
/// called; the returned future settles once the control resolution of every affected zone has.
pub struct Zones {
    instances: RwLock<Vec<Arc<Zone>>>,
    /// Content loads, keyed by zone id
    writes: SingleFlight<bool>,
    control_resolver: Arc<ControlResolver>,
    service: Arc<dyn Service>,
    event_tx: broadcast::Sender<EngineEvent>,
    max_zones: usize,
    /// Shared with pending loads so a load settling after `destroy` leaves its zone alone
    destroyed: Arc<AtomicBool>,
}

impl Zones {
    pub fn new(
        control_resolver: Arc<ControlResolver>,
        service: Arc<dyn Service>,
        event_tx: broadcast::Sender<EngineEvent>,
        max_zones: usize,
    ) -> Self {
        Self {
            instances: RwLock::new(Vec::new()),
            writes: SingleFlight::new(),
            control_resolver,
            service,
            event_tx,
            max_zones,
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers a zone. Returns `Ok(false)` without touching anything when a zone with the same
    /// id is already registered.
    pub fn add(&self, zone: Zone) -> Result<bool, EngineError> {
        let zone = {
            let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
            if instances.iter().any(|z| z.id() == zone.id()) {
                log::trace!("zone {} is already registered", zone.id());
                return Ok(false);
            }
            if instances.len() >= self.max_zones {
                return Err(EngineError::ZoneLimitExceeded);
            }
            let zone = Arc::new(zone);
            instances.push(zone.clone());
            zone
        };

        log::debug!("registered zone {}", zone.id());
        self.service.after_zone_registered(&ServiceZone::from(zone.as_ref()));
        self.emit(EngineEvent::ZoneRegistered { zone_id: zone.id().clone() });
        Ok(true)
    }

    pub fn get(&self, id: &ZoneId) -> Option<Arc<Zone>> {
        self.read().iter().find(|z| z.id() == id).cloned()
    }

    /// Ids of all zones, in registration order.
    pub fn ids(&self) -> Vec<ZoneId> {
        self.read().iter().map(|z| z.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Shows the loaded zones among `ids`. Control resolution runs for each zone that was hidden.
    ///
    /// Flags flip when this is called; control callbacks only run when the future is polled.
    #[must_use = "control callbacks only run when the future is polled"]
    pub fn show(&self, ids: &[ZoneId]) -> ZonesFuture {
        self.set_visibility(ids, true)
    }

    /// Hides the loaded zones among `ids`. Control resolution runs for each zone that was visible.
    ///
    /// Flags flip when this is called; control callbacks only run when the future is polled.
    #[must_use = "control callbacks only run when the future is polled"]
    pub fn hide(&self, ids: &[ZoneId]) -> ZonesFuture {
        self.set_visibility(ids, false)
    }

    /// Loads content for the unloaded zones among `ids`.
    ///
    /// Each zone is written at most once, no matter how many calls ask for it. Once its content
    /// settled the zone is marked loaded (or empty), shown, and resolved against the controls if
    /// it was hidden. A load that settles after [`Zones::destroy`] is dropped without touching
    /// its zone.
    ///
    /// Loads are dispatched when this is called; zones are only shown and resolved when the
    /// future is polled.
    #[must_use = "loaded zones are only shown when the future is polled"]
    pub fn write(&self, ids: &[ZoneId]) -> ZonesFuture {
        let targets = self.select(ids, |z| !z.is_loaded());
        let batch: Vec<ServiceZone> = targets.iter().map(|z| ServiceZone::from(z.as_ref())).collect();

        self.service.before_write_zones(&batch);

        let units = targets
            .into_iter()
            .zip(batch.iter().cloned())
            .map(|(zone, service_zone)| {
                let load = self.writes.get_or_start(zone.id(), || {
                    let service = self.service.clone();
                    async move { service.write_zone(&service_zone).await }
                });

                // Run the load up to its first suspension point so the service has seen every
                // write of the batch before `after_write_zones`.
                let _ = load.clone().now_or_never();

                let resolver = self.control_resolver.clone();
                let event_tx = self.event_tx.clone();
                let destroyed = self.destroyed.clone();

                async move {
                    let has_content = load.await?;
                    if destroyed.load(Ordering::SeqCst) {
                        log::trace!("zone {} loaded after destroy, ignoring", zone.id());
                        return Ok(zone);
                    }
                    if has_content {
                        zone.set_as_loaded();
                    } else {
                        zone.set_as_empty();
                    }
                    log::debug!("zone {} loaded (empty: {})", zone.id(), !has_content);
                    let _ = event_tx.send(EngineEvent::ZoneLoaded { zone_id: zone.id().clone(), empty: !has_content });

                    if !zone.show() {
                        let _ = event_tx.send(EngineEvent::ZoneVisibilityChanged { zone_id: zone.id().clone(), visible: true });
                        resolver.resolve(&zone).await?;
                    }
                    Ok::<_, EngineError>(zone)
                }
                .boxed()
            })
            .collect::<Vec<_>>();

        self.service.after_write_zones(&batch);

        settle_all(units).boxed()
    }

    /// Destroys every zone and empties the collection.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        let instances = std::mem::take(&mut *self.instances.write().unwrap_or_else(PoisonError::into_inner));
        for zone in &instances {
            zone.destroy();
        }
        log::debug!("destroyed {} zones", instances.len());
    }

    fn set_visibility(&self, ids: &[ZoneId], visible: bool) -> ZonesFuture {
        if self.is_destroyed() {
            return future::ready(Ok(Vec::new())).boxed();
        }
        let units = self
            .select(ids, |z| z.is_loaded())
            .into_iter()
            .map(|zone| {
                let was_visible = if visible { zone.show() } else { zone.hide() };
                if was_visible == visible {
                    return future::ready(Ok(zone)).boxed();
                }

                log::trace!("zone {} visibility changed to {}", zone.id(), visible);
                self.emit(EngineEvent::ZoneVisibilityChanged { zone_id: zone.id().clone(), visible });
                let resolution = self.control_resolver.resolve(&zone);
                async move {
                    resolution.await?;
                    Ok::<_, EngineError>(zone)
                }
                .boxed()
            })
            .collect::<Vec<_>>();

        settle_all(units).boxed()
    }

    /// Zones whose id is listed in `ids` and that pass `filter`, in registration order.
    fn select(&self, ids: &[ZoneId], filter: impl Fn(&Zone) -> bool) -> Vec<Arc<Zone>> {
        let wanted: HashSet<&ZoneId> = ids.iter().collect();
        self.read()
            .iter()
            .filter(|z| wanted.contains(z.id()) && filter(z))
            .cloned()
            .collect()
    }

    fn emit(&self, event: EngineEvent) {
        // Fails only when nobody subscribed.
        let _ = self.event_tx.send(event);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Zone>>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }
}
