use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use crate::engine::config::EngineConfig;
use crate::engine::context::{Context, ContextResolver, ResolveHandle, ZonePartition};
use crate::engine::control::{Control, ControlResolver};
use crate::engine::element::Element;
use crate::engine::errors::EngineError;
use crate::engine::events::EngineEvent;
use crate::engine::service::Service;
use crate::engine::zone::{Zone, ZoneId, Zones};

/// The zone resolution engine.
///
/// Owns the zones and the control and context resolvers, all sharing one [`Service`].
/// Dropping the engine destroys it.
pub struct AdvertolEngine {
    config: EngineConfig,
    service: Arc<dyn Service>,
    control_resolver: Arc<ControlResolver>,
    zones: Arc<Zones>,
    context_resolver: Arc<ContextResolver>,
    event_tx: broadcast::Sender<EngineEvent>,
    /// Is the re-resolution listener running?
    running: AtomicBool,
    destroyed: AtomicBool,
}

impl AdvertolEngine {
    /// Creates an engine with the default configuration.
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self::assemble(EngineConfig::default(), service)
    }

    /// Creates an engine with a custom configuration, which is validated first.
    pub fn with_config(config: EngineConfig, service: Arc<dyn Service>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::assemble(config, service))
    }

    fn assemble(config: EngineConfig, service: Arc<dyn Service>) -> Self {
        // Broadcast event bus. Subscribe to receive zone and resolution events
        let (event_tx, _first_rx) = broadcast::channel::<EngineEvent>(config.event_channel_capacity);

        let control_resolver = Arc::new(ControlResolver::new());
        let zones = Arc::new(Zones::new(
            control_resolver.clone(),
            service.clone(),
            event_tx.clone(),
            config.max_zones,
        ));
        let context_resolver = Arc::new(ContextResolver::new(
            zones.clone(),
            config.request_queue_capacity,
            event_tx.clone(),
        ));

        Self {
            config,
            service,
            control_resolver,
            zones,
            context_resolver,
            event_tx,
            running: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one resolution round and settles once every zone and control involved has.
    ///
    /// Resolves to the partition the contexts produced. After [`destroy`](Self::destroy) this
    /// does nothing and resolves to an empty partition.
    ///
    /// Zone flags flip when this is called; control callbacks only run when the future is
    /// polled, so the future has to be awaited:
    ///
    /// ```compile_fail
    /// #![deny(unused_must_use)]
    /// use std::sync::Arc;
    /// use advertol_engine::{AdvertolEngine, DefaultService};
    ///
    /// let engine = AdvertolEngine::new(Arc::new(DefaultService));
    /// engine.resolve();
    /// ```
    #[must_use = "control callbacks only run when the future is polled"]
    pub fn resolve(&self) -> BoxFuture<'static, Result<ZonePartition, EngineError>> {
        if self.is_destroyed() {
            return future::ready(Ok(ZonePartition::default())).boxed();
        }
        self.context_resolver.resolve()
    }

    pub fn add_control(&self, control: Arc<dyn Control>) -> Result<(), EngineError> {
        self.ensure_alive()?;
        self.control_resolver.add_control(control);
        Ok(())
    }

    pub fn add_context(&self, context: Arc<dyn Context>) -> Result<(), EngineError> {
        self.ensure_alive()?;
        self.context_resolver.add_context(context);
        Ok(())
    }

    /// Registers a zone. Returns `Ok(false)` when a zone with the same id already exists.
    pub fn add_zone(&self, id: impl Into<String>, element: Element) -> Result<bool, EngineError> {
        self.ensure_alive()?;
        self.zones.add(Zone::new(id, element)?)
    }

    pub(crate) fn insert_zone(&self, zone: Zone) -> Result<bool, EngineError> {
        self.ensure_alive()?;
        self.zones.add(zone)
    }

    pub fn zone(&self, id: &str) -> Option<Arc<Zone>> {
        let id = ZoneId::new(id).ok()?;
        self.zones.get(&id)
    }

    /// Ids of all registered zones, in registration order.
    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.zones.ids()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Handle through which resolution rounds can be requested from anywhere. Requests are only
    /// served once the engine has been [started](Self::start).
    pub fn resolve_handle(&self) -> ResolveHandle {
        self.context_resolver.handle()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Spawns the task serving resolution requests made through [`ResolveHandle`]s.
    ///
    /// Requests arriving while a round is pending are folded into it. The task ends once the
    /// engine is destroyed.
    pub fn start(&self) -> Result<JoinHandle<()>, EngineError> {
        self.ensure_alive()?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }
        let mut requests = self.context_resolver.take_requests().ok_or(EngineError::AlreadyRunning)?;
        let resolver = self.context_resolver.clone();

        Ok(tokio::spawn(async move {
            log::debug!("resolve listener started");
            while requests.recv().await.is_some() {
                match resolver.resolve().await {
                    Ok(partition) => log::trace!("requested resolution settled: {:?}", partition.visible),
                    Err(e) => log::warn!("requested resolution failed: {e}"),
                }
            }
            log::debug!("resolve listener stopped");
        }))
    }

    /// Tears everything down: the service, the controls (for every zone they have seen), the
    /// contexts and finally the zones, which end up hidden. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.service.destroy();
        self.control_resolver.destroy();
        self.context_resolver.destroy();
        self.zones.destroy();

        log::debug!("engine destroyed");
        let _ = self.event_tx.send(EngineEvent::EngineDestroyed);
    }

    fn ensure_alive(&self) -> Result<(), EngineError> {
        if self.is_destroyed() {
            return Err(EngineError::Destroyed);
        }
        Ok(())
    }
}

impl Drop for AdvertolEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for AdvertolEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvertolEngine")
            .field("config", &self.config)
            .field("zones", &self.zones.ids())
            .field("controls", &self.control_resolver.len())
            .field("contexts", &self.context_resolver.len())
            .field("running", &self.running.load(Ordering::SeqCst))
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
