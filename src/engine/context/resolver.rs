use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::{broadcast, mpsc};
use crate::engine::context::{Context, ResolveHandle, ResolveRequest, ZonePartition};
use crate::engine::errors::EngineError;
use crate::engine::events::EngineEvent;
use crate::engine::zone::{ZoneId, Zones};

/// Runs the context pipeline and applies its outcome to the zones.
pub struct ContextResolver {
    /// Released on destroy; resolving afterwards does nothing.
    zones: RwLock<Option<Arc<Zones>>>,
    contexts: RwLock<Vec<Arc<dyn Context>>>,
    request_tx: Mutex<Option<mpsc::Sender<ResolveRequest>>>,
    request_rx: Mutex<Option<mpsc::Receiver<ResolveRequest>>>,
    /// Set once the request queue has been taken by a listener
    listening: Arc<AtomicBool>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl ContextResolver {
    pub fn new(zones: Arc<Zones>, request_queue_capacity: usize, event_tx: broadcast::Sender<EngineEvent>) -> Self {
        let (request_tx, request_rx) = mpsc::channel(request_queue_capacity.max(1));
        Self {
            zones: RwLock::new(Some(zones)),
            contexts: RwLock::new(Vec::new()),
            request_tx: Mutex::new(Some(request_tx)),
            request_rx: Mutex::new(Some(request_rx)),
            listening: Arc::new(AtomicBool::new(false)),
            event_tx,
        }
    }

    /// Appends a context to the pipeline. Contexts run in the order they were added.
    pub fn add_context(&self, context: Arc<dyn Context>) {
        context.attach(self.handle());
        self.contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context);
    }

    pub fn len(&self) -> usize {
        self.contexts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A handle feeding the request queue, or a detached one after destroy.
    pub fn handle(&self) -> ResolveHandle {
        match self.request_tx.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(tx) => ResolveHandle::new(tx).with_listener(self.listening.clone()),
            None => ResolveHandle::detached(),
        }
    }

    /// Takes the receiving end of the request queue. Only the first call gets it, and from then
    /// on handles report that they are served.
    pub fn take_requests(&self) -> Option<mpsc::Receiver<ResolveRequest>> {
        let rx = self.request_rx.lock().unwrap_or_else(PoisonError::into_inner).take();
        if rx.is_some() {
            self.listening.store(true, Ordering::SeqCst);
        }
        rx
    }

    /// Folds `ids` through every context. Hidden ids accumulate in pipeline order, the visible
    /// ids of the last context are the final candidates.
    pub fn calculate(&self, ids: &[ZoneId]) -> Result<ZonePartition, EngineError> {
        let contexts = self.contexts.read().unwrap_or_else(PoisonError::into_inner).clone();

        contexts
            .iter()
            .try_fold(ZonePartition::all_visible(ids.to_vec()), |mut acc, context| {
                let next = context.calculate(&acc.visible)?;
                acc.hidden.extend(next.hidden);
                acc.visible = next.visible;
                Ok::<_, EngineError>(acc)
            })
    }

    /// Runs one resolution round.
    ///
    /// The partition is computed and hide, show and write are issued (in that order) before this
    /// returns; the future settles once all three did. Control callbacks only run when the
    /// future is polled.
    #[must_use = "control callbacks only run when the future is polled"]
    pub fn resolve(&self) -> BoxFuture<'static, Result<ZonePartition, EngineError>> {
        let Some(zones) = self.zones.read().unwrap_or_else(PoisonError::into_inner).clone() else {
            log::trace!("context resolver is destroyed; nothing to resolve");
            return future::ready(Ok(ZonePartition::default())).boxed();
        };

        let partition = match self.calculate(&zones.ids()) {
            Ok(partition) => partition,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        log::debug!("resolving: visible {:?}, hidden {:?}", partition.visible, partition.hidden);

        let hide = zones.hide(&partition.hidden);
        let show = zones.show(&partition.visible);
        let write = zones.write(&partition.visible);
        let event_tx = self.event_tx.clone();

        async move {
            let (hidden, shown, written) = futures::join!(hide, show, write);
            hidden?;
            shown?;
            written?;

            if zones.is_destroyed() {
                log::trace!("round settled after destroy; not reporting it");
                return Ok(partition);
            }
            let _ = event_tx.send(EngineEvent::ResolveCompleted {
                visible: partition.visible.clone(),
                hidden: partition.hidden.clone(),
            });
            Ok::<_, EngineError>(partition)
        }
        .boxed()
    }

    /// Destroys every context, closes the request queue and releases the zones.
    pub fn destroy(&self) {
        let contexts = std::mem::take(&mut *self.contexts.write().unwrap_or_else(PoisonError::into_inner));
        for context in &contexts {
            context.destroy();
        }

        self.request_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.zones.write().unwrap_or_else(PoisonError::into_inner).take();
        log::debug!("context resolver destroyed ({} contexts)", contexts.len());
    }
}
