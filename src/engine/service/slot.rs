use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use crate::engine::element::Element;
use crate::engine::service::{Service, ServiceZone};
use crate::engine::zone::ZoneId;

/// Commands emitted by a [`SlotService`] for the embedder to execute against the ad SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotCommand {
    /// Define the slot for a zone
    Define { zone_id: ZoneId, path: String },
    /// Display the slot inside the zone's element
    Display { zone_id: ZoneId, element: Element },
    /// Fetch (or refetch) content for the given slots
    Refresh { zone_ids: Vec<ZoneId> },
}

#[derive(Default)]
struct SlotState {
    defined: HashSet<ZoneId>,
    displayed: HashSet<ZoneId>,
    refreshed: HashSet<ZoneId>,
    pending: HashMap<ZoneId, oneshot::Sender<bool>>,
    destroyed: bool,
}

/// Ad-slot service driven by render notifications.
///
/// Each configured zone maps to a slot path. The service never talks to an SDK itself: it emits
/// [`SlotCommand`]s and waits for the embedder to report the outcome of each render through
/// [`SlotService::render_ended`]. Every slot is defined, displayed and refreshed at most once.
/// Zones without a configured slot are reported empty.
pub struct SlotService {
    slots: HashMap<ZoneId, String>,
    cmd_tx: mpsc::UnboundedSender<SlotCommand>,
    state: Mutex<SlotState>,
}

impl SlotService {
    /// Creates the service and the receiving end of its command stream.
    pub fn new(slots: impl IntoIterator<Item = (ZoneId, String)>) -> (Self, mpsc::UnboundedReceiver<SlotCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let svc = Self {
            slots: slots.into_iter().collect(),
            cmd_tx,
            state: Mutex::new(SlotState::default()),
        };
        (svc, cmd_rx)
    }

    pub fn has_slot(&self, zone_id: &ZoneId) -> bool {
        self.slots.contains_key(zone_id)
    }

    /// Reports that the slot of `zone_id` finished rendering. Returns false when no write for the
    /// zone was waiting.
    pub fn render_ended(&self, zone_id: &ZoneId, filled: bool) -> bool {
        let pending = self.lock().pending.remove(zone_id);
        match pending {
            Some(tx) => {
                log::debug!("slot {zone_id} rendered (filled: {filled})");
                tx.send(filled).is_ok()
            }
            None => {
                log::trace!("slot {zone_id} rendered without a pending write");
                false
            }
        }
    }

    fn send(&self, cmd: SlotCommand) {
        // Sending fails only when the embedder dropped the receiver.
        if self.cmd_tx.send(cmd).is_err() {
            log::trace!("slot command receiver is gone");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Service for SlotService {
    fn before_write_zones(&self, zones: &[ServiceZone]) {
        let to_define: Vec<(ZoneId, String)> = {
            let mut state = self.lock();
            zones
                .iter()
                .filter_map(|z| self.slots.get(&z.id).map(|path| (z.id.clone(), path.clone())))
                .filter(|(id, _)| state.defined.insert(id.clone()))
                .collect()
        };

        for (zone_id, path) in to_define {
            self.send(SlotCommand::Define { zone_id, path });
        }
    }

    async fn write_zone(&self, zone: &ServiceZone) -> anyhow::Result<bool> {
        if !self.has_slot(&zone.id) {
            log::debug!("zone {} has no slot; reporting it empty", zone.id);
            return Ok(false);
        }

        let (rx, display) = {
            let mut state = self.lock();
            if state.destroyed {
                return Err(anyhow!("slot service has been destroyed"));
            }
            let (tx, rx) = oneshot::channel();
            state.pending.insert(zone.id.clone(), tx);
            (rx, state.displayed.insert(zone.id.clone()))
        };

        if display {
            self.send(SlotCommand::Display { zone_id: zone.id.clone(), element: zone.element.clone() });
        }

        rx.await.map_err(|_| anyhow!("slot {} was dropped before it rendered", zone.id))
    }

    fn after_write_zones(&self, zones: &[ServiceZone]) {
        let to_refresh: Vec<ZoneId> = {
            let mut state = self.lock();
            zones
                .iter()
                .filter(|z| self.slots.contains_key(&z.id))
                .filter(|z| state.refreshed.insert(z.id.clone()))
                .map(|z| z.id.clone())
                .collect()
        };

        if !to_refresh.is_empty() {
            self.send(SlotCommand::Refresh { zone_ids: to_refresh });
        }
    }

    fn destroy(&self) {
        let mut state = self.lock();
        state.destroyed = true;
        state.pending.clear();
    }
}
