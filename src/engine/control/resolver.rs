use std::sync::{Arc, Mutex, PoisonError, RwLock};
use futures::future::{BoxFuture, FutureExt};
use crate::engine::control::{Control, ControlTeardown, TriggerResult, ZoneArgs, ZoneCallbackArgs};
use crate::engine::errors::EngineError;
use crate::engine::single_flight::{self, settle_all, SingleFlight};
use crate::engine::zone::{Zone, ZoneFlags};

/// A registered control together with its per-zone memoization.
struct ControlSlot {
    control: Arc<dyn Control>,
    /// `should_trigger_control` outcomes, keyed by zone id
    triggers: SingleFlight<bool>,
    /// `on_initial_control_trigger` outcomes, keyed by zone id
    initial: SingleFlight<TriggerResult>,
}

/// Runs every registered [`Control`] against a zone.
///
/// For each control the protocol is:
/// 1. ask (once per zone) whether the control triggers; stop silently when the zone has not
///    loaded or the control declines,
/// 2. run the initial trigger hook (once per zone),
/// 3. compare the zone's visibility at the start of the resolution with its visibility once the
///    hook settled: both visible fires `on_zone_show`, both hidden fires `on_zone_hide`, and a
///    mismatch fires nothing. The round started by the toggle fires the right callback.
#[derive(Default)]
pub struct ControlResolver {
    controls: RwLock<Vec<Arc<ControlSlot>>>,
    /// Every zone resolution has ever been run for, in first-seen order.
    zones: Mutex<Vec<Arc<Zone>>>,
}

impl ControlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_control(&self, control: Arc<dyn Control>) {
        self.controls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(ControlSlot {
                control,
                triggers: SingleFlight::new(),
                initial: SingleFlight::new(),
            }));
    }

    pub fn len(&self) -> usize {
        self.controls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves all controls for `zone`.
    ///
    /// The zone's flags are captured and the trigger decisions are registered when this is
    /// called; show and hide callbacks only run when the returned future is polled.
    #[must_use = "control callbacks only run when the future is polled"]
    pub fn resolve(&self, zone: &Arc<Zone>) -> BoxFuture<'static, Result<(), EngineError>> {
        let flags = zone.flags();
        let snapshot_visible = flags.contains(ZoneFlags::VISIBLE);
        let is_loaded = flags.contains(ZoneFlags::LOADED);
        let args = ZoneArgs {
            id: zone.id().clone(),
            element: zone.element().clone(),
            is_empty: flags.contains(ZoneFlags::EMPTY),
        };

        self.remember(zone);

        let slots = self.controls.read().unwrap_or_else(PoisonError::into_inner).clone();
        let units = slots
            .into_iter()
            .map(|slot| {
                let trigger = slot.triggers.get_or_start(&args.id, || {
                    let control = slot.control.clone();
                    let args = args.clone();
                    async move { control.should_trigger_control(&args).await }
                });
                let zone = zone.clone();
                let args = args.clone();

                async move {
                    let triggered = trigger.await?;

                    if !is_loaded {
                        log::trace!("zone {} is not loaded; skipping control", args.id);
                        return Ok(());
                    }
                    if !triggered {
                        log::trace!("control declined zone {}", args.id);
                        return Ok(());
                    }

                    let initial = slot.initial.get_or_start(&args.id, || {
                        let control = slot.control.clone();
                        let args = args.clone();
                        async move { control.on_initial_control_trigger(&args).await }
                    });
                    let initial_trigger_result = initial.await?;

                    let current_visible = zone.is_visible();
                    let callback_args = ZoneCallbackArgs {
                        id: args.id,
                        element: args.element,
                        is_empty: args.is_empty,
                        initial_trigger_result,
                    };

                    match (snapshot_visible, current_visible) {
                        (true, true) => slot.control.on_zone_show(&callback_args),
                        (false, false) => slot.control.on_zone_hide(&callback_args),
                        _ => log::debug!(
                            "zone {} toggled while its control trigger was pending; leaving the callback to the next round",
                            callback_args.id
                        ),
                    }

                    Ok::<(), EngineError>(())
                }
                .boxed()
            })
            .collect::<Vec<_>>();

        async move { settle_all(units).await.map(|_| ()) }.boxed()
    }

    /// Calls every control's destroy hook for every zone seen so far, then forgets all controls,
    /// zones and memoized results.
    pub fn destroy(&self) {
        let slots = std::mem::take(&mut *self.controls.write().unwrap_or_else(PoisonError::into_inner));
        let zones = std::mem::take(&mut *self.zones.lock().unwrap_or_else(PoisonError::into_inner));

        for slot in &slots {
            for zone in &zones {
                let initial_trigger = slot
                    .initial
                    .get(zone.id())
                    .unwrap_or_else(|| single_flight::settled(None));

                slot.control.destroy(ControlTeardown {
                    id: zone.id().clone(),
                    element: zone.element().clone(),
                    is_empty: zone.is_empty(),
                    initial_trigger,
                });
            }
            slot.triggers.clear();
            slot.initial.clear();
        }

        log::debug!("control resolver destroyed ({} controls, {} zones)", slots.len(), zones.len());
    }

    fn remember(&self, zone: &Arc<Zone>) {
        let mut zones = self.zones.lock().unwrap_or_else(PoisonError::into_inner);
        if !zones.iter().any(|z| z.id() == zone.id()) {
            zones.push(zone.clone());
        }
    }
}
