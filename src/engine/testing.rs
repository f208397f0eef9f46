//! Recording collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use anyhow::anyhow;
use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Notify;
use crate::engine::context::{Context, ResolveHandle, ZonePartition};
use crate::engine::control::{Control, ControlTeardown, TriggerResult, ZoneArgs, ZoneCallbackArgs};
use crate::engine::element::Element;
use crate::engine::service::{Service, ServiceZone};
use crate::engine::zone::{Zone, ZoneId};

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn id(s: &str) -> ZoneId {
    ZoneId::new(s).unwrap()
}

pub(crate) fn ids(list: &[&str]) -> Vec<ZoneId> {
    list.iter().map(|s| id(s)).collect()
}

pub(crate) fn zone(s: &str) -> Arc<Zone> {
    init_logger();
    Arc::new(Zone::new(s, Element::new(format!("zone-{s}"))).unwrap())
}

fn result_text(result: &TriggerResult) -> Option<String> {
    result.as_ref().and_then(|r| r.downcast_ref::<String>().cloned())
}

#[derive(Default)]
pub(crate) struct RecordingControl {
    trigger: bool,
    gate: Mutex<Option<Arc<Notify>>>,
    pub fail_trigger: AtomicBool,
    trigger_calls: AtomicUsize,
    initial_calls: AtomicUsize,
    shows: AtomicUsize,
    hides: AtomicUsize,
    trigger_args: Mutex<Vec<ZoneArgs>>,
    initial_args: Mutex<Vec<ZoneArgs>>,
    last_result: Mutex<Option<String>>,
    destroyed: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingControl {
    pub fn new(trigger: bool) -> Self {
        Self { trigger, ..Self::default() }
    }

    /// Makes trigger decisions wait until the returned notify fires.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn trigger_calls(&self) -> usize {
        self.trigger_calls.load(Ordering::SeqCst)
    }

    pub fn initial_calls(&self) -> usize {
        self.initial_calls.load(Ordering::SeqCst)
    }

    pub fn shows(&self) -> usize {
        self.shows.load(Ordering::SeqCst)
    }

    pub fn hides(&self) -> usize {
        self.hides.load(Ordering::SeqCst)
    }

    pub fn trigger_args(&self) -> Vec<ZoneArgs> {
        self.trigger_args.lock().unwrap().clone()
    }

    pub fn initial_args(&self) -> Vec<ZoneArgs> {
        self.initial_args.lock().unwrap().clone()
    }

    pub fn last_result(&self) -> Option<String> {
        self.last_result.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<(String, Option<String>)> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Control for RecordingControl {
    async fn should_trigger_control(&self, zone: &ZoneArgs) -> anyhow::Result<bool> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        self.trigger_args.lock().unwrap().push(zone.clone());
        if self.fail_trigger.load(Ordering::SeqCst) {
            return Err(anyhow!("trigger failed for {}", zone.id));
        }
        Ok(self.trigger)
    }

    async fn on_initial_control_trigger(&self, zone: &ZoneArgs) -> anyhow::Result<TriggerResult> {
        self.initial_calls.fetch_add(1, Ordering::SeqCst);
        self.initial_args.lock().unwrap().push(zone.clone());
        Ok(Some(Arc::new(format!("initial:{}", zone.id))))
    }

    fn on_zone_show(&self, zone: &ZoneCallbackArgs) {
        self.shows.fetch_add(1, Ordering::SeqCst);
        *self.last_result.lock().unwrap() = result_text(&zone.initial_trigger_result);
    }

    fn on_zone_hide(&self, zone: &ZoneCallbackArgs) {
        self.hides.fetch_add(1, Ordering::SeqCst);
        *self.last_result.lock().unwrap() = result_text(&zone.initial_trigger_result);
    }

    fn destroy(&self, zone: ControlTeardown) {
        let result = match zone.initial_trigger.now_or_never() {
            Some(Ok(result)) => result_text(&result),
            _ => None,
        };
        self.destroyed.lock().unwrap().push((zone.id.to_string(), result));
    }
}

/// Service whose writes succeed with content unless the zone is listed as empty or failing.
#[derive(Default)]
pub(crate) struct RecordingService {
    empty: HashSet<ZoneId>,
    failing: HashSet<ZoneId>,
    gate: Mutex<Option<Arc<Notify>>>,
    log: Mutex<Vec<String>>,
    writes: Mutex<HashMap<ZoneId, usize>>,
}

impl RecordingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_empty(mut self, list: &[&str]) -> Self {
        self.empty.extend(ids(list));
        self
    }

    pub fn with_failing(mut self, list: &[&str]) -> Self {
        self.failing.extend(ids(list));
        self
    }

    /// Makes writes wait (after being logged) until the returned notify fires.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn writes(&self, zone: &str) -> usize {
        self.writes.lock().unwrap().get(&id(zone)).copied().unwrap_or(0)
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

fn joined(zones: &[ServiceZone]) -> String {
    zones.iter().map(|z| z.id.to_string()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl Service for RecordingService {
    fn after_zone_registered(&self, zone: &ServiceZone) {
        self.record(format!("registered:{}", zone.id));
    }

    fn before_write_zones(&self, zones: &[ServiceZone]) {
        self.record(format!("before:{}", joined(zones)));
    }

    async fn write_zone(&self, zone: &ServiceZone) -> anyhow::Result<bool> {
        self.record(format!("write:{}", zone.id));
        *self.writes.lock().unwrap().entry(zone.id.clone()).or_insert(0) += 1;

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.contains(&zone.id) {
            return Err(anyhow!("cannot write {}", zone.id));
        }
        Ok(!self.empty.contains(&zone.id))
    }

    fn after_write_zones(&self, zones: &[ServiceZone]) {
        self.record(format!("after:{}", joined(zones)));
    }

    fn destroy(&self) {
        self.record("destroy".to_string());
    }
}

/// Context that keeps only the listed zones visible and records what it was given.
#[derive(Default)]
pub(crate) struct FilterContext {
    visible: Vec<ZoneId>,
    seen: Mutex<Vec<Vec<ZoneId>>>,
    handle: Mutex<Option<ResolveHandle>>,
    destroyed: AtomicBool,
}

impl FilterContext {
    pub fn new(visible: &[&str]) -> Self {
        Self { visible: ids(visible), ..Self::default() }
    }

    pub fn seen(&self) -> Vec<Vec<ZoneId>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn handle(&self) -> Option<ResolveHandle> {
        self.handle.lock().unwrap().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Context for FilterContext {
    fn attach(&self, handle: ResolveHandle) {
        *self.handle.lock().unwrap() = Some(handle);
    }

    fn calculate(&self, visible: &[ZoneId]) -> anyhow::Result<ZonePartition> {
        self.seen.lock().unwrap().push(visible.to_vec());
        let (keep, drop): (Vec<ZoneId>, Vec<ZoneId>) =
            visible.iter().cloned().partition(|id| self.visible.contains(id));
        Ok(ZonePartition { visible: keep, hidden: drop })
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}
