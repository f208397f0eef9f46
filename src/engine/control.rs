//! Controls: side effects on zone visibility transitions.
//!
//! A [`Control`] is asked once per zone whether it wants to activate for that zone. If it does,
//! and the zone has loaded, its initial trigger hook runs once and its result is handed to every
//! later [`on_zone_show`](Control::on_zone_show) / [`on_zone_hide`](Control::on_zone_hide) call
//! and to [`destroy`](Control::destroy). The memoization and dispatch protocol lives in
//! [`ControlResolver`].

mod element_classes;
mod resolver;

use std::any::Any;
use std::sync::Arc;
use async_trait::async_trait;
use crate::engine::element::Element;
use crate::engine::single_flight::Flight;
use crate::engine::zone::ZoneId;

pub use element_classes::{ElementClasses, ElementClassesControl};
pub use resolver::ControlResolver;

/// Value produced by [`Control::on_initial_control_trigger`]. Controls downcast it themselves.
pub type TriggerResult = Option<Arc<dyn Any + Send + Sync>>;

/// Memoized initial trigger of a control for one zone.
pub type TriggerFlight = Flight<TriggerResult>;

/// Zone state handed to the trigger hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneArgs {
    pub id: ZoneId,
    pub element: Element,
    pub is_empty: bool,
}

/// Zone state handed to the show and hide callbacks.
#[derive(Clone)]
pub struct ZoneCallbackArgs {
    pub id: ZoneId,
    pub element: Element,
    pub is_empty: bool,
    pub initial_trigger_result: TriggerResult,
}

/// Zone state handed to [`Control::destroy`]. `initial_trigger` is the memoized initial trigger,
/// or an already settled `None` if the control never triggered for the zone.
#[derive(Clone)]
pub struct ControlTeardown {
    pub id: ZoneId,
    pub element: Element,
    pub is_empty: bool,
    pub initial_trigger: TriggerFlight,
}

#[async_trait]
pub trait Control: Send + Sync {
    /// Whether the control activates for the zone. Asked at most once per zone.
    async fn should_trigger_control(&self, _zone: &ZoneArgs) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Runs at most once per zone, the first time the control triggers for a loaded zone.
    async fn on_initial_control_trigger(&self, _zone: &ZoneArgs) -> anyhow::Result<TriggerResult> {
        Ok(None)
    }

    fn on_zone_show(&self, _zone: &ZoneCallbackArgs) {}

    fn on_zone_hide(&self, _zone: &ZoneCallbackArgs) {}

    fn destroy(&self, _zone: ControlTeardown) {}
}

/// Control that never triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopControl;

impl Control for NoopControl {}
