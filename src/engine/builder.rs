use std::sync::Arc;
use crate::engine::context::Context;
use crate::engine::control::Control;
use crate::engine::element::Element;
use crate::engine::{AdvertolEngine, EngineConfig, EngineError};
use crate::engine::service::Service;
use crate::engine::zone::Zone;

/// Collects everything an [`AdvertolEngine`] starts out with.
///
/// ```
/// use std::sync::Arc;
/// use advertol_engine::{AdvertolEngine, DefaultService, EngineError};
///
/// let err = AdvertolEngine::builder().build().unwrap_err();
/// assert!(matches!(err, EngineError::MissingService));
///
/// let engine = AdvertolEngine::builder().service(Arc::new(DefaultService)).build().unwrap();
/// assert!(engine.zone_ids().is_empty());
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    service: Option<Arc<dyn Service>>,
    zones: Vec<(String, Element)>,
    controls: Vec<Arc<dyn Control>>,
    contexts: Vec<Arc<dyn Context>>,
}

impl AdvertolEngine {
    /// Entry point to start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

impl EngineBuilder {
    pub fn config(mut self, cfg: EngineConfig) -> Self {
        self.config = Some(cfg);
        self
    }

    pub fn service(mut self, service: Arc<dyn Service>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn zone(mut self, id: impl Into<String>, element: Element) -> Self {
        self.zones.push((id.into(), element));
        self
    }

    pub fn control(mut self, control: Arc<dyn Control>) -> Self {
        self.controls.push(control);
        self
    }

    /// Contexts run in the order they are added.
    pub fn context(mut self, context: Arc<dyn Context>) -> Self {
        self.contexts.push(context);
        self
    }

    /// Builds the engine. Fails without a service, with an invalid configuration, or when any
    /// zone is invalid.
    pub fn build(self) -> Result<AdvertolEngine, EngineError> {
        let service = self.service.ok_or(EngineError::MissingService)?;
        let zones = self
            .zones
            .into_iter()
            .map(|(id, element)| Zone::new(id, element))
            .collect::<Result<Vec<_>, _>>()?;

        let engine = AdvertolEngine::with_config(self.config.unwrap_or_default(), service)?;

        for control in self.controls {
            engine.add_control(control)?;
        }
        for zone in zones {
            engine.insert_zone(zone)?;
        }
        for context in self.contexts {
            engine.add_context(context)?;
        }

        Ok(engine)
    }
}
