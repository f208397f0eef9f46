use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::engine::control::{Control, ControlTeardown, TriggerResult, ZoneArgs, ZoneCallbackArgs};
use crate::engine::element::Element;

/// Class names applied by [`ElementClassesControl`]. Each entry is a whitespace separated list;
/// empty entries are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementClasses {
    pub is_visible: String,
    pub is_hidden: String,
    pub is_loaded: String,
    pub is_empty: String,
}

/// Control that reflects zone state as classes on the zone's element.
#[derive(Debug, Clone, Default)]
pub struct ElementClassesControl {
    classes: ElementClasses,
}

impl ElementClassesControl {
    pub fn new(classes: ElementClasses) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &ElementClasses {
        &self.classes
    }
}

fn add_classes(element: &Element, list: &str) {
    for class in list.split_whitespace() {
        element.add_class(class);
    }
}

fn remove_classes(element: &Element, list: &str) {
    for class in list.split_whitespace() {
        element.remove_class(class);
    }
}

#[async_trait]
impl Control for ElementClassesControl {
    async fn should_trigger_control(&self, _zone: &ZoneArgs) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn on_initial_control_trigger(&self, zone: &ZoneArgs) -> anyhow::Result<TriggerResult> {
        add_classes(&zone.element, &self.classes.is_loaded);
        if zone.is_empty {
            add_classes(&zone.element, &self.classes.is_empty);
        }
        Ok(None)
    }

    fn on_zone_show(&self, zone: &ZoneCallbackArgs) {
        remove_classes(&zone.element, &self.classes.is_hidden);
        add_classes(&zone.element, &self.classes.is_visible);
    }

    fn on_zone_hide(&self, zone: &ZoneCallbackArgs) {
        remove_classes(&zone.element, &self.classes.is_visible);
        add_classes(&zone.element, &self.classes.is_hidden);
    }

    fn destroy(&self, zone: ControlTeardown) {
        for list in [
            &self.classes.is_visible,
            &self.classes.is_hidden,
            &self.classes.is_loaded,
            &self.classes.is_empty,
        ] {
            remove_classes(&zone.element, list);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::engine::control::ControlResolver;
    use crate::engine::testing::zone;

    fn control() -> Arc<ElementClassesControl> {
        Arc::new(ElementClassesControl::new(ElementClasses {
            is_visible: "is-visible".into(),
            is_hidden: " is-hidden  zone--off ".into(),
            is_loaded: "is-loaded".into(),
            is_empty: "is-empty".into(),
        }))
    }

    #[tokio::test]
    async fn reflects_state_as_classes() {
        let resolver = ControlResolver::new();
        resolver.add_control(control());

        let zone = zone("becky");
        zone.set_as_loaded();
        zone.show();
        resolver.resolve(&zone).await.unwrap();
        assert_eq!(zone.element().classes(), vec!["is-loaded", "is-visible"]);

        zone.hide();
        resolver.resolve(&zone).await.unwrap();
        assert_eq!(zone.element().classes(), vec!["is-hidden", "is-loaded", "zone--off"]);

        zone.show();
        resolver.resolve(&zone).await.unwrap();
        assert_eq!(zone.element().classes(), vec!["is-loaded", "is-visible"]);
    }

    #[tokio::test]
    async fn empty_zone_gets_empty_class() {
        let resolver = ControlResolver::new();
        resolver.add_control(control());

        let zone = zone("rufus");
        zone.set_as_empty();
        zone.show();
        resolver.resolve(&zone).await.unwrap();
        assert!(zone.element().has_class("is-empty"));
        assert!(zone.element().has_class("is-loaded"));
    }

    #[tokio::test]
    async fn destroy_strips_managed_classes() {
        let resolver = ControlResolver::new();
        resolver.add_control(control());

        let zone = zone("becky");
        zone.element().add_class("Zone");
        zone.set_as_empty();
        zone.hide();
        resolver.resolve(&zone).await.unwrap();
        assert!(zone.element().has_class("is-hidden"));

        resolver.destroy();
        assert_eq!(zone.element().classes(), vec!["Zone"]);
    }

    #[test]
    fn classes_deserialize_with_defaults() {
        let classes: ElementClasses = serde_json::from_str(r#"{"is_visible": "shown"}"#).unwrap();
        assert_eq!(classes.is_visible, "shown");
        assert!(classes.is_hidden.is_empty());

        let ctl = ElementClassesControl::default();
        assert_eq!(ctl.classes(), &ElementClasses::default());
    }
}
