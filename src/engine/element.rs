use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for an element, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque presentation target of a zone (the page node the zone renders into).
///
/// Cloning an `Element` yields another handle to the same node: class changes made through one
/// handle are observed through all of them.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

struct ElementInner {
    id: ElementId,
    dom_id: String,
    classes: RwLock<BTreeSet<String>>,
    connected: AtomicBool,
}

impl Element {
    /// Creates a new element that is attached to the page.
    pub fn new(dom_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                id: ElementId::new(),
                dom_id: dom_id.into(),
                classes: RwLock::new(BTreeSet::new()),
                connected: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> ElementId {
        self.inner.id
    }

    pub fn dom_id(&self) -> &str {
        &self.inner.dom_id
    }

    /// Returns true while the element is attached to the page.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Removes the element from the page. Detached elements cannot back a zone.
    pub fn detach(&self) {
        self.inner.connected.store(false, Ordering::Release);
    }

    pub fn add_class(&self, class: &str) {
        self.inner
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class.to_string());
    }

    pub fn remove_class(&self, class: &str) {
        self.inner
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(class);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(class)
    }

    /// Sorted snapshot of the element's classes.
    pub fn classes(&self) -> Vec<String> {
        self.inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Element {}

impl Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.inner.id)
            .field("dom_id", &self.inner.dom_id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
