use std::fmt::Display;
use std::sync::{Mutex, PoisonError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use crate::engine::element::Element;
use crate::EngineError;

/// Identifier of a zone: a non-empty string without whitespace (it usually doubles as a slot
/// or ad unit name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Result<Self, EngineError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(EngineError::InvalidZoneId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ZoneId {
    type Error = EngineError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        ZoneId::new(id)
    }
}

impl TryFrom<&str> for ZoneId {
    type Error = EngineError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        ZoneId::new(id)
    }
}

impl From<ZoneId> for String {
    fn from(id: ZoneId) -> Self {
        id.0
    }
}

impl AsRef<str> for ZoneId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Lifecycle flags of a zone. `EMPTY` is only ever set together with `LOADED`.
    pub struct ZoneFlags: u8 {
        const VISIBLE = 0b001;
        const LOADED  = 0b010;
        const EMPTY   = 0b100;
    }
}

/// A single addressable content slot.
///
/// Visibility is a presentation intent and is independent of the loaded dimension: a zone may be
/// visible before its content has loaded. Once loaded, a zone never reverts to unloaded.
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    element: Element,
    flags: Mutex<ZoneFlags>,
}

impl Zone {
    /// Creates a hidden, unloaded zone. Fails when `id` is not a valid identifier or the
    /// element is not attached to the page.
    pub fn new(id: impl Into<String>, element: Element) -> Result<Self, EngineError> {
        let id = ZoneId::new(id)?;
        Self::with_id(id, element)
    }

    pub fn with_id(id: ZoneId, element: Element) -> Result<Self, EngineError> {
        if !element.is_connected() {
            return Err(EngineError::InvalidHandle(element.dom_id().to_string()));
        }

        Ok(Self {
            id,
            element,
            flags: Mutex::new(ZoneFlags::empty()),
        })
    }

    pub fn id(&self) -> &ZoneId {
        &self.id
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Snapshot of the current flags.
    pub fn flags(&self) -> ZoneFlags {
        *self.lock()
    }

    pub fn is_visible(&self) -> bool {
        self.flags().contains(ZoneFlags::VISIBLE)
    }

    pub fn is_loaded(&self) -> bool {
        self.flags().contains(ZoneFlags::LOADED)
    }

    pub fn is_empty(&self) -> bool {
        self.flags().contains(ZoneFlags::EMPTY)
    }

    /// Marks the zone visible, returning whether it was visible before.
    pub fn show(&self) -> bool {
        self.set_visible(true)
    }

    /// Marks the zone hidden, returning whether it was visible before.
    pub fn hide(&self) -> bool {
        self.set_visible(false)
    }

    pub fn set_as_loaded(&self) {
        let mut flags = self.lock();
        flags.insert(ZoneFlags::LOADED);
        flags.remove(ZoneFlags::EMPTY);
    }

    pub fn set_as_empty(&self) {
        self.lock().insert(ZoneFlags::LOADED | ZoneFlags::EMPTY);
    }

    /// Teardown signal: hides the zone but keeps its loaded state.
    pub fn destroy(&self) {
        self.set_visible(false);
    }

    fn set_visible(&self, visible: bool) -> bool {
        let mut flags = self.lock();
        let was_visible = flags.contains(ZoneFlags::VISIBLE);
        flags.set(ZoneFlags::VISIBLE, visible);
        was_visible
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ZoneFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
