//! Contexts: policies deciding which zones should be visible.
//!
//! Every resolution round starts with all registered zone ids as visibility candidates. The
//! registered [`Context`]s are folded left to right: each one receives the ids its predecessor
//! kept visible and splits them into a [`ZonePartition`]. Ids a context hides never reach the
//! contexts after it. See [`ContextResolver`] for the pipeline itself.
//!
//! A context may ask for a new round at any time (for instance when the viewport changed)
//! through the [`ResolveHandle`] it receives in [`Context::attach`]. Such rounds only run once
//! the engine's listener is started with [`AdvertolEngine::start`](crate::AdvertolEngine::start).

mod media_query;
mod resolver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use crate::engine::zone::ZoneId;

pub use media_query::{MediaQuery, MediaQueryContext};
pub use resolver::ContextResolver;

/// Outcome of [`Context::calculate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePartition {
    pub visible: Vec<ZoneId>,
    pub hidden: Vec<ZoneId>,
}

impl ZonePartition {
    /// Partition keeping every id visible.
    pub fn all_visible(visible: Vec<ZoneId>) -> Self {
        Self { visible, hidden: Vec::new() }
    }
}

/// Message sent by a [`ResolveHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveRequest;

/// Capability to request a new resolution round.
///
/// The handle does not keep the engine alive. Once the engine has been destroyed, requests are
/// dropped. Requests made before [`AdvertolEngine::start`](crate::AdvertolEngine::start) stay
/// queued and are served once the listener runs.
#[derive(Debug, Clone, Default)]
pub struct ResolveHandle {
    tx: Option<mpsc::WeakSender<ResolveRequest>>,
    /// Whether something drains the queue. Only used for logging.
    listening: Option<Arc<AtomicBool>>,
}

impl ResolveHandle {
    pub(crate) fn new(tx: &mpsc::Sender<ResolveRequest>) -> Self {
        Self { tx: Some(tx.downgrade()), listening: None }
    }

    /// Ties the handle to the flag of the listener draining its queue.
    pub(crate) fn with_listener(mut self, listening: Arc<AtomicBool>) -> Self {
        self.listening = Some(listening);
        self
    }

    /// Whether a listener is known to serve requests. Handles created without one assume so.
    pub fn is_served(&self) -> bool {
        self.listening.as_ref().map_or(true, |l| l.load(Ordering::SeqCst))
    }

    /// Handle that is not connected to any engine.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Requests a resolution round without waiting for it.
    ///
    /// Returns `false` when there is no engine left to serve the request. When the request
    /// queue is full a round is already pending and the request is folded into it.
    pub fn request(&self) -> bool {
        let Some(tx) = self.tx.as_ref().and_then(|tx| tx.upgrade()) else {
            log::trace!("resolve request dropped: engine is gone");
            return false;
        };

        let queued = match tx.try_send(ResolveRequest) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("resolve request coalesced with a pending one");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        };

        if queued && !self.is_served() {
            log::debug!("resolve request queued, but no listener is running; it is served once the engine is started");
        }
        queued
    }
}

pub trait Context: Send + Sync {
    /// Receives the capability to request resolution rounds. Called once on registration.
    ///
    /// Requests made through the handle are queued until the engine is started with
    /// [`AdvertolEngine::start`](crate::AdvertolEngine::start); before that only explicit calls
    /// to `resolve` run rounds.
    fn attach(&self, _handle: ResolveHandle) {}

    /// Splits the candidate ids into visible and hidden ones.
    fn calculate(&self, visible: &[ZoneId]) -> anyhow::Result<ZonePartition> {
        Ok(ZonePartition::all_visible(visible.to_vec()))
    }

    fn destroy(&self) {}
}

/// Context that keeps every candidate visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContext;

impl Context for NoopContext {}
