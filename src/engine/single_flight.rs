//! Keyed single-flight memoization.
//!
//! A [`SingleFlight`] maps a [`ZoneId`] to the one shared future that computes its value. The
//! first caller for a key starts the computation; every later caller, concurrent or not, gets a
//! clone of the same [`Flight`] and observes the same outcome. Failures are memoized as well.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use crate::engine::errors::{EngineError, SharedError};
use crate::engine::zone::ZoneId;

/// A shared, clonable handle to an in-flight or completed keyed computation.
pub type Flight<T> = Shared<BoxFuture<'static, Result<T, SharedError>>>;

pub struct SingleFlight<T> {
    flights: Mutex<HashMap<ZoneId, Flight<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self { flights: Mutex::new(HashMap::new()) }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the flight for `key`, calling `start` to create it only if none exists yet.
    pub fn get_or_start<F, Fut>(&self, key: &ZoneId, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        flights
            .entry(key.clone())
            .or_insert_with(|| start().map(|res| res.map_err(SharedError::new)).boxed().shared())
            .clone()
    }

    pub fn get(&self, key: &ZoneId) -> Option<Flight<T>> {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// A flight that has already completed with `value`.
pub fn settled<T>(value: T) -> Flight<T>
where
    T: Clone + Send + Sync + 'static,
{
    future::ready(Ok(value)).boxed().shared()
}

/// Awaits every unit and reports the first failure only after all units have completed, so a
/// failing unit never cancels its siblings.
pub(crate) async fn settle_all<T>(units: Vec<BoxFuture<'static, Result<T, EngineError>>>) -> Result<Vec<T>, EngineError> {
    let mut settled = Vec::with_capacity(units.len());
    let mut first_err = None;

    for res in future::join_all(units).await {
        match res {
            Ok(value) => settled.push(value),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(settled),
    }
}
