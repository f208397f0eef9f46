//! Zone resolution engine.
//!
//! Decides, for a set of named content zones on a page, which zones are shown and which are
//! hidden, loads their content through a [`Service`], and reacts to visibility transitions
//! through [`Control`]s. Visibility policy is provided by an ordered list of [`Context`]s.
//!
//! ```no_run
//! use std::sync::Arc;
//! use advertol_engine::{AdvertolEngine, DefaultService, Element, EngineError};
//!
//! # async fn run() -> Result<(), EngineError> {
//! let engine = AdvertolEngine::builder()
//!     .service(Arc::new(DefaultService))
//!     .zone("sidebar", Element::new("zone-sidebar"))
//!     .build()?;
//!
//! engine.resolve().await?;
//! assert!(engine.zone("sidebar").map(|z| z.is_visible()).unwrap_or(false));
//! # Ok(()) }
//! ```
pub mod engine;

pub use engine::*;
