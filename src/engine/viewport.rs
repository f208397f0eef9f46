//! Viewport against which media queries are evaluated.
//!
//! A [`Viewport`] is the size of the visible area of the embedding page in CSS pixels.
//!
//! # Examples
//!
//! ```
//! use advertol_engine::Viewport;
//!
//! let vp = Viewport::new(1024, 768);
//! assert_eq!(vp.width, 1024);
//! assert!(vp.is_landscape());
//! ```

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Viewport {{ width: {}, height: {} }}", self.width, self.height)
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Portrait when the height is greater than or equal to the width, as in CSS.
    pub fn is_portrait(&self) -> bool {
        self.height >= self.width
    }

    pub fn is_landscape(&self) -> bool {
        !self.is_portrait()
    }
}
