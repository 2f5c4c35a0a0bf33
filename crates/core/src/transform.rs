//! Native-pixel to display-space projection.

use crate::detection::BoundingBox;

/// Per-axis factors from native image pixels to display pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// `display / native` on each axis, or identity while any side is unknown.
    pub fn between(native: (u32, u32), display: (u32, u32)) -> Self {
        let (nw, nh) = native;
        let (dw, dh) = display;
        if nw == 0 || nh == 0 || dw == 0 || dh == 0 {
            return Self::IDENTITY;
        }
        Self {
            x: f64::from(dw) / f64::from(nw),
            y: f64::from(dh) / f64::from(nh),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Maps a box from native pixel space into display space.
///
/// Pure: the input is untouched and equal inputs always give equal outputs.
/// Ordering is preserved for positive scale factors.
pub fn to_display(bbox: &BoundingBox, scale: Scale) -> BoundingBox {
    BoundingBox {
        x1: bbox.x1 * scale.x,
        y1: bbox.y1 * scale.y,
        x2: bbox.x2 * scale.x,
        y2: bbox.y2 * scale.y,
    }
}
