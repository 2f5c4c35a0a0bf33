//! Tracks the native size of the shown image and the size it is drawn at.
//!
//! Image loads and layout changes arrive independently of detection
//! responses. Both sizes are plain fields here, and the transform only ever
//! reads the latest pair, so arrival order does not matter.

use crate::config::Config;
use crate::transform::Scale;

/// Native and display sizes of the image currently on screen.
///
/// Zero means "not known yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageDimensions {
    pub native_width: u32,
    pub native_height: u32,
    pub display_width: u32,
    pub display_height: u32,
}

#[derive(Clone, Debug, Default)]
pub struct DimensionTracker {
    dims: ImageDimensions,
}

impl DimensionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the display size from the configured render area.
    pub fn from_config(config: &Config) -> Self {
        let (w, h) = config.display_size;
        Self {
            dims: ImageDimensions {
                display_width: w,
                display_height: h,
                ..Default::default()
            },
        }
    }

    /// Records the intrinsic pixel size of a newly loaded image or frame.
    ///
    /// Returns `true` if the stored size changed.
    pub fn on_native_size_known(&mut self, width: u32, height: u32) -> bool {
        let changed = (self.dims.native_width, self.dims.native_height) != (width, height);
        self.dims.native_width = width;
        self.dims.native_height = height;
        changed
    }

    /// Records the size the image is currently rendered at.
    ///
    /// Returns `true` if the stored size changed, so callers can skip
    /// redundant re-renders.
    pub fn on_display_size_known(&mut self, width: u32, height: u32) -> bool {
        let changed = (self.dims.display_width, self.dims.display_height) != (width, height);
        self.dims.display_width = width;
        self.dims.display_height = height;
        changed
    }

    /// Forgets the native size, e.g. when the shown image is removed.
    pub fn reset_native(&mut self) {
        self.dims.native_width = 0;
        self.dims.native_height = 0;
    }

    pub fn dimensions(&self) -> ImageDimensions {
        self.dims
    }

    /// `(display / native)` per axis; identity while any size is unknown.
    pub fn current_scale(&self) -> Scale {
        Scale::between(
            (self.dims.native_width, self.dims.native_height),
            (self.dims.display_width, self.dims.display_height),
        )
    }
}
