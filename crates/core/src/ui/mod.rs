//! Desktop viewer for plate-vision.
//!
//! # Architecture
//!
//! The UI is split into focused submodules:
//! - [`settings`]: User preferences and persistence
//! - [`rendering`]: Drawing utilities for the detection overlay
//! - [`live`]: Throttled live view of the feed
//! - [`viewer`]: Main application logic
//!
//! # Usage
//!
//! ```ignore
//! use plate_vision_core::{ui, Config, ImageSource};
//!
//! let config = Config::load()?;
//! ui::run_viewer(config, ImageSource::uploads_only(90), ui::ViewerOptions::default())?;
//! ```

mod live;
mod rendering;
mod settings;
mod viewer;

// Public API exports
pub use rendering::{band_color, draw_annotations, fit_display_size, status_color};
pub use settings::Settings;
pub use live::{LIVE_FRAME_INTERVAL, LiveView};
pub use viewer::{DetectionViewer, ViewerOptions};

use crate::capture::ImageSource;
use crate::config::Config;
use crate::error::Result;

/// Opens the viewer window and blocks until it is closed.
///
/// Stored user settings are layered over `config` before the first request;
/// fields in `options.overrides` win over them.
///
/// # Arguments
/// * `config` - Application configuration
/// * `source` - Where images come from; without a live feed the capture
///   button stays disabled
/// * `options` - Command line overrides and an optional first upload
pub fn run_viewer(config: Config, source: ImageSource, options: ViewerOptions) -> Result<()> {
    viewer::run(config, source, options)
}
