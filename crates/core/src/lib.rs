//! Plate Vision Core Library
//!
//! This library provides the client side of a license plate recognition
//! tool: acquiring images, sending them to a detection service and drawing
//! the returned plates over the image.
//!
//! # Overview
//!
//! - **Image acquisition**: Live screen feed and file uploads via [`capture`]
//! - **Detection service**: HTTP client and wire types via [`client`] and [`detection`]
//! - **Coordinates**: Native to display mapping via [`dimensions`] and [`transform`]
//! - **Request lifecycle**: Stale response protection via [`lifecycle`] and [`session`]
//! - **Overlay**: Box and label layout via [`overlay`], painted by [`ui`]
//!
//! # Quick Start
//!
//! ```ignore
//! use plate_vision_core::{Acquisition, PlateVision};
//!
//! let app = PlateVision::new()?;
//! let mut session = app.session(app.uploads())?;
//! session.submit(Acquisition::Upload("car.jpg".into()));
//! println!("{:?}", session.wait_until_settled());
//! ```
//!
//! # Module Structure
//!
//! - [`capture`]: Image sources and upload payloads
//! - [`client`]: Detection service client
//! - [`config`]: Configuration loading and management
//! - [`detection`]: Detection records and response parsing
//! - [`dimensions`]: Native and display size tracking
//! - [`error`]: Error types and result aliases
//! - [`image_processing`]: JPEG encoding and data URIs
//! - [`lifecycle`]: Generation-guarded request state machine
//! - [`overlay`]: Display-space annotation layout
//! - [`session`]: Background request runner
//! - [`transform`]: Coordinate scaling
//! - [`ui`]: Desktop viewer

pub mod capture;
pub mod client;
pub mod config;
pub mod detection;
pub mod dimensions;
pub mod error;
pub mod image_processing;
pub mod lifecycle;
pub mod overlay;
pub mod session;
pub mod transform;
pub mod ui;

// Re-export primary types for convenience
pub use capture::{ImageSource, ScreenFeed};
pub use client::{DetectionClient, ServiceStatus};
pub use config::{Config, ConfigOverrides, TransportMode};
pub use detection::{BoundingBox, Detection};
pub use error::{AppError, Result};
pub use lifecycle::{Generation, LifecycleState, RequestLifecycle};
pub use overlay::{ConfidenceBand, OverlayRenderer};
pub use session::{Acquisition, DetectionSession};

use std::path::PathBuf;
use std::sync::Arc;

/// Main entry point for the plate-vision application.
///
/// Holds the configuration and builds the pieces that depend on it.
pub struct PlateVision {
    config: Config,
    overrides: ConfigOverrides,
}

impl PlateVision {
    /// Creates an instance configured from the environment (including `.env`
    /// files).
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override is invalid.
    pub fn new() -> Result<Self> {
        Self::with_overrides(ConfigOverrides::from_env()?)
    }

    /// Creates an instance from explicitly set values (environment, command
    /// line). The viewer keeps these over its stored settings.
    pub fn with_overrides(overrides: ConfigOverrides) -> Result<Self> {
        let config = overrides.apply_to(Config::builder()).build()?;
        Ok(Self { config, overrides })
    }

    /// Creates an instance with custom configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            overrides: ConfigOverrides::default(),
        }
    }

    /// Lists available monitors with their dimensions.
    pub fn list_monitors(&self) -> Result<Vec<String>> {
        ScreenFeed::list()
    }

    /// An image source that only accepts uploaded files.
    pub fn uploads(&self) -> ImageSource {
        ImageSource::uploads_only(self.config.jpeg_quality)
    }

    /// An image source backed by a monitor as the live feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the monitor index is out of bounds.
    pub fn screen_source(&self, monitor_index: usize) -> Result<ImageSource> {
        let feed = ScreenFeed::new(monitor_index)?;
        Ok(ImageSource::with_feed(Arc::new(feed), self.config.jpeg_quality))
    }

    /// Creates a client for the configured service.
    pub fn client(&self) -> Result<DetectionClient> {
        DetectionClient::new(&self.config)
    }

    /// Creates a session that acquires images from `source`.
    pub fn session(&self, source: ImageSource) -> Result<DetectionSession> {
        Ok(DetectionSession::new(self.client()?, source))
    }

    /// Launches the desktop viewer, optionally uploading a file right away.
    pub fn run_viewer(&self, source: ImageSource, initial_upload: Option<PathBuf>) -> Result<()> {
        let options = ui::ViewerOptions {
            overrides: self.overrides.clone(),
            initial_upload,
        };
        ui::run_viewer(self.config.clone(), source, options)
    }

    /// Explicit overrides this instance was built from.
    pub fn overrides(&self) -> &ConfigOverrides {
        &self.overrides
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup. This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
