//! Image acquisition from a live feed or a user-selected file.
//!
//! A live feed is anything implementing [`FrameSource`]: the bundled
//! [`ScreenFeed`] grabs a monitor, while [`LatestFrame`] is a slot an external
//! device driver (e.g. a webcam loop) can push frames into. Either way the
//! [`ImageSource`] hands back the bytes to upload together with a preview the
//! UI can display.
//!
//! # Example
//!
//! ```ignore
//! use plate_vision_core::capture::{ImageSource, ScreenFeed};
//! use std::sync::Arc;
//!
//! let feed = Arc::new(ScreenFeed::new(0)?);
//! let source = ImageSource::with_feed(feed, 90);
//! let captured = source.capture().await?;
//! println!("{}x{}", captured.preview.width(), captured.preview.height());
//! ```

use crate::error::{AppError, ImageSourceError, Result};
use crate::image_processing::ImageProcessor;
use image::DynamicImage;
use screenshots::Screen;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// A live source of frames.
pub trait FrameSource: Send + Sync {
    /// Human readable name for logs and the UI.
    fn name(&self) -> String;

    /// Returns the most recent frame, or [`ImageSourceError::NoFrameAvailable`]
    /// if the feed is not ready yet.
    fn grab(&self) -> std::result::Result<DynamicImage, ImageSourceError>;
}

/// Live feed backed by a monitor.
pub struct ScreenFeed {
    index: usize,
    screen: Screen,
}

impl ScreenFeed {
    /// Opens the monitor with the given zero-based index.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`AppError::ScreenCapture`] if screen enumeration fails
    /// - [`AppError::ScreenNotFound`] if the index is out of bounds
    pub fn new(index: usize) -> Result<Self> {
        let screens = Self::screens()?;
        let screen = screens
            .get(index)
            .cloned()
            .ok_or(AppError::ScreenNotFound(index))?;
        Ok(Self { index, screen })
    }

    /// Lists available monitors with their dimensions and scale factor.
    pub fn list() -> Result<Vec<String>> {
        Ok(Self::screens()?
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Monitor {}: {}x{} (scale: {})",
                    i, s.display_info.width, s.display_info.height, s.display_info.scale_factor
                )
            })
            .collect())
    }

    fn screens() -> Result<Vec<Screen>> {
        let screens = Screen::all()
            .map_err(|e| AppError::capture(format!("Failed to enumerate screens: {}", e)))?;

        if screens.is_empty() {
            return Err(AppError::capture("No screens detected"));
        }
        Ok(screens)
    }
}

impl FrameSource for ScreenFeed {
    fn name(&self) -> String {
        format!(
            "Monitor {} ({}x{})",
            self.index, self.screen.display_info.width, self.screen.display_info.height
        )
    }

    fn grab(&self) -> std::result::Result<DynamicImage, ImageSourceError> {
        let captured = self.screen.capture().map_err(|e| {
            warn!(monitor = self.index, "Screen capture failed: {}", e);
            ImageSourceError::NoFrameAvailable
        })?;

        // Convert screenshots::Image to image::DynamicImage
        let width = captured.width();
        let height = captured.height();
        let rgba_data = captured.into_raw();

        let buffer = image::ImageBuffer::from_raw(width, height, rgba_data)
            .ok_or(ImageSourceError::NoFrameAvailable)?;

        Ok(DynamicImage::ImageRgba8(buffer))
    }
}

/// Holds the latest frame pushed by an external device loop.
#[derive(Default)]
pub struct LatestFrame {
    name: String,
    slot: RwLock<Option<DynamicImage>>,
}

impl LatestFrame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: RwLock::new(None),
        }
    }

    /// Replaces the stored frame.
    pub fn push(&self, frame: DynamicImage) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(frame);
        }
    }

    /// Drops the stored frame, e.g. when the device disconnects.
    pub fn reset(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }
}

impl FrameSource for LatestFrame {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn grab(&self) -> std::result::Result<DynamicImage, ImageSourceError> {
        self.slot
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or(ImageSourceError::NoFrameAvailable)
    }
}

/// Locally displayable copy of the image that was sent for detection.
#[derive(Clone)]
pub struct PreviewHandle(Arc<DynamicImage>);

impl PreviewHandle {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreviewHandle({}x{})", self.width(), self.height())
    }
}

/// Encoded image bytes ready for upload.
#[derive(Clone, Debug)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

/// Result of a capture or upload.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    pub payload: Payload,
    pub preview: PreviewHandle,
}

/// Produces payloads from the live feed (if any) or from files.
#[derive(Clone)]
pub struct ImageSource {
    feed: Option<Arc<dyn FrameSource>>,
    jpeg_quality: u8,
}

impl ImageSource {
    /// A source without a live feed; only [`ImageSource::accept`] works.
    pub fn uploads_only(jpeg_quality: u8) -> Self {
        Self {
            feed: None,
            jpeg_quality,
        }
    }

    pub fn with_feed(feed: Arc<dyn FrameSource>, jpeg_quality: u8) -> Self {
        Self {
            feed: Some(feed),
            jpeg_quality,
        }
    }

    /// The live feed, if this source has one.
    pub fn feed(&self) -> Option<Arc<dyn FrameSource>> {
        self.feed.clone()
    }

    pub fn feed_name(&self) -> Option<String> {
        self.feed.as_ref().map(|f| f.name())
    }

    /// Grabs a frame from the live feed and encodes it as JPEG.
    ///
    /// Fails with [`ImageSourceError::NoFrameAvailable`] when there is no feed
    /// or it has not produced a frame yet.
    pub async fn capture(&self) -> std::result::Result<CapturedImage, ImageSourceError> {
        let feed = self.feed.clone().ok_or(ImageSourceError::NoFrameAvailable)?;
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            let frame = feed.grab()?;
            let bytes = ImageProcessor::encode_jpeg(&frame, quality).map_err(|e| {
                warn!("Failed to encode live frame: {}", e);
                ImageSourceError::NoFrameAvailable
            })?;
            debug!(feed = %feed.name(), size = bytes.len(), "Captured live frame");

            Ok(CapturedImage {
                payload: Payload {
                    bytes,
                    mime: "image/jpeg".to_string(),
                    file_name: "capture.jpg".to_string(),
                },
                preview: PreviewHandle::new(frame),
            })
        })
        .await
        .map_err(|_| ImageSourceError::NoFrameAvailable)?
    }

    /// Reads and decodes a user-selected file. The original bytes are uploaded.
    pub async fn accept(
        &self,
        path: impl AsRef<Path>,
    ) -> std::result::Result<CapturedImage, ImageSourceError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImageSourceError::UnreadableFile(format!("{}: {}", path.display(), e)))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        tokio::task::spawn_blocking(move || Self::accept_bytes(bytes, file_name))
            .await
            .map_err(|e| ImageSourceError::UnreadableFile(e.to_string()))?
    }

    /// Decodes in-memory file contents.
    pub fn accept_bytes(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
    ) -> std::result::Result<CapturedImage, ImageSourceError> {
        let file_name = file_name.into();
        let image = image::load_from_memory(&bytes)
            .map_err(|e| ImageSourceError::UnreadableFile(format!("{}: {}", file_name, e)))?;
        let mime = ImageProcessor::sniff_mime(&bytes).to_string();
        debug!(file = %file_name, %mime, width = image.width(), height = image.height(), "Accepted upload");

        Ok(CapturedImage {
            payload: Payload {
                bytes,
                mime,
                file_name,
            },
            preview: PreviewHandle::new(image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn frame(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 10])))
    }

    #[tokio::test]
    async fn capture_without_feed_has_no_frame() {
        let source = ImageSource::uploads_only(90);
        assert_eq!(source.capture().await.unwrap_err(), ImageSourceError::NoFrameAvailable);
        assert!(source.feed_name().is_none());
    }

    #[tokio::test]
    async fn capture_before_first_frame_has_no_frame() {
        let feed = Arc::new(LatestFrame::new("webcam"));
        let source = ImageSource::with_feed(feed.clone(), 90);

        assert_eq!(source.capture().await.unwrap_err(), ImageSourceError::NoFrameAvailable);

        feed.push(frame(64, 48));
        let captured = source.capture().await.unwrap();
        assert_eq!(captured.payload.mime, "image/jpeg");
        assert_eq!(captured.payload.file_name, "capture.jpg");
        assert_eq!((captured.preview.width(), captured.preview.height()), (64, 48));

        feed.reset();
        assert_eq!(source.capture().await.unwrap_err(), ImageSourceError::NoFrameAvailable);
    }

    #[tokio::test]
    async fn accept_keeps_original_bytes() {
        let mut png = Vec::new();
        frame(20, 10)
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&png).unwrap();

        let captured = ImageSource::uploads_only(90).accept(file.path()).await.unwrap();

        assert_eq!(captured.payload.bytes, png);
        assert_eq!(captured.payload.mime, "image/png");
        assert_eq!(captured.preview.width(), 20);
        assert_eq!(captured.preview.height(), 10);
    }

    #[tokio::test]
    async fn accept_rejects_garbage_and_missing_files() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "definitely not an image").unwrap();
        let source = ImageSource::uploads_only(90);

        assert!(matches!(
            source.accept(file.path()).await,
            Err(ImageSourceError::UnreadableFile(_))
        ));
        assert!(matches!(
            source.accept("/nonexistent/plate.jpg").await,
            Err(ImageSourceError::UnreadableFile(_))
        ));
    }
}
