//! Image encoding utilities.
//!
//! Live frames are encoded to JPEG before upload. Uploaded files are sent
//! as-is, so only their MIME type is sniffed. For the JSON transport the
//! payload is wrapped into a base64 data URI.

use crate::error::{AppError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// Image processing utilities for outgoing payloads.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Encodes a frame as JPEG at the given quality (1..=100).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageProcessing`] if encoding fails.
    pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();

        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;

        Ok(buffer)
    }

    /// Wraps raw bytes into a `data:<mime>;base64,...` URI.
    pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
        format!("data:{};base64,{}", mime, BASE64.encode(bytes))
    }

    /// Guesses the MIME type of encoded image bytes.
    ///
    /// Falls back to `application/octet-stream` for unknown formats.
    pub fn sniff_mime(bytes: &[u8]) -> &'static str {
        match image::guess_format(bytes) {
            Ok(format) => format.to_mime_type(),
            Err(_) => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 16, Rgba([200, 30, 30, 128])))
    }

    #[test]
    fn jpeg_keeps_dimensions() {
        let bytes = ImageProcessor::encode_jpeg(&sample(), 90).unwrap();

        assert_eq!(ImageProcessor::sniff_mime(&bytes), "image/jpeg");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }

    #[test]
    fn data_uri_has_header() {
        let uri = ImageProcessor::to_data_uri(b"abc", "image/png");
        assert_eq!(uri, "data:image/png;base64,YWJj");
    }

    #[test]
    fn sniffs_png_and_unknown() {
        let mut png = Vec::new();
        sample()
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        assert_eq!(ImageProcessor::sniff_mime(&png), "image/png");
        assert_eq!(ImageProcessor::sniff_mime(b"plain text"), "application/octet-stream");
    }
}
