//! Configuration loading and management.
//!
//! All settings that used to be scattered constants (service address, display
//! size, confidence bands) live in one [`Config`] that is handed to the
//! client, the dimension tracker and the overlay renderer at construction.

use crate::error::{AppError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_DETECT_PATH: &str = "/detect";
pub const DEFAULT_STATUS_PATH: &str = "/health";
pub const DEFAULT_DISPLAY_SIZE: (u32, u32) = (640, 480);
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// How the image is put on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Binary `multipart/form-data` upload with a single `file` part.
    #[default]
    Multipart,
    /// JSON body carrying a base64 data URI under `image`.
    EncodedJson,
}

impl FromStr for TransportMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multipart" => Ok(Self::Multipart),
            "json" | "encoded_json" | "encodedjson" => Ok(Self::EncodedJson),
            other => Err(AppError::config(format!(
                "Unknown transport mode '{}', expected 'multipart' or 'json'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multipart => f.write_str("multipart"),
            Self::EncodedJson => f.write_str("json"),
        }
    }
}

/// Lower bounds (exclusive) of the high and medium confidence bands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl ConfidenceThresholds {
    pub fn new(high: f64, medium: f64) -> Result<Self> {
        let thresholds = Self { high, medium };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Checks `0 <= medium <= high <= 1`.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.high) || !in_unit(self.medium) {
            return Err(AppError::config(format!(
                "Confidence thresholds must lie in [0, 1] (high={}, medium={})",
                self.high, self.medium
            )));
        }
        if self.medium > self.high {
            return Err(AppError::config(format!(
                "Medium threshold {} exceeds high threshold {}",
                self.medium, self.high
            )));
        }
        Ok(())
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub service_endpoint: Url,
    pub detect_path: String,
    pub status_path: String,
    pub transport_mode: TransportMode,
    pub confidence_thresholds: ConfidenceThresholds,
    /// Initial size of the area the image is rendered into.
    pub display_size: (u32, u32),
    /// Quality used when encoding live frames to JPEG.
    pub jpeg_quality: u8,
}

impl Config {
    /// Loads configuration from the environment (including `.env` files).
    ///
    /// Every variable is optional; unset values fall back to the defaults.
    pub fn load() -> Result<Self> {
        ConfigOverrides::from_env()?.apply_to(Self::builder()).build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Full URL of the detection endpoint.
    pub fn detect_url(&self) -> Result<Url> {
        join_path(&self.service_endpoint, &self.detect_path)
    }

    /// Full URL of the readiness probe.
    pub fn status_url(&self) -> Result<Url> {
        join_path(&self.service_endpoint, &self.status_path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            detect_path: DEFAULT_DETECT_PATH.to_string(),
            status_path: DEFAULT_STATUS_PATH.to_string(),
            transport_mode: TransportMode::default(),
            confidence_thresholds: ConfidenceThresholds::default(),
            display_size: DEFAULT_DISPLAY_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Values set explicitly by the environment or the command line.
///
/// These take precedence over anything the viewer has stored, so they are
/// kept apart from the resolved [`Config`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub transport: Option<TransportMode>,
    pub high_confidence: Option<f64>,
    pub medium_confidence: Option<f64>,
}

impl ConfigOverrides {
    /// Reads `PLATE_VISION_*` variables, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let mut overrides = Self {
            endpoint: env::var("PLATE_VISION_ENDPOINT").ok(),
            ..Self::default()
        };
        if let Ok(transport) = env::var("PLATE_VISION_TRANSPORT") {
            overrides.transport = Some(transport.parse()?);
        }
        if let Ok(high) = env::var("PLATE_VISION_HIGH_CONFIDENCE") {
            overrides.high_confidence = Some(parse_threshold("PLATE_VISION_HIGH_CONFIDENCE", &high)?);
        }
        if let Ok(medium) = env::var("PLATE_VISION_MEDIUM_CONFIDENCE") {
            overrides.medium_confidence =
                Some(parse_threshold("PLATE_VISION_MEDIUM_CONFIDENCE", &medium)?);
        }
        Ok(overrides)
    }

    /// Layers `other` on top; its set fields win.
    pub fn merge(mut self, other: ConfigOverrides) -> Self {
        self.endpoint = other.endpoint.or(self.endpoint);
        self.transport = other.transport.or(self.transport);
        self.high_confidence = other.high_confidence.or(self.high_confidence);
        self.medium_confidence = other.medium_confidence.or(self.medium_confidence);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes the set fields into a builder, leaving the rest untouched.
    pub fn apply_to(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        if let Some(transport) = self.transport {
            builder = builder.with_transport(transport);
        }
        if let Some(high) = self.high_confidence {
            builder = builder.with_high_threshold(high);
        }
        if let Some(medium) = self.medium_confidence {
            builder = builder.with_medium_threshold(medium);
        }
        builder
    }
}

fn parse_threshold(name: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::config(format!("{} must be a number, got '{}'", name, value)))
}

fn join_path(base: &Url, path: &str) -> Result<Url> {
    // Keep any path prefix of the endpoint (e.g. a reverse-proxy mount point).
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let suffix = path.trim_start_matches('/');
    url.set_path(&format!("{}/{}", prefix, suffix));
    if url.cannot_be_a_base() {
        return Err(AppError::config(format!("Endpoint '{}' cannot be a base URL", base)));
    }
    Ok(url)
}

/// Builder for [`Config`]; validation happens in [`ConfigBuilder::build`].
#[derive(Default)]
pub struct ConfigBuilder {
    endpoint: Option<String>,
    detect_path: Option<String>,
    status_path: Option<String>,
    transport: Option<TransportMode>,
    high: Option<f64>,
    medium: Option<f64>,
    display_size: Option<(u32, u32)>,
    jpeg_quality: Option<u8>,
}

impl From<Config> for ConfigBuilder {
    fn from(config: Config) -> Self {
        Self {
            endpoint: Some(config.service_endpoint.to_string()),
            detect_path: Some(config.detect_path),
            status_path: Some(config.status_path),
            transport: Some(config.transport_mode),
            high: Some(config.confidence_thresholds.high),
            medium: Some(config.confidence_thresholds.medium),
            display_size: Some(config.display_size),
            jpeg_quality: Some(config.jpeg_quality),
        }
    }
}

impl ConfigBuilder {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_detect_path(mut self, path: impl Into<String>) -> Self {
        self.detect_path = Some(path.into());
        self
    }

    pub fn with_status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = Some(path.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ConfidenceThresholds) -> Self {
        self.high = Some(thresholds.high);
        self.medium = Some(thresholds.medium);
        self
    }

    pub fn with_high_threshold(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    pub fn with_medium_threshold(mut self, medium: f64) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn with_display_size(mut self, width: u32, height: u32) -> Self {
        self.display_size = Some((width, height));
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality);
        self
    }

    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();

        let service_endpoint = match self.endpoint {
            Some(raw) => {
                let url = Url::parse(raw.trim())
                    .map_err(|e| AppError::config(format!("Invalid service endpoint '{}': {}", raw, e)))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(AppError::config(format!(
                        "Service endpoint must use http or https, got '{}'",
                        url.scheme()
                    )));
                }
                url
            }
            None => defaults.service_endpoint,
        };

        let confidence_thresholds = ConfidenceThresholds::new(
            self.high.unwrap_or(defaults.confidence_thresholds.high),
            self.medium.unwrap_or(defaults.confidence_thresholds.medium),
        )?;

        let display_size = self.display_size.unwrap_or(defaults.display_size);
        if display_size.0 == 0 || display_size.1 == 0 {
            return Err(AppError::config("Display size must be non-zero"));
        }

        let jpeg_quality = self.jpeg_quality.unwrap_or(defaults.jpeg_quality);
        if !(1..=100).contains(&jpeg_quality) {
            return Err(AppError::config(format!(
                "JPEG quality must be within 1..=100, got {}",
                jpeg_quality
            )));
        }

        Ok(Config {
            service_endpoint,
            detect_path: self.detect_path.unwrap_or(defaults.detect_path),
            status_path: self.status_path.unwrap_or(defaults.status_path),
            transport_mode: self.transport.unwrap_or(defaults.transport_mode),
            confidence_thresholds,
            display_size,
            jpeg_quality,
        })
    }
}
