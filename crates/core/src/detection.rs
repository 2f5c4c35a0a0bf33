//! Detection data model and the detection service wire format.
//!
//! A response looks like
//!
//! ```json
//! { "results": [ { "box": [12, 40, 180, 92], "text": "KA01AB1234",
//!                  "yolo_confidence": 0.91, "ocr_confidence": 0.78 } ] }
//! ```
//!
//! or, when the service fails at the application level,
//! `{ "results": [], "error": "Image decode failed" }`.

use crate::error::DetectionError;
use serde::{Deserialize, Serialize};

/// Axis-aligned box `[x1, y1, x2, y2]` with `x1 <= x2` and `y1 <= y2`.
///
/// Serialized as a plain four-element array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Builds a box from two opposite corners, ordering the coordinates.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

/// One recognized plate: where it is, what it says and how sure the service is.
///
/// Immutable once parsed; coordinates are in native image pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    bbox: BoundingBox,
    text: String,
    #[serde(default)]
    yolo_confidence: f64,
    #[serde(default)]
    ocr_confidence: f64,
}

impl Detection {
    /// Creates a validated detection.
    ///
    /// Both confidences must lie in `[0, 1]` and the box must be finite.
    pub fn new(
        bbox: BoundingBox,
        text: impl Into<String>,
        yolo_confidence: f64,
        ocr_confidence: f64,
    ) -> Result<Self, DetectionError> {
        let detection = Self {
            bbox,
            text: text.into(),
            yolo_confidence,
            ocr_confidence,
        };
        detection.validate()?;
        Ok(detection)
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Localization confidence of the plate detector.
    pub fn yolo_confidence(&self) -> f64 {
        self.yolo_confidence
    }

    /// Confidence of the text recognizer.
    pub fn ocr_confidence(&self) -> f64 {
        self.ocr_confidence
    }

    fn validate(&self) -> Result<(), DetectionError> {
        if !self.bbox.is_finite() {
            return Err(DetectionError::MalformedResponse(format!(
                "box {:?} contains non-finite coordinates",
                self.bbox.to_array()
            )));
        }
        for (name, value) in [
            ("yolo_confidence", self.yolo_confidence),
            ("ocr_confidence", self.ocr_confidence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DetectionError::MalformedResponse(format!(
                    "{} {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Body returned by `POST /detect`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Detection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResponse {
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        Self {
            results: Some(detections),
            error: None,
        }
    }

    /// Applies the service contract: a non-empty `error` wins, a missing
    /// `results` array is malformed, every detection is validated.
    pub fn into_detections(self) -> Result<Vec<Detection>, DetectionError> {
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return Err(DetectionError::ServiceError(error));
        }

        let results = self
            .results
            .ok_or_else(|| DetectionError::MalformedResponse("missing 'results' array".into()))?;

        for detection in &results {
            detection.validate()?;
        }
        Ok(results)
    }
}

/// Parses a raw response body into detections.
pub fn parse_detection_response(body: &[u8]) -> Result<Vec<Detection>, DetectionError> {
    let response: DetectionResponse = serde_json::from_slice(body)
        .map_err(|e| DetectionError::MalformedResponse(e.to_string()))?;
    response.into_detections()
}

/// Body returned by the readiness probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ready: bool,
}
