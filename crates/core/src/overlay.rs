//! Turns settled detections into drawable annotations.
//!
//! Rendering is pure: the renderer reads detections and a scale and returns
//! shapes in display space. Actually painting them is the caller's job.

use crate::config::ConfidenceThresholds;
use crate::detection::{BoundingBox, Detection};
use crate::transform::{Scale, to_display};

/// Height of the label plate drawn above each box.
pub const LABEL_HEIGHT: f64 = 25.0;
/// Gap between the top of the box and the top of the label plate.
pub const LABEL_OFFSET: f64 = 30.0;
/// Label plates are never narrower than this.
pub const LABEL_MIN_WIDTH: f64 = 100.0;
/// Approximate advance per label character.
pub const LABEL_CHAR_WIDTH: f64 = 10.0;

/// Confidence band of a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Bands are exclusive at their lower bound: a score equal to `high`
    /// is medium.
    pub fn classify(confidence: f64, thresholds: &ConfidenceThresholds) -> Self {
        if confidence > thresholds.high {
            Self::High
        } else if confidence > thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// RGB color used for boxes, plates and confidence bars.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::High => [0x4C, 0xAF, 0x50],
            Self::Medium => [0xFF, 0x98, 0x00],
            Self::Low => [0xF4, 0x43, 0x36],
        }
    }
}

/// One box plus its label, ready to be painted in display space.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawableAnnotation {
    pub bbox: BoundingBox,
    /// Background plate for the label, above the box.
    pub label_rect: BoundingBox,
    pub label: String,
    pub band: ConfidenceBand,
    /// Detector confidence in `[0, 1]`, kept for stroke weight or opacity.
    pub confidence: f64,
}

/// Formats a confidence as a whole percentage, e.g. `0.914` → `"91"`.
pub fn percent(confidence: f64) -> String {
    format!("{:.0}", confidence * 100.0)
}

#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    thresholds: ConfidenceThresholds,
}

impl OverlayRenderer {
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: ConfidenceThresholds) {
        self.thresholds = thresholds;
    }

    pub fn render(&self, detections: &[Detection], scale: Scale) -> Vec<DrawableAnnotation> {
        detections.iter().map(|d| self.annotate(d, scale)).collect()
    }

    fn annotate(&self, detection: &Detection, scale: Scale) -> DrawableAnnotation {
        let bbox = to_display(detection.bbox(), scale);
        let confidence = detection.yolo_confidence();
        let label = format!("{} ({}%)", detection.text(), percent(confidence));

        let width = (detection.text().chars().count() as f64 * LABEL_CHAR_WIDTH).max(LABEL_MIN_WIDTH);
        let top = bbox.y1 - LABEL_OFFSET;
        let label_rect = BoundingBox::new(bbox.x1, top, bbox.x1 + width, top + LABEL_HEIGHT);

        DrawableAnnotation {
            bbox,
            label_rect,
            label,
            band: ConfidenceBand::classify(confidence, &self.thresholds),
            confidence,
        }
    }
}
