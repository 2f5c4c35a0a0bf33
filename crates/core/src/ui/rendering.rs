//! Painting helpers for the detection overlay.
//!
//! These turn the display-space annotations produced by
//! [`OverlayRenderer`](crate::overlay::OverlayRenderer) into egui shapes.
//! Annotation coordinates are relative to the top-left corner of the image,
//! so every helper takes the on-screen image rect as its origin.

use crate::client::ServiceStatus;
use crate::overlay::{ConfidenceBand, DrawableAnnotation};
use crate::transform::Scale;
use eframe::egui;

/// Stroke width of detection boxes.
pub const BOX_STROKE: f32 = 3.0;

/// Maps a confidence band to its overlay color.
pub fn band_color(band: ConfidenceBand) -> egui::Color32 {
    let [r, g, b] = band.rgb();
    egui::Color32::from_rgb(r, g, b)
}

/// Color of the connectivity indicator.
pub fn status_color(status: ServiceStatus) -> egui::Color32 {
    match status {
        ServiceStatus::Online => band_color(ConfidenceBand::High),
        ServiceStatus::Offline => band_color(ConfidenceBand::Low),
        ServiceStatus::Checking => band_color(ConfidenceBand::Medium),
    }
}

fn to_screen(image_rect: egui::Rect, x: f64, y: f64) -> egui::Pos2 {
    egui::pos2(image_rect.min.x + x as f32, image_rect.min.y + y as f32)
}

/// Draws one annotation: the box outline, the label plate and the label text.
///
/// # Arguments
/// * `painter` - The egui painter to draw with
/// * `image_rect` - Where the image is drawn on screen
/// * `annotation` - Annotation in display space
pub fn draw_annotation(
    painter: &egui::Painter,
    image_rect: egui::Rect,
    annotation: &DrawableAnnotation,
) {
    let color = band_color(annotation.band);
    let b = &annotation.bbox;

    painter.rect_stroke(
        egui::Rect::from_min_max(to_screen(image_rect, b.x1, b.y1), to_screen(image_rect, b.x2, b.y2)),
        4.0,
        egui::Stroke::new(BOX_STROKE, color),
        egui::StrokeKind::Middle,
    );

    let l = &annotation.label_rect;
    let plate = egui::Rect::from_min_max(
        to_screen(image_rect, l.x1, l.y1),
        to_screen(image_rect, l.x2, l.y2),
    );
    painter.rect_filled(plate, 3.0, color.gamma_multiply(0.8));
    painter.text(
        plate.left_center() + egui::vec2(5.0, 0.0),
        egui::Align2::LEFT_CENTER,
        &annotation.label,
        egui::FontId::proportional(14.0),
        egui::Color32::WHITE,
    );
}

/// Draws every annotation over the image.
pub fn draw_annotations(
    painter: &egui::Painter,
    image_rect: egui::Rect,
    annotations: &[DrawableAnnotation],
) {
    for annotation in annotations {
        draw_annotation(painter, image_rect, annotation);
    }
}

/// Draws an error banner across the bottom of the image.
pub fn draw_error_banner(painter: &egui::Painter, image_rect: egui::Rect, message: &str) {
    let banner = egui::Rect::from_min_max(
        egui::pos2(image_rect.min.x, image_rect.max.y - 36.0),
        image_rect.max,
    );
    painter.rect_filled(banner, 0.0, egui::Color32::from_black_alpha(180));
    painter.text(
        banner.center(),
        egui::Align2::CENTER_CENTER,
        format!("⚠ {}", message),
        egui::FontId::proportional(15.0),
        egui::Color32::from_rgb(0xF4, 0x43, 0x36),
    );
}

/// Size to draw an image at: the configured display size, shrunk uniformly
/// if it does not fit into the available space.
///
/// # Arguments
/// * `configured` - Preferred display size in points
/// * `available` - Space left in the panel
pub fn fit_display_size(configured: (u32, u32), available: egui::Vec2) -> egui::Vec2 {
    let wanted = egui::vec2(configured.0 as f32, configured.1 as f32);
    if wanted.x <= 0.0 || wanted.y <= 0.0 || available.x <= 0.0 || available.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let shrink = (available.x / wanted.x).min(available.y / wanted.y).min(1.0);
    wanted * shrink
}

/// Rounds a drawn size to whole display pixels for the dimension tracker.
pub fn display_pixels(size: egui::Vec2) -> (u32, u32) {
    (size.x.round().max(0.0) as u32, size.y.round().max(0.0) as u32)
}

/// Human readable scale for the status line, e.g. `0.50× / 0.67×`.
pub fn describe_scale(scale: Scale) -> String {
    format!("{:.2}× / {:.2}×", scale.x, scale.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_configured_size_when_there_is_room() {
        let size = fit_display_size((640, 480), egui::vec2(1000.0, 800.0));
        assert_eq!(size, egui::vec2(640.0, 480.0));
    }

    #[test]
    fn shrinks_uniformly_when_too_small() {
        let size = fit_display_size((640, 480), egui::vec2(320.0, 800.0));
        assert!((size.x - 320.0).abs() < 0.001);
        assert!((size.y - 240.0).abs() < 0.001);
    }

    #[test]
    fn zero_space_gives_zero_size() {
        assert_eq!(fit_display_size((640, 480), egui::vec2(0.0, 100.0)), egui::Vec2::ZERO);
        assert_eq!(display_pixels(egui::Vec2::ZERO), (0, 0));
    }

    #[test]
    fn rounds_to_pixels() {
        assert_eq!(display_pixels(egui::vec2(319.6, 239.4)), (320, 239));
    }

    #[test]
    fn band_colors() {
        assert_eq!(band_color(ConfidenceBand::High), egui::Color32::from_rgb(0x4C, 0xAF, 0x50));
        assert_eq!(band_color(ConfidenceBand::Low), egui::Color32::from_rgb(0xF4, 0x43, 0x36));
        assert_eq!(status_color(ServiceStatus::Checking), band_color(ConfidenceBand::Medium));
    }

    #[test]
    fn scale_description() {
        assert_eq!(describe_scale(Scale::new(0.5, 2.0)), "0.50× / 2.00×");
    }
}
