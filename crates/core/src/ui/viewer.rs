//! Main viewer application.
//!
//! This module contains the `DetectionViewer` struct which implements the
//! `eframe::App` trait. It only reads the session through
//! [`SessionView`](crate::session::SessionView); all state changes go through
//! the session's submit/clear calls.

use super::rendering::{
    band_color, describe_scale, display_pixels, draw_annotations, draw_error_banner,
    fit_display_size, status_color,
};
use super::live::{LIVE_FRAME_INTERVAL, LiveView};
use super::settings::Settings;
use crate::client::DetectionClient;
use crate::capture::ImageSource;
use crate::config::{Config, ConfigOverrides, TransportMode};
use crate::detection::Detection;
use crate::dimensions::DimensionTracker;
use crate::error::{AppError, Result};
use crate::lifecycle::Generation;
use crate::overlay::{ConfidenceBand, OverlayRenderer, percent};
use crate::session::{Acquisition, DetectionSession};
use eframe::egui;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// How often the UI polls for worker messages while a request is pending.
const PENDING_REPAINT: Duration = Duration::from_millis(100);

/// A user action collected while drawing, applied after the frame's panels.
enum ViewerAction {
    Capture,
    Upload(PathBuf),
    Clear,
    RefreshStatus,
    ApplySettings,
}

/// Desktop front-end: controls on the left, the image with its overlay in the
/// middle, detection results on the right.
pub struct DetectionViewer {
    base_config: Config,
    config: Config,
    session: DetectionSession,
    tracker: DimensionTracker,
    renderer: OverlayRenderer,

    // Image state
    texture: Option<(Generation, egui::TextureHandle)>,
    live: Option<LiveView>,

    // Controls
    upload_path: String,
    expanded: Option<usize>,

    // Settings
    settings: Settings,
    show_settings: bool,
    settings_error: Option<String>,
}

impl DetectionViewer {
    /// Creates a new viewer.
    ///
    /// # Arguments
    /// * `base_config` - Configuration before user settings were applied
    /// * `config` - Effective configuration
    /// * `settings` - Persisted user settings
    /// * `session` - Session driving requests
    pub fn new(base_config: Config, config: Config, settings: Settings, session: DetectionSession) -> Self {
        let live = session
            .source()
            .feed()
            .map(|feed| LiveView::new(feed, LIVE_FRAME_INTERVAL));
        Self {
            tracker: DimensionTracker::from_config(&config),
            renderer: OverlayRenderer::new(config.confidence_thresholds),
            base_config,
            config,
            session,
            texture: None,
            live,
            upload_path: String::new(),
            expanded: None,
            settings,
            show_settings: false,
            settings_error: None,
        }
    }

    /// Keeps the texture in step with the preview of the current generation.
    fn sync_texture(&mut self, ctx: &egui::Context) {
        let view = self.session.view();
        match view.preview {
            Some(preview) => {
                let stale = self
                    .texture
                    .as_ref()
                    .is_none_or(|(generation, _)| *generation != view.generation);
                if stale {
                    let rgba = preview.image().to_rgba8();
                    let size = [preview.width() as usize, preview.height() as usize];
                    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
                    let texture = ctx.load_texture("preview", color_image, egui::TextureOptions::LINEAR);

                    self.texture = Some((view.generation, texture));
                    self.tracker.on_native_size_known(preview.width(), preview.height());
                }
            }
            None => {
                if self.texture.take().is_some() {
                    self.tracker.reset_native();
                }
            }
        }
    }

    fn render_header(&self, ui: &mut egui::Ui, actions: &mut Vec<ViewerAction>) {
        let status = self.session.view().service_status;
        ui.horizontal(|ui| {
            ui.heading("Plate Vision");
            ui.label(egui::RichText::new("License plate recognition").weak());

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("⟳").on_hover_text("Check service").clicked() {
                    actions.push(ViewerAction::RefreshStatus);
                }
                ui.colored_label(status_color(status), status.to_string());
                let (dot, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
                ui.painter().circle_filled(dot.center(), 5.0, status_color(status));
            });
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui, actions: &mut Vec<ViewerAction>) {
        let (is_pending, has_results) = {
            let view = self.session.view();
            (view.is_pending, view.has_results)
        };
        let feed_name = self.session.source().feed_name();

        ui.heading("Controls");
        ui.add_space(6.0);

        let capture_label = if is_pending { "Processing..." } else { "📷 Capture Photo" };
        let capture = ui
            .add_enabled(!is_pending && feed_name.is_some(), egui::Button::new(capture_label))
            .on_disabled_hover_text("No live feed");
        if capture.clicked() {
            actions.push(ViewerAction::Capture);
        }
        if let Some(name) = &feed_name {
            ui.label(egui::RichText::new(format!("Feed: {}", name)).small().weak());
        }

        ui.add_space(8.0);
        ui.label("Image file:");
        let response = ui.add_enabled(
            !is_pending,
            egui::TextEdit::singleline(&mut self.upload_path).hint_text("/path/to/car.jpg"),
        );
        let enter_pressed = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        let upload = ui.add_enabled(
            !is_pending && !self.upload_path.trim().is_empty(),
            egui::Button::new("📁 Upload Image"),
        );
        if (upload.clicked() || enter_pressed) && !self.upload_path.trim().is_empty() {
            actions.push(ViewerAction::Upload(PathBuf::from(self.upload_path.trim())));
        }

        if has_results {
            ui.add_space(8.0);
            if ui.button("🗑 Clear Results").clicked() {
                actions.push(ViewerAction::Clear);
            }
        }

        ui.add_space(12.0);
        ui.separator();
        if ui.button("⚙ Settings").clicked() {
            self.show_settings = !self.show_settings;
        }
        if self.show_settings {
            self.render_settings_ui(ui, actions);
        }
    }

    /// Renders the settings panel.
    fn render_settings_ui(&mut self, ui: &mut egui::Ui, actions: &mut Vec<ViewerAction>) {
        ui.label("Service endpoint:");
        ui.text_edit_singleline(&mut self.settings.service_endpoint);

        egui::ComboBox::from_label("Transport")
            .selected_text(self.settings.transport_mode.to_string())
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut self.settings.transport_mode, TransportMode::Multipart, "multipart");
                ui.selectable_value(&mut self.settings.transport_mode, TransportMode::EncodedJson, "json");
            });

        let thresholds = &mut self.settings.confidence_thresholds;
        ui.add(egui::Slider::new(&mut thresholds.high, 0.0..=1.0).text("High above"));
        ui.add(egui::Slider::new(&mut thresholds.medium, 0.0..=1.0).text("Medium above"));

        if ui.button("Apply").clicked() {
            actions.push(ViewerAction::ApplySettings);
        }
        if let Some(err) = &self.settings_error {
            ui.label(egui::RichText::new(err).color(band_color(ConfidenceBand::Low)));
        }
    }

    fn render_image(&mut self, ui: &mut egui::Ui) {
        let size = fit_display_size(self.config.display_size, ui.available_size());
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        let (w, h) = display_pixels(size);
        if self.tracker.on_display_size_known(w, h) {
            ui.ctx().request_repaint();
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 12.0, egui::Color32::from_gray(24));

        let view = self.session.view();
        match &self.texture {
            Some((_, texture)) => {
                painter.image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }
            None => match self.live.as_mut().and_then(|live| live.update(ui.ctx())) {
                Some(frame) => {
                    painter.image(
                        frame.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                    painter.text(
                        rect.left_top() + egui::vec2(12.0, 12.0),
                        egui::Align2::LEFT_TOP,
                        "● LIVE",
                        egui::FontId::proportional(14.0),
                        band_color(ConfidenceBand::Low),
                    );
                }
                None => {
                    let hint = match self.session.source().feed_name() {
                        Some(name) => format!("Waiting for {}...", name),
                        None => "Upload an image to start".to_string(),
                    };
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        hint,
                        egui::FontId::proportional(16.0),
                        egui::Color32::GRAY,
                    );
                }
            },
        }

        let annotations = self.renderer.render(view.detections, self.tracker.current_scale());
        draw_annotations(&painter, rect, &annotations);

        if view.is_pending {
            painter.rect_filled(rect, 12.0, egui::Color32::from_black_alpha(120));
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Processing Image...",
                egui::FontId::proportional(20.0),
                egui::Color32::WHITE,
            );
        }
        if let Some(err) = view.error {
            draw_error_banner(&painter, rect, &err.to_string());
        }

        ui.label(
            egui::RichText::new(format!(
                "Scale {}",
                describe_scale(self.tracker.current_scale())
            ))
            .small()
            .weak(),
        );
    }

    fn render_results(&mut self, ui: &mut egui::Ui) {
        let view = self.session.view();
        let thresholds = *self.renderer.thresholds();

        if view.detections.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                ui.heading("No Detections Yet");
                ui.label("Capture or upload an image to start detecting license plates");
            });
            return;
        }

        ui.heading("Detection Results");
        let count = view.detections.len();
        let mut meta = format!("{} plate{} found", count, if count == 1 { "" } else { "s" });
        if let Some(elapsed) = view.processing_time {
            meta.push_str(&format!(" • {}ms", elapsed.as_millis()));
        }
        ui.label(meta);

        if ui.button("Copy plates").clicked() {
            copy_plates(view.detections);
        }
        ui.separator();

        let mut toggled = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (idx, det) in view.detections.iter().enumerate() {
                let band = ConfidenceBand::classify(det.yolo_confidence(), &thresholds);
                let header = ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(det.text()).strong().monospace());
                    ui.colored_label(band_color(band), format!("{}%", percent(det.yolo_confidence())));
                });
                if header.response.interact(egui::Sense::click()).clicked() {
                    toggled = Some(idx);
                }

                confidence_bar(ui, "YOLO", det.yolo_confidence(), &thresholds);
                confidence_bar(ui, "OCR", det.ocr_confidence(), &thresholds);

                if self.expanded == Some(idx) {
                    let b = det.bbox();
                    ui.label(format!("Box: [{}, {}, {}, {}]", b.x1, b.y1, b.x2, b.y2));
                    ui.horizontal(|ui| {
                        ui.label("Quality:");
                        ui.colored_label(band_color(band), band.label());
                    });
                }
                ui.separator();
            }
        });

        if let Some(idx) = toggled {
            self.expanded = if self.expanded == Some(idx) { None } else { Some(idx) };
        }
    }

    fn apply(&mut self, action: ViewerAction) {
        match action {
            ViewerAction::Capture => {
                self.expanded = None;
                self.session.submit(Acquisition::Capture);
            }
            ViewerAction::Upload(path) => {
                self.expanded = None;
                self.session.submit(Acquisition::Upload(path));
            }
            ViewerAction::Clear => {
                self.expanded = None;
                self.session.clear();
            }
            ViewerAction::RefreshStatus => self.session.refresh_status(),
            ViewerAction::ApplySettings => {
                if let Err(e) = self.apply_settings() {
                    self.settings_error = Some(e.to_string());
                }
            }
        }
    }

    fn apply_settings(&mut self) -> Result<()> {
        let config = self.settings.apply(&self.base_config)?;
        let client = DetectionClient::new(&config)?;

        self.renderer.set_thresholds(config.confidence_thresholds);
        self.session.set_client(client);
        self.config = config;
        self.settings_error = None;

        if let Err(e) = self.settings.save() {
            warn!("Failed to save settings: {}", e);
        }
        self.session.refresh_status();
        Ok(())
    }
}

fn confidence_bar(
    ui: &mut egui::Ui,
    label: &str,
    confidence: f64,
    thresholds: &crate::config::ConfidenceThresholds,
) {
    let band = ConfidenceBand::classify(confidence, thresholds);
    ui.horizontal(|ui| {
        ui.label(format!("{} Confidence:", label));
        ui.add(
            egui::ProgressBar::new(confidence as f32)
                .fill(band_color(band))
                .text(format!("{:.1}%", confidence * 100.0)),
        );
    });
}

fn copy_plates(detections: &[Detection]) {
    let text = detections
        .iter()
        .map(|d| d.text())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text) {
                warn!("Failed to copy to clipboard: {}", e);
            }
        }
        Err(e) => warn!("Could not access clipboard: {}", e),
    }
}

impl eframe::App for DetectionViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Enforce dark mode
        ctx.set_visuals(egui::Visuals::dark());

        if self.session.poll() {
            ctx.request_repaint();
        }
        if self.session.view().is_pending {
            ctx.request_repaint_after(PENDING_REPAINT);
        }
        self.sync_texture(ctx);

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.render_header(ui, &mut actions);
        });

        egui::SidePanel::left("controls")
            .resizable(false)
            .default_width(240.0)
            .show(ctx, |ui| {
                self.render_controls(ui, &mut actions);
            });

        egui::SidePanel::right("results")
            .default_width(320.0)
            .show(ctx, |ui| {
                self.render_results(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                self.render_image(ui);
            });
        });

        // Handle escape to close
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        if !actions.is_empty() {
            for action in actions {
                self.apply(action);
            }
            ctx.request_repaint();
        }
    }
}

/// Startup options for [`run`].
#[derive(Clone, Debug, Default)]
pub struct ViewerOptions {
    /// Values set on the command line or in the environment. They win over
    /// stored settings.
    pub overrides: ConfigOverrides,
    /// File to upload as soon as the window opens.
    pub initial_upload: Option<PathBuf>,
}

/// Launches the viewer and returns when the user closes the window.
///
/// # Arguments
/// * `config` - Application configuration
/// * `source` - Image source (with or without a live feed)
/// * `options` - Explicit overrides and an optional first upload
pub fn run(config: Config, source: ImageSource, options: ViewerOptions) -> Result<()> {
    let stored = Settings::load(&config);
    let effective = match stored.apply_under(&config, &options.overrides) {
        Ok(effective) => effective,
        Err(e) => {
            warn!("Ignoring stored settings: {}", e);
            config.clone()
        }
    };
    // The panel shows what is actually in use
    let settings = Settings::from_config(&effective);

    let mut session = DetectionSession::new(DetectionClient::new(&effective)?, source);
    session.refresh_status();

    let upload_path = match options.initial_upload {
        Some(path) => {
            session.submit(Acquisition::Upload(path.clone()));
            path.display().to_string()
        }
        None => String::new(),
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title("Plate Vision"),
        ..Default::default()
    };

    eframe::run_native(
        "Plate Vision",
        native_options,
        Box::new(move |_cc| {
            let mut viewer = DetectionViewer::new(config, effective, settings, session);
            viewer.upload_path = upload_path;
            Ok(Box::new(viewer) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
