//! Live view of the feed while no captured image is shown.
//!
//! Frames are grabbed on a worker thread at most once per interval and
//! converted to an egui image there. The UI thread only uploads the latest
//! one into a texture.

use crate::capture::FrameSource;
use eframe::egui;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Time between two live frames.
pub const LIVE_FRAME_INTERVAL: Duration = Duration::from_millis(250);

/// Live frames wider than this are shrunk before upload.
const LIVE_MAX_WIDTH: u32 = 1280;

/// A grabbed frame, ready for upload.
pub struct LiveFrame {
    pub width: u32,
    pub height: u32,
    pub image: egui::ColorImage,
}

pub struct LiveView {
    feed: Arc<dyn FrameSource>,
    interval: Duration,
    in_flight: bool,
    last_request: Option<Instant>,
    texture: Option<egui::TextureHandle>,
    tx: Sender<Option<LiveFrame>>,
    rx: Receiver<Option<LiveFrame>>,
}

impl LiveView {
    pub fn new(feed: Arc<dyn FrameSource>, interval: Duration) -> Self {
        let (tx, rx) = channel();
        Self {
            feed,
            interval,
            in_flight: false,
            last_request: None,
            texture: None,
            tx,
            rx,
        }
    }

    /// Whether a new grab may start at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.in_flight
            && self
                .last_request
                .is_none_or(|last| now.duration_since(last) >= self.interval)
    }

    /// Starts a background grab if one is due. Returns `true` if it did.
    pub fn request(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.in_flight = true;
        self.last_request = Some(now);

        let feed = self.feed.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let frame = match feed.grab() {
                Ok(frame) => Some(to_live_frame(frame)),
                Err(e) => {
                    debug!(feed = %feed.name(), "No live frame: {}", e);
                    None
                }
            };
            let _ = tx.send(frame);
        });
        true
    }

    /// Returns the newest finished frame, if any arrived since the last call.
    pub fn try_take(&mut self) -> Option<LiveFrame> {
        let mut latest = None;
        while let Ok(frame) = self.rx.try_recv() {
            self.in_flight = false;
            if frame.is_some() {
                latest = frame;
            }
        }
        latest
    }

    /// Drives the feed for one UI frame and returns the texture to paint.
    pub fn update(&mut self, ctx: &egui::Context) -> Option<&egui::TextureHandle> {
        if let Some(frame) = self.try_take() {
            match &mut self.texture {
                Some(texture) => texture.set(frame.image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("live-feed", frame.image, egui::TextureOptions::LINEAR));
                }
            }
        }
        self.request(Instant::now());
        ctx.request_repaint_after(self.interval);
        self.texture.as_ref()
    }
}

fn to_live_frame(frame: image::DynamicImage) -> LiveFrame {
    let frame = if frame.width() > LIVE_MAX_WIDTH {
        frame.thumbnail(LIVE_MAX_WIDTH, u32::MAX)
    } else {
        frame
    };
    let rgba = frame.to_rgba8();
    let (width, height) = rgba.dimensions();
    LiveFrame {
        width,
        height,
        image: egui::ColorImage::from_rgba_unmultiplied([width as usize, height as usize], rgba.as_raw()),
    }
}
