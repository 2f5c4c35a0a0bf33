//! Drives requests through the lifecycle.
//!
//! The owning thread (the UI loop or the CLI) holds the [`DetectionSession`].
//! Each submission starts a generation synchronously and hands the slow part
//! (acquiring the image and calling the service) to a worker thread. Workers
//! report back over a channel with every message tagged by its generation.
//! Messages are applied in the owning thread, one at a time, so the
//! generation check and the state change happen as a single step.

use crate::capture::{ImageSource, PreviewHandle};
use crate::client::{DetectionClient, ServiceStatus};
use crate::detection::Detection;
use crate::error::{DetectionError, RequestError};
use crate::lifecycle::{Generation, LifecycleState, RequestLifecycle, RequestOrigin, Transition};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Where the image for a request comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// Grab the current frame of the live feed.
    Capture,
    /// Read a user-selected file.
    Upload(PathBuf),
}

impl Acquisition {
    pub fn origin(&self) -> RequestOrigin {
        match self {
            Self::Capture => RequestOrigin::Capture,
            Self::Upload(_) => RequestOrigin::Upload,
        }
    }
}

/// Messages sent from worker threads back to the session owner.
pub(crate) enum SessionMessage {
    /// The image for a generation was acquired.
    Preview {
        generation: Generation,
        preview: PreviewHandle,
    },
    /// The request for a generation finished.
    Resolved {
        generation: Generation,
        outcome: Result<Vec<Detection>, RequestError>,
        elapsed: Duration,
    },
    /// Result of a readiness probe.
    Status(ServiceStatus),
}

/// Read-only projection of the session for views.
#[derive(Clone, Copy, Debug)]
pub struct SessionView<'a> {
    pub state: &'a LifecycleState,
    pub generation: Generation,
    pub detections: &'a [Detection],
    pub error: Option<&'a RequestError>,
    pub preview: Option<&'a PreviewHandle>,
    pub processing_time: Option<Duration>,
    pub service_status: ServiceStatus,
    pub is_pending: bool,
    pub has_results: bool,
}

pub struct DetectionSession {
    lifecycle: RequestLifecycle,
    source: ImageSource,
    client: DetectionClient,
    preview: Option<PreviewHandle>,
    processing_time: Option<Duration>,
    service_status: ServiceStatus,
    tx: Sender<SessionMessage>,
    rx: Receiver<SessionMessage>,
}

impl DetectionSession {
    pub fn new(client: DetectionClient, source: ImageSource) -> Self {
        let (tx, rx) = channel();
        Self {
            lifecycle: RequestLifecycle::new(),
            source,
            client,
            preview: None,
            processing_time: None,
            service_status: ServiceStatus::Checking,
            tx,
            rx,
        }
    }

    /// Starts a new generation and dispatches it in the background.
    ///
    /// The previous overlay, preview and error are gone as soon as this
    /// returns; any response still in flight for an older generation will be
    /// discarded on arrival.
    pub fn submit(&mut self, acquisition: Acquisition) -> Generation {
        let generation = self.lifecycle.start(acquisition.origin());
        self.preview = None;
        self.processing_time = None;
        self.spawn_request(generation, acquisition);
        generation
    }

    /// Clears settled results or an error. Ignored while a request is pending.
    pub fn clear(&mut self) -> Transition {
        let transition = self.lifecycle.clear();
        if transition == Transition::Cleared {
            self.preview = None;
            self.processing_time = None;
        }
        transition
    }

    /// Checks the readiness probe in the background.
    pub fn refresh_status(&mut self) {
        self.service_status = ServiceStatus::Checking;
        let tx = self.tx.clone();
        let client = self.client.clone();

        thread::spawn(move || {
            let status = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt.block_on(client.status()),
                Err(e) => {
                    debug!("Failed to create async runtime for status probe: {}", e);
                    ServiceStatus::Offline
                }
            };
            let _ = tx.send(SessionMessage::Status(status));
        });
    }

    /// Applies every message that has arrived, without blocking.
    ///
    /// Returns `true` if anything visible changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.rx.try_recv() {
            changed |= self.handle(message);
        }
        changed
    }

    /// Blocks until one message arrives and applies it.
    ///
    /// Returns `false` immediately when nothing is pending.
    pub fn wait(&mut self) -> bool {
        if !self.lifecycle.is_pending() {
            return false;
        }
        match self.rx.recv() {
            Ok(message) => self.handle(message),
            Err(_) => false,
        }
    }

    /// Blocks until the current generation settles or fails.
    pub fn wait_until_settled(&mut self) -> &LifecycleState {
        while self.lifecycle.is_pending() {
            self.wait();
        }
        self.lifecycle.state()
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            state: self.lifecycle.state(),
            generation: self.lifecycle.generation(),
            detections: self.lifecycle.detections(),
            error: self.lifecycle.error(),
            preview: self.preview.as_ref(),
            processing_time: self.processing_time,
            service_status: self.service_status,
            is_pending: self.lifecycle.is_pending(),
            has_results: self.lifecycle.has_results(),
        }
    }

    pub fn lifecycle(&self) -> &RequestLifecycle {
        &self.lifecycle
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn client(&self) -> &DetectionClient {
        &self.client
    }

    /// Swaps the client used by future requests (e.g. after the endpoint
    /// changed). Requests already in flight keep their client.
    pub fn set_client(&mut self, client: DetectionClient) {
        self.client = client;
    }

    pub(crate) fn handle(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Preview {
                generation,
                preview,
            } => {
                if self.lifecycle.is_awaiting(generation) {
                    self.preview = Some(preview);
                    true
                } else {
                    debug!(generation = generation.value(), "Dropping preview of an abandoned request");
                    false
                }
            }
            SessionMessage::Resolved {
                generation,
                outcome,
                elapsed,
            } => {
                let transition = self.lifecycle.resolve(generation, outcome);
                if transition.changed() {
                    self.processing_time = Some(elapsed);
                }
                transition.changed()
            }
            SessionMessage::Status(status) => {
                let changed = self.service_status != status;
                self.service_status = status;
                changed
            }
        }
    }

    fn spawn_request(&self, generation: Generation, acquisition: Acquisition) {
        let tx = self.tx.clone();
        let source = self.source.clone();
        let client = self.client.clone();

        // Spawn background thread for async work
        thread::spawn(move || {
            let started = Instant::now();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();

            let outcome = match runtime {
                Ok(rt) => rt.block_on(run_request(generation, acquisition, &source, &client, &tx)),
                Err(e) => Err(DetectionError::NetworkFailure(format!(
                    "Failed to create async runtime: {}",
                    e
                ))
                .into()),
            };

            let _ = tx.send(SessionMessage::Resolved {
                generation,
                outcome,
                elapsed: started.elapsed(),
            });
        });
    }
}

async fn run_request(
    generation: Generation,
    acquisition: Acquisition,
    source: &ImageSource,
    client: &DetectionClient,
    tx: &Sender<SessionMessage>,
) -> Result<Vec<Detection>, RequestError> {
    let captured = match acquisition {
        Acquisition::Capture => source.capture().await?,
        Acquisition::Upload(path) => source.accept(&path).await?,
    };

    let _ = tx.send(SessionMessage::Preview {
        generation,
        preview: captured.preview.clone(),
    });

    Ok(client.detect(&captured.payload).await?)
}
