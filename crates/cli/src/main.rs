use plate_vision_core::{
    Acquisition, AppError, DetectionSession, ImageSource, LifecycleState, PlateVision, ServiceStatus,
    config::{ConfidenceThresholds, ConfigOverrides, TransportMode},
    detection::Detection,
    init,
    overlay::{ConfidenceBand, percent},
};
use anyhow::{Context, Result, bail};
use arboard::Clipboard;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image file to send for detection (with --gui, opened in the viewer)
    #[arg(short, long, conflicts_with = "screen")]
    image: Option<PathBuf>,

    /// Capture this monitor and send the frame for detection
    #[arg(long)]
    screen: Option<usize>,

    /// List available monitors and exit
    #[arg(long)]
    list_monitors: bool,

    /// Check whether the detection service is reachable and exit
    #[arg(long)]
    status: bool,

    /// Override the service endpoint defined in .env
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Wire format for uploads: multipart or json
    #[arg(short, long)]
    transport: Option<String>,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Copy the recognized plate texts to clipboard
    #[arg(short, long, default_value_t = false)]
    copy: bool,

    /// Open the desktop viewer
    #[arg(long, default_value_t = false)]
    gui: bool,

    /// Log debug details (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    let args = Args::parse();
    init_tracing(args.verbose);

    // Handle --list-monitors
    if args.list_monitors {
        println!("Available monitors:");
        for info in plate_vision_core::ScreenFeed::list().context("Failed to enumerate monitors")? {
            println!("{}", info);
        }
        return Ok(());
    }

    // Load config and apply CLI overrides
    let overrides = ConfigOverrides::from_env()
        .context("Failed to load configuration")?
        .merge(cli_overrides(&args)?);
    let app = PlateVision::with_overrides(overrides).context("Invalid configuration")?;
    debug!(
        endpoint = %app.config().service_endpoint,
        transport = %app.config().transport_mode,
        "Configuration loaded"
    );

    if args.status {
        let status = app.client()?.status().await;
        println!("{} ({})", status, app.config().service_endpoint);
        if status != ServiceStatus::Online {
            std::process::exit(1);
        }
        return Ok(());
    }

    match args.mode() {
        Mode::Upload(path) => {
            let session = app.session(app.uploads())?;
            let thresholds = app.config().confidence_thresholds;
            run_headless(session, Acquisition::Upload(path), thresholds, &args).await
        }
        Mode::Screen(index) => {
            let source = app
                .screen_source(index)
                .context("Failed to open monitor. Try using --list-monitors to check indices")?;
            let session = app.session(source)?;
            let thresholds = app.config().confidence_thresholds;
            run_headless(session, Acquisition::Capture, thresholds, &args).await
        }
        Mode::Viewer { screen, upload } => {
            let source = viewer_source(&app, screen)?;
            app.run_viewer(source, upload).context("Viewer failed")
        }
    }
}

/// What a run does, decided from the flags alone.
#[derive(Debug, PartialEq, Eq)]
enum Mode {
    /// Send one file and print the result.
    Upload(PathBuf),
    /// Capture one monitor and print the result.
    Screen(usize),
    /// Open the viewer, optionally on a monitor and with a first upload.
    Viewer {
        screen: Option<usize>,
        upload: Option<PathBuf>,
    },
}

impl Args {
    fn mode(&self) -> Mode {
        match (&self.image, self.screen) {
            (Some(path), _) if !self.gui => Mode::Upload(path.clone()),
            (None, Some(index)) if !self.gui => Mode::Screen(index),
            (upload, screen) => Mode::Viewer {
                screen,
                upload: upload.clone(),
            },
        }
    }
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cli_overrides(args: &Args) -> Result<ConfigOverrides> {
    let transport = args
        .transport
        .as_deref()
        .map(|t| {
            t.parse::<TransportMode>()
                .with_context(|| format!("Unknown transport '{}'", t))
        })
        .transpose()?;

    Ok(ConfigOverrides {
        endpoint: args.endpoint.clone(),
        transport,
        ..Default::default()
    })
}

/// Picks the viewer's live feed: the requested monitor, otherwise the
/// primary one if any, otherwise uploads only.
fn viewer_source(app: &PlateVision, screen: Option<usize>) -> Result<ImageSource> {
    if let Some(index) = screen {
        return app
            .screen_source(index)
            .context("Failed to open monitor. Try using --list-monitors to check indices");
    }
    match app.screen_source(0) {
        Ok(source) => Ok(source),
        Err(e) => {
            warn!("No live feed available, uploads only: {}", e);
            Ok(app.uploads())
        }
    }
}

async fn run_headless(
    mut session: DetectionSession,
    acquisition: Acquisition,
    thresholds: ConfidenceThresholds,
    args: &Args,
) -> Result<()> {
    eprintln!("Processing image...");

    // The session blocks while it waits, keep it off the async runtime
    let session = tokio::task::spawn_blocking(move || {
        session.submit(acquisition);
        session.wait_until_settled();
        session
    })
    .await
    .context("Detection worker panicked")?;

    let view = session.view();
    match view.state {
        LifecycleState::Settled { detections, .. } => {
            if args.json {
                print_json(detections, view.processing_time)?;
            } else {
                print_results(detections, view.processing_time, &thresholds);
            }

            if args.copy {
                copy_to_clipboard(detections);
            }
            Ok(())
        }
        LifecycleState::Failed { error, .. } => {
            Err::<(), _>(AppError::from(error.clone())).context("Detection failed")
        }
        other => bail!("Request did not finish: {:?}", other),
    }
}

fn print_results(
    detections: &[Detection],
    elapsed: Option<Duration>,
    thresholds: &ConfidenceThresholds,
) {
    if detections.is_empty() {
        println!("No license plates detected.");
    }
    for (i, det) in detections.iter().enumerate() {
        let band = ConfidenceBand::classify(det.yolo_confidence(), thresholds);
        let b = det.bbox();
        println!(
            "{}. {:<12} YOLO {:>3}%  OCR {:>3}%  [{}]  box [{:.0}, {:.0}, {:.0}, {:.0}]",
            i + 1,
            if det.text().is_empty() { "(unread)" } else { det.text() },
            percent(det.yolo_confidence()),
            percent(det.ocr_confidence()),
            band.label(),
            b.x1,
            b.y1,
            b.x2,
            b.y2,
        );
    }
    if let Some(elapsed) = elapsed {
        println!("Processed in {}ms", elapsed.as_millis());
    }
}

fn print_json(detections: &[Detection], elapsed: Option<Duration>) -> Result<()> {
    let output = serde_json::json!({
        "results": detections,
        "processing_time_ms": elapsed.map(|d| d.as_millis() as u64),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn copy_to_clipboard(detections: &[Detection]) {
    let text = detections
        .iter()
        .map(|d| d.text())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    match Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text) {
                eprintln!("Warning: Failed to copy to clipboard: {}", e);
            } else {
                eprintln!("(Copied to clipboard)");
            }
        }
        Err(e) => eprintln!("Warning: Could not access clipboard: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("plate-vision").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn image_alone_runs_headless() {
        assert_eq!(parse(&["--image", "car.jpg"]).mode(), Mode::Upload("car.jpg".into()));
        assert_eq!(parse(&["--screen", "1"]).mode(), Mode::Screen(1));
    }

    #[test]
    fn gui_keeps_the_image() {
        assert_eq!(
            parse(&["--gui", "--image", "car.jpg"]).mode(),
            Mode::Viewer {
                screen: None,
                upload: Some("car.jpg".into()),
            }
        );
        assert_eq!(
            parse(&["--gui", "--screen", "2"]).mode(),
            Mode::Viewer {
                screen: Some(2),
                upload: None,
            }
        );
        assert_eq!(parse(&[]).mode(), Mode::Viewer { screen: None, upload: None });
    }

    #[test]
    fn image_and_screen_conflict() {
        assert!(Args::try_parse_from(["plate-vision", "--image", "a.jpg", "--screen", "0"]).is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_filter(0), "info");
        assert_eq!(default_filter(1), "debug");
        assert_eq!(default_filter(3), "trace");
    }

    #[test]
    fn flags_become_overrides() {
        let overrides = cli_overrides(&parse(&["--endpoint", "http://10.0.0.2:8000", "--transport", "json"])).unwrap();
        assert_eq!(overrides.endpoint.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(overrides.transport, Some(TransportMode::EncodedJson));
        assert!(overrides.high_confidence.is_none());

        assert!(cli_overrides(&parse(&["--transport", "grpc"])).is_err());
        assert!(cli_overrides(&parse(&[])).unwrap().is_empty());
    }
}
