use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mockito::{Matcher, Server};
use plate_vision_core::capture::LatestFrame;
use plate_vision_core::config::{Config, TransportMode};
use plate_vision_core::dimensions::DimensionTracker;
use plate_vision_core::error::{DetectionError, RequestError};
use plate_vision_core::lifecycle::{LifecycleState, Transition};
use plate_vision_core::overlay::{ConfidenceBand, OverlayRenderer};
use plate_vision_core::{Acquisition, DetectionClient, DetectionSession, ImageSource};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const TWO_PLATES: &str = r#"{
    "results": [
        {"box": [100, 50, 300, 110], "text": "ABC123", "yolo_confidence": 0.93, "ocr_confidence": 0.88},
        {"box": [400, 300, 520, 340], "text": "XYZ9", "yolo_confidence": 0.42}
    ]
}"#;

fn config(server: &Server, transport: TransportMode) -> Config {
    Config::builder()
        .with_endpoint(server.url())
        .with_transport(transport)
        .build()
        .unwrap()
}

fn car_photo(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("car.png");
    DynamicImage::ImageRgb8(RgbImage::from_pixel(1280, 960, Rgb([90, 90, 90])))
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

#[test]
fn upload_settles_and_maps_to_display() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/detect")
        .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
        .match_body(Matcher::Regex(r#"name="file"; filename="car.png""#.to_string()))
        .with_header("content-type", "application/json")
        .with_body(TWO_PLATES)
        .create();

    let config = config(&server, TransportMode::Multipart);
    let dir = tempfile::tempdir().unwrap();
    let mut session = DetectionSession::new(
        DetectionClient::new(&config).unwrap(),
        ImageSource::uploads_only(config.jpeg_quality),
    );

    let generation = session.submit(Acquisition::Upload(car_photo(&dir)));
    assert!(session.view().is_pending);

    let state = session.wait_until_settled().clone();
    mock.assert();

    let LifecycleState::Settled {
        generation: settled,
        detections,
    } = state
    else {
        panic!("expected a settled state");
    };
    assert_eq!(settled, generation);
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[1].ocr_confidence(), 0.0);

    let view = session.view();
    let preview = view.preview.expect("preview of the uploaded image");
    assert_eq!((preview.width(), preview.height()), (1280, 960));
    assert!(view.processing_time.is_some());

    // 1280x960 shown at 640x480
    let mut tracker = DimensionTracker::from_config(&config);
    tracker.on_native_size_known(preview.width(), preview.height());
    let annotations =
        OverlayRenderer::new(config.confidence_thresholds).render(view.detections, tracker.current_scale());

    assert_eq!(annotations[0].bbox.to_array(), [50.0, 25.0, 150.0, 55.0]);
    assert_eq!(annotations[0].band, ConfidenceBand::High);
    assert_eq!(annotations[0].label, "ABC123 (93%)");
    assert_eq!(annotations[1].bbox.to_array(), [200.0, 150.0, 260.0, 170.0]);
    assert_eq!(annotations[1].band, ConfidenceBand::Low);
}

#[test]
fn json_transport_sends_data_uri() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/detect")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Regex(r#"^\{"image":"data:image/png;base64,"#.to_string()))
        .with_body(r#"{"results": []}"#)
        .create();

    let config = config(&server, TransportMode::EncodedJson);
    let dir = tempfile::tempdir().unwrap();
    let mut session = DetectionSession::new(
        DetectionClient::new(&config).unwrap(),
        ImageSource::uploads_only(config.jpeg_quality),
    );

    session.submit(Acquisition::Upload(car_photo(&dir)));
    let state = session.wait_until_settled().clone();
    mock.assert();

    assert!(matches!(state, LifecycleState::Settled { ref detections, .. } if detections.is_empty()));
    assert!(session.view().has_results);
}

#[test]
fn service_error_fails_and_can_be_cleared() {
    let mut server = Server::new();
    server
        .mock("POST", "/detect")
        .with_body(r#"{"error": "model not loaded"}"#)
        .create();

    let config = config(&server, TransportMode::Multipart);
    let dir = tempfile::tempdir().unwrap();
    let mut session = DetectionSession::new(
        DetectionClient::new(&config).unwrap(),
        ImageSource::uploads_only(config.jpeg_quality),
    );

    let generation = session.submit(Acquisition::Upload(car_photo(&dir)));
    let state = session.wait_until_settled().clone();

    assert_eq!(
        state,
        LifecycleState::Failed {
            generation,
            error: RequestError::Detection(DetectionError::ServiceError("model not loaded".to_string())),
        }
    );
    assert!(session.view().detections.is_empty());

    assert_eq!(session.clear(), Transition::Cleared);
    assert_eq!(session.view().state, &LifecycleState::Idle);
    assert!(session.view().preview.is_none());
}

#[test]
fn unreadable_upload_fails_without_calling_service() {
    let mut server = Server::new();
    let mock = server.mock("POST", "/detect").expect(0).create();

    let config = config(&server, TransportMode::Multipart);
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("notes.txt");
    std::fs::write(&bogus, "not an image").unwrap();

    let mut session = DetectionSession::new(
        DetectionClient::new(&config).unwrap(),
        ImageSource::uploads_only(config.jpeg_quality),
    );
    session.submit(Acquisition::Upload(bogus));

    let state = session.wait_until_settled().clone();
    mock.assert();
    assert!(matches!(
        state,
        LifecycleState::Failed {
            error: RequestError::Source(_),
            ..
        }
    ));
}

#[test]
fn latest_submission_wins() {
    let mut server = Server::new();
    server
        .mock("POST", "/detect")
        .with_body(TWO_PLATES)
        .expect_at_least(1)
        .create();

    let config = config(&server, TransportMode::Multipart);
    let feed = Arc::new(LatestFrame::new("test feed"));
    feed.push(DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]))));

    let mut session = DetectionSession::new(
        DetectionClient::new(&config).unwrap(),
        ImageSource::with_feed(feed, config.jpeg_quality),
    );

    session.submit(Acquisition::Capture);
    let second = session.submit(Acquisition::Capture);

    let state = session.wait_until_settled().clone();
    assert!(matches!(state, LifecycleState::Settled { generation, .. } if generation == second));

    // The first request may still report back; it must not disturb the result.
    std::thread::sleep(std::time::Duration::from_millis(200));
    session.poll();
    assert!(matches!(session.view().state, LifecycleState::Settled { generation, .. } if *generation == second));
    assert_eq!(session.view().preview.map(|p| p.width()), Some(320));
}
