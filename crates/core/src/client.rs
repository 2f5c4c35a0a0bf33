//! Client for the license plate detection service.
//!
//! One [`DetectionClient::detect`] call is one HTTP exchange. Failures are
//! reported as [`DetectionError`] so they can be stored in the request
//! lifecycle; the readiness probe feeds the connectivity indicator.

use crate::capture::Payload;
use crate::config::{Config, TransportMode};
use crate::detection::{Detection, StatusResponse, parse_detection_response};
use crate::error::{DetectionError, Result};
use crate::image_processing::ImageProcessor;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Connectivity of the detection service as shown in the header indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServiceStatus {
    #[default]
    Checking,
    Online,
    Offline,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => f.write_str("Checking..."),
            Self::Online => f.write_str("API Online"),
            Self::Offline => f.write_str("API Offline"),
        }
    }
}

/// Builds the `file` part. A MIME type reqwest rejects is dropped locally
/// and the part goes out as `application/octet-stream`.
fn file_part(payload: &Payload) -> Part {
    let part = Part::bytes(payload.bytes.clone()).file_name(payload.file_name.clone());
    match part.mime_str(&payload.mime) {
        Ok(part) => part,
        Err(e) => {
            warn!(mime = %payload.mime, "Unusable MIME type, sending as octet-stream: {}", e);
            Part::bytes(payload.bytes.clone()).file_name(payload.file_name.clone())
        }
    }
}

#[derive(Serialize)]
struct EncodedImage<'a> {
    image: &'a str,
}

/// Stateless client for the detection service.
///
/// One call is one request/response exchange. There is no retry and no
/// ordering between concurrent calls; callers tag requests themselves.
#[derive(Clone)]
pub struct DetectionClient {
    http: reqwest::Client,
    detect_url: Url,
    status_url: Url,
    transport: TransportMode,
}

impl DetectionClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            detect_url: config.detect_url()?,
            status_url: config.status_url()?,
            transport: config.transport_mode,
        })
    }

    pub fn transport(&self) -> TransportMode {
        self.transport
    }

    /// Sends an image to the detection endpoint and parses the detections.
    pub async fn detect(&self, payload: &Payload) -> std::result::Result<Vec<Detection>, DetectionError> {
        debug!(
            url = %self.detect_url,
            transport = %self.transport,
            size = payload.bytes.len(),
            "Sending detection request"
        );

        let request = self.http.post(self.detect_url.clone());
        let request = match self.transport {
            TransportMode::Multipart => {
                request.multipart(Form::new().part("file", file_part(payload)))
            }
            TransportMode::EncodedJson => {
                let uri = ImageProcessor::to_data_uri(&payload.bytes, &payload.mime);
                request.json(&EncodedImage { image: &uri })
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| DetectionError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectionError::NetworkFailure(format!(
                "Detection service returned HTTP {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DetectionError::NetworkFailure(e.to_string()))?;

        let detections = parse_detection_response(&body)?;
        debug!(count = detections.len(), "Detection response parsed");
        Ok(detections)
    }

    /// Asks the readiness probe whether the service can take requests.
    pub async fn probe(&self) -> std::result::Result<bool, DetectionError> {
        let response = self
            .http
            .get(self.status_url.clone())
            .send()
            .await
            .map_err(|e| DetectionError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectionError::NetworkFailure(format!(
                "Status probe returned HTTP {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DetectionError::NetworkFailure(e.to_string()))?;
        let status: StatusResponse = serde_json::from_slice(&body)
            .map_err(|e| DetectionError::MalformedResponse(e.to_string()))?;
        Ok(status.ready)
    }

    /// Probe result folded into the indicator states.
    pub async fn status(&self) -> ServiceStatus {
        match self.probe().await {
            Ok(true) => ServiceStatus::Online,
            Ok(false) => {
                info!("Detection service reports not ready");
                ServiceStatus::Offline
            }
            Err(e) => {
                info!("Detection service unreachable: {}", e);
                ServiceStatus::Offline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn payload() -> Payload {
        Payload {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3],
            mime: "image/jpeg".to_string(),
            file_name: "capture.jpg".to_string(),
        }
    }

    fn client(server: &mockito::Server, transport: TransportMode) -> DetectionClient {
        let config = Config::builder()
            .with_endpoint(server.url())
            .with_transport(transport)
            .build()
            .unwrap();
        DetectionClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn multipart_upload_parses_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/detect")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data; boundary=.*".to_string()),
            )
            .match_body(Matcher::Regex(r#"name="file"; filename="capture.jpg""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results": [{"box": [10, 20, 110, 60], "text": "KA01AB1234",
                    "yolo_confidence": 0.93, "ocr_confidence": 0.81}]}"#,
            )
            .create_async()
            .await;

        let detections = client(&server, TransportMode::Multipart)
            .detect(&payload())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].text(), "KA01AB1234");
        assert_eq!(detections[0].bbox().to_array(), [10.0, 20.0, 110.0, 60.0]);
    }

    #[tokio::test]
    async fn unusable_mime_still_uploads() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/detect")
            .match_body(Matcher::Regex(r#"name="file"; filename="capture.jpg""#.to_string()))
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        let mut bad = payload();
        bad.mime = "not a mime type".to_string();
        let detections = client(&server, TransportMode::Multipart).detect(&bad).await;

        mock.assert_async().await;
        assert_eq!(detections, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn json_transport_sends_data_uri() {
        let mut server = mockito::Server::new_async().await;
        let expected = ImageProcessor::to_data_uri(&payload().bytes, "image/jpeg");
        let mock = server
            .mock("POST", "/detect")
            .match_body(Matcher::Json(serde_json::json!({ "image": expected })))
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        let detections = client(&server, TransportMode::EncodedJson)
            .detect(&payload())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn service_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body(r#"{"results": [], "error": "Image decode failed"}"#)
            .create_async()
            .await;

        let err = client(&server, TransportMode::Multipart)
            .detect(&payload())
            .await
            .unwrap_err();
        assert_eq!(err, DetectionError::ServiceError("Image decode failed".into()));
    }

    #[tokio::test]
    async fn non_2xx_is_a_network_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(502)
            .with_body(r#"{"error": "bad gateway"}"#)
            .create_async()
            .await;

        let err = client(&server, TransportMode::Multipart)
            .detect(&payload())
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::NetworkFailure(m) if m.contains("502")));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/detect")
            .with_status(200)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let err = client(&server, TransportMode::Multipart)
            .detect(&payload())
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_failure() {
        let config = Config::builder()
            .with_endpoint("http://127.0.0.1:9")
            .build()
            .unwrap();
        let err = DetectionClient::new(&config)
            .unwrap()
            .detect(&payload())
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::NetworkFailure(_)));
    }

    #[tokio::test]
    async fn probe_reports_readiness() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"ready": true}"#)
            .create_async()
            .await;

        let client = client(&server, TransportMode::Multipart);
        assert_eq!(client.probe().await, Ok(true));
        assert_eq!(client.status().await, ServiceStatus::Online);
    }

    #[tokio::test]
    async fn probe_not_ready_or_failing_is_offline() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"ready": false}"#)
            .create_async()
            .await;
        assert_eq!(
            client(&server, TransportMode::Multipart).status().await,
            ServiceStatus::Offline
        );

        let mut down = mockito::Server::new_async().await;
        down.mock("GET", "/health").with_status(503).create_async().await;
        assert_eq!(
            client(&down, TransportMode::Multipart).status().await,
            ServiceStatus::Offline
        );
    }

    #[test]
    fn status_labels() {
        assert_eq!(ServiceStatus::default().to_string(), "Checking...");
        assert_eq!(ServiceStatus::Online.to_string(), "API Online");
        assert_eq!(ServiceStatus::Offline.to_string(), "API Offline");
    }
}
