//! HTTP surface: base64 image in, state plus annotated JPEG out.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::annotate::AnnotateOptions;
use crate::classifier::{FrameState, LampColor};
use crate::pipeline::{Detection, Detector};

/// Request bodies above this size are refused with 413.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const INDEX_HTML: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>lampwatch</title></head>
<body style="font-family:sans-serif">
  <h2>Traffic light detector</h2>
  <input type="file" id="file" accept="image/*">
  <p id="status" style="font-family:monospace">idle</p>
  <img id="result" style="max-width:100%">
  <script>
  document.getElementById('file').onchange = (ev) => {
    const f = ev.target.files[0]; if (!f) return;
    const status = document.getElementById('status');
    const reader = new FileReader();
    reader.onload = async () => {
      status.textContent = 'detecting...';
      const resp = await fetch('/detect', { method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ image: reader.result }) });
      const body = await resp.json();
      if (!resp.ok) { status.textContent = body.error; return; }
      status.textContent = body.status + ' ' + JSON.stringify(body.detected_colors);
      document.getElementById('result').src = 'data:image/jpeg;base64,' + body.image;
    };
    reader.readAsDataURL(f);
  };
  </script>
</body></html>"#;

#[derive(Clone)]
struct AppState {
    detector: Arc<Detector>,
    options: AnnotateOptions,
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Human-facing status line ("NO LIGHT DETECTED" when nothing is lit).
    pub status: String,
    pub state: FrameState,
    /// Annotated frame, base64 JPEG.
    pub image: String,
    pub detected_colors: Vec<LampColor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(detector: Arc<Detector>) -> Router {
    let state = AppState {
        detector,
        options: AnnotateOptions::default(),
    };
    Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(detector: Arc<Detector>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Listener has no local address")?;

    tracing::info!("Listening on http://{}", local);
    tracing::info!("POST /detect with {{\"image\": \"<base64>\"}}; Ctrl+C stops the server");

    axum::serve(listener, router(detector))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large. Maximum size is 16MB.",
            );
        }
        Err(rejection) => {
            tracing::debug!("Rejected detect request: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, "No image data provided");
        }
    };

    let Some(data) = request.image.filter(|s| !s.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No image data provided");
    };

    let detector = state.detector.clone();
    let options = state.options;
    let outcome = tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, Detection), Response> {
        let frame = decode_image(&data).map_err(|e| {
            tracing::debug!("Undecodable upload: {:#}", e);
            error_response(StatusCode::BAD_REQUEST, "Invalid image data")
        })?;
        let internal = |e: anyhow::Error| {
            tracing::error!("Detection failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        };
        let (annotated, detection) = detector
            .process(&frame, &options)
            .map_err(|e| internal(e.into()))?;
        let jpeg = encode_jpeg(&annotated).map_err(internal)?;
        Ok((jpeg, detection))
    })
    .await;

    match outcome {
        Ok(Ok((jpeg, detection))) => {
            tracing::info!(
                state = %detection.state,
                regions = detection.verdicts.len(),
                "Detect request served"
            );
            Json(DetectResponse {
                status: detection.state.status_message().to_string(),
                state: detection.state,
                image: BASE64.encode(jpeg),
                detected_colors: detection.detected_colors,
            })
            .into_response()
        }
        Ok(Err(response)) => response,
        Err(e) => {
            tracing::error!("Detection task aborted: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Decode a base64 image, tolerating a `data:<mime>;base64,` prefix.
pub fn decode_image(data: &str) -> Result<RgbImage> {
    let payload = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .context("Payload is not valid base64")?;
    let decoded = image::load_from_memory(&bytes).context("Payload is not a supported image")?;
    Ok(decoded.to_rgb8())
}

pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    frame
        .write_to(&mut buf, ImageFormat::Jpeg)
        .context("Failed to encode JPEG")?;
    Ok(buf.into_inner())
}
