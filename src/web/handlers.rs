//! Control-surface handlers
//!
//! Overlay and blocking mutations are GET endpoints with query subsets,
//! matching the streamer's remote-control clients; every response uses
//! the unified `{success, message}` envelope or a JSON snapshot.

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::blocking::BlockingConfig;
use crate::error::{AppError, Result};
use crate::overlay::{OverlayConfig, OverlayPosition};
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

fn ok(message: impl Into<String>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        message: message.into(),
    })
}

pub async fn health() -> Json<StatusResponse> {
    ok("ok")
}

/// Query text uses literal `\n` for line breaks
fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

pub async fn overlay_get(State(state): State<Arc<AppState>>) -> Json<OverlayConfig> {
    Json(state.overlay.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct OverlaySetParams {
    pub text: Option<String>,
    pub position: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub scale: Option<u32>,
    pub y_color: Option<u8>,
    pub u_color: Option<u8>,
    pub v_color: Option<u8>,
    pub bg_enabled: Option<bool>,
    pub bg_y: Option<u8>,
    pub bg_u: Option<u8>,
    pub bg_v: Option<u8>,
    pub bg_alpha: Option<u8>,
    pub padding: Option<u32>,
    pub enabled: Option<bool>,
}

pub async fn overlay_set(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OverlaySetParams>,
) -> Result<Json<OverlayConfig>> {
    // Validate everything before touching the shared config
    let position = params
        .position
        .as_deref()
        .map(|p| p.parse::<OverlayPosition>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let current = state.overlay.snapshot();

    if let Some(text) = &params.text {
        state.overlay.set_text(&unescape_newlines(text));
    }
    if position.is_some() || params.x.is_some() || params.y.is_some() {
        state.overlay.set_position(
            position.unwrap_or(current.position),
            params.x.unwrap_or(current.x),
            params.y.unwrap_or(current.y),
        );
    }
    if let Some(scale) = params.scale {
        state.overlay.set_scale(scale);
    }
    if params.y_color.is_some() || params.u_color.is_some() || params.v_color.is_some() {
        state.overlay.set_color(
            params.y_color.unwrap_or(current.y_color),
            params.u_color.unwrap_or(current.u_color),
            params.v_color.unwrap_or(current.v_color),
        );
    }
    if params.bg_enabled.is_some()
        || params.bg_y.is_some()
        || params.bg_u.is_some()
        || params.bg_v.is_some()
        || params.bg_alpha.is_some()
    {
        state.overlay.set_background(
            params.bg_enabled.unwrap_or(current.background),
            params.bg_y.unwrap_or(current.bg_y),
            params.bg_u.unwrap_or(current.bg_u),
            params.bg_v.unwrap_or(current.bg_v),
            params.bg_alpha.unwrap_or(current.bg_alpha),
        );
    }
    if let Some(padding) = params.padding {
        state.overlay.set_padding(padding);
    }
    if let Some(enabled) = params.enabled {
        state.overlay.set_enabled(enabled);
    }

    Ok(Json(state.overlay.snapshot()))
}

// ---------------------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------------------

/// Snapshot without the background payload
#[derive(Debug, Serialize)]
pub struct BlockingSnapshot {
    pub enabled: bool,
    pub bg_valid: bool,
    pub bg_width: u32,
    pub bg_height: u32,
    pub preview_x: i32,
    pub preview_y: i32,
    pub preview_w: u32,
    pub preview_h: u32,
    pub preview_enabled: bool,
    pub text_vocab: String,
    pub text_stats: String,
    pub text_vocab_scale: u32,
    pub text_stats_scale: u32,
    pub text_y: u8,
    pub text_u: u8,
    pub text_v: u8,
    pub box_y: u8,
    pub box_u: u8,
    pub box_v: u8,
    pub box_alpha: u8,
}

impl From<&BlockingConfig> for BlockingSnapshot {
    fn from(cfg: &BlockingConfig) -> Self {
        let (bg_valid, bg_width, bg_height) = match &cfg.background {
            Some(bg) => (true, bg.width, bg.height),
            None => (false, 0, 0),
        };
        Self {
            enabled: cfg.enabled,
            bg_valid,
            bg_width,
            bg_height,
            preview_x: cfg.preview.x,
            preview_y: cfg.preview.y,
            preview_w: cfg.preview.width,
            preview_h: cfg.preview.height,
            preview_enabled: cfg.preview.enabled,
            text_vocab: cfg.text_vocab.clone(),
            text_stats: cfg.text_stats.clone(),
            text_vocab_scale: cfg.vocab_scale,
            text_stats_scale: cfg.stats_scale,
            text_y: cfg.text_color.0,
            text_u: cfg.text_color.1,
            text_v: cfg.text_color.2,
            box_y: cfg.box_color.0,
            box_u: cfg.box_color.1,
            box_v: cfg.box_color.2,
            box_alpha: cfg.box_color.3,
        }
    }
}

pub async fn blocking_get(State(state): State<Arc<AppState>>) -> Json<BlockingSnapshot> {
    Json(BlockingSnapshot::from(&state.blocking.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct BlockingSetParams {
    pub enabled: Option<bool>,
    pub text_vocab: Option<String>,
    pub text_stats: Option<String>,
    pub text_vocab_scale: Option<u32>,
    pub text_stats_scale: Option<u32>,
    pub preview_x: Option<i32>,
    pub preview_y: Option<i32>,
    pub preview_w: Option<u32>,
    pub preview_h: Option<u32>,
    pub preview_enabled: Option<bool>,
    pub text_y: Option<u8>,
    pub text_u: Option<u8>,
    pub text_v: Option<u8>,
    pub box_y: Option<u8>,
    pub box_u: Option<u8>,
    pub box_v: Option<u8>,
    pub box_alpha: Option<u8>,
    pub clear: Option<bool>,
}

pub async fn blocking_set(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BlockingSetParams>,
) -> Json<BlockingSnapshot> {
    if params.clear == Some(true) {
        state.blocking.clear();
    }

    let current = state.blocking.snapshot();

    if let Some(text) = &params.text_vocab {
        state.blocking.set_text_vocab(&unescape_newlines(text));
    }
    if let Some(text) = &params.text_stats {
        state.blocking.set_text_stats(&unescape_newlines(text));
    }
    if let Some(scale) = params.text_vocab_scale {
        state.blocking.set_vocab_scale(scale);
    }
    if let Some(scale) = params.text_stats_scale {
        state.blocking.set_stats_scale(scale);
    }
    if params.preview_x.is_some()
        || params.preview_y.is_some()
        || params.preview_w.is_some()
        || params.preview_h.is_some()
        || params.preview_enabled.is_some()
    {
        state.blocking.set_preview(
            params.preview_x.unwrap_or(current.preview.x),
            params.preview_y.unwrap_or(current.preview.y),
            params.preview_w.unwrap_or(current.preview.width),
            params.preview_h.unwrap_or(current.preview.height),
            params.preview_enabled.unwrap_or(current.preview.enabled),
        );
    }
    if params.text_y.is_some() || params.text_u.is_some() || params.text_v.is_some() {
        state.blocking.set_text_color(
            params.text_y.unwrap_or(current.text_color.0),
            params.text_u.unwrap_or(current.text_color.1),
            params.text_v.unwrap_or(current.text_color.2),
        );
    }
    if params.box_y.is_some()
        || params.box_u.is_some()
        || params.box_v.is_some()
        || params.box_alpha.is_some()
    {
        state.blocking.set_box_color(
            params.box_y.unwrap_or(current.box_color.0),
            params.box_u.unwrap_or(current.box_color.1),
            params.box_v.unwrap_or(current.box_color.2),
            params.box_alpha.unwrap_or(current.box_color.3),
        );
    }
    if let Some(enabled) = params.enabled {
        state.blocking.set_enabled(enabled);
    }

    Json(BlockingSnapshot::from(&state.blocking.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct BackgroundParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Upload a background image: JPEG (detected by magic) or raw NV12 with
/// explicit `?width&height`.
pub async fn blocking_background(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BackgroundParams>,
    body: Bytes,
) -> Result<Json<StatusResponse>> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty background payload".into()));
    }

    if body.len() >= 2 && body[0] == 0xFF && body[1] == 0xD8 {
        let (w, h) = state.blocking.set_background_jpeg(&body)?;
        return Ok(ok(format!("background set: {}x{}", w, h)));
    }

    match (params.width, params.height) {
        (Some(width), Some(height)) => {
            state
                .blocking
                .set_background_nv12(body.to_vec(), width, height)?;
            Ok(ok(format!("background set: {}x{} (raw)", width, height)))
        }
        _ => Err(AppError::BadRequest(
            "not a JPEG; raw NV12 needs ?width&height".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Snapshots and stream
// ---------------------------------------------------------------------------

/// Current raw capture frame as NV12 bytes
pub async fn snapshot_raw(State(state): State<Arc<AppState>>) -> Result<Response> {
    let frame = state
        .raw_cache
        .snapshot()
        .ok_or_else(|| AppError::NotFound("no raw frame cached".into()))?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header("X-Frame-Width", frame.width.to_string())
        .header("X-Frame-Height", frame.height.to_string())
        .header("X-Frame-Stride", frame.stride.to_string())
        .body(Body::from(frame.data))
        .map_err(|e| AppError::VideoError(e.to_string()))?;
    Ok(response)
}

/// Latest encoded JPEG packet
pub async fn snapshot_jpeg(State(state): State<Arc<AppState>>) -> Result<Response> {
    let frame = state
        .hub
        .latest()
        .ok_or_else(|| AppError::NotFound("no encoded frame yet".into()))?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, frame.len().to_string())
        .body(Body::from(frame.data_bytes()))
        .map_err(|e| AppError::VideoError(e.to_string()))?;
    Ok(response)
}

const BOUNDARY: &str = "mpp-streamer-frame";

fn multipart_chunk(data: &Bytes) -> Bytes {
    let mut chunk = Vec::with_capacity(data.len() + 128);
    chunk.extend_from_slice(
        format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            BOUNDARY,
            data.len()
        )
        .as_bytes(),
    );
    chunk.extend_from_slice(data);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

/// Live MJPEG multipart stream
pub async fn stream_mjpeg(State(state): State<Arc<AppState>>) -> Response {
    let rx = state.hub.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        // Lagging consumers skip to the newest packet
        Ok(frame) => Some(Ok::<_, std::convert::Infallible>(multipart_chunk(
            &frame.data_bytes(),
        ))),
        Err(_) => None,
    });

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
