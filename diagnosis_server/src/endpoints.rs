//! Endpoints of HTTP server.
//!
use std::{convert::Infallible, path::PathBuf, sync::Arc};

use axum::{
    body::StreamBody,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use bytes::Bytes;
use common::protocol::{PresenterState, SurfaceMsg};
use futures::Stream;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{config::Mode, meter::MeterSnapshot, session::Session, surface::BroadcastSurface};

const INDEX_HTML: &str = include_str!("../resources/index.html");

/// Shared state of all endpoints.
pub struct AppState {
    pub session: Arc<Session>,
    pub surface: Arc<BroadcastSurface>,
    pub triggers: mpsc::Sender<()>,
    pub presenter_state: watch::Receiver<PresenterState>,
    pub alert_sound: Option<PathBuf>,
    pub mode: Mode,
    /// Ends the long-lived stream responses so the server can shut down.
    pub shutdown: CancellationToken,
}

/// Settings the page adapts to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageConfig {
    pub mode: Mode,
    /// Mirror the camera stream like the classified frames.
    pub mirror: bool,
}

/// Build the router serving the page, the camera stream and display updates.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/stream", get(camera_stream))
        .route("/events", get(events))
        .route("/diagnose", post(diagnose))
        .route("/state", get(presenter_state))
        .route("/alert-sound", get(alert_sound))
        .route("/config", get(page_config))
        .route("/stats", get(stats))
        .layer(Extension(state))
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Live camera stream as multipart JPEG.
pub async fn camera_stream(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    log::info!("Camera stream requested");

    let stream = until_shutdown(jpeg_parts(state.session.subscribe_jpeg()), &state.shutdown);

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}

/// Multipart parts of the captured JPEG frames.
pub fn jpeg_parts(
    frames: broadcast::Receiver<Bytes>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    BroadcastStream::new(frames).filter_map(|res| match res {
        Ok(jpeg) => Some(Ok(as_jpeg_stream_item(&jpeg))),
        Err(err) => {
            log::debug!("Camera stream listener fell behind: {err}");
            None
        }
    })
}

/// Display updates as server-sent events, starting with the current presenter state.
pub async fn events(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, serde_json::Error>>> {
    let current = *state.presenter_state.borrow();
    let updates = display_updates(current, state.surface.subscribe());

    let stream =
        until_shutdown(updates, &state.shutdown).map(|msg| Event::default().json_data(msg));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// The `current` presenter state followed by every emitted update.
pub fn display_updates(
    current: PresenterState,
    updates: broadcast::Receiver<SurfaceMsg>,
) -> impl Stream<Item = SurfaceMsg> {
    let updates = BroadcastStream::new(updates).filter_map(|res| match res {
        Ok(msg) => Some(msg),
        Err(err) => {
            log::warn!("Display update listener fell behind: {err}");
            None
        }
    });

    tokio_stream::once(SurfaceMsg::State(current)).chain(updates)
}

/// End `stream` once `token` is cancelled.
fn until_shutdown<S: Stream>(
    stream: S,
    token: &CancellationToken,
) -> impl Stream<Item = S::Item> {
    futures::StreamExt::take_until(stream, token.clone().cancelled_owned())
}

/// Start a diagnosis cycle unless one is running.
pub async fn diagnose(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.mode == Mode::Continuous {
        return (StatusCode::CONFLICT, "diagnosis runs continuously");
    }
    if *state.presenter_state.borrow() != PresenterState::Idle {
        return (StatusCode::CONFLICT, "diagnosis in progress");
    }

    match state.triggers.try_send(()) {
        Ok(()) => (StatusCode::ACCEPTED, "diagnosis started"),
        Err(mpsc::error::TrySendError::Full(())) => {
            (StatusCode::CONFLICT, "diagnosis in progress")
        }
        Err(mpsc::error::TrySendError::Closed(())) => {
            (StatusCode::SERVICE_UNAVAILABLE, "presenter stopped")
        }
    }
}

pub async fn presenter_state(Extension(state): Extension<Arc<AppState>>) -> String {
    state.presenter_state.borrow().to_string()
}

pub async fn page_config(Extension(state): Extension<Arc<AppState>>) -> Json<PageConfig> {
    Json(PageConfig {
        mode: state.mode,
        mirror: state.session.mirrored(),
    })
}

pub async fn stats(Extension(state): Extension<Arc<AppState>>) -> Json<MeterSnapshot> {
    Json(state.session.meter().snapshot())
}

/// Serve the configured alert sound file.
pub async fn alert_sound(Extension(state): Extension<Arc<AppState>>) -> Response {
    let Some(path) = state.alert_sound.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(path).await {
        Ok(data) => ([(header::CONTENT_TYPE, audio_content_type(path))], data).into_response(),
        Err(err) => {
            log::error!("Failed to read alert sound {}: {err}", path.display());
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn audio_content_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

pub fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(
        &[
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}
