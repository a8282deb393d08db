//! Live reload endpoint.
//!
//! Browsers subscribe to `GET /__reload` as a Server-Sent Events stream and
//! receive a `reload` event whenever a reload binding fires.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use taskkit_core::{ReloadHub, ReloadSignal};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    hub: Arc<ReloadHub>,
    cancel: CancellationToken,
}

/// Creates the HTTP router.
pub fn create_router(hub: Arc<ReloadHub>, cancel: CancellationToken) -> Router {
    Router::new()
        .route("/__reload", get(reload_events))
        .route("/__health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { hub, cancel })
}

/// Serves the endpoint until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<ReloadHub>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let app = create_router(hub, cancel.clone());
    info!(addr = ?listener.local_addr().ok(), "live reload endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

fn to_event(signal: &ReloadSignal) -> Event {
    let paths: Vec<String> = signal
        .paths
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    Event::default()
        .event("reload")
        .id(signal.sequence.to_string())
        .data(serde_json::json!({ "paths": paths }).to_string())
}

/// Streams reload signals to one observer.
///
/// GET /__reload
async fn reload_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    debug!(observers = state.hub.observer_count(), "reload observer connected");

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(signal) => return Some((Ok::<_, Infallible>(to_event(&signal)), receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "reload observer lagged, skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .take_until(state.cancel.cancelled_owned());

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /__health
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "observers": state.hub.observer_count(),
    }))
}
