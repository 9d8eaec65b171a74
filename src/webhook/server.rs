//! HTTP surface: callback endpoints and health probes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::orchestrator::dispatcher::{DispatchOutcome, Dispatcher};
use crate::{AppError, Result};

use super::codec::{CallbackCodec, CallbackQuery};
use super::xml::parse_inbound;

/// Acknowledgment the platform expects for every callback.
pub const CALLBACK_ACK: &str = "success";

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Inbound message entry point.
    pub dispatcher: Dispatcher,
    /// Callback verification and decoding.
    pub codec: Arc<dyn CallbackCodec>,
}

/// Build the router with all routes mounted.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/callback", get(verify_callback).post(receive_callback))
        .route("/health", get(health))
        .route("/", get(root))
        .with_state(state)
}

async fn verify_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(echostr) = query.echostr.clone() else {
        return (StatusCode::BAD_REQUEST, "missing echostr").into_response();
    };
    match state.codec.verify_url(&query, &echostr) {
        Ok(echo) => {
            info!("callback url verified");
            echo.into_response()
        }
        Err(err) => {
            warn!(%err, "callback url verification failed");
            (StatusCode::FORBIDDEN, "error").into_response()
        }
    }
}

async fn receive_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> &'static str {
    let body = String::from_utf8_lossy(&body);
    let decoded = state
        .codec
        .decrypt(&query, &body)
        .and_then(|xml| parse_inbound(&xml));

    match decoded {
        Ok(message) => match state.dispatcher.dispatch(message) {
            DispatchOutcome::Accepted => debug!("callback accepted"),
            DispatchOutcome::Duplicate => debug!("callback was a redelivery"),
            DispatchOutcome::Ignored => {}
        },
        Err(err) => error!(%err, "failed to decode callback"),
    }
    CALLBACK_ACK
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "pending": state.dispatcher.tasks().pending_count(),
    }))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "clip-digest running" }))
}

/// Bind `addr` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the address cannot be bound or the server
/// fails.
pub async fn serve(state: AppState, addr: SocketAddr, ct: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    serve_listener(state, listener, ct).await
}

/// Serve on an already bound `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the server fails.
pub async fn serve_listener(
    state: AppState,
    listener: TcpListener,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("listener address: {err}")))?;
    info!(%local, "starting webhook server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("webhook server error: {err}")))?;

    info!("webhook server shut down");
    Ok(())
}
