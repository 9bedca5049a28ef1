//! Axum-based HTTP gateway.
//!
//! Routes:
//! - `GET  /webhook`   subscription handshake
//! - `POST /webhook`   signed event deliveries
//! - `GET  /authorize` account-linking page
//! - `GET  /health`    liveness probe
//! - anything else     static files from `gateway.public_dir`

pub mod authorize;

use crate::channels::MessengerChannel;
use crate::config::Config;
use crate::identity::SqliteIdentityStore;
use crate::providers::PandorabotsProvider;
use crate::relay::Relay;
use crate::security::constant_time_eq;
use crate::security::signature::{
    verify_delivery, Verification, SIGNATURE_256_HEADER, SIGNATURE_HEADER,
};
use crate::transform::TextPipeline;
use crate::webhook::{Dispatcher, WebhookBatch};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Run the HTTP gateway until Ctrl+C.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;

    let provider = Arc::new(PandorabotsProvider::new(&config.backend)?);
    let channel = Arc::new(MessengerChannel::new(&config.messenger)?);
    let identities = Arc::new(SqliteIdentityStore::open(&config.identity.database_path)?);
    let pipeline = TextPipeline::new(&config.persona)?;
    let relay = Relay::new(provider, channel, identities, pipeline);

    let state = AppState {
        config: Arc::new(config),
        dispatcher: Arc::new(Dispatcher::new(Arc::new(relay))),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let actual_port = listener.local_addr()?.port();
    let server_url = state.config.gateway.server_url.trim_end_matches('/');

    println!("🦊 keiko gateway listening on http://{host}:{actual_port}");
    println!("  Webhook callback URL: {server_url}/webhook");
    println!("  GET  /webhook   — subscription handshake");
    println!("  POST /webhook   — signed page events");
    println!("  GET  /authorize — account linking");
    println!("  GET  /health    — health check");
    println!(
        "  Static files: {}",
        state.config.gateway.public_dir.display()
    );
    if state.config.webhook.allow_unsigned {
        println!("  ⚠️  Unsigned webhook deliveries are ACCEPTED");
    }
    println!("  Press Ctrl+C to stop.\n");
    tracing::info!("Gateway started on {host}:{actual_port}");

    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_dir = state.config.gateway.public_dir.clone();
    Router::new()
        .route("/webhook", get(handle_webhook_verify).post(handle_webhook))
        .route("/authorize", get(authorize::handle_authorize))
        .route("/health", get(handle_health))
        .with_state(state)
        .fallback_service(ServeDir::new(public_dir))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health — always public (no secrets leaked)
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Subscription handshake query params
#[derive(Debug, serde::Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhook — platform subscription handshake
async fn handle_webhook_verify(
    State(state): State<AppState>,
    Query(params): Query<WebhookVerifyQuery>,
) -> impl IntoResponse {
    let expected = state.config.messenger.validation_token.as_str();
    let token_matches = !expected.is_empty()
        && params
            .verify_token
            .as_deref()
            .is_some_and(|t| constant_time_eq(t, expected));
    if params.mode.as_deref() == Some("subscribe") && token_matches {
        if let Some(challenge) = params.challenge {
            tracing::info!("Validating webhook");
            return (StatusCode::OK, challenge);
        }
        return (StatusCode::BAD_REQUEST, "Missing hub.challenge".to_string());
    }

    tracing::warn!("Failed validation. Make sure the validation tokens match.");
    (StatusCode::FORBIDDEN, "Forbidden".to_string())
}

/// POST /webhook — page event deliveries
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    match verify_delivery(
        &state.config.messenger.app_secret,
        &body,
        header(SIGNATURE_HEADER),
        header(SIGNATURE_256_HEADER),
        state.config.webhook.allow_unsigned,
    ) {
        Ok(Verification::Signed) => {}
        Ok(Verification::Unsigned) => {
            tracing::warn!("Accepting unsigned webhook delivery (webhook.allow_unsigned = true)");
        }
        Err(e) => {
            tracing::warn!("Webhook signature verification failed: {e}");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Invalid signature"})),
            );
        }
    }

    let batch = match serde_json::from_slice::<WebhookBatch>(&body) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Webhook JSON parse error: {e}");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid JSON payload"})),
            );
        }
    };

    if !batch.is_page_subscription() {
        tracing::warn!(
            "Ignoring webhook delivery for object '{}'",
            batch.object
        );
        return (StatusCode::OK, Json(serde_json::json!({"status": "ok"})));
    }

    // Acknowledge now; the platform retries deliveries that are not answered promptly.
    let dispatcher = Arc::clone(&state.dispatcher);
    tokio::spawn(async move {
        let summary = dispatcher.dispatch_batch(batch).await;
        tracing::info!(
            "Webhook batch done: {} handled, {} skipped, {} failed",
            summary.handled,
            summary.skipped,
            summary.failed
        );
    });

    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
