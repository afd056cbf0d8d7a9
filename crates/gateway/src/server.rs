use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::{Html, IntoResponse, Json},
        routing::get,
    },
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use {
    vidrelay_config::VidrelayConfig,
    vidrelay_dispatch::Dispatcher,
    vidrelay_fetch::{Fetcher, sweep_older_than},
    vidrelay_messenger::{MessengerClient, WebhookPayload, verify_subscription},
};

/// Age threshold for the sweep behind `GET /cleanup`.
const SWEEP_MAX_AGE: Duration = Duration::from_secs(60 * 60);

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VidrelayConfig>,
    pub dispatcher: Arc<Dispatcher>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the relay router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/webhook", get(verify_handler).post(event_handler))
        .route("/cleanup", get(cleanup_handler))
        .with_state(state)
}

/// Start the webhook HTTP server and block until it exits.
pub async fn start_gateway(config: VidrelayConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);

    tokio::fs::create_dir_all(&config.download.dir)
        .await
        .with_context(|| format!("create download dir {}", config.download.dir.display()))?;

    let fetcher = Fetcher::new(config.download.clone());
    if !fetcher.is_available().await {
        warn!(
            binary = %config.download.binary,
            "extraction tool not found, retrievals will fail"
        );
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&config),
        Arc::new(MessengerClient::new(config.messenger.clone())),
        Arc::new(fetcher),
    ));

    let app = build_app(AppState {
        config: Arc::clone(&config),
        dispatcher,
    });

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "vidrelay gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// Subscription-verification query parameters, exactly as the platform
/// names them.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_handler(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    match verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        &state.config.messenger.verify_token,
    ) {
        Some(challenge) => {
            info!("webhook subscription verified");
            challenge.into_response()
        },
        None => {
            warn!("webhook verification failed");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        },
    }
}

/// Event delivery. Whatever happens inside, the platform gets a 200 so it
/// does not retry the delivery.
async fn event_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) if payload.is_page_subscription() => {
            for event in payload.events() {
                state.dispatcher.handle_event(event).await;
            }
        },
        Ok(payload) => {
            debug!(object = %payload.object, "ignoring non-page webhook delivery");
        },
        Err(e) => {
            warn!(error = %e, "unparsable webhook body");
        },
    }
    (StatusCode::OK, "OK")
}

async fn cleanup_handler(State(state): State<AppState>) -> impl IntoResponse {
    match sweep_older_than(&state.config.download.dir, SWEEP_MAX_AGE).await {
        Ok(removed) => {
            info!(removed, "cleanup sweep finished");
            (
                StatusCode::OK,
                format!("Cleanup completed ({removed} files removed)"),
            )
        },
        Err(e) => {
            warn!(error = %e, "cleanup sweep failed");
            (StatusCode::OK, "Cleanup failed: see logs".to_string())
        },
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn home_handler() -> Html<&'static str> {
    Html(STATUS_PAGE)
}

const STATUS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Video Relay Bot</title></head>
<body>
  <h1>🎥 Video Relay Bot</h1>
  <p>The bot is running.</p>
  <h2>Supported sources</h2>
  <ul>
    <li>YouTube (youtube.com, youtu.be)</li>
    <li>TikTok (tiktok.com, vm.tiktok.com)</li>
    <li>Facebook (facebook.com, fb.watch)</li>
  </ul>
  <h2>How to use</h2>
  <ol>
    <li>Open the bot's page in Messenger</li>
    <li>Send a video link</li>
    <li>Get the video back in the chat</li>
  </ol>
  <h2>Endpoints</h2>
  <ul>
    <li><code>GET /webhook</code> &mdash; subscription verification</li>
    <li><code>POST /webhook</code> &mdash; event delivery</li>
    <li><code>GET /cleanup</code> &mdash; remove downloads older than an hour</li>
    <li><code>GET /health</code> &mdash; liveness probe</li>
  </ul>
</body>
</html>
"#;
