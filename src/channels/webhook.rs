//! Webhook source — the messaging gateway POSTs message events over HTTP.
//!
//! - `POST /events` with a JSON `MessageEvent` → `202 Accepted`, or
//!   `422 Unprocessable Entity` when the body is not a valid event
//! - `GET /health` → `200 ok`
//!
//! When a token is configured, `/events` requires `Authorization: Bearer <token>`
//! and answers `401` before looking at the body.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use futures::stream;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::channels::MessageSource;
use crate::error::ChannelError;
use crate::pipeline::types::{EventStream, MessageEvent};

/// State shared between the source and its HTTP handlers.
struct WebhookInner {
    /// HTTP handler → `start()` stream.
    incoming_tx: mpsc::UnboundedSender<MessageEvent>,
    token: Option<SecretString>,
}

/// HTTP push source.
///
/// `start()` returns a stream backed by an mpsc receiver; the `/events`
/// handler pushes into the sender. Build the router before handing the
/// source to the channel manager.
pub struct WebhookSource {
    inner: Arc<WebhookInner>,
    /// Consumed once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<MessageEvent>>>,
}

impl WebhookSource {
    pub fn new(token: Option<SecretString>) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(WebhookInner { incoming_tx, token }),
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Axum router with `/events` and `/health`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/events", post(receive_event))
            .route("/health", get(health))
            .with_state(Arc::clone(&self.inner))
    }
}

#[async_trait]
impl MessageSource for WebhookSource {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: "webhook".to_string(),
                reason: "start() already called".to_string(),
            })?;

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }
}

fn authorized(inner: &WebhookInner, headers: &HeaderMap) -> bool {
    let Some(expected) = &inner.token else {
        return true;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|given| {
            bool::from(given.trim().as_bytes().ct_eq(expected.expose_secret().as_bytes()))
        })
}

async fn receive_event(
    State(inner): State<Arc<WebhookInner>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&inner, &headers) {
        warn!("Webhook call rejected: bad or missing token");
        return StatusCode::UNAUTHORIZED;
    }

    let event: MessageEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook call rejected: invalid event body");
            return StatusCode::UNPROCESSABLE_ENTITY;
        }
    };

    debug!(id = %event.id, from_self = event.from_self, "Webhook event received");
    match inner.incoming_tx.send(event) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => {
            warn!("Webhook event dropped: processor is not running");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
