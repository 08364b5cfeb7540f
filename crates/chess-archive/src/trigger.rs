//! Message-queue trigger endpoint.
//!
//! In `serve` mode the archiver sits behind a small HTTP server that accepts
//! Pub/Sub-style push deliveries. The message body is never interpreted: its
//! arrival is the trigger. Runs are serialised, so a delivery that lands
//! while a run is active is rejected with `409 Conflict` and left for the
//! queue to redeliver.
//!
//! # Routes
//!
//! - `POST /` - run the archiver once
//! - `GET /health` - liveness probe

use crate::archiver::{Archiver, RunStats};
use crate::Error;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shared state for trigger handlers.
#[derive(Clone)]
pub struct TriggerState {
    archiver: Arc<Archiver>,
    running: Arc<Mutex<()>>,
    run_timeout: Duration,
}

impl TriggerState {
    pub fn new(archiver: Arc<Archiver>, run_timeout: Duration) -> Self {
        Self {
            archiver,
            running: Arc::new(Mutex::new(())),
            run_timeout,
        }
    }
}

/// Push delivery envelope. Only used to label logs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PushEnvelope {
    pub message: PushMessage,
    pub subscription: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PushMessage {
    pub message_id: String,
    pub data: String,
}

/// Trigger failures mapped onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Another run holds the lock.
    #[error("a run is already in progress")]
    Busy,

    /// The run exceeded its deadline and was dropped.
    #[error("run timed out after {0:?}")]
    Timeout(Duration),

    /// The run failed.
    #[error(transparent)]
    Run(#[from] Error),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            Self::Busy => (StatusCode::CONFLICT, "busy"),
            Self::Timeout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "timeout"),
            Self::Run(_) => (StatusCode::INTERNAL_SERVER_ERROR, "run_failed"),
        };

        let body = ErrorResponse {
            error,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Build the trigger router.
pub fn router(state: TriggerState) -> Router {
    Router::new()
        .route("/", post(trigger))
        .route("/health", get(health))
        .with_state(state)
}

/// Run the archiver once for an incoming delivery.
pub async fn trigger(
    State(state): State<TriggerState>,
    body: Bytes,
) -> Result<Json<RunStats>, TriggerError> {
    let envelope: PushEnvelope = serde_json::from_slice(&body).unwrap_or_default();

    let Ok(_guard) = state.running.try_lock() else {
        tracing::warn!(
            message_id = %envelope.message.message_id,
            "trigger rejected, run already in progress"
        );
        return Err(TriggerError::Busy);
    };

    tracing::info!(
        message_id = %envelope.message.message_id,
        subscription = %envelope.subscription,
        "trigger received"
    );

    match tokio::time::timeout(state.run_timeout, state.archiver.run()).await {
        Ok(Ok(stats)) => Ok(Json(stats)),
        Ok(Err(e)) => Err(TriggerError::Run(e)),
        Err(_) => {
            tracing::error!(timeout = ?state.run_timeout, "archive run timed out");
            Err(TriggerError::Timeout(state.run_timeout))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::ArchiverConfig;
    use crate::sink::{DocumentSink, MemoryDocumentStore, Sink};
    use crate::source::GameSource;
    use crate::watermark::DocumentWatermark;
    use crate::Result;
    use async_trait::async_trait;
    use chess_archive_core::{RawGame, Transformer};
    use chrono::FixedOffset;

    struct StaticSource {
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl GameSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn list_games(&self, _username: &str, since: i64, _max: usize) -> Result<Vec<RawGame>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::Api {
                    status: 500,
                    body: "boom".into(),
                });
            }
            if since > 0 {
                return Ok(vec![]);
            }
            let line = r#"{"id":"abc","createdAt":1000,"players":{"white":{"user":{"id":"alice","name":"Alice"}},"black":{"aiLevel":3}},"winner":"white","pgn":"1. e4"}"#;
            Ok(vec![RawGame::decode("lichess", line)?])
        }
    }

    fn state(fail: bool, delay: Duration, timeout: Duration) -> TriggerState {
        let store = Arc::new(MemoryDocumentStore::new());
        let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(DocumentSink::new(store.clone()))];
        let archiver = Archiver::new(
            ArchiverConfig {
                username: "alice".into(),
                batch_limit: 10,
                max_in_flight: 2,
            },
            Arc::new(StaticSource { fail, delay }),
            Arc::new(DocumentWatermark::new(store)),
            Arc::new(Transformer::new("alice", FixedOffset::east_opt(0).unwrap())),
            sinks,
        );
        TriggerState::new(Arc::new(archiver), timeout)
    }

    fn envelope() -> Bytes {
        Bytes::from_static(
            br#"{"message":{"data":"e30=","messageId":"42"},"subscription":"projects/p/subscriptions/s"}"#,
        )
    }

    #[tokio::test]
    async fn test_trigger_runs_archiver() {
        let state = state(false, Duration::ZERO, Duration::from_secs(5));

        let Json(stats) = trigger(State(state.clone()), envelope()).await.unwrap();
        assert_eq!(stats.archived, 1);
        assert_eq!(stats.watermark_after, Some(1000));

        let Json(stats) = trigger(State(state), envelope()).await.unwrap();
        assert_eq!(stats.since, 1000);
        assert_eq!(stats.archived, 0);
    }

    #[tokio::test]
    async fn test_trigger_ignores_payload_shape() {
        let state = state(false, Duration::ZERO, Duration::from_secs(5));
        let result = trigger(State(state), Bytes::from_static(b"not json")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_busy_returns_conflict() {
        let state = state(false, Duration::ZERO, Duration::from_secs(5));
        let _held = state.running.lock().await;

        let err = trigger(State(state.clone()), envelope()).await.unwrap_err();
        assert!(matches!(err, TriggerError::Busy));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_trigger_failure_returns_500() {
        let state = state(true, Duration::ZERO, Duration::from_secs(5));
        let err = trigger(State(state), envelope()).await.unwrap_err();
        assert!(matches!(err, TriggerError::Run(Error::SourceFetch { .. })));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_timeout() {
        let state = state(false, Duration::from_secs(120), Duration::from_secs(60));
        let err = trigger(State(state), envelope()).await.unwrap_err();
        assert!(matches!(err, TriggerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }
}
