//! Cache worker control routes
//!
//! - POST /worker/message - out-of-band control channel; currently the one
//!   recognized command is `{"type": "skip-waiting"}`
//! - GET /worker/status - lifecycle phase, cache generations, serve counters

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cache::{WorkerCommand, WorkerPhase, WorkerStatsSnapshot, CACHE_GENERATION};
use crate::routes::{error_response, json_response};
use crate::server::AppState;

#[derive(Serialize)]
struct MessageResponse {
    phase: WorkerPhase,
}

#[derive(Serialize)]
struct WorkerStatusResponse {
    phase: WorkerPhase,
    current_generation: &'static str,
    generations: Vec<String>,
    skip_waiting: bool,
    stats: WorkerStatsSnapshot,
}

/// Handle POST /worker/message
///
/// Unrecognized commands are a 400; a recognized one is accepted with 202
/// and the phase it left the worker in.
pub async fn handle_worker_message(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid body"),
    };

    let command: WorkerCommand = match serde_json::from_slice(&body_bytes) {
        Ok(c) => c,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Unrecognized worker command: {}", e),
            )
        }
    };

    info!(?command, "Worker control message");
    let phase = state.worker.message(command).await;

    let body = serde_json::to_string(&MessageResponse { phase })
        .unwrap_or_else(|_| r#"{"phase":"unknown"}"#.to_string());
    json_response(StatusCode::ACCEPTED, body)
}

/// Handle GET /worker/status
pub async fn handle_worker_status(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mut generations = state.worker.generation_names();
    generations.sort();

    let response = WorkerStatusResponse {
        phase: state.worker.phase().await,
        current_generation: CACHE_GENERATION,
        generations,
        skip_waiting: state.worker.auto_skip(),
        stats: state.worker.stats(),
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());
    json_response(StatusCode::OK, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_response_shape() {
        let body = serde_json::to_string(&MessageResponse {
            phase: WorkerPhase::Active,
        })
        .unwrap();
        assert_eq!(body, r#"{"phase":"active"}"#);
    }
}
