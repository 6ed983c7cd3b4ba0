//! Health and version endpoints
//!
//! - /health - liveness probe, 200 whenever the daemon is running
//! - /version - build info for deployment verification
//!
//! The health body carries enough state for a dashboard one-liner: worker
//! phase, alarm armed/target, and whether a content repository is wired up.
//! `status` reads "online" once the cache worker has activated and
//! "degraded" while it is still installing, waiting, or redundant.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::{WorkerPhase, CACHE_GENERATION};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    /// "online" once the worker is active, "degraded" otherwise
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since process start
    pub uptime: u64,
    pub timestamp: String,
    pub worker: WorkerHealth,
    pub alarm: AlarmHealth,
    pub repository: RepositoryHealth,
}

#[derive(Serialize)]
pub struct WorkerHealth {
    pub phase: WorkerPhase,
    pub generation: &'static str,
}

#[derive(Serialize)]
pub struct AlarmHealth {
    pub armed: bool,
    pub alarm_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_title: Option<String>,
}

#[derive(Serialize)]
pub struct RepositoryHealth {
    pub configured: bool,
}

/// Handle liveness probe (/health)
pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let phase = state.worker.phase().await;
    let settings = state.settings.get().await;

    let response = HealthResponse {
        healthy: true,
        status: if phase == WorkerPhase::Active {
            "online"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        worker: WorkerHealth {
            phase,
            generation: CACHE_GENERATION,
        },
        alarm: AlarmHealth {
            armed: settings.is_armed(),
            alarm_time: settings.alarm_time.to_string(),
            selected_title: settings.selected_content.map(|c| c.title),
        },
        repository: RepositoryHealth {
            configured: state.repository.is_some(),
        },
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "sexton",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
