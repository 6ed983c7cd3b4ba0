//! Alarm settings routes
//!
//! - GET /alarm/settings - read the persisted blob; a `content` query
//!   parameter is ingested once and stripped with a 303 so a reload or
//!   bookmark never re-applies it
//! - PUT /alarm/settings - replace the whole blob
//! - POST /alarm/pick - pick random content of a kind and store it
//!
//! Malformed handoff payloads are dropped without blocking the page: the
//! redirect still happens and the stored settings stay untouched.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::content::ContentKind;
use crate::routes::{error_response, error_to_response, json_response};
use crate::server::AppState;
use crate::settings::AlarmSettings;

/// Query shape for the settings page; other parameters are ignored
#[derive(Debug, Deserialize)]
struct SettingsQuery {
    content: Option<String>,
}

/// Body shape for POST /alarm/pick
#[derive(Debug, Deserialize)]
struct PickRequest {
    #[serde(rename = "type")]
    kind: ContentKind,
}

fn settings_body(settings: &AlarmSettings) -> Response<Full<Bytes>> {
    match serde_json::to_string(settings) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Settings serialization failed: {}", e),
        ),
    }
}

fn strip_payload_redirect() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header("Location", "/alarm/settings")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Handle GET /alarm/settings
///
/// `query` is the raw query string. When it carries a content payload the
/// payload is consumed and the response is a 303 back to the bare path,
/// whether or not the payload parsed.
pub async fn handle_get_settings(state: Arc<AppState>, query: &str) -> Response<Full<Bytes>> {
    if !query.is_empty() {
        let parsed: SettingsQuery =
            serde_urlencoded::from_str(query).unwrap_or(SettingsQuery { content: None });
        if let Some(payload) = parsed.content {
            match state.settings.ingest_handoff_payload(&payload).await {
                Ok(settings) => info!(
                    title = ?settings.selected_content.map(|c| c.title),
                    "Accepted URL-carried content selection"
                ),
                Err(e) => warn!("Dropped malformed content payload: {}", e),
            }
            return strip_payload_redirect();
        }
    }

    let settings = state.settings.get().await;
    settings_body(&settings)
}

/// Handle PUT /alarm/settings
pub async fn handle_put_settings(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid body"),
    };

    let settings: AlarmSettings = match serde_json::from_slice(&body_bytes) {
        Ok(s) => s,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid settings: {}", e))
        }
    };

    match state.settings.set(&settings).await {
        Ok(()) => {
            info!(
                alarm_time = %settings.alarm_time,
                active = settings.is_alarm_active,
                "Alarm settings replaced"
            );
            settings_body(&settings)
        }
        Err(e) => error_to_response(&e),
    }
}

/// Handle POST /alarm/pick
///
/// Picks one random record of the requested kind from the repository and
/// stores it as the selected content. 503 when no repository is configured,
/// 404 when the collection is empty.
pub async fn handle_pick(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let picker = match &state.picker {
        Some(p) => Arc::clone(p),
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Content repository not configured",
            )
        }
    };

    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid body"),
    };

    let pick: PickRequest = match serde_json::from_slice(&body_bytes) {
        Ok(p) => p,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid pick request: {}", e))
        }
    };

    let content = match picker.pick(pick.kind).await {
        Ok(c) => c,
        Err(e) => return error_to_response(&e),
    };

    match state.settings.set_selected_content(content).await {
        Ok(settings) => settings_body(&settings),
        Err(e) => error_to_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_query_decodes_payload() {
        let query = "content=%7B%22id%22%3A3%2C%22title%22%3A%22Morning%20Dew%22%2C%22type%22%3A%22praise%22%7D";
        let parsed: SettingsQuery = serde_urlencoded::from_str(query).unwrap();
        let payload = parsed.content.unwrap();
        assert_eq!(payload, r#"{"id":3,"title":"Morning Dew","type":"praise"}"#);
    }

    #[test]
    fn test_settings_query_ignores_other_params() {
        let parsed: SettingsQuery = serde_urlencoded::from_str("tab=alarm&theme=dark").unwrap();
        assert!(parsed.content.is_none());
    }

    #[test]
    fn test_pick_request_parses_kind() {
        let pick: PickRequest = serde_json::from_str(r#"{"type": "sermon"}"#).unwrap();
        assert_eq!(pick.kind, ContentKind::Sermon);
        assert!(serde_json::from_str::<PickRequest>(r#"{"type": "hymn"}"#).is_err());
    }

    #[test]
    fn test_redirect_strips_to_bare_path() {
        let response = strip_payload_redirect();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("Location").unwrap(),
            "/alarm/settings"
        );
    }
}
