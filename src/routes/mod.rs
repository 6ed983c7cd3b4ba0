//! HTTP routes for sexton

pub mod alarm;
pub mod content;
pub mod health;
pub mod playback;
pub mod worker;

pub use alarm::{handle_get_settings, handle_pick, handle_put_settings};
pub use content::{handle_content_insert, handle_content_query};
pub use health::{health_check, version_info};
pub use playback::handle_playback_page;
pub use worker::{handle_worker_message, handle_worker_status};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::types::SextonError;

/// Build a JSON response with the given status
pub(crate) fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Build a JSON error response
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    json_response(status, body.to_string())
}

/// Map a component error onto an HTTP status
///
/// Validation failures are the client's fault, missing resources are 404,
/// repository and origin trouble surface as 502, everything else is a 500.
pub(crate) fn error_to_response(err: &SextonError) -> Response<Full<Bytes>> {
    let status = match err {
        SextonError::Validation(_) => StatusCode::BAD_REQUEST,
        SextonError::NotFound(_) => StatusCode::NOT_FOUND,
        SextonError::Repository(_) | SextonError::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (SextonError::Validation("bad".into()), 400),
            (SextonError::NotFound("gone".into()), 404),
            (SextonError::Repository("down".into()), 502),
            (SextonError::Upstream("down".into()), 502),
            (SextonError::Storage("disk".into()), 500),
            (SextonError::Internal("oops".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(error_to_response(&err).status().as_u16(), expected);
        }
    }
}
