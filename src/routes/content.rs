//! Content repository routes
//!
//! Thin passthrough to the external PostgREST-style repository:
//!
//! - GET /content/{sermons|praises}?title=…&date=… - filtered listing
//! - POST /content/{sermons|praises} - insert one record; when the body
//!   carries a `media` descriptor it is validated locally first so an
//!   oversized or wrong-format upload never reaches the repository
//!
//! Both answer 503 when no repository is configured and 404 for a
//! collection segment that is not a known kind.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::content::{validate_media, ContentKind, ContentQuery, MediaDescriptor, NewContentRecord};
use crate::routes::{error_response, error_to_response, json_response};
use crate::server::AppState;
use crate::types::SextonError;

/// Search parameters accepted on the listing route
#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    title: Option<String>,
    date: Option<String>,
    limit: Option<usize>,
}

impl SearchQuery {
    fn into_content_query(self) -> ContentQuery {
        let defaults = ContentQuery::default();
        ContentQuery {
            title_contains: self.title.filter(|t| !t.is_empty()),
            date: self.date.filter(|d| !d.is_empty()),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

/// Insert body: the record plus an optional media descriptor to validate
#[derive(Debug, Deserialize)]
struct InsertRequest {
    #[serde(flatten)]
    record: NewContentRecord,
    #[serde(default)]
    media: Option<MediaDescriptor>,
}

fn parse_kind(segment: &str) -> Result<ContentKind, Response<Full<Bytes>>> {
    ContentKind::from_str(segment).map_err(|_| {
        error_response(
            StatusCode::NOT_FOUND,
            &format!("Unknown content collection {:?}", segment),
        )
    })
}

/// Handle GET /content/{kind}
pub async fn handle_content_query(
    state: Arc<AppState>,
    kind_segment: &str,
    query: &str,
) -> Response<Full<Bytes>> {
    let repository = match &state.repository {
        Some(r) => Arc::clone(r),
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Content repository not configured",
            )
        }
    };

    let kind = match parse_kind(kind_segment) {
        Ok(k) => k,
        Err(response) => return response,
    };

    let search: SearchQuery = serde_urlencoded::from_str(query).unwrap_or_default();
    match repository.query(kind, &search.into_content_query()).await {
        Ok(records) => match serde_json::to_string(&records) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => error_to_response(&SextonError::from(e)),
        },
        Err(e) => error_to_response(&e),
    }
}

/// Handle POST /content/{kind}
pub async fn handle_content_insert(
    req: Request<Incoming>,
    state: Arc<AppState>,
    kind_segment: &str,
) -> Response<Full<Bytes>> {
    let repository = match &state.repository {
        Some(r) => Arc::clone(r),
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Content repository not configured",
            )
        }
    };

    let kind = match parse_kind(kind_segment) {
        Ok(k) => k,
        Err(response) => return response,
    };

    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid body"),
    };

    let insert: InsertRequest = match serde_json::from_slice(&body_bytes) {
        Ok(i) => i,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid record: {}", e))
        }
    };

    if insert.record.title.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Title is required");
    }

    if let Some(ref media) = insert.media {
        if let Err(e) = validate_media(media.kind, &media.mime_type, media.size_bytes) {
            return error_to_response(&e);
        }
    }

    match repository.insert(kind, insert.record).await {
        Ok(record) => {
            info!(
                collection = kind.collection(),
                id = record.id,
                title = %record.title,
                "Content record inserted"
            );
            match serde_json::to_string(&record) {
                Ok(body) => json_response(StatusCode::CREATED, body),
                Err(e) => error_to_response(&SextonError::from(e)),
            }
        }
        Err(e) => error_to_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_parses_filters() {
        let search: SearchQuery =
            serde_urlencoded::from_str("title=grace&date=2024-03-01&limit=25").unwrap();
        let query = search.into_content_query();
        assert_eq!(query.title_contains.as_deref(), Some("grace"));
        assert_eq!(query.date.as_deref(), Some("2024-03-01"));
        assert_eq!(query.limit, 25);
    }

    #[test]
    fn test_empty_filters_drop_out() {
        let search: SearchQuery = serde_urlencoded::from_str("title=&date=").unwrap();
        let query = search.into_content_query();
        assert!(query.title_contains.is_none());
        assert!(query.date.is_none());
        assert_eq!(query.limit, ContentQuery::default().limit);
    }

    #[test]
    fn test_insert_request_with_media() {
        let raw = r#"{
            "title": "Amazing Grace",
            "audio_url": "https://x/a.mp3",
            "media": {"kind": "audio", "mime_type": "audio/mpeg", "size_bytes": 2048}
        }"#;
        let insert: InsertRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(insert.record.title, "Amazing Grace");
        assert!(insert.media.is_some());
    }

    #[test]
    fn test_insert_request_without_media() {
        let raw = r#"{"title": "Sunday Sermon", "date": "2024-03-01"}"#;
        let insert: InsertRequest = serde_json::from_str(raw).unwrap();
        assert!(insert.media.is_none());
        assert_eq!(insert.record.date.as_deref(), Some("2024-03-01"));
    }
}
