//! Playback page route
//!
//! GET /alarm/play?content=<url-encoded ContentRef JSON> renders a minimal
//! autoplay surface for the fired alarm. The `content` value is pulled out
//! of the query string still percent-encoded; `decode_payload` owns the
//! single decode step, so nothing here double-decodes a payload whose JSON
//! itself contains encoded characters.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::playback::{decode_payload, render_playback_page};

/// Pull one parameter's raw (still percent-encoded) value out of a query string
fn raw_query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Handle GET /alarm/play
pub fn handle_playback_page(query: &str) -> Response<Full<Bytes>> {
    let view = decode_payload(raw_query_param(query, "content"));
    let html = render_playback_page(&view);

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Cache-Control", "no-cache")
        .body(Full::new(Bytes::from(html)))
        .unwrap()
}
