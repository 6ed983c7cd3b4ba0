//! Playback surface rendering
//!
//! Decodes the `content` query parameter and renders the media page: a
//! video source wins over audio, neither gets an explicit notice, and a
//! malformed or missing payload degrades to the empty state. Decoding never
//! fails the request.

use crate::settings::ContentRef;

/// How the playback page renders a payload
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackView {
    Video(ContentRef),
    Audio(ContentRef),
    NoMedia(ContentRef),
    Empty,
}

/// Decode a raw (still percent-encoded) `content` parameter value
pub fn decode_payload(raw: Option<&str>) -> PlaybackView {
    let Some(raw) = raw else {
        return PlaybackView::Empty;
    };
    let decoded = match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(_) => return PlaybackView::Empty,
    };
    let content: ContentRef = match serde_json::from_str(&decoded) {
        Ok(content) => content,
        Err(_) => return PlaybackView::Empty,
    };

    if content.video_url.is_some() {
        PlaybackView::Video(content)
    } else if content.audio_url.is_some() {
        PlaybackView::Audio(content)
    } else {
        PlaybackView::NoMedia(content)
    }
}

/// Render the playback page for a decoded view
pub fn render_playback_page(view: &PlaybackView) -> String {
    let body = match view {
        PlaybackView::Video(content) => {
            let src = content.video_url.as_deref().unwrap_or_default();
            format!(
                r#"<h1>{}</h1>
      <video controls autoplay src="{}"></video>"#,
                escape_html(&content.title),
                escape_attr(src)
            )
        }
        PlaybackView::Audio(content) => {
            let src = content.audio_url.as_deref().unwrap_or_default();
            format!(
                r#"<h1>{}</h1>
      <audio controls autoplay src="{}"></audio>"#,
                escape_html(&content.title),
                escape_attr(src)
            )
        }
        PlaybackView::NoMedia(content) => {
            format!(
                r#"<h1>{}</h1>
      <p class="notice">No media available for this content.</p>"#,
                escape_html(&content.title)
            )
        }
        PlaybackView::Empty => r#"<p class="notice">Loading content...</p>"#.to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>HolySeeds Alarm</title>
    <style>
      body {{ margin: 0; background: #0b0d12; color: #f4f4f5; font-family: sans-serif;
             min-height: 100vh; display: flex; align-items: center; justify-content: center; }}
      main {{ max-width: 720px; padding: 24px; text-align: center; }}
      video, audio {{ width: 100%; margin-top: 16px; }}
      .notice {{ color: #a1a1aa; }}
    </style>
  </head>
  <body>
    <main>
      {}
    </main>
  </body>
</html>
"#,
        body
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(input: &str) -> String {
    escape_html(input).replace('"', "&quot;").replace('\'', "&#39;")
}
