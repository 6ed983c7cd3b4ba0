//! Playback handoff
//!
//! Serializes a content descriptor into the `content` query parameter of
//! the fixed playback route and opens that URL in the user's browsing
//! surface. The launcher sits behind the `SurfaceOpener` seam.

use std::sync::Arc;
use tracing::{info, warn};

use crate::settings::ContentRef;
use crate::types::{Result, SextonError};

/// Fixed playback route served by this daemon
pub const PLAYBACK_ROUTE: &str = "/alarm/play";

/// Trait for opening a browsing surface (allows mocking in tests)
#[async_trait::async_trait]
pub trait SurfaceOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the platform launcher
pub struct CommandOpener;

#[async_trait::async_trait]
impl SurfaceOpener for CommandOpener {
    async fn open(&self, url: &str) -> Result<()> {
        #[cfg(target_os = "macos")]
        let status = tokio::process::Command::new("open").arg(url).status().await;
        #[cfg(target_os = "linux")]
        let status = tokio::process::Command::new("xdg-open").arg(url).status().await;
        #[cfg(target_os = "windows")]
        let status = tokio::process::Command::new("cmd")
            .arg("/C")
            .arg("start")
            .arg("")
            .arg(url)
            .status()
            .await;
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        let status: std::io::Result<std::process::ExitStatus> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no browser launcher wired for this platform",
        ));

        let status = status
            .map_err(|e| SextonError::Playback(format!("Failed to launch browser: {}", e)))?;
        if !status.success() {
            return Err(SextonError::Playback(format!(
                "Browser launcher exited with {}",
                status
            )));
        }
        Ok(())
    }
}

/// Hands a selected descriptor off to a fresh playback surface
pub struct PlaybackHandoff {
    base_url: String,
    opener: Arc<dyn SurfaceOpener>,
}

impl PlaybackHandoff {
    pub fn new(base_url: &str, opener: Arc<dyn SurfaceOpener>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            opener,
        }
    }

    /// Build the playback URL carrying the URL-encoded descriptor
    pub fn playback_url(&self, content: &ContentRef) -> Result<String> {
        let json = serde_json::to_string(content)?;
        Ok(format!(
            "{}{}?content={}",
            self.base_url,
            PLAYBACK_ROUTE,
            urlencoding::encode(&json)
        ))
    }

    /// Open the playback surface for the descriptor; returns the URL opened
    pub async fn open(&self, content: &ContentRef) -> Result<String> {
        let url = self.playback_url(content)?;
        info!(content_id = content.id, title = %content.title, "Opening playback surface");
        if let Err(e) = self.opener.open(&url).await {
            warn!("Playback surface failed to open: {}", e);
            return Err(e);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKind;
    use std::sync::Mutex;

    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SurfaceOpener for RecordingOpener {
        async fn open(&self, url: &str) -> Result<()> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn sample_content() -> ContentRef {
        ContentRef {
            id: 1,
            title: "Grace & Truth".to_string(),
            kind: ContentKind::Sermon,
            video_url: Some("https://x/v.mp4".to_string()),
            audio_url: None,
        }
    }

    #[test]
    fn test_playback_url_shape() {
        let handoff = PlaybackHandoff::new(
            "http://127.0.0.1:8080/",
            Arc::new(RecordingOpener {
                opened: Mutex::new(vec![]),
            }),
        );
        let url = handoff.playback_url(&sample_content()).unwrap();
        assert!(url.starts_with("http://127.0.0.1:8080/alarm/play?content="));
        // No raw JSON punctuation may survive encoding
        assert!(!url.contains('{'));
        assert!(!url.contains('"'));
        assert!(!url.contains('&') || url.find('&').unwrap() > url.find('?').unwrap());
    }

    #[test]
    fn test_payload_round_trips_through_encoding() {
        let handoff = PlaybackHandoff::new(
            "http://127.0.0.1:8080",
            Arc::new(RecordingOpener {
                opened: Mutex::new(vec![]),
            }),
        );
        let content = sample_content();
        let url = handoff.playback_url(&content).unwrap();
        let encoded = url.split("content=").nth(1).unwrap();
        let decoded = urlencoding::decode(encoded).unwrap();
        let parsed: ContentRef = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed, content);
    }

    #[tokio::test]
    async fn test_open_drives_the_opener() {
        let opener = Arc::new(RecordingOpener {
            opened: Mutex::new(vec![]),
        });
        let handoff = PlaybackHandoff::new("http://127.0.0.1:8080", opener.clone());
        let url = handoff.open(&sample_content()).await.unwrap();
        let opened = opener.opened.lock().unwrap();
        assert_eq!(opened.as_slice(), [url]);
    }
}
