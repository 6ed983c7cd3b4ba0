//! Upload validation for the admin collaborator
//!
//! Media files are rejected locally before any network call: video must be
//! MP4, audio must be MPEG/MP3, and either is capped at 50 MiB. Failures
//! surface inline to the caller, never as process errors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Result, SextonError};

/// Upload size cap in bytes (50 MiB)
pub const MAX_MEDIA_BYTES: u64 = 50 * 1024 * 1024;

/// Kind of media being uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Media metadata supplied by the upload collaborator for validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Validate a media upload before it is allowed anywhere near the network
pub fn validate_media(kind: MediaKind, mime_type: &str, size_bytes: u64) -> Result<()> {
    match kind {
        MediaKind::Video => {
            if !mime_type.contains("video/mp4") {
                return Err(SextonError::Validation(
                    "Only MP4 video uploads are accepted".to_string(),
                ));
            }
        }
        MediaKind::Audio => {
            if !mime_type.contains("audio/mpeg") && !mime_type.contains("audio/mp3") {
                return Err(SextonError::Validation(
                    "Only MP3 audio uploads are accepted".to_string(),
                ));
            }
        }
    }

    if size_bytes > MAX_MEDIA_BYTES {
        return Err(SextonError::Validation(
            "Media exceeds the 50MB upload limit".to_string(),
        ));
    }

    Ok(())
}
