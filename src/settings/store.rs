//! Alarm settings persistence
//!
//! One JSON blob at a fixed path under the data directory. An absent or
//! unparseable blob reads back as the documented defaults (07:00, no
//! content, inactive); writes replace the whole blob, last write wins.
//! A content descriptor may also arrive as a URL-carried payload from the
//! search surface; `ingest_handoff_payload` consumes it exactly once.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::content::ContentKind;
use crate::types::{Result, SextonError};

/// 24-hour wall-clock alarm target, rendered as "HH:MM"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(SextonError::Validation(format!(
                "Invalid alarm time {:02}:{:02}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl Default for AlarmTime {
    fn default() -> Self {
        Self { hour: 7, minute: 0 }
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for AlarmTime {
    type Err = SextonError;

    fn from_str(s: &str) -> Result<Self> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| SextonError::Validation(format!("Invalid alarm time {:?}", s)))?;
        if h.len() != 2 || m.len() != 2 {
            return Err(SextonError::Validation(format!(
                "Invalid alarm time {:?}",
                s
            )));
        }
        let hour: u8 = h
            .parse()
            .map_err(|_| SextonError::Validation(format!("Invalid alarm time {:?}", s)))?;
        let minute: u8 = m
            .parse()
            .map_err(|_| SextonError::Validation(format!("Invalid alarm time {:?}", s)))?;
        Self::new(hour, minute)
    }
}

impl Serialize for AlarmTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AlarmTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e| D::Error::custom(format!("{}", e)))
    }
}

/// Playable content descriptor selected for the alarm
///
/// Immutable once selected and replaced wholesale. This is the shape that
/// travels in the persisted blob and in the playback handoff URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// The alarm configuration blob
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettings {
    pub alarm_time: AlarmTime,
    pub selected_content: Option<ContentRef>,
    pub is_alarm_active: bool,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            alarm_time: AlarmTime::default(),
            selected_content: None,
            is_alarm_active: false,
        }
    }
}

impl AlarmSettings {
    /// Active flag with no content counts as disarmed
    pub fn is_armed(&self) -> bool {
        self.is_alarm_active && self.selected_content.is_some()
    }
}

/// File-backed settings store
///
/// Reads and writes are serialized through one async mutex; there is a
/// single logical writer per daemon and the file is overwritten in place.
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Read the persisted settings
    ///
    /// An absent or unparseable blob yields the defaults; corruption is
    /// treated as absence, never as an error.
    pub async fn get(&self) -> AlarmSettings {
        let _guard = self.lock.lock().await;
        self.read_unlocked()
    }

    /// Overwrite the persisted settings
    pub async fn set(&self, settings: &AlarmSettings) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(settings)
    }

    /// Replace only the selected content, preserving time and active flag
    pub async fn set_selected_content(&self, content: ContentRef) -> Result<AlarmSettings> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read_unlocked();
        settings.selected_content = Some(content);
        self.write_unlocked(&settings)?;
        Ok(settings)
    }

    /// Consume a URL-carried content payload (JSON for a `ContentRef`)
    ///
    /// A parseable payload populates `selectedContent`; a malformed one is
    /// rejected without touching stored state. The caller is responsible
    /// for stripping the payload from the visible address afterwards.
    pub async fn ingest_handoff_payload(&self, raw_json: &str) -> Result<AlarmSettings> {
        let content: ContentRef = serde_json::from_str(raw_json).map_err(|e| {
            debug!("Discarding malformed handoff payload: {}", e);
            SextonError::Validation(format!("Malformed content payload: {}", e))
        })?;
        info!(
            content_id = content.id,
            kind = %content.kind,
            title = %content.title,
            "Ingesting URL-carried content selection"
        );
        self.set_selected_content(content).await
    }

    fn read_unlocked(&self) -> AlarmSettings {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return AlarmSettings::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                debug!(
                    path = %self.path.display(),
                    "Settings blob unreadable, substituting defaults: {}", e
                );
                AlarmSettings::default()
            }
        }
    }

    fn write_unlocked(&self, settings: &AlarmSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string(settings)?;
        std::fs::write(&self.path, raw).map_err(|e| {
            warn!(path = %self.path.display(), "Failed to persist settings: {}", e);
            SextonError::Storage(format!("Failed to persist settings: {}", e))
        })
    }
}
