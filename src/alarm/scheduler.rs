//! Wall-clock alarm loop
//!
//! A background task checks once per second whether the stored target
//! (local HH:MM) matches the current time. A match is actionable only
//! inside the first ten seconds of the minute, and the fired-minute latch
//! guarantees at most one fire per calendar minute. Settings are re-read on
//! every tick, so time, content, and armed changes take effect on the next
//! tick without restarting the loop.
//!
//! On fire: request notification permission, notify when granted (body
//! names the content kind and title), then hand playback off according to
//! the configured denied-permission policy.

use chrono::{Local, NaiveDateTime, Timelike};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alarm::gate::{NotificationGate, NotificationRequest, PermissionState};
use crate::playback::PlaybackHandoff;
use crate::settings::{AlarmTime, ContentRef, SettingsStore};
use crate::types::SextonError;

/// Seconds at the start of a matching minute during which a fire is allowed
const FIRE_WINDOW_SECS: u32 = 10;
/// Cadence of the alarm check
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Wall clock seam (fixed time in tests)
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// What to do with the playback handoff when permission is denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffPolicy {
    /// Hand off regardless of the notification outcome
    Always,
    /// Skip the handoff unless permission is granted
    GrantedOnly,
}

impl FromStr for HandoffPolicy {
    type Err = SextonError;

    fn from_str(s: &str) -> Result<Self, SextonError> {
        match s {
            "always" => Ok(HandoffPolicy::Always),
            "granted-only" => Ok(HandoffPolicy::GrantedOnly),
            other => Err(SextonError::Config(format!(
                "Unknown handoff policy {:?}",
                other
            ))),
        }
    }
}

/// What happened on a fired tick
#[derive(Debug, Clone, PartialEq)]
pub struct FireOutcome {
    pub fire_id: String,
    pub permission: PermissionState,
    pub notified: bool,
    pub handed_off: bool,
    pub playback_url: Option<String>,
}

/// The alarm scheduler
///
/// The fired-minute latch is a field on this instance, never shared state;
/// two scheduler instances latch independently.
pub struct AlarmScheduler {
    settings: Arc<SettingsStore>,
    gate: Arc<NotificationGate>,
    handoff: Arc<PlaybackHandoff>,
    clock: Arc<dyn Clock>,
    policy: HandoffPolicy,
    public_url: String,
    last_fired: Mutex<Option<NaiveDateTime>>,
}

impl AlarmScheduler {
    pub fn new(
        settings: Arc<SettingsStore>,
        gate: Arc<NotificationGate>,
        handoff: Arc<PlaybackHandoff>,
        clock: Arc<dyn Clock>,
        policy: HandoffPolicy,
        public_url: &str,
    ) -> Self {
        Self {
            settings,
            gate,
            handoff,
            clock,
            policy,
            public_url: public_url.trim_end_matches('/').to_string(),
            last_fired: Mutex::new(None),
        }
    }

    /// Run one alarm check against the current settings and clock
    ///
    /// Returns the fire outcome when this tick fired, `None` otherwise.
    pub async fn tick(&self) -> Option<FireOutcome> {
        let settings = self.settings.get().await;
        if !settings.is_armed() {
            return None;
        }
        let content = settings.selected_content?;

        let now = self.clock.now();
        if !matches_target(now, settings.alarm_time) {
            return None;
        }

        let minute = minute_key(now);
        {
            let mut last = self.last_fired.lock().await;
            if *last == Some(minute) {
                return None;
            }
            *last = Some(minute);
        }

        Some(self.fire(content).await)
    }

    async fn fire(&self, content: ContentRef) -> FireOutcome {
        let fire_id = format!("fire_{}", uuid::Uuid::new_v4());
        info!(
            fire_id = %fire_id,
            kind = %content.kind,
            title = %content.title,
            "Alarm fired"
        );

        let permission = self.gate.request().await;
        let mut notified = false;
        if permission == PermissionState::Granted {
            let request = NotificationRequest {
                title: "HolySeeds Alarm".to_string(),
                body: format!("{}: {}", content.kind.label(), content.title),
                icon: format!("{}/church-logo.png", self.public_url),
                badge: format!("{}/church-logo.png", self.public_url),
                focus_url: format!("{}/alarm/settings", self.public_url),
                dismiss_on_click: true,
            };
            match self.gate.notify(&request).await {
                Ok(()) => notified = true,
                Err(e) => warn!(fire_id = %fire_id, "Notification failed: {}", e),
            }
        } else {
            debug!(fire_id = %fire_id, permission = %permission, "Notification suppressed");
        }

        let should_hand_off = match self.policy {
            HandoffPolicy::Always => true,
            HandoffPolicy::GrantedOnly => permission == PermissionState::Granted,
        };

        let mut handed_off = false;
        let mut playback_url = None;
        if should_hand_off {
            match self.handoff.open(&content).await {
                Ok(url) => {
                    handed_off = true;
                    playback_url = Some(url);
                }
                Err(e) => warn!(fire_id = %fire_id, "Playback handoff failed: {}", e),
            }
        } else {
            debug!(fire_id = %fire_id, "Handoff skipped by policy");
        }

        FireOutcome {
            fire_id,
            permission,
            notified,
            handed_off,
            playback_url,
        }
    }
}

/// True when the local time sits inside the target minute's fire window
fn matches_target(now: NaiveDateTime, target: AlarmTime) -> bool {
    now.hour() == target.hour() as u32
        && now.minute() == target.minute() as u32
        && now.second() < FIRE_WINDOW_SECS
}

/// Truncate a time to its calendar minute for the latch
fn minute_key(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// Spawn the once-per-second alarm check loop
pub fn spawn_alarm_task(scheduler: Arc<AlarmScheduler>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Alarm scheduler started ({}s tick)", TICK_INTERVAL.as_secs());
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            scheduler.tick().await;
        }
    })
}
