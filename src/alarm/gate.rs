//! Notification permission gate
//!
//! One-way state machine mirroring the platform's permission store:
//! `Default -> Granted` or `Default -> Denied`, terminal once decided. The
//! platform prompt and delivery sit behind the `Notifier` seam; the desktop
//! implementation shells out to the native notification tool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::types::{Result, SextonError};

/// Mirrored platform permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Default,
    Granted,
    Denied,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionState::Default => write!(f, "default"),
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
        }
    }
}

/// A platform notification
///
/// `focus_url` and `dismiss_on_click` carry the click contract: activating
/// the notification focuses the originating surface and dismisses itself,
/// on platforms whose notifier supports actions.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub focus_url: String,
    pub dismiss_on_click: bool,
}

/// Trait for the platform notification surface (allows mocking in tests)
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Prompt the platform for permission and report the decided state
    async fn request_permission(&self) -> PermissionState;

    /// Deliver a notification
    async fn notify(&self, request: &NotificationRequest) -> Result<()>;
}

/// Permission gate over a notifier
pub struct NotificationGate {
    notifier: Arc<dyn Notifier>,
    state: RwLock<PermissionState>,
}

impl NotificationGate {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            state: RwLock::new(PermissionState::Default),
        }
    }

    /// Current state without prompting
    pub async fn state(&self) -> PermissionState {
        *self.state.read().await
    }

    /// Request permission
    ///
    /// Prompts the platform only while the state is `Default`; once a
    /// terminal state is recorded it is returned without prompting again.
    /// A prompt the user dismisses without deciding leaves the state at
    /// `Default` and a later request may prompt once more.
    pub async fn request(&self) -> PermissionState {
        {
            let state = self.state.read().await;
            if *state != PermissionState::Default {
                return *state;
            }
        }

        let mut state = self.state.write().await;
        if *state != PermissionState::Default {
            return *state;
        }

        let decided = self.notifier.request_permission().await;
        if decided != PermissionState::Default {
            info!(permission = %decided, "Notification permission decided");
            *state = decided;
        } else {
            debug!("Notification permission prompt left undecided");
        }
        *state
    }

    /// Deliver a notification through the platform notifier
    ///
    /// Callers are expected to have consulted `request()` first; delivery
    /// failures are the caller's to log, not fatal.
    pub async fn notify(&self, request: &NotificationRequest) -> Result<()> {
        self.notifier.notify(request).await
    }
}

/// Desktop notifier shelling out to the platform notification tool
///
/// Permission mirrors tool availability: a responsive `notify-send` (Linux)
/// or `osascript` (macOS) grants, anything else denies. Platforms without a
/// wired tool stay denied and the alarm degrades to a silent handoff.
pub struct DesktopNotifier;

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn request_permission(&self) -> PermissionState {
        #[cfg(target_os = "linux")]
        let probe = tokio::process::Command::new("notify-send")
            .arg("--version")
            .output()
            .await;
        #[cfg(target_os = "macos")]
        let probe = tokio::process::Command::new("osascript")
            .arg("-e")
            .arg("return 1")
            .output()
            .await;
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let probe: std::io::Result<std::process::Output> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no notification tool wired for this platform",
        ));

        match probe {
            Ok(output) if output.status.success() => PermissionState::Granted,
            Ok(_) => {
                warn!("Platform notification tool present but not responding");
                PermissionState::Denied
            }
            Err(e) => {
                warn!("No platform notification tool available: {}", e);
                PermissionState::Denied
            }
        }
    }

    async fn notify(&self, request: &NotificationRequest) -> Result<()> {
        #[cfg(target_os = "linux")]
        let status = tokio::process::Command::new("notify-send")
            .arg("--app-name=HolySeeds")
            .arg("--icon")
            .arg(&request.icon)
            .arg(&request.title)
            .arg(&request.body)
            .status()
            .await;
        #[cfg(target_os = "macos")]
        let status = tokio::process::Command::new("osascript")
            .arg("-e")
            .arg(format!(
                r#"display notification "{}" with title "{}""#,
                applescript_escape(&request.body),
                applescript_escape(&request.title)
            ))
            .status()
            .await;
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let status: std::io::Result<std::process::ExitStatus> = Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no notification tool wired for this platform",
        ));

        let status = status
            .map_err(|e| SextonError::Notification(format!("Failed to notify: {}", e)))?;
        if !status.success() {
            return Err(SextonError::Notification(format!(
                "Notification tool exited with {}",
                status
            )));
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn applescript_escape(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedNotifier {
        outcome: PermissionState,
        prompts: AtomicUsize,
        delivered: Mutex<Vec<NotificationRequest>>,
    }

    impl ScriptedNotifier {
        fn new(outcome: PermissionState) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                prompts: AtomicUsize::new(0),
                delivered: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait::async_trait]
    impl Notifier for ScriptedNotifier {
        async fn request_permission(&self) -> PermissionState {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.outcome
        }

        async fn notify(&self, request: &NotificationRequest) -> Result<()> {
            self.delivered.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn sample_request() -> NotificationRequest {
        NotificationRequest {
            title: "HolySeeds Alarm".to_string(),
            body: "Sermon: Grace".to_string(),
            icon: "/church-logo.png".to_string(),
            badge: "/church-logo.png".to_string(),
            focus_url: "http://127.0.0.1:8080/alarm/settings".to_string(),
            dismiss_on_click: true,
        }
    }

    #[tokio::test]
    async fn test_grant_is_terminal_and_prompts_once() {
        let notifier = ScriptedNotifier::new(PermissionState::Granted);
        let gate = NotificationGate::new(notifier.clone());

        assert_eq!(gate.state().await, PermissionState::Default);
        assert_eq!(gate.request().await, PermissionState::Granted);
        assert_eq!(gate.request().await, PermissionState::Granted);
        assert_eq!(gate.request().await, PermissionState::Granted);
        assert_eq!(notifier.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_denial_is_terminal() {
        let notifier = ScriptedNotifier::new(PermissionState::Denied);
        let gate = NotificationGate::new(notifier.clone());

        assert_eq!(gate.request().await, PermissionState::Denied);
        assert_eq!(gate.request().await, PermissionState::Denied);
        assert_eq!(notifier.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state().await, PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_undecided_prompt_may_reprompt() {
        let notifier = ScriptedNotifier::new(PermissionState::Default);
        let gate = NotificationGate::new(notifier.clone());

        assert_eq!(gate.request().await, PermissionState::Default);
        assert_eq!(gate.request().await, PermissionState::Default);
        assert_eq!(notifier.prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_notify_passes_through() {
        let notifier = ScriptedNotifier::new(PermissionState::Granted);
        let gate = NotificationGate::new(notifier.clone());
        gate.notify(&sample_request()).await.unwrap();

        let delivered = notifier.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].body, "Sermon: Grace");
        assert!(delivered[0].dismiss_on_click);
    }
}
