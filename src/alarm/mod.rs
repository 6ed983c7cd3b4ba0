//! Alarm scheduling and notification permission for sexton

pub mod gate;
pub mod scheduler;

pub use gate::{
    DesktopNotifier, NotificationGate, NotificationRequest, Notifier, PermissionState,
};
pub use scheduler::{
    spawn_alarm_task, AlarmScheduler, Clock, FireOutcome, HandoffPolicy, SystemClock,
};
