//! Persisted alarm configuration for sexton

pub mod store;

pub use store::{AlarmSettings, AlarmTime, ContentRef, SettingsStore};
