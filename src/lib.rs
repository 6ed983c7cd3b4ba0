//! Sexton - alarm and offline caretaker for the HolySeeds content client
//!
//! "Watch ye therefore ... at the cockcrowing, or in the morning" - Mark 13:35
//!
//! Sexton fronts a HolySeeds content app with an offline-capable caching
//! gateway and rings a recurring devotional alarm on the side.
//!
//! ## Services
//!
//! - **Gateway**: HTTP front for the content app; same-origin GETs flow
//!   through the hosted cache worker, everything else is forwarded untouched
//! - **Cache worker**: install/activate lifecycle over named cache
//!   generations with network-first serving and an offline fallback page
//! - **Alarm**: once-per-second scheduler that fires a chosen devotional at
//!   a stored HH:MM, notifies, and hands playback off to a browser surface
//! - **Content**: REST passthrough to the sermon/praise repository plus a
//!   random picker for alarm content

pub mod alarm;
pub mod cache;
pub mod config;
pub mod content;
pub mod playback;
pub mod routes;
pub mod server;
pub mod settings;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, SextonError};
