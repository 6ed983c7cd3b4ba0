//! Playback handoff and the playback surface

pub mod handoff;
pub mod page;

pub use handoff::{CommandOpener, PlaybackHandoff, SurfaceOpener, PLAYBACK_ROUTE};
pub use page::{decode_payload, render_playback_page, PlaybackView};
