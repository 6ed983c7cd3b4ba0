//! Content repository boundary and selection for sexton

pub mod picker;
pub mod repository;
pub mod upload;

pub use picker::{ContentPicker, PICK_LIMIT};
pub use repository::{
    ContentKind, ContentQuery, ContentRecord, ContentRepository, HttpContentRepository,
    NewContentRecord,
};
pub use upload::{validate_media, MediaDescriptor, MediaKind, MAX_MEDIA_BYTES};
