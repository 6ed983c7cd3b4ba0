//! Random content selection
//!
//! Picks one record uniformly at random from the first `PICK_LIMIT` records
//! of a kind. An empty or failed query surfaces an error to the caller and
//! never touches stored state; only the successful pick is written back by
//! the route handler.

use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::content::{ContentKind, ContentQuery, ContentRecord, ContentRepository};
use crate::settings::ContentRef;
use crate::types::{Result, SextonError};

/// How many records a pick draws from
pub const PICK_LIMIT: usize = 100;

pub struct ContentPicker {
    repository: Arc<dyn ContentRepository>,
}

impl ContentPicker {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }

    /// Pick one record of the kind uniformly at random
    pub async fn pick(&self, kind: ContentKind) -> Result<ContentRef> {
        let query = ContentQuery {
            limit: PICK_LIMIT,
            ..ContentQuery::default()
        };

        let records = self.repository.query(kind, &query).await.map_err(|e| {
            warn!(kind = %kind, "Content pick query failed: {}", e);
            e
        })?;

        if records.is_empty() {
            return Err(SextonError::NotFound(format!(
                "No {} available to pick from",
                kind.collection()
            )));
        }

        let index = rand::thread_rng().gen_range(0..records.len());
        let record = records[index].clone();
        debug!(
            kind = %kind,
            picked = index,
            of = records.len(),
            title = %record.title,
            "Picked content"
        );

        Ok(to_content_ref(kind, record))
    }
}

fn to_content_ref(kind: ContentKind, record: ContentRecord) -> ContentRef {
    ContentRef {
        id: record.id,
        title: record.title,
        kind,
        video_url: record.video_url,
        audio_url: record.audio_url,
    }
}
