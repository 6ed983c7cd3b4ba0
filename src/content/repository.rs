//! Content repository client
//!
//! The devotional content lives in an external PostgREST-style repository
//! with one collection per kind (`sermons`, `praises`). Sermons are ordered
//! newest-first by date and carry a `date` field; praises are ordered by
//! title and carry `lyrics`, which is also searchable. The trait seam keeps
//! the picker and routes testable without a live repository.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::types::{Result, SextonError};

/// Kind of devotional content, one repository collection each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Sermon,
    Praise,
}

impl ContentKind {
    /// Repository collection name
    pub fn collection(&self) -> &'static str {
        match self {
            ContentKind::Sermon => "sermons",
            ContentKind::Praise => "praises",
        }
    }

    /// Human-readable label for notifications
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Sermon => "Sermon",
            ContentKind::Praise => "Praise",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Sermon => write!(f, "sermon"),
            ContentKind::Praise => write!(f, "praise"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = SextonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sermon" | "sermons" => Ok(ContentKind::Sermon),
            "praise" | "praises" => Ok(ContentKind::Praise),
            other => Err(SextonError::Validation(format!(
                "Unknown content kind {:?}",
                other
            ))),
        }
    }
}

/// One repository row (upstream snake_case shape)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// Row shape accepted by the insert operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContentRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// Query filters for a collection
#[derive(Debug, Clone)]
pub struct ContentQuery {
    /// Case-insensitive title substring (praises also match lyrics)
    pub title_contains: Option<String>,
    /// Exact date match (sermons only carry dates)
    pub date: Option<String>,
    pub limit: usize,
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self {
            title_contains: None,
            date: None,
            limit: 100,
        }
    }
}

/// Trait for the content repository (allows mocking in tests)
#[async_trait::async_trait]
pub trait ContentRepository: Send + Sync {
    /// Fetch up to `query.limit` records of the given kind
    async fn query(&self, kind: ContentKind, query: &ContentQuery) -> Result<Vec<ContentRecord>>;

    /// Insert a record into the kind's collection
    async fn insert(&self, kind: ContentKind, record: NewContentRecord) -> Result<ContentRecord>;
}

/// PostgREST-backed repository client
pub struct HttpContentRepository {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpContentRepository {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    fn collection_url(&self, kind: ContentKind) -> String {
        format!("{}/{}", self.base_url, kind.collection())
    }
}

/// Build the PostgREST query pairs for a kind + filter combination
///
/// Sermons order newest-first by date and filter on exact date; praises
/// order by title and search title OR lyrics.
pub fn query_params(kind: ContentKind, query: &ContentQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];

    match kind {
        ContentKind::Sermon => {
            params.push(("order".to_string(), "date.desc".to_string()));
            if let Some(ref term) = query.title_contains {
                params.push(("title".to_string(), format!("ilike.*{}*", term)));
            }
            if let Some(ref date) = query.date {
                params.push(("date".to_string(), format!("eq.{}", date)));
            }
        }
        ContentKind::Praise => {
            params.push(("order".to_string(), "title.asc".to_string()));
            if let Some(ref term) = query.title_contains {
                params.push((
                    "or".to_string(),
                    format!("(title.ilike.*{term}*,lyrics.ilike.*{term}*)"),
                ));
            }
        }
    }

    params.push(("limit".to_string(), query.limit.to_string()));
    params
}

#[async_trait::async_trait]
impl ContentRepository for HttpContentRepository {
    async fn query(&self, kind: ContentKind, query: &ContentQuery) -> Result<Vec<ContentRecord>> {
        let url = self.collection_url(kind);
        let params = query_params(kind, query);
        debug!(collection = kind.collection(), ?params, "Repository query");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| SextonError::Repository(format!("Query request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SextonError::Repository(format!(
                "Query returned HTTP {} from {}",
                response.status(),
                kind.collection()
            )));
        }

        response
            .json::<Vec<ContentRecord>>()
            .await
            .map_err(|e| SextonError::Repository(format!("Malformed query response: {}", e)))
    }

    async fn insert(&self, kind: ContentKind, record: NewContentRecord) -> Result<ContentRecord> {
        let url = self.collection_url(kind);
        debug!(collection = kind.collection(), title = %record.title, "Repository insert");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(|e| SextonError::Repository(format!("Insert request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SextonError::Repository(format!(
                "Insert returned HTTP {} for {}",
                response.status(),
                kind.collection()
            )));
        }

        let mut rows: Vec<ContentRecord> = response
            .json()
            .await
            .map_err(|e| SextonError::Repository(format!("Malformed insert response: {}", e)))?;

        rows.pop()
            .ok_or_else(|| SextonError::Repository("Insert returned no row".to_string()))
    }
}
