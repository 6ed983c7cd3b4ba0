//! Asset Cache Worker - Offline-First Interception for the Content App
//!
//! Mirrors the lifecycle of an installable page worker: a new instance
//! installs by precaching the static asset set, activates by dropping stale
//! cache generations, and then intercepts same-origin GET traffic with a
//! network-first strategy. Everything else passes through untouched.
//!
//! ## Lifecycle
//!
//! ```text
//! Installing ──install ok──► Waiting ──skip-waiting──► Activating ──► Active
//!     │                         ▲                                       │
//!     └──install failed──► Redundant ──retry──► Installing              │
//!                                                                serve() intercepts
//! ```
//!
//! With aggressive updates enabled (the default) the Waiting stop is skipped
//! and a successful install activates immediately.
//!
//! ## Serving strategy
//!
//! Network first. A live response is always preferred and HTTP 200 copies
//! are written back to the current generation. When the origin is
//! unreachable the worker falls back to an exact-match cached copy, then to
//! the cached offline page for HTML navigations, and finally reports
//! Unavailable. Cache write failures never fail a live serve.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::generations::{CacheRecord, GenerationStore};
use crate::types::{Result, SextonError};

/// Current cache generation name; bump on asset-set changes
pub const CACHE_GENERATION: &str = "holyseeds-v1";

/// Offline fallback document, served to HTML navigations when disconnected
pub const OFFLINE_PATH: &str = "/offline";

/// Asset set precached during install
pub const STATIC_ASSETS: [&str; 4] = ["/", OFFLINE_PATH, "/manifest.json", "/church-logo.png"];

// ============================================================================
// Origin Fetcher
// ============================================================================

/// One upstream response, body fully collected
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Response headers, hop-by-hop fields already removed
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Hop-by-hop fields, plus those each hop recomputes (host, content-length)
const HOP_BY_HOP_HEADERS: [&str; 10] = [
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copy end-to-end headers into owned pairs, dropping hop-by-hop fields
///
/// Values that are not valid UTF-8 are skipped rather than mangled.
pub fn end_to_end_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Fetches targets from the content app origin
///
/// `Err` means the origin was unreachable (connection refused, timeout,
/// DNS). An HTTP error status is still `Ok` - the worker passes those
/// through live without caching them.
#[async_trait::async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(&self, target: &str) -> Result<UpstreamResponse>;
}

/// Origin fetcher backed by reqwest
pub struct HttpOriginFetcher {
    base: String,
    client: reqwest::Client,
}

impl HttpOriginFetcher {
    pub fn new(base: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base, client }
    }
}

#[async_trait::async_trait]
impl OriginFetcher for HttpOriginFetcher {
    async fn fetch(&self, target: &str) -> Result<UpstreamResponse> {
        let url = format!("{}{}", self.base, target);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SextonError::Upstream(format!("origin fetch {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let headers = end_to_end_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| SextonError::Upstream(format!("origin body read failed: {}", e)))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

// ============================================================================
// Requests and Decisions
// ============================================================================

/// The slice of an incoming request the worker inspects
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    /// HTTP method, uppercase or not
    pub method: String,
    /// Request target: a path like `/feed?page=2` or an absolute URL
    pub target: String,
    /// Accept header, if the client sent one
    pub accept: Option<String>,
}

impl WorkerRequest {
    fn accepts_html(&self) -> bool {
        self.accept
            .as_deref()
            .map(|a| a.contains("text/html"))
            .unwrap_or(false)
    }
}

/// What the worker decided to do with a request
#[derive(Debug)]
pub enum FetchDecision {
    /// Not intercepted; the caller handles the request itself
    Bypass,
    /// Intercepted and resolved
    Served(ServedResponse),
}

/// Where an intercepted response came from
#[derive(Debug)]
pub enum ServedResponse {
    /// Fresh from the origin
    Live(UpstreamResponse),
    /// Origin unreachable, exact cached copy
    Cached(CacheRecord),
    /// Origin unreachable, no copy, HTML navigation gets the offline page
    OfflineFallback(CacheRecord),
    /// Origin unreachable and nothing cached fits
    Unavailable,
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Default)]
struct WorkerStats {
    network_serves: AtomicU64,
    cache_serves: AtomicU64,
    offline_serves: AtomicU64,
    unavailable: AtomicU64,
    bypassed: AtomicU64,
}

/// Point-in-time copy of the serve counters
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatsSnapshot {
    pub network_serves: u64,
    pub cache_serves: u64,
    pub offline_serves: u64,
    pub unavailable: u64,
    pub bypassed: u64,
}

// ============================================================================
// Asset Cache Worker
// ============================================================================

/// The interception engine: precache, generation cleanup, network-first serving
pub struct AssetCacheWorker {
    origin: String,
    fetcher: Arc<dyn OriginFetcher>,
    generations: GenerationStore,
    stats: WorkerStats,
}

impl AssetCacheWorker {
    pub fn new(origin: impl Into<String>, fetcher: Arc<dyn OriginFetcher>) -> Self {
        let mut origin = origin.into();
        while origin.ends_with('/') {
            origin.pop();
        }
        Self {
            origin,
            fetcher,
            generations: GenerationStore::new(),
            stats: WorkerStats::default(),
        }
    }

    /// Precache the static asset set into the current generation
    ///
    /// All-or-nothing: every asset must come back HTTP 200 before anything
    /// is written, so a flaky install never leaves a half-seeded generation.
    pub async fn install(&self) -> Result<()> {
        let mut seeded = Vec::with_capacity(STATIC_ASSETS.len());
        for asset in STATIC_ASSETS {
            let response = self.fetcher.fetch(asset).await?;
            if response.status != 200 {
                return Err(SextonError::Upstream(format!(
                    "precache of {} got HTTP {}",
                    asset, response.status
                )));
            }
            seeded.push((asset, response));
        }

        let generation = self.generations.open(CACHE_GENERATION);
        for (asset, response) in seeded {
            generation.put(
                asset,
                CacheRecord::new(response.status, response.headers, response.body),
            );
        }
        info!(
            generation = CACHE_GENERATION,
            assets = STATIC_ASSETS.len(),
            "precached static assets"
        );
        Ok(())
    }

    /// Drop every generation except the current one
    pub fn activate(&self) -> Vec<String> {
        self.generations.open(CACHE_GENERATION);
        self.generations.delete_others(CACHE_GENERATION)
    }

    /// Decide and resolve one request
    pub async fn fetch(&self, request: &WorkerRequest) -> FetchDecision {
        if !request.method.eq_ignore_ascii_case("GET") {
            self.stats.bypassed.fetch_add(1, Ordering::Relaxed);
            return FetchDecision::Bypass;
        }
        let Some(key) = self.same_origin_target(&request.target) else {
            self.stats.bypassed.fetch_add(1, Ordering::Relaxed);
            return FetchDecision::Bypass;
        };

        let generation = self.generations.open(CACHE_GENERATION);
        match self.fetcher.fetch(&key).await {
            Ok(response) => {
                if response.status == 200 {
                    generation.put(
                        &key,
                        CacheRecord::new(
                            response.status,
                            response.headers.clone(),
                            response.body.clone(),
                        ),
                    );
                }
                self.stats.network_serves.fetch_add(1, Ordering::Relaxed);
                FetchDecision::Served(ServedResponse::Live(response))
            }
            Err(err) => {
                debug!(target = %key, error = %err, "origin unreachable, consulting cache");
                if let Some(record) = generation.lookup(&key) {
                    self.stats.cache_serves.fetch_add(1, Ordering::Relaxed);
                    FetchDecision::Served(ServedResponse::Cached(record))
                } else if request.accepts_html() {
                    match generation.lookup(OFFLINE_PATH) {
                        Some(offline) => {
                            self.stats.offline_serves.fetch_add(1, Ordering::Relaxed);
                            FetchDecision::Served(ServedResponse::OfflineFallback(offline))
                        }
                        None => {
                            self.stats.unavailable.fetch_add(1, Ordering::Relaxed);
                            FetchDecision::Served(ServedResponse::Unavailable)
                        }
                    }
                } else {
                    self.stats.unavailable.fetch_add(1, Ordering::Relaxed);
                    FetchDecision::Served(ServedResponse::Unavailable)
                }
            }
        }
    }

    /// Normalize a target to a same-origin path+query, or None if foreign
    ///
    /// Path-only targets always belong to the origin. Absolute URLs must
    /// match the configured origin up to a path/query boundary, so
    /// `http://host:3000` never claims `http://host:30001`.
    fn same_origin_target(&self, target: &str) -> Option<String> {
        if target.starts_with('/') && !target.starts_with("//") {
            return Some(target.to_string());
        }
        let rest = target.strip_prefix(&self.origin)?;
        match rest.chars().next() {
            None => Some("/".to_string()),
            Some('/') => Some(rest.to_string()),
            Some('?') => Some(format!("/{}", rest)),
            Some(_) => None,
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            network_serves: self.stats.network_serves.load(Ordering::Relaxed),
            cache_serves: self.stats.cache_serves.load(Ordering::Relaxed),
            offline_serves: self.stats.offline_serves.load(Ordering::Relaxed),
            unavailable: self.stats.unavailable.load(Ordering::Relaxed),
            bypassed: self.stats.bypassed.load(Ordering::Relaxed),
        }
    }

    pub fn generation_names(&self) -> Vec<String> {
        self.generations.names()
    }
}

// ============================================================================
// Worker Host
// ============================================================================

/// Lifecycle phase of the hosted worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerPhase::Installing => "installing",
            WorkerPhase::Waiting => "waiting",
            WorkerPhase::Activating => "activating",
            WorkerPhase::Active => "active",
            WorkerPhase::Redundant => "redundant",
        };
        write!(f, "{}", s)
    }
}

/// Out-of-band control message for the hosted worker
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerCommand {
    /// Promote a Waiting instance to Active without a drain
    SkipWaiting,
}

/// Drives a worker instance through its lifecycle and gates serving on it
///
/// Requests are only intercepted while the instance is Active; every other
/// phase bypasses so the caller can reach the origin directly. A failed
/// install parks the instance as Redundant until the retry task starts a
/// fresh cycle.
pub struct WorkerHost {
    worker: Arc<AssetCacheWorker>,
    phase: RwLock<WorkerPhase>,
    auto_skip: bool,
    skip_requested: AtomicBool,
}

impl WorkerHost {
    pub fn new(worker: Arc<AssetCacheWorker>, auto_skip: bool) -> Self {
        Self {
            worker,
            phase: RwLock::new(WorkerPhase::Installing),
            auto_skip,
            skip_requested: AtomicBool::new(false),
        }
    }

    /// Install, then either activate immediately or park in Waiting
    pub async fn run_install_cycle(&self) -> Result<()> {
        self.set_phase(WorkerPhase::Installing).await;
        match self.worker.install().await {
            Ok(()) => {
                if self.auto_skip || self.skip_requested.swap(false, Ordering::SeqCst) {
                    self.activate_now().await;
                } else {
                    self.set_phase(WorkerPhase::Waiting).await;
                    info!("worker installed, waiting for activation");
                }
                Ok(())
            }
            Err(err) => {
                self.set_phase(WorkerPhase::Redundant).await;
                Err(err)
            }
        }
    }

    /// Claim the serving slot: drop stale generations and go Active
    pub async fn activate_now(&self) {
        self.set_phase(WorkerPhase::Activating).await;
        let dropped = self.worker.activate();
        self.set_phase(WorkerPhase::Active).await;
        info!(
            generation = CACHE_GENERATION,
            dropped = dropped.len(),
            "worker activated"
        );
    }

    /// Handle a control message, returning the phase afterwards
    pub async fn message(&self, command: WorkerCommand) -> WorkerPhase {
        match command {
            WorkerCommand::SkipWaiting => {
                match self.phase().await {
                    WorkerPhase::Waiting => self.activate_now().await,
                    WorkerPhase::Installing => {
                        self.skip_requested.store(true, Ordering::SeqCst);
                    }
                    _ => {}
                }
                self.phase().await
            }
        }
    }

    /// Intercept a request if the instance is Active, otherwise bypass
    pub async fn serve(&self, request: &WorkerRequest) -> FetchDecision {
        if self.phase().await != WorkerPhase::Active {
            self.worker.stats.bypassed.fetch_add(1, Ordering::Relaxed);
            return FetchDecision::Bypass;
        }
        self.worker.fetch(request).await
    }

    pub async fn phase(&self) -> WorkerPhase {
        *self.phase.read().await
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.worker.stats()
    }

    pub fn generation_names(&self) -> Vec<String> {
        self.worker.generation_names()
    }

    pub fn auto_skip(&self) -> bool {
        self.auto_skip
    }

    async fn set_phase(&self, phase: WorkerPhase) {
        let mut guard = self.phase.write().await;
        if *guard != phase {
            debug!(from = %guard, to = %phase, "worker phase change");
            *guard = phase;
        }
    }
}

/// Spawn the install loop: retry on failure until one cycle succeeds
pub fn spawn_worker_task(host: Arc<WorkerHost>, retry: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("asset cache worker task started");
        loop {
            match host.run_install_cycle().await {
                Ok(()) => break,
                Err(err) => {
                    warn!(
                        error = %err,
                        retry_secs = retry.as_secs(),
                        "worker install failed, retrying"
                    );
                    tokio::time::sleep(retry).await;
                }
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    const ORIGIN: &str = "http://localhost:3000";

    struct ScriptedFetcher {
        online: AtomicBool,
        pages: DashMap<String, (u16, Vec<(String, String)>, String)>,
    }

    impl ScriptedFetcher {
        fn new() -> Arc<Self> {
            let fetcher = Self {
                online: AtomicBool::new(true),
                pages: DashMap::new(),
            };
            for asset in STATIC_ASSETS {
                fetcher.set_page(asset, 200, "asset body");
            }
            Arc::new(fetcher)
        }

        fn set_page(&self, target: &str, status: u16, body: &str) {
            self.set_page_with_headers(
                target,
                status,
                vec![("content-type".to_string(), "text/html".to_string())],
                body,
            );
        }

        fn set_page_with_headers(
            &self,
            target: &str,
            status: u16,
            headers: Vec<(String, String)>,
            body: &str,
        ) {
            self.pages
                .insert(target.to_string(), (status, headers, body.to_string()));
        }

        fn remove_page(&self, target: &str) {
            self.pages.remove(target);
        }

        fn go_offline(&self) {
            self.online.store(false, Ordering::SeqCst);
        }

        fn go_online(&self) {
            self.online.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl OriginFetcher for ScriptedFetcher {
        async fn fetch(&self, target: &str) -> Result<UpstreamResponse> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(SextonError::Upstream("connection refused".to_string()));
            }
            match self.pages.get(target) {
                Some(entry) => {
                    let (status, headers, body) = entry.value().clone();
                    Ok(UpstreamResponse {
                        status,
                        headers,
                        body: Bytes::from(body),
                    })
                }
                None => Ok(UpstreamResponse {
                    status: 404,
                    headers: vec![("content-type".to_string(), "text/plain".to_string())],
                    body: Bytes::from("not found"),
                }),
            }
        }
    }

    fn worker(fetcher: &Arc<ScriptedFetcher>) -> AssetCacheWorker {
        AssetCacheWorker::new(ORIGIN, fetcher.clone() as Arc<dyn OriginFetcher>)
    }

    fn get_request(target: &str) -> WorkerRequest {
        WorkerRequest {
            method: "GET".to_string(),
            target: target.to_string(),
            accept: None,
        }
    }

    fn html_request(target: &str) -> WorkerRequest {
        WorkerRequest {
            method: "GET".to_string(),
            target: target.to_string(),
            accept: Some("text/html,application/xhtml+xml".to_string()),
        }
    }

    #[tokio::test]
    async fn test_install_seeds_static_assets() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);

        worker.install().await.unwrap();

        let generation = worker.generations.open(CACHE_GENERATION);
        assert_eq!(generation.len(), STATIC_ASSETS.len());
        assert!(generation.lookup(OFFLINE_PATH).is_some());
    }

    #[tokio::test]
    async fn test_install_fails_when_asset_missing() {
        let fetcher = ScriptedFetcher::new();
        fetcher.remove_page("/church-logo.png");
        let worker = worker(&fetcher);

        assert!(worker.install().await.is_err());
        assert!(worker.generations.open(CACHE_GENERATION).is_empty());
    }

    #[tokio::test]
    async fn test_install_fails_when_origin_down() {
        let fetcher = ScriptedFetcher::new();
        fetcher.go_offline();
        let worker = worker(&fetcher);

        assert!(worker.install().await.is_err());
    }

    #[tokio::test]
    async fn test_activate_drops_stale_generations() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);
        worker.generations.open("holyseeds-v0");
        worker.install().await.unwrap();

        let dropped = worker.activate();

        assert_eq!(dropped, vec!["holyseeds-v0".to_string()]);
        assert_eq!(worker.generation_names(), vec![CACHE_GENERATION.to_string()]);
    }

    #[tokio::test]
    async fn test_non_get_bypasses() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);
        let request = WorkerRequest {
            method: "POST".to_string(),
            target: "/feed".to_string(),
            accept: None,
        };

        assert!(matches!(worker.fetch(&request).await, FetchDecision::Bypass));
        assert_eq!(worker.stats().bypassed, 1);
    }

    #[tokio::test]
    async fn test_cross_origin_bypasses() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);
        let request = get_request("https://fonts.example.com/inter.woff2");

        assert!(matches!(worker.fetch(&request).await, FetchDecision::Bypass));
    }

    #[tokio::test]
    async fn test_origin_prefix_requires_boundary() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);
        let request = get_request("http://localhost:30001/feed");

        assert!(matches!(worker.fetch(&request).await, FetchDecision::Bypass));
    }

    #[tokio::test]
    async fn test_network_first_serves_live_and_caches() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page("/feed", 200, "fresh feed");
        let worker = worker(&fetcher);

        let decision = worker.fetch(&get_request("/feed")).await;

        match decision {
            FetchDecision::Served(ServedResponse::Live(response)) => {
                assert_eq!(response.status, 200);
                assert_eq!(response.body, Bytes::from("fresh feed"));
            }
            other => panic!("expected live serve, got {:?}", other),
        }
        let generation = worker.generations.open(CACHE_GENERATION);
        assert!(generation.lookup("/feed").is_some());
        assert_eq!(worker.stats().network_serves, 1);
    }

    #[tokio::test]
    async fn test_network_refresh_replaces_cached_copy() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page("/feed", 200, "v1");
        let worker = worker(&fetcher);
        worker.fetch(&get_request("/feed")).await;

        fetcher.set_page("/feed", 200, "v2");
        worker.fetch(&get_request("/feed")).await;

        let generation = worker.generations.open(CACHE_GENERATION);
        let record = generation.lookup("/feed").unwrap();
        assert_eq!(record.body, Bytes::from("v2"));
    }

    #[tokio::test]
    async fn test_error_status_passes_through_uncached() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page("/broken", 500, "server error");
        let worker = worker(&fetcher);

        let decision = worker.fetch(&get_request("/broken")).await;

        match decision {
            FetchDecision::Served(ServedResponse::Live(response)) => {
                assert_eq!(response.status, 500);
            }
            other => panic!("expected live serve, got {:?}", other),
        }
        let generation = worker.generations.open(CACHE_GENERATION);
        assert!(generation.lookup("/broken").is_none());
    }

    #[tokio::test]
    async fn test_offline_serves_cached_copy() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page("/feed", 200, "cached feed");
        let worker = worker(&fetcher);
        worker.fetch(&get_request("/feed")).await;

        fetcher.go_offline();
        let decision = worker.fetch(&get_request("/feed")).await;

        match decision {
            FetchDecision::Served(ServedResponse::Cached(record)) => {
                assert_eq!(record.body, Bytes::from("cached feed"));
            }
            other => panic!("expected cached serve, got {:?}", other),
        }
        assert_eq!(worker.stats().cache_serves, 1);
    }

    #[tokio::test]
    async fn test_cached_copy_retains_response_headers() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page_with_headers(
            "/feed",
            200,
            vec![
                ("content-type".to_string(), "text/html".to_string()),
                ("etag".to_string(), "\"v1\"".to_string()),
                ("cache-control".to_string(), "max-age=60".to_string()),
            ],
            "feed",
        );
        let worker = worker(&fetcher);
        worker.fetch(&get_request("/feed")).await;

        fetcher.go_offline();
        let decision = worker.fetch(&get_request("/feed")).await;

        match decision {
            FetchDecision::Served(ServedResponse::Cached(record)) => {
                assert_eq!(record.content_type(), Some("text/html"));
                assert!(record
                    .headers
                    .contains(&("etag".to_string(), "\"v1\"".to_string())));
                assert!(record
                    .headers
                    .contains(&("cache-control".to_string(), "max-age=60".to_string())));
            }
            other => panic!("expected cached serve, got {:?}", other),
        }
    }

    #[test]
    fn test_end_to_end_headers_strips_hop_fields() {
        use reqwest::header::{HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("host", HeaderValue::from_static("localhost:8080"));
        headers.insert("authorization", HeaderValue::from_static("Bearer token"));
        headers.insert("cookie", HeaderValue::from_static("sid=1"));
        headers.insert("etag", HeaderValue::from_static("\"v1\""));

        let retained = end_to_end_headers(&headers);

        let names: Vec<&str> = retained.iter().map(|(name, _)| name.as_str()).collect();
        assert!(names.contains(&"authorization"));
        assert!(names.contains(&"cookie"));
        assert!(names.contains(&"etag"));
        assert!(!names.contains(&"connection"));
        assert!(!names.contains(&"transfer-encoding"));
        assert!(!names.contains(&"content-length"));
        assert!(!names.contains(&"host"));
    }

    #[tokio::test]
    async fn test_offline_html_falls_back_to_offline_page() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page(OFFLINE_PATH, 200, "you are offline");
        let worker = worker(&fetcher);
        worker.install().await.unwrap();

        fetcher.go_offline();
        let decision = worker.fetch(&html_request("/never-seen")).await;

        match decision {
            FetchDecision::Served(ServedResponse::OfflineFallback(record)) => {
                assert_eq!(record.body, Bytes::from("you are offline"));
            }
            other => panic!("expected offline fallback, got {:?}", other),
        }
        assert_eq!(worker.stats().offline_serves, 1);
    }

    #[tokio::test]
    async fn test_offline_non_html_is_unavailable() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);
        worker.install().await.unwrap();

        fetcher.go_offline();
        let request = WorkerRequest {
            method: "GET".to_string(),
            target: "/api/data.json".to_string(),
            accept: Some("application/json".to_string()),
        };
        let decision = worker.fetch(&request).await;

        assert!(matches!(
            decision,
            FetchDecision::Served(ServedResponse::Unavailable)
        ));
        assert_eq!(worker.stats().unavailable, 1);
    }

    #[tokio::test]
    async fn test_offline_html_without_offline_page_is_unavailable() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);

        fetcher.go_offline();
        let decision = worker.fetch(&html_request("/never-seen")).await;

        assert!(matches!(
            decision,
            FetchDecision::Served(ServedResponse::Unavailable)
        ));
    }

    #[tokio::test]
    async fn test_absolute_same_origin_url_normalized() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page("/feed?page=2", 200, "page two");
        let worker = worker(&fetcher);

        let decision = worker
            .fetch(&get_request("http://localhost:3000/feed?page=2"))
            .await;

        assert!(matches!(
            decision,
            FetchDecision::Served(ServedResponse::Live(_))
        ));
        let generation = worker.generations.open(CACHE_GENERATION);
        assert!(generation.lookup("/feed?page=2").is_some());
    }

    #[tokio::test]
    async fn test_bare_origin_url_maps_to_root() {
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&fetcher);

        let decision = worker.fetch(&get_request(ORIGIN)).await;

        assert!(matches!(
            decision,
            FetchDecision::Served(ServedResponse::Live(_))
        ));
        let generation = worker.generations.open(CACHE_GENERATION);
        assert!(generation.lookup("/").is_some());
    }

    #[tokio::test]
    async fn test_host_auto_skip_activates_after_install() {
        let fetcher = ScriptedFetcher::new();
        let host = WorkerHost::new(Arc::new(worker(&fetcher)), true);

        host.run_install_cycle().await.unwrap();

        assert_eq!(host.phase().await, WorkerPhase::Active);
    }

    #[tokio::test]
    async fn test_host_waits_then_activates_on_message() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_page("/feed", 200, "feed");
        let host = WorkerHost::new(Arc::new(worker(&fetcher)), false);
        host.run_install_cycle().await.unwrap();
        assert_eq!(host.phase().await, WorkerPhase::Waiting);

        assert!(matches!(
            host.serve(&get_request("/feed")).await,
            FetchDecision::Bypass
        ));

        let phase = host.message(WorkerCommand::SkipWaiting).await;
        assert_eq!(phase, WorkerPhase::Active);
        assert!(matches!(
            host.serve(&get_request("/feed")).await,
            FetchDecision::Served(_)
        ));
    }

    #[tokio::test]
    async fn test_host_failed_install_goes_redundant_then_recovers() {
        let fetcher = ScriptedFetcher::new();
        fetcher.go_offline();
        let host = WorkerHost::new(Arc::new(worker(&fetcher)), true);

        assert!(host.run_install_cycle().await.is_err());
        assert_eq!(host.phase().await, WorkerPhase::Redundant);

        fetcher.go_online();
        host.run_install_cycle().await.unwrap();
        assert_eq!(host.phase().await, WorkerPhase::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_is_noop_when_active() {
        let fetcher = ScriptedFetcher::new();
        let host = WorkerHost::new(Arc::new(worker(&fetcher)), true);
        host.run_install_cycle().await.unwrap();

        let phase = host.message(WorkerCommand::SkipWaiting).await;

        assert_eq!(phase, WorkerPhase::Active);
    }

    #[test]
    fn test_worker_command_wire_format() {
        let command: WorkerCommand =
            serde_json::from_str(r#"{"type": "skip-waiting"}"#).unwrap();
        assert!(matches!(command, WorkerCommand::SkipWaiting));

        assert!(serde_json::from_str::<WorkerCommand>(r#"{"type": "detach"}"#).is_err());
    }
}
