//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling. Named routes are matched
//! first; everything else falls through to the gateway, where the hosted
//! cache worker may intercept same-origin GETs and anything it bypasses is
//! forwarded to the content app origin untouched.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::alarm::{DesktopNotifier, NotificationGate};
use crate::cache::{
    end_to_end_headers, AssetCacheWorker, FetchDecision, HttpOriginFetcher, ServedResponse,
    WorkerHost, WorkerRequest,
};
use crate::config::Args;
use crate::content::{ContentPicker, ContentRepository, HttpContentRepository};
use crate::playback::{CommandOpener, PlaybackHandoff};
use crate::routes;
use crate::settings::SettingsStore;
use crate::types::SextonError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Persisted alarm settings blob
    pub settings: Arc<SettingsStore>,
    /// Permission-gated notifier
    pub gate: Arc<NotificationGate>,
    /// Random content picker; absent without a repository
    pub picker: Option<Arc<ContentPicker>>,
    /// Content repository client; absent when CONTENT_API_URL is unset
    pub repository: Option<Arc<dyn ContentRepository>>,
    /// Playback surface handoff
    pub handoff: Arc<PlaybackHandoff>,
    /// Hosted cache worker driving the gateway
    pub worker: Arc<WorkerHost>,
    /// Client for requests the gateway forwards itself
    pub upstream: reqwest::Client,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args) -> Self {
        let timeout = Duration::from_millis(args.request_timeout_ms);
        let upstream = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        let settings = Arc::new(SettingsStore::new(args.settings_path()));
        let gate = Arc::new(NotificationGate::new(Arc::new(DesktopNotifier)));

        let repository: Option<Arc<dyn ContentRepository>> = args.repo_url.as_ref().map(|url| {
            Arc::new(HttpContentRepository::new(url, &args.repo_key, timeout))
                as Arc<dyn ContentRepository>
        });
        let picker = repository
            .as_ref()
            .map(|repo| Arc::new(ContentPicker::new(Arc::clone(repo))));

        let handoff = Arc::new(PlaybackHandoff::new(
            &args.public_url(),
            Arc::new(CommandOpener),
        ));

        let fetcher = Arc::new(HttpOriginFetcher::new(args.origin_base(), upstream.clone()));
        let worker = Arc::new(WorkerHost::new(
            Arc::new(AssetCacheWorker::new(args.origin_base(), fetcher)),
            args.skip_waiting,
        ));

        Self {
            args,
            settings,
            gate,
            picker,
            repository,
            handoff,
            worker,
            upstream,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), SextonError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Sexton listening on {}", state.args.listen);
    info!("Gateway origin: {}", state.args.origin_base());

    if state.repository.is_none() {
        warn!("Content repository not configured - /alarm/pick and /content/* will answer 503");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    debug!("[{}] {} {}", addr, method, path);

    // Absolute-form requests name their own host; they never match the
    // daemon's routes, the gateway decides where they go
    if req.uri().authority().is_some() {
        return Ok(handle_gateway(state, req).await);
    }

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)).await)
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // Alarm settings read; a content payload in the query is ingested
        // once and stripped with a 303
        (Method::GET, "/alarm/settings") => {
            to_boxed(routes::handle_get_settings(Arc::clone(&state), &query).await)
        }

        // Whole-blob settings replace
        (Method::PUT, "/alarm/settings") => {
            return Ok(to_boxed(
                routes::handle_put_settings(req, Arc::clone(&state)).await,
            ));
        }

        // Random pick of a content kind
        (Method::POST, "/alarm/pick") => {
            return Ok(to_boxed(routes::handle_pick(req, Arc::clone(&state)).await));
        }

        // Playback surface for a fired alarm
        (Method::GET, "/alarm/play") => to_boxed(routes::handle_playback_page(&query)),

        // Cache worker control channel
        (Method::POST, "/worker/message") => {
            return Ok(to_boxed(
                routes::handle_worker_message(req, Arc::clone(&state)).await,
            ));
        }

        // Cache worker phase and serve counters
        (Method::GET, "/worker/status") => {
            to_boxed(routes::handle_worker_status(Arc::clone(&state)).await)
        }

        // Content repository passthrough
        (Method::GET, p) if p.starts_with("/content/") => {
            let kind = p.strip_prefix("/content/").unwrap_or("");
            to_boxed(routes::handle_content_query(Arc::clone(&state), kind, &query).await)
        }
        (Method::POST, p) if p.starts_with("/content/") => {
            let kind = p.strip_prefix("/content/").unwrap_or("").to_string();
            return Ok(to_boxed(
                routes::handle_content_insert(req, Arc::clone(&state), &kind).await,
            ));
        }

        // CORS preflight, only for routes the daemon answers itself; a
        // preflight aimed at the content app carries the origin's policy
        (Method::OPTIONS, p) if is_daemon_path(p) => to_boxed(preflight_response()),

        // Everything else belongs to the fronted content app
        _ => return Ok(handle_gateway(state, req).await),
    };

    Ok(response)
}

/// Serve a request through the cache worker, or forward it untouched
///
/// Bypassed requests go where they point: path-form targets are resolved
/// against the configured origin, absolute-form targets are forwarded
/// as-is, matching a pass-through that never rewrites foreign traffic.
async fn handle_gateway(state: Arc<AppState>, req: Request<Incoming>) -> Response<BoxBody> {
    let worker_request = WorkerRequest {
        method: req.method().as_str().to_string(),
        target: request_target(&req),
        accept: req
            .headers()
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    match state.worker.serve(&worker_request).await {
        FetchDecision::Bypass => forward_to_origin(state, req).await,
        FetchDecision::Served(ServedResponse::Live(upstream)) => {
            debug!(target = %worker_request.target, "Gateway served live response");
            passthrough_response(upstream.status, &upstream.headers, upstream.body)
        }
        FetchDecision::Served(ServedResponse::Cached(record)) => {
            debug!(target = %worker_request.target, "Gateway served cached copy");
            passthrough_response(record.status, &record.headers, record.body)
        }
        FetchDecision::Served(ServedResponse::OfflineFallback(record)) => {
            debug!(target = %worker_request.target, "Gateway served offline page");
            passthrough_response(record.status, &record.headers, record.body)
        }
        FetchDecision::Served(ServedResponse::Unavailable) => to_boxed(unavailable_response()),
    }
}

/// Forward a bypassed request to where it points
async fn forward_to_origin(state: Arc<AppState>, req: Request<Incoming>) -> Response<BoxBody> {
    let method = req.method().clone();
    let target = request_target(&req);
    let url = resolve_forward_url(&state.args.origin_base(), &target);
    let headers = end_to_end_headers(req.headers());

    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read request body for forwarding");
            return to_boxed(bad_request_response("Invalid body"));
        }
    };

    debug!(method = %method, url = %url, "Forwarding to origin");

    let mut builder = state.upstream.request(method, &url);
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !body_bytes.is_empty() {
        builder = builder.body(body_bytes);
    }

    match builder.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let headers = end_to_end_headers(response.headers());

            match response.bytes().await {
                Ok(body) => passthrough_response(status, &headers, body),
                Err(e) => {
                    warn!(error = %e, url = %url, "Failed to read origin response body");
                    to_boxed(bad_gateway_response(&format!(
                        "Failed to read origin response: {}",
                        e
                    )))
                }
            }
        }
        Err(e) => {
            warn!(error = %e, url = %url, "Failed to forward to origin");
            to_boxed(bad_gateway_response(&format!(
                "Failed to connect to origin: {}",
                e
            )))
        }
    }
}

/// Request target preserving absolute form, so a proxied URL keeps its host
fn request_target<B>(req: &Request<B>) -> String {
    let uri = req.uri();
    if uri.authority().is_some() {
        return uri.to_string();
    }
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Absolute targets already say where they go; path-form targets resolve
/// against the configured origin
fn resolve_forward_url(origin_base: &str, target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("{}{}", origin_base, target)
    }
}

/// Paths the daemon answers itself; everything else belongs to the origin
fn is_daemon_path(path: &str) -> bool {
    matches!(path, "/health" | "/healthz" | "/version")
        || path.starts_with("/alarm/")
        || path.starts_with("/content/")
        || path.starts_with("/worker/")
}

/// Rebuild a proxied or cached response, mirroring its retained headers
fn passthrough_response(
    status: u16,
    headers: &[(String, String)],
    body: Bytes,
) -> Response<BoxBody> {
    let mut builder =
        Response::builder().status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK));
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let response = builder.body(Full::new(body)).unwrap_or_else(|_| {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::new(Bytes::from(r#"{"error": "Internal error"}"#)))
            .unwrap()
    });
    to_boxed(response)
}

/// Convert `Response<Full<Bytes>>` to `Response<BoxBody>`
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Origin unreachable and nothing cached fits
fn unavailable_response() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Service Unavailable",
        "message": "Origin unreachable and no cached copy fits this request"
    });

    Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad gateway response
fn bad_gateway_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Gateway",
        "message": message
    });

    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
