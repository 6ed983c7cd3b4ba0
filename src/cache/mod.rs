//! Offline cache layer for the content app
//!
//! Two pieces:
//!
//! - **Generations**: named, versioned response stores (`holyseeds-v1`);
//!   activation drops every generation but the current one
//! - **Worker**: the install/activate/fetch lifecycle and the network-first
//!   interception strategy, plus the host that gates serving on phase

pub mod generations;
pub mod worker;

pub use generations::{CacheRecord, Generation, GenerationStore};
pub use worker::{
    end_to_end_headers, AssetCacheWorker, FetchDecision, HttpOriginFetcher, OriginFetcher,
    ServedResponse, UpstreamResponse, WorkerCommand, WorkerHost, WorkerPhase, WorkerRequest,
    WorkerStatsSnapshot, spawn_worker_task, CACHE_GENERATION, OFFLINE_PATH, STATIC_ASSETS,
};
