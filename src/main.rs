//! Sexton - alarm and offline caretaker for the HolySeeds content client
//!
//! "Watch ye therefore ... at the cockcrowing, or in the morning" - Mark 13:35

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sexton::{
    alarm::{spawn_alarm_task, AlarmScheduler, HandoffPolicy, SystemClock},
    cache::spawn_worker_task,
    config::Args,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sexton={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let policy = match args.handoff_policy.parse::<HandoffPolicy>() {
        Ok(policy) => policy,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Print startup banner
    info!("======================================");
    info!("  Sexton - HolySeeds caretaker");
    info!("  \"Watch ye therefore\" - Mark 13:35");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Origin: {}", args.origin_base());
    info!("Public URL: {}", args.public_url());
    info!("Settings file: {}", args.settings_path().display());
    info!(
        "Content API: {}",
        args.repo_url.as_deref().unwrap_or("(not configured)")
    );
    info!("Handoff policy: {}", args.handoff_policy);
    info!("Skip waiting: {}", args.skip_waiting);
    info!("======================================");

    // Build application state; the worker and alarm tasks hang off it
    let state = Arc::new(server::AppState::new(args.clone()));

    // Start the cache worker lifecycle (install, then waiting or active)
    let _worker_handle = spawn_worker_task(
        Arc::clone(&state.worker),
        Duration::from_secs(args.install_retry_secs),
    );

    // Start the once-per-second alarm loop
    let scheduler = Arc::new(AlarmScheduler::new(
        Arc::clone(&state.settings),
        Arc::clone(&state.gate),
        Arc::clone(&state.handoff),
        Arc::new(SystemClock),
        policy,
        &args.public_url(),
    ));
    let _alarm_handle = spawn_alarm_task(scheduler);

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
