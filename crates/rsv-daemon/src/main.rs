//! rsv-daemon entry point.
//!
//! Sets up tracing, connects the store, starts the file watch and the HTTP
//! server, and shuts both down on Ctrl-C. Handlers live in `routes.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use rsv_config::EngineConfig;
use rsv_csv::SiteController;
use rsv_daemon::{routes, state, watch::spawn_watch};
use rsv_db::PgStore;
use rsv_reconcile::FilePoller;
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = EngineConfig::from_env()?;
    init_tracing();
    for w in &loaded.warnings {
        warn!("config: {w}");
    }
    let cfg = loaded.config;

    let site_controller = SiteController::parse(&cfg.watch.site_controller)?;

    let pool = rsv_db::connect(cfg.require_database_url()?).await?;
    rsv_db::migrate(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let (stop_tx, stop_rx) = watch::channel(false);
    let shared = Arc::new(state::AppState::new(
        Arc::clone(&store),
        cfg.upload_dir.clone(),
        stop_rx.clone(),
    ));

    let seed = shared
        .tracker()
        .latest_created_time()
        .await
        .context("read watermark seed failed")?;
    let poller = FilePoller::new(
        cfg.watch.mount_path.clone(),
        cfg.watch.polling_interval(),
        seed,
        tracing::info_span!("poller"),
    );
    let handles = spawn_watch(Arc::clone(&shared), poller, site_controller, stop_rx);

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("rsv-daemon listening on http://{}", cfg.daemon_addr);
    axum::serve(tokio::net::TcpListener::bind(cfg.daemon_addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(stop_tx))
        .await
        .context("server crashed")?;

    match handles.poller.await {
        Ok(watermark) => info!(?watermark, "poller stopped"),
        Err(e) => error!(error = %e, "poller task failed"),
    }
    if let Err(e) = handles.consumer.await {
        error!(error = %e, "consumer task failed");
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Resolve on Ctrl-C and tell the poller and in-flight batches to stop.
async fn shutdown_signal(stop: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "ctrl-c handler failed");
    }
    info!("shutdown requested");
    let _ = stop.send(true);
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
