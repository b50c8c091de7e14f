//! sf-daemon entry point.
//!
//! Loads layered config, connects and migrates the database, wires the
//! workflow to Postgres and the local image directory, then serves the
//! router from `routes.rs` until ctrl-c.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use sf_config::{ConfigMode, UnusedKeyPolicy};
use sf_daemon::{routes, state};
use sf_db::PgBackend;
use sf_workflow::{ChangeFeed, LocalDirStore, Workflow, WorkflowSettings};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_paths = std::env::var("SF_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let paths: Vec<&str> = config_paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let loaded = sf_config::load_layered_yaml(&paths)?;
    let settings = loaded.settings()?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let unused =
        sf_config::report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(pointer = %ptr, "config key is not read by sf-daemon");
    }

    let secrets = sf_config::resolve_secrets(&loaded.config_json, ConfigMode::Daemon)?;
    let url = secrets
        .database_url
        .as_deref()
        .with_context(|| format!("{} is not set", secrets.database_url_env))?;

    let pool = sf_db::connect(url, settings.database.max_connections).await?;
    sf_db::migrate(&pool).await?;

    let feed = ChangeFeed::new(settings.realtime.channel_capacity);
    let backend = Arc::new(PgBackend::new(pool, feed.clone()));
    let objects = Arc::new(LocalDirStore::new(
        settings.storage.root_dir.clone(),
        settings.storage.public_base_url.clone(),
    ));
    let workflow = Workflow::new(
        backend,
        objects,
        WorkflowSettings {
            max_submission_rows: settings.submission.max_rows,
            default_list_limit: settings.catalog.default_limit,
        },
    );

    let shared = Arc::new(state::AppState::new(workflow, feed));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(a) => a,
        None => settings
            .server
            .bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid server.bind_addr {:?}", settings.server.bind_addr))?,
    };
    info!("sf-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("SF_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
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
        "http://localhost:8080",
        "http://127.0.0.1:8080",
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
