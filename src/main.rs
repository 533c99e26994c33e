use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dvbviewer_livetv::config::Config;
use dvbviewer_livetv::routes;
use dvbviewer_livetv::services::{
    clock::SystemClock,
    dvbviewer::{DvbViewerClient, ImageUrlResolver},
    live_tv::LiveTvService,
    refresh_task::{start_refresh_task, RefreshTaskConfig},
};
use dvbviewer_livetv::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dvbviewer_livetv=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    config.validate()?;
    let port = config.port;

    tracing::info!("Starting DVBViewer Live TV v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Backend: {} (authentication: {}, timezone: {})",
        config.api_base_url(),
        config.requires_authentication,
        config.backend_timezone
    );

    // The client is both the transport and the logo URL resolver
    let client = Arc::new(DvbViewerClient::new(&config)?);
    let live_tv = Arc::new(LiveTvService::new(
        &config,
        client.clone(),
        Some(client as Arc<dyn ImageUrlResolver>),
        Arc::new(SystemClock),
    ));

    // Start refresh task (runs in background)
    let shutdown = CancellationToken::new();
    tokio::spawn(start_refresh_task(
        live_tv.coordinator(),
        live_tv.recordings(),
        RefreshTaskConfig::from(&config),
        shutdown.clone(),
    ));

    // Build application state
    let state = Arc::new(AppState {
        config,
        live_tv,
        start_time: Instant::now(),
    });

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/live", get(routes::health::live))
        // Channels & guide
        .route("/api/channels", get(routes::channels::list_channels))
        .route(
            "/api/channel-groups",
            get(routes::channels::list_channel_groups),
        )
        .route(
            "/api/channels/:id/programs",
            get(routes::channels::list_programs),
        )
        // Timers
        .route(
            "/api/timers",
            get(routes::timers::list_timers).post(routes::timers::create_timer),
        )
        .route("/api/timers/defaults", get(routes::timers::timer_defaults))
        .route(
            "/api/timers/:id",
            axum::routing::put(routes::timers::update_timer).delete(routes::timers::cancel_timer),
        )
        .route(
            "/api/series-timers",
            get(routes::timers::list_series_timers).post(routes::timers::create_series_timer),
        )
        .route(
            "/api/series-timers/:id",
            axum::routing::put(routes::timers::update_series_timer)
                .delete(routes::timers::cancel_series_timer),
        )
        // Recordings
        .route("/api/recordings", get(routes::recordings::list_recordings))
        .route(
            "/api/recordings/:id",
            axum::routing::delete(routes::recordings::delete_recording),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
