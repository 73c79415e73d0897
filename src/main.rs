use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{config::Config, controllers, services::Reconciler, store::PgStore, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    if config.app.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting cinema booking API ({})", config.app.environment);

    let app_state = AppState::new(config).await?;
    let config = &app_state.config;

    app_state.cache.warmup_cache(&app_state.booking).await;
    info!("Cache warmed up");

    // --- Start background tasks ---

    // Сверка is_booked_out с фактическими бронями
    let reconciler = Reconciler::new(PgStore::new(&app_state.db));
    let interval = Duration::from_secs(config.booking.reconcile_interval_secs);
    task::spawn(reconciler.run_every(interval));

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Cinema booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
