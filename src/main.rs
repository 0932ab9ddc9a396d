use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use alt_text_engine::app_state::AppState;
use alt_text_engine::config::AppConfig;
use alt_text_engine::services::queue::ScanQueue;
use alt_text_engine::{db, routes};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing alt-text-engine server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // Register application metrics
    metrics::describe_histogram!(
        "scan_duration_seconds",
        "Time to run one full catalog scan"
    );
    metrics::describe_histogram!(
        "caption_generation_seconds",
        "Time to generate one alt-text caption"
    );
    metrics::describe_counter!("scans_completed_total", "Total catalog scans completed");
    metrics::describe_counter!(
        "images_updated_total",
        "Total images that received new alt text"
    );
    metrics::describe_counter!(
        "images_failed_total",
        "Total images whose processing failed"
    );
    metrics::describe_counter!(
        "failed_jobs_recovered_total",
        "Dead-letter jobs recovered by the background retry sweep"
    );
    metrics::describe_counter!(
        "failed_jobs_rescheduled_total",
        "Dead-letter jobs rescheduled after an unsuccessful retry"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize Redis scan queue
    tracing::info!("Connecting to Redis scan queue");
    let queue = ScanQueue::new(&config.redis_url).expect("Failed to initialize scan queue");

    // Create shared application state
    let state = AppState::new(db_pool, queue);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/scans",
            post(routes::scans::start_scan).get(routes::scans::list_scans),
        )
        .route("/api/v1/scans/{scan_id}", get(routes::scans::get_scan))
        .route(
            "/api/v1/settings",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route("/api/v1/jobs", get(routes::jobs::list_failed_jobs))
        .route("/api/v1/analytics", get(routes::jobs::shop_analytics))
        .with_state(state)
        // Prometheus metrics endpoint (no shared state)
        .route(
            "/metrics",
            get(move || std::future::ready(prometheus_handle.render())),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting alt-text-engine on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
