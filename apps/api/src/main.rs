mod accounts;
mod adherence;
mod auth;
mod clock;
mod config;
mod db;
mod errors;
mod events;
mod logs;
mod medications;
mod models;
mod notifications;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::timeout::TimeoutConfig;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::accounts::PgAccountDirectory;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::create_pool;
use crate::events::EventHub;
use crate::notifications::dispatcher::Dispatcher;
use crate::notifications::mailer::HttpMailer;
use crate::notifications::store::PgNotificationStore;
use crate::notifications::sweep::spawn_sweeper;
use crate::routes::build_router;
use crate::session::PgStatusSource;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;
    config.check_infrastructure()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MedTrack API v{}", env!("CARGO_PKG_VERSION"));

    let offset = config.local_offset()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(offset));
    info!("Local day evaluated at UTC{offset}");

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize mail relay
    let mailer = HttpMailer::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
        config.mail_timeout(),
    )?;
    info!("Mail relay client initialized ({})", config.mail_api_url);

    let events = EventHub::default();
    let dispatcher = Arc::new(
        Dispatcher::new(
            Arc::new(PgNotificationStore::new(db.clone())),
            Arc::new(mailer),
            Arc::new(PgAccountDirectory::new(db.clone())),
            events.clone(),
        )
        .with_timeouts(config.store_timeout(), config.mail_timeout()),
    );

    // Scheduled missed-dose sweep
    spawn_sweeper(
        db.clone(),
        dispatcher.clone(),
        clock.clone(),
        Duration::from_secs(config.sweep_interval_secs.max(1)),
        config.sweep_window_minutes,
    );
    info!(
        "Missed-dose sweep every {}s, {} minute window",
        config.sweep_interval_secs, config.sweep_window_minutes
    );

    // Build app state
    let state = AppState {
        status_source: Arc::new(PgStatusSource::new(db.clone())),
        db,
        s3,
        config: config.clone(),
        dispatcher,
        events,
        clock,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "medtrack-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(config.store_timeout())
                .build(),
        )
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
