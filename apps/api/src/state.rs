use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::clock::Clock;
use crate::config::Config;
use crate::events::EventHub;
use crate::notifications::dispatcher::Dispatcher;
use crate::session::StatusSource;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Object store for proof photos.
    pub s3: S3Client,
    pub config: Config,
    /// Shared by the HTTP callable, the scheduled sweep and session monitors.
    pub dispatcher: Arc<Dispatcher>,
    pub events: EventHub,
    /// Local-day clock. Every "today" and minute-of-day comes from here.
    pub clock: Arc<dyn Clock>,
    pub status_source: Arc<dyn StatusSource>,
}
