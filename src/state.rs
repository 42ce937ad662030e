use std::sync::Arc;

use campus_config::{CorsConfig, EmailConfig, JwtConfig, RateLimitConfig, UploadConfig};
use campus_core::file_storage::{FileStorage, LocalFileStorage};
use sqlx::PgPool;

use crate::middleware::rate_limit::RateLimiters;
use crate::modules::notifications::hub::NotificationHub;
use crate::modules::reports::aggregator::{DatabaseReportAggregator, ReportAggregator};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub email_config: EmailConfig,
    pub cors_config: CorsConfig,
    pub rate_limiters: RateLimiters,
    pub storage: Arc<dyn FileStorage>,
    pub hub: NotificationHub,
    pub report_aggregator: Arc<dyn ReportAggregator>,
}

impl AppState {
    /// State wired from environment configuration around an existing pool.
    pub fn from_env(db: PgPool) -> Self {
        let uploads = UploadConfig::from_env();
        Self {
            report_aggregator: Arc::new(DatabaseReportAggregator::new(db.clone())),
            db,
            jwt_config: JwtConfig::from_env(),
            email_config: EmailConfig::from_env(),
            cors_config: CorsConfig::from_env(),
            rate_limiters: RateLimiters::new(&RateLimitConfig::from_env()),
            storage: Arc::new(LocalFileStorage::new(uploads.dir, uploads.base_url)),
            hub: NotificationHub::new(),
        }
    }

    pub fn with_rate_limits(mut self, config: &RateLimitConfig) -> Self {
        self.rate_limiters = RateLimiters::new(config);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn FileStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_report_aggregator(mut self, aggregator: Arc<dyn ReportAggregator>) -> Self {
        self.report_aggregator = aggregator;
        self
    }
}
