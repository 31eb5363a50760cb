pub mod advisor;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod relay;
pub mod store;

use std::sync::Arc;

use config::GlowdConfig;

/// Shared state passed to every relay request handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<GlowdConfig>,
    /// Reused HTTP client for upstream calls (connection pooling).
    pub http: reqwest::Client,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: Arc<GlowdConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            config,
            http,
            started_at: std::time::Instant::now(),
        }
    }
}
