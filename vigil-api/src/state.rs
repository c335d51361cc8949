//! Shared application state for Axum handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil_analyzer::Analyzer;

/// State cloned into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub start_time: Instant,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(analyzer: Arc<Analyzer>, request_timeout: Duration) -> Self {
        Self {
            analyzer,
            start_time: Instant::now(),
            request_timeout,
        }
    }
}
