use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::adapters::PostgresStore;
use crate::game::GuessOrchestrator;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<GuessOrchestrator>,

    /// Set when backed by Postgres; the health endpoint probes it.
    /// In-memory runs have nothing to probe.
    pub store: Option<Arc<PostgresStore>>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<GuessOrchestrator>, store: Option<Arc<PostgresStore>>) -> Self {
        Self {
            orchestrator,
            store,
            start_time: Utc::now(),
        }
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
