pub mod config;
pub mod dashboard;
pub mod deletion;
pub mod error;
pub mod matches;
pub mod metrics;
pub mod players;
pub mod practices;
pub mod schema;
pub mod stats;
pub mod store;
pub mod types;
pub mod utils;
pub mod validation;
pub mod web;

use std::future::Future;
use std::sync::Arc;
use tracing::error;

use crate::config::TeamConfig;
use crate::error::{Result, StoreResult};
use crate::metrics::MetricsCollector;
use crate::store::TeamStore;

/// Handle shared by every service: the storage backend plus the
/// collector that records each backend call.
#[derive(Clone)]
pub struct Team {
    pub store: Arc<dyn TeamStore>,
    pub metrics: MetricsCollector,
    pub config: TeamConfig,
}

impl Team {
    pub fn new(store: Arc<dyn TeamStore>, config: TeamConfig) -> Self {
        Self {
            store,
            metrics: MetricsCollector::new(),
            config,
        }
    }

    /// Runs one backend call, recording it and logging any failure before
    /// handing it back to the caller.
    pub(crate) async fn observe<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let tracker = self.metrics.record_call_start(operation);
        match call.await {
            Ok(value) => {
                tracker.finish(true);
                Ok(value)
            }
            Err(e) => {
                error!("Error {}: {}", operation, e);
                tracker.finish_with_error(&e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn players(&self) -> players::PlayerService<'_> {
        players::PlayerService::new(self)
    }

    pub fn practices(&self) -> practices::PracticeService<'_> {
        practices::PracticeService::new(self)
    }

    pub fn matches(&self) -> matches::MatchService<'_> {
        matches::MatchService::new(self)
    }
}
