//! Storage seam. Services talk to a [`TeamStore`]; each backend decides how
//! a parent row and its child rows are written together.

pub mod memory;
pub mod postgres;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::{BackendKind, TeamConfig};
use crate::error::{PersistenceError, StoreResult};
use crate::schema::{
    AttendanceEntry, AttendanceRow, MatchRecord, MatchRow, ParticipationEntry,
    ParticipationRow, PlayerRecord, PlayerRow, PracticeRecord, PracticeRow,
};
use crate::types::{AttendanceStatus, ParticipationStatus, Relation};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerOrder {
    #[default]
    FullName,
    GoalsScoredDesc,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerQuery {
    /// Case-insensitive substring match on `full_name`.
    pub name_contains: Option<String>,
    pub order: PlayerOrder,
    pub limit: Option<usize>,
}

impl PlayerQuery {
    pub fn search(term: &str) -> Self {
        Self {
            name_contains: Some(term.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PracticeQuery {
    /// Only practices dated at or after this instant.
    pub from: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceQuery {
    pub practice_ids: Option<Vec<Uuid>>,
    pub player_id: Option<Uuid>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub order: SortOrder,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ParticipationQuery {
    pub match_ids: Option<Vec<Uuid>>,
    pub player_id: Option<Uuid>,
    pub status: Option<ParticipationStatus>,
}

#[async_trait]
pub trait TeamStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    async fn list_players(&self, query: &PlayerQuery) -> StoreResult<Vec<PlayerRow>>;
    async fn find_player(&self, id: Uuid) -> StoreResult<Option<PlayerRow>>;
    async fn insert_player(&self, record: &PlayerRecord) -> StoreResult<PlayerRow>;
    /// Fails with [`PersistenceError::NotFound`] when `id` does not exist.
    async fn update_player(&self, id: Uuid, record: &PlayerRecord) -> StoreResult<PlayerRow>;
    async fn delete_player(&self, id: Uuid) -> StoreResult<()>;

    async fn list_practices(&self, query: &PracticeQuery) -> StoreResult<Vec<PracticeRow>>;
    async fn list_attendance(&self, query: &AttendanceQuery) -> StoreResult<Vec<AttendanceRow>>;
    /// Inserts the practice and one attendance row per entry.
    async fn create_practice(
        &self,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow>;
    /// Updates the practice and leaves exactly `attendance` as its attendance rows.
    async fn update_practice(
        &self,
        id: Uuid,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow>;
    /// Removes the practice together with its attendance rows.
    async fn delete_practice(&self, id: Uuid) -> StoreResult<()>;

    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchRow>>;
    async fn list_participation(
        &self,
        query: &ParticipationQuery,
    ) -> StoreResult<Vec<ParticipationRow>>;
    async fn create_match(
        &self,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow>;
    async fn update_match(
        &self,
        id: Uuid,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow>;
    async fn delete_match(&self, id: Uuid) -> StoreResult<()>;

    async fn count(&self, relation: Relation) -> StoreResult<u64>;
}

pub(crate) fn not_found(relation: Relation, id: Uuid) -> PersistenceError {
    PersistenceError::NotFound {
        relation,
        id: id.to_string(),
    }
}

/// Escapes `LIKE` wildcards so a search term matches literally, as it does
/// in the in-memory store.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builds the backend selected by `config`.
pub async fn connect(config: &TeamConfig) -> StoreResult<Arc<dyn TeamStore>> {
    match config.backend {
        BackendKind::Postgres => {
            let url = config.postgres.database_url.as_deref().ok_or_else(|| {
                PersistenceError::Unsupported("DATABASE_URL is not set".to_string())
            })?;
            let store = PgStore::connect(
                url,
                config.postgres.max_connections,
                Duration::from_secs(config.request_timeout_secs),
            )
            .await?;
            info!("Connected to Postgres backend");
            Ok(Arc::new(store))
        }
        BackendKind::Rest => {
            let base_url = config.rest.base_url.as_deref().ok_or_else(|| {
                PersistenceError::Unsupported("SUPABASE_URL is not set".to_string())
            })?;
            let api_key = config.rest.api_key.as_deref().ok_or_else(|| {
                PersistenceError::Unsupported("SUPABASE_ANON_KEY is not set".to_string())
            })?;
            let store = RestStore::new(
                base_url,
                api_key,
                Duration::from_secs(config.request_timeout_secs),
            )?;
            info!("Using REST backend at {}", base_url);
            Ok(Arc::new(store))
        }
        BackendKind::Memory => {
            info!("Using in-memory backend; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Ana"), "Ana");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
