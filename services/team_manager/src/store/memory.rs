use async_trait::async_trait;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    not_found, AttendanceQuery, MatchQuery, ParticipationQuery, PlayerOrder, PlayerQuery,
    PracticeQuery, SortOrder, TeamStore,
};
use crate::error::{PersistenceError, StoreResult};
use crate::schema::{
    AttendanceEntry, AttendanceRow, MatchRecord, MatchRow, ParticipationEntry,
    ParticipationRow, PlayerRecord, PlayerRow, PracticeRecord, PracticeRow,
};
use crate::types::Relation;

#[derive(Default)]
struct Tables {
    players: Vec<PlayerRow>,
    practices: Vec<PracticeRow>,
    attendance: Vec<AttendanceRow>,
    matches: Vec<MatchRow>,
    participation: Vec<ParticipationRow>,
}

/// Process-local backend. Each write holds the single table lock for its
/// whole duration, so parent and child rows change together.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

fn apply_limit<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

fn attendance_rows(practice_id: Uuid, attendance: &[AttendanceEntry]) -> Vec<AttendanceRow> {
    attendance
        .iter()
        .map(|entry| AttendanceRow {
            id: Uuid::new_v4(),
            practice_id,
            player_id: entry.player_id,
            status: entry.status,
        })
        .collect()
}

fn participation_rows(match_id: Uuid, entries: &[ParticipationEntry]) -> Vec<ParticipationRow> {
    entries
        .iter()
        .map(|entry| ParticipationRow {
            id: Uuid::new_v4(),
            match_id,
            player_id: entry.player_id,
            minutes_played: entry.minutes_played,
            substitution_time: entry.substitution_time,
            position: entry.position.clone(),
            status: entry.status,
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Rejected {
                status: 503,
                message: "memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TeamStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list_players(&self, query: &PlayerQuery) -> StoreResult<Vec<PlayerRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let needle = query.name_contains.as_ref().map(|t| t.to_lowercase());
        let mut rows: Vec<PlayerRow> = tables
            .players
            .iter()
            .filter(|p| match &needle {
                Some(needle) => p.full_name.to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect();
        match query.order {
            PlayerOrder::FullName => {
                rows.sort_by(|a, b| {
                    (a.full_name.to_lowercase(), &a.full_name)
                        .cmp(&(b.full_name.to_lowercase(), &b.full_name))
                });
            }
            PlayerOrder::GoalsScoredDesc => rows.sort_by_key(|p| Reverse(p.goals_scored)),
        }
        Ok(apply_limit(rows, query.limit))
    }

    async fn find_player(&self, id: Uuid) -> StoreResult<Option<PlayerRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables.players.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_player(&self, record: &PlayerRecord) -> StoreResult<PlayerRow> {
        self.check_available()?;
        let row = record.clone().into_row(Uuid::new_v4());
        self.tables.lock().await.players.push(row.clone());
        Ok(row)
    }

    async fn update_player(&self, id: Uuid, record: &PlayerRecord) -> StoreResult<PlayerRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let slot = tables
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(Relation::Players, id))?;
        *slot = record.clone().into_row(id);
        Ok(slot.clone())
    }

    async fn delete_player(&self, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let before = tables.players.len();
        tables.players.retain(|p| p.id != id);
        if tables.players.len() == before {
            return Err(not_found(Relation::Players, id));
        }
        tables.attendance.retain(|a| a.player_id != id);
        tables.participation.retain(|p| p.player_id != id);
        Ok(())
    }

    async fn list_practices(&self, query: &PracticeQuery) -> StoreResult<Vec<PracticeRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut rows: Vec<PracticeRow> = tables
            .practices
            .iter()
            .filter(|p| query.from.map_or(true, |from| p.date >= from))
            .cloned()
            .collect();
        match query.order {
            SortOrder::Ascending => rows.sort_by_key(|p| p.date),
            SortOrder::Descending => rows.sort_by_key(|p| Reverse(p.date)),
        }
        Ok(apply_limit(rows, query.limit))
    }

    async fn list_attendance(&self, query: &AttendanceQuery) -> StoreResult<Vec<AttendanceRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .attendance
            .iter()
            .filter(|a| {
                query
                    .practice_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&a.practice_id))
                    && query.player_id.map_or(true, |id| a.player_id == id)
                    && query.status.map_or(true, |s| a.status == s)
            })
            .cloned()
            .collect())
    }

    async fn create_practice(
        &self,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let row = record.clone().into_row(Uuid::new_v4());
        tables.practices.push(row.clone());
        tables.attendance.extend(attendance_rows(row.id, attendance));
        Ok(row)
    }

    async fn update_practice(
        &self,
        id: Uuid,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let slot = tables
            .practices
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(Relation::Practices, id))?;
        *slot = record.clone().into_row(id);
        let row = slot.clone();
        tables.attendance.retain(|a| a.practice_id != id);
        tables.attendance.extend(attendance_rows(id, attendance));
        Ok(row)
    }

    async fn delete_practice(&self, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let before = tables.practices.len();
        tables.practices.retain(|p| p.id != id);
        if tables.practices.len() == before {
            return Err(not_found(Relation::Practices, id));
        }
        tables.attendance.retain(|a| a.practice_id != id);
        Ok(())
    }

    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut rows = tables.matches.clone();
        match query.order {
            SortOrder::Ascending => rows.sort_by_key(|m| m.date),
            SortOrder::Descending => rows.sort_by_key(|m| Reverse(m.date)),
        }
        Ok(apply_limit(rows, query.limit))
    }

    async fn list_participation(
        &self,
        query: &ParticipationQuery,
    ) -> StoreResult<Vec<ParticipationRow>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .participation
            .iter()
            .filter(|p| {
                query
                    .match_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&p.match_id))
                    && query.player_id.map_or(true, |id| p.player_id == id)
                    && query.status.map_or(true, |s| p.status == s)
            })
            .cloned()
            .collect())
    }

    async fn create_match(
        &self,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let row = record.clone().into_row(Uuid::new_v4());
        tables.matches.push(row.clone());
        tables
            .participation
            .extend(participation_rows(row.id, participation));
        Ok(row)
    }

    async fn update_match(
        &self,
        id: Uuid,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let slot = tables
            .matches
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(Relation::Matches, id))?;
        *slot = record.clone().into_row(id);
        let row = slot.clone();
        tables.participation.retain(|p| p.match_id != id);
        tables
            .participation
            .extend(participation_rows(id, participation));
        Ok(row)
    }

    async fn delete_match(&self, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let before = tables.matches.len();
        tables.matches.retain(|m| m.id != id);
        if tables.matches.len() == before {
            return Err(not_found(Relation::Matches, id));
        }
        tables.participation.retain(|p| p.match_id != id);
        Ok(())
    }

    async fn count(&self, relation: Relation) -> StoreResult<u64> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let count = match relation {
            Relation::Players => tables.players.len(),
            Relation::Practices => tables.practices.len(),
            Relation::PracticeAttendance => tables.attendance.len(),
            Relation::Matches => tables.matches.len(),
            Relation::MatchParticipation => tables.participation.len(),
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttendanceStatus;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn player(name: &str, goals: i32) -> PlayerRecord {
        PlayerRecord {
            profile_photo: String::new(),
            full_name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2010, 3, 1).unwrap(),
            health_card_expiration: NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
            goals_scored: goals,
            goals_against: 0,
            position: None,
        }
    }

    #[tokio::test]
    async fn test_players_sorted_and_searched() {
        let store = MemoryStore::new();
        store.insert_player(&player("zoe Martín", 2)).await.unwrap();
        store.insert_player(&player("Alba Gil", 9)).await.unwrap();
        store.insert_player(&player("Marta Ríos", 5)).await.unwrap();

        let names: Vec<String> = store
            .list_players(&PlayerQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.full_name)
            .collect();
        assert_eq!(names, vec!["Alba Gil", "Marta Ríos", "zoe Martín"]);

        let found = store.list_players(&PlayerQuery::search("MAR")).await.unwrap();
        assert_eq!(found.len(), 2);

        let top = store
            .list_players(&PlayerQuery {
                order: PlayerOrder::GoalsScoredDesc,
                limit: Some(1),
                ..PlayerQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(top[0].full_name, "Alba Gil");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_ids() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update_player(missing, &player("X", 0)).await,
            Err(PersistenceError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_practice(missing).await,
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_practice_delete_cascades() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let practice = store
            .create_practice(
                &PracticeRecord {
                    date: Utc.with_ymd_and_hms(2026, 10, 1, 18, 0, 0).unwrap(),
                    notes: None,
                },
                &[AttendanceEntry {
                    player_id: a,
                    status: AttendanceStatus::Present,
                }],
            )
            .await
            .unwrap();
        assert_eq!(store.count(Relation::PracticeAttendance).await.unwrap(), 1);

        store.delete_practice(practice.id).await.unwrap();
        assert_eq!(store.count(Relation::Practices).await.unwrap(), 0);
        assert_eq!(store.count(Relation::PracticeAttendance).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_instead_of_returning_empty() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.list_players(&PlayerQuery::default()).await.is_err());
        store.set_unavailable(false);
        assert!(store
            .list_players(&PlayerQuery::default())
            .await
            .unwrap()
            .is_empty());
    }
}
