use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Postgres, QueryBuilder, Transaction,
};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    escape_like, not_found, AttendanceQuery, MatchQuery, ParticipationQuery, PlayerOrder,
    PlayerQuery, PracticeQuery, SortOrder, TeamStore,
};
use crate::error::StoreResult;
use crate::schema::{
    AttendanceEntry, AttendanceRow, MatchRecord, MatchRow, ParticipationEntry,
    ParticipationRow, PlayerRecord, PlayerRow, PracticeRecord, PracticeRow,
};
use crate::types::Relation;

const PLAYER_COLUMNS: &str = "id, profile_photo, full_name, date_of_birth, \
     health_card_expiration, goals_scored, goals_against, position";
const MATCH_COLUMNS: &str = "id, date, rival, home_score, away_score, venue, coach";
const PARTICIPATION_COLUMNS: &str =
    "id, match_id, player_id, minutes_played, substitution_time, position, status";

/// Postgres backend. Parent and child writes share one transaction and the
/// schema cascades child rows on delete.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn order_keyword(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    }
}

fn push_limit(builder: &mut QueryBuilder<'_, Postgres>, limit: Option<usize>) {
    if let Some(limit) = limit {
        builder.push(" LIMIT ").push_bind(limit as i64);
    }
}

async fn insert_attendance(
    tx: &mut Transaction<'_, Postgres>,
    practice_id: Uuid,
    attendance: &[AttendanceEntry],
) -> StoreResult<()> {
    if attendance.is_empty() {
        return Ok(());
    }
    let mut builder =
        QueryBuilder::new("INSERT INTO practice_attendance (practice_id, player_id, status) ");
    builder.push_values(attendance, |mut row, entry| {
        row.push_bind(practice_id)
            .push_bind(entry.player_id)
            .push_bind(entry.status);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

async fn insert_participation(
    tx: &mut Transaction<'_, Postgres>,
    match_id: Uuid,
    participation: &[ParticipationEntry],
) -> StoreResult<()> {
    if participation.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::new(
        "INSERT INTO match_participation \
         (match_id, player_id, minutes_played, substitution_time, position, status) ",
    );
    builder.push_values(participation, |mut row, entry| {
        row.push_bind(match_id)
            .push_bind(entry.player_id)
            .push_bind(entry.minutes_played)
            .push_bind(entry.substitution_time)
            .push_bind(entry.position.clone())
            .push_bind(entry.status);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

impl PgStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn delete_by_id(&self, relation: Relation, id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", relation.table_name());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(not_found(relation, id));
        }
        debug!("Deleted {} row {}", relation, id);
        Ok(())
    }
}

#[async_trait]
impl TeamStore for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn list_players(&self, query: &PlayerQuery) -> StoreResult<Vec<PlayerRow>> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM players", PLAYER_COLUMNS));
        if let Some(term) = &query.name_contains {
            builder
                .push(" WHERE full_name ILIKE ")
                .push_bind(format!("%{}%", escape_like(term)));
        }
        builder.push(match query.order {
            PlayerOrder::FullName => " ORDER BY full_name ASC",
            PlayerOrder::GoalsScoredDesc => " ORDER BY goals_scored DESC, full_name ASC",
        });
        push_limit(&mut builder, query.limit);
        Ok(builder
            .build_query_as::<PlayerRow>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_player(&self, id: Uuid) -> StoreResult<Option<PlayerRow>> {
        let sql = format!("SELECT {} FROM players WHERE id = $1", PLAYER_COLUMNS);
        Ok(sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_player(&self, record: &PlayerRecord) -> StoreResult<PlayerRow> {
        let sql = format!(
            "INSERT INTO players (profile_photo, full_name, date_of_birth, \
             health_card_expiration, goals_scored, goals_against, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PLAYER_COLUMNS
        );
        Ok(sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(&record.profile_photo)
            .bind(&record.full_name)
            .bind(record.date_of_birth)
            .bind(record.health_card_expiration)
            .bind(record.goals_scored)
            .bind(record.goals_against)
            .bind(&record.position)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_player(&self, id: Uuid, record: &PlayerRecord) -> StoreResult<PlayerRow> {
        let sql = format!(
            "UPDATE players SET profile_photo = $2, full_name = $3, date_of_birth = $4, \
             health_card_expiration = $5, goals_scored = $6, goals_against = $7, position = $8 \
             WHERE id = $1 RETURNING {}",
            PLAYER_COLUMNS
        );
        sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(id)
            .bind(&record.profile_photo)
            .bind(&record.full_name)
            .bind(record.date_of_birth)
            .bind(record.health_card_expiration)
            .bind(record.goals_scored)
            .bind(record.goals_against)
            .bind(&record.position)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(Relation::Players, id))
    }

    async fn delete_player(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id(Relation::Players, id).await
    }

    async fn list_practices(&self, query: &PracticeQuery) -> StoreResult<Vec<PracticeRow>> {
        let mut builder = QueryBuilder::new("SELECT id, date, notes FROM practices");
        if let Some(from) = query.from {
            builder.push(" WHERE date >= ").push_bind(from);
        }
        builder.push(" ORDER BY date ").push(order_keyword(query.order));
        push_limit(&mut builder, query.limit);
        Ok(builder
            .build_query_as::<PracticeRow>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_attendance(&self, query: &AttendanceQuery) -> StoreResult<Vec<AttendanceRow>> {
        let mut builder = QueryBuilder::new(
            "SELECT id, practice_id, player_id, status FROM practice_attendance WHERE TRUE",
        );
        if let Some(ids) = &query.practice_ids {
            builder.push(" AND practice_id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(player_id) = query.player_id {
            builder.push(" AND player_id = ").push_bind(player_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        Ok(builder
            .build_query_as::<AttendanceRow>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_practice(
        &self,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, PracticeRow>(
            "INSERT INTO practices (date, notes) VALUES ($1, $2) RETURNING id, date, notes",
        )
        .bind(record.date)
        .bind(&record.notes)
        .fetch_one(&mut *tx)
        .await?;
        insert_attendance(&mut tx, row.id, attendance).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_practice(
        &self,
        id: Uuid,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, PracticeRow>(
            "UPDATE practices SET date = $2, notes = $3 WHERE id = $1 RETURNING id, date, notes",
        )
        .bind(id)
        .bind(record.date)
        .bind(&record.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(Relation::Practices, id))?;

        sqlx::query("DELETE FROM practice_attendance WHERE practice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_attendance(&mut tx, id, attendance).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn delete_practice(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id(Relation::Practices, id).await
    }

    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchRow>> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM matches", MATCH_COLUMNS));
        builder.push(" ORDER BY date ").push(order_keyword(query.order));
        push_limit(&mut builder, query.limit);
        Ok(builder
            .build_query_as::<MatchRow>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_participation(
        &self,
        query: &ParticipationQuery,
    ) -> StoreResult<Vec<ParticipationRow>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM match_participation WHERE TRUE",
            PARTICIPATION_COLUMNS
        ));
        if let Some(ids) = &query.match_ids {
            builder.push(" AND match_id = ANY(").push_bind(ids.clone()).push(")");
        }
        if let Some(player_id) = query.player_id {
            builder.push(" AND player_id = ").push_bind(player_id);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        Ok(builder
            .build_query_as::<ParticipationRow>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_match(
        &self,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow> {
        let sql = format!(
            "INSERT INTO matches (date, rival, home_score, away_score, venue, coach) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            MATCH_COLUMNS
        );
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(record.date)
            .bind(&record.rival)
            .bind(record.home_score)
            .bind(record.away_score)
            .bind(&record.venue)
            .bind(&record.coach)
            .fetch_one(&mut *tx)
            .await?;
        insert_participation(&mut tx, row.id, participation).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn update_match(
        &self,
        id: Uuid,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow> {
        let sql = format!(
            "UPDATE matches SET date = $2, rival = $3, home_score = $4, away_score = $5, \
             venue = $6, coach = $7 WHERE id = $1 RETURNING {}",
            MATCH_COLUMNS
        );
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(id)
            .bind(record.date)
            .bind(&record.rival)
            .bind(record.home_score)
            .bind(record.away_score)
            .bind(&record.venue)
            .bind(&record.coach)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found(Relation::Matches, id))?;

        sqlx::query("DELETE FROM match_participation WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_participation(&mut tx, id, participation).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn delete_match(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id(Relation::Matches, id).await
    }

    async fn count(&self, relation: Relation) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", relation.table_name());
        let count = sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}
