//! PostgREST backend (Supabase `rest/v1`). Each request is its own
//! transaction, so parent and child writes are sequenced so that a failure
//! leaves the previous state or a retryable one, never a half-written parent.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    escape_like, not_found, AttendanceQuery, MatchQuery, ParticipationQuery, PlayerOrder,
    PlayerQuery, PracticeQuery, SortOrder, TeamStore,
};
use crate::error::{PersistenceError, StoreResult};
use crate::schema::{
    AttendanceEntry, AttendanceRecord, AttendanceRow, MatchRecord, MatchRow,
    ParticipationEntry, ParticipationRecord, ParticipationRow, PlayerRecord, PlayerRow,
    PracticeRecord, PracticeRow,
};
use crate::types::Relation;

const RETURN_ROWS: &str = "return=representation";

/// Ids per `in.(...)` filter. Keeps request URLs well under proxy limits.
const ID_CHUNK: usize = 100;

pub struct RestStore {
    client: Client,
    base_url: String,
}

type Params = Vec<(&'static str, String)>;

fn order_param(column: &str, order: SortOrder) -> String {
    match order {
        SortOrder::Ascending => format!("{}.asc", column),
        SortOrder::Descending => format!("{}.desc", column),
    }
}

fn id_list(ids: &[Uuid]) -> String {
    let joined: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    format!("({})", joined.join(","))
}

/// Parses the total out of a `Content-Range` header such as `0-24/57` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> StoreResult<Self> {
        let invalid_key = |_: InvalidHeaderValue| {
            PersistenceError::Unsupported("SUPABASE_ANON_KEY is not a valid header".to_string())
        };
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(api_key).map_err(invalid_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid_key)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
        })
    }

    fn url(&self, relation: Relation, params: &[(&'static str, String)]) -> String {
        let mut url = format!("{}/{}", self.base_url, relation.table_name());
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    fn request(
        &self,
        method: Method,
        relation: Relation,
        params: &[(&'static str, String)],
    ) -> RequestBuilder {
        let url = self.url(relation, params);
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        relation: Relation,
        params: Params,
    ) -> StoreResult<Vec<T>> {
        let response = self
            .send(self.request(Method::GET, relation, &params))
            .await?;
        Ok(response.json().await?)
    }

    /// Runs `params` once per chunk of `ids`, filtering `column` with `in.(...)`.
    async fn select_in<T: DeserializeOwned>(
        &self,
        relation: Relation,
        params: Params,
        column: &'static str,
        ids: &[Uuid],
    ) -> StoreResult<Vec<T>> {
        let mut rows = Vec::new();
        for chunk in ids.chunks(ID_CHUNK) {
            let mut chunk_params = params.clone();
            chunk_params.push((column, format!("in.{}", id_list(chunk))));
            rows.extend(self.select::<T>(relation, chunk_params).await?);
        }
        Ok(rows)
    }

    /// Sends a write that returns the affected rows.
    async fn write_returning<T, B>(
        &self,
        method: Method,
        relation: Relation,
        params: Params,
        body: &B,
    ) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .request(method, relation, &params)
            .header("Prefer", RETURN_ROWS)
            .json(body);
        Ok(self.send(request).await?.json().await?)
    }

    async fn insert_one<T, B>(&self, relation: Relation, body: &B) -> StoreResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut rows: Vec<T> = self
            .write_returning(Method::POST, relation, vec![("select", "*".to_string())], body)
            .await?;
        if rows.is_empty() {
            return Err(PersistenceError::Decode(format!(
                "insert into {} returned no row",
                relation
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update_one<T, B>(&self, relation: Relation, id: Uuid, body: &B) -> StoreResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let params = vec![("id", format!("eq.{}", id)), ("select", "*".to_string())];
        let mut rows: Vec<T> = self
            .write_returning(Method::PATCH, relation, params, body)
            .await?;
        if rows.is_empty() {
            return Err(not_found(relation, id));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete_one(&self, relation: Relation, id: Uuid) -> StoreResult<()> {
        let params = vec![("id", format!("eq.{}", id)), ("select", "id".to_string())];
        let request = self
            .request(Method::DELETE, relation, &params)
            .header("Prefer", RETURN_ROWS);
        let deleted: Vec<serde_json::Value> = self.send(request).await?.json().await?;
        if deleted.is_empty() {
            return Err(not_found(relation, id));
        }
        Ok(())
    }

    /// Inserts child rows, merging on the natural key when a row already exists.
    async fn upsert_children<B: Serialize>(
        &self,
        relation: Relation,
        conflict_key: &str,
        rows: &[B],
    ) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let params = vec![("on_conflict", conflict_key.to_string())];
        let request = self
            .request(Method::POST, relation, &params)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        self.send(request).await?;
        Ok(())
    }

    /// Removes the children of `parent_id` whose player is not in `keep`.
    async fn prune_children(
        &self,
        relation: Relation,
        parent_column: &'static str,
        parent_id: Uuid,
        keep: &[Uuid],
    ) -> StoreResult<()> {
        let mut params = vec![(parent_column, format!("eq.{}", parent_id))];
        if !keep.is_empty() {
            params.push(("player_id", format!("not.in.{}", id_list(keep))));
        }
        self.send(self.request(Method::DELETE, relation, &params))
            .await?;
        Ok(())
    }

    /// Removes a parent row whose children could not be written.
    async fn compensate(
        &self,
        relation: Relation,
        id: Uuid,
        cause: PersistenceError,
    ) -> PersistenceError {
        warn!(
            "Writing children of {} {} failed, removing parent: {}",
            relation, id, cause
        );
        if let Err(e) = self.delete_one(relation, id).await {
            warn!("Failed to remove {} {} after partial write: {}", relation, id, e);
        }
        cause
    }
}

#[async_trait]
impl TeamStore for RestStore {
    fn backend_tag(&self) -> &'static str {
        "rest"
    }

    async fn list_players(&self, query: &PlayerQuery) -> StoreResult<Vec<PlayerRow>> {
        let mut params: Params = vec![("select", "*".to_string())];
        if let Some(term) = &query.name_contains {
            params.push(("full_name", format!("ilike.*{}*", escape_like(term))));
        }
        params.push((
            "order",
            match query.order {
                PlayerOrder::FullName => "full_name.asc".to_string(),
                PlayerOrder::GoalsScoredDesc => "goals_scored.desc,full_name.asc".to_string(),
            },
        ));
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.select(Relation::Players, params).await
    }

    async fn find_player(&self, id: Uuid) -> StoreResult<Option<PlayerRow>> {
        let rows: Vec<PlayerRow> = self
            .select(
                Relation::Players,
                vec![("select", "*".to_string()), ("id", format!("eq.{}", id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_player(&self, record: &PlayerRecord) -> StoreResult<PlayerRow> {
        self.insert_one(Relation::Players, record).await
    }

    async fn update_player(&self, id: Uuid, record: &PlayerRecord) -> StoreResult<PlayerRow> {
        self.update_one(Relation::Players, id, record).await
    }

    async fn delete_player(&self, id: Uuid) -> StoreResult<()> {
        self.delete_one(Relation::Players, id).await
    }

    async fn list_practices(&self, query: &PracticeQuery) -> StoreResult<Vec<PracticeRow>> {
        let mut params: Params = vec![("select", "id,date,notes".to_string())];
        if let Some(from) = query.from {
            params.push(("date", format!("gte.{}", from.to_rfc3339())));
        }
        params.push(("order", order_param("date", query.order)));
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.select(Relation::Practices, params).await
    }

    async fn list_attendance(&self, query: &AttendanceQuery) -> StoreResult<Vec<AttendanceRow>> {
        let mut params: Params = vec![("select", "id,practice_id,player_id,status".to_string())];
        if let Some(player_id) = query.player_id {
            params.push(("player_id", format!("eq.{}", player_id)));
        }
        if let Some(status) = query.status {
            params.push(("status", format!("eq.{}", status.as_str())));
        }
        match &query.practice_ids {
            Some(ids) => {
                self.select_in(Relation::PracticeAttendance, params, "practice_id", ids)
                    .await
            }
            None => self.select(Relation::PracticeAttendance, params).await,
        }
    }

    async fn create_practice(
        &self,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow> {
        let row: PracticeRow = self.insert_one(Relation::Practices, record).await?;
        let children: Vec<AttendanceRecord> =
            attendance.iter().map(|e| e.for_practice(row.id)).collect();
        if let Err(e) = self
            .upsert_children(Relation::PracticeAttendance, "practice_id,player_id", &children)
            .await
        {
            return Err(self.compensate(Relation::Practices, row.id, e).await);
        }
        Ok(row)
    }

    async fn update_practice(
        &self,
        id: Uuid,
        record: &PracticeRecord,
        attendance: &[AttendanceEntry],
    ) -> StoreResult<PracticeRow> {
        let row: PracticeRow = self.update_one(Relation::Practices, id, record).await?;
        let keep: Vec<Uuid> = attendance.iter().map(|e| e.player_id).collect();
        self.prune_children(Relation::PracticeAttendance, "practice_id", id, &keep)
            .await?;
        let children: Vec<AttendanceRecord> =
            attendance.iter().map(|e| e.for_practice(id)).collect();
        self.upsert_children(Relation::PracticeAttendance, "practice_id,player_id", &children)
            .await?;
        Ok(row)
    }

    async fn delete_practice(&self, id: Uuid) -> StoreResult<()> {
        self.delete_one(Relation::Practices, id).await
    }

    async fn list_matches(&self, query: &MatchQuery) -> StoreResult<Vec<MatchRow>> {
        let mut params: Params = vec![
            (
                "select",
                "id,date,rival,home_score,away_score,venue,coach".to_string(),
            ),
            ("order", order_param("date", query.order)),
        ];
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        self.select(Relation::Matches, params).await
    }

    async fn list_participation(
        &self,
        query: &ParticipationQuery,
    ) -> StoreResult<Vec<ParticipationRow>> {
        let mut params: Params = vec![(
            "select",
            "id,match_id,player_id,minutes_played,substitution_time,position,status".to_string(),
        )];
        if let Some(player_id) = query.player_id {
            params.push(("player_id", format!("eq.{}", player_id)));
        }
        if let Some(status) = query.status {
            params.push(("status", format!("eq.{}", status.as_str())));
        }
        match &query.match_ids {
            Some(ids) => {
                self.select_in(Relation::MatchParticipation, params, "match_id", ids)
                    .await
            }
            None => self.select(Relation::MatchParticipation, params).await,
        }
    }

    async fn create_match(
        &self,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow> {
        let row: MatchRow = self.insert_one(Relation::Matches, record).await?;
        let children: Vec<ParticipationRecord> =
            participation.iter().map(|e| e.for_match(row.id)).collect();
        if let Err(e) = self
            .upsert_children(Relation::MatchParticipation, "match_id,player_id", &children)
            .await
        {
            return Err(self.compensate(Relation::Matches, row.id, e).await);
        }
        Ok(row)
    }

    async fn update_match(
        &self,
        id: Uuid,
        record: &MatchRecord,
        participation: &[ParticipationEntry],
    ) -> StoreResult<MatchRow> {
        let row: MatchRow = self.update_one(Relation::Matches, id, record).await?;
        let keep: Vec<Uuid> = participation.iter().map(|e| e.player_id).collect();
        self.prune_children(Relation::MatchParticipation, "match_id", id, &keep)
            .await?;
        let children: Vec<ParticipationRecord> =
            participation.iter().map(|e| e.for_match(id)).collect();
        self.upsert_children(Relation::MatchParticipation, "match_id,player_id", &children)
            .await?;
        Ok(row)
    }

    async fn delete_match(&self, id: Uuid) -> StoreResult<()> {
        self.delete_one(Relation::Matches, id).await
    }

    async fn count(&self, relation: Relation) -> StoreResult<u64> {
        let params = vec![("select", "id".to_string()), ("limit", "1".to_string())];
        let request = self
            .request(Method::GET, relation, &params)
            .header("Prefer", "count=exact");
        let response = self.send(request).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PersistenceError::Decode("missing Content-Range header".to_string()))?;
        parse_content_range(range)
            .ok_or_else(|| PersistenceError::Decode(format!("bad Content-Range: {}", range)))
    }
}
