//! Matches and their per-player participation rows.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::players::MIN_SEARCH_LEN;
use crate::schema::{MatchRecord, MatchRow, ParticipationEntry, ParticipationRow};
use crate::store::{MatchQuery, ParticipationQuery};
use crate::types::{Match, MatchInput, Participation, ParticipationStatus, PlayerId};
use crate::validation::validate_match;
use crate::Team;

/// Played rows for the lineup followed by absent rows for `absentees`.
/// A repeated absentee collapses to one row.
pub fn participation_entries(input: &MatchInput) -> Vec<ParticipationEntry> {
    let played = input.players.iter().map(|p| ParticipationEntry {
        player_id: p.player_id,
        minutes_played: p.minutes_played,
        substitution_time: p.substitution_time,
        position: p.position.clone(),
        status: ParticipationStatus::Played,
    });
    let mut seen = HashSet::new();
    let absent = input
        .absentees
        .iter()
        .filter(|id| seen.insert(**id))
        .map(|id| ParticipationEntry {
            player_id: *id,
            minutes_played: 0,
            substitution_time: None,
            position: None,
            status: ParticipationStatus::Absent,
        });
    played.chain(absent).collect()
}

/// Rebuilds a match from its row and the participation rows that belong to it.
pub fn assemble_match(row: MatchRow, participation: &[ParticipationRow]) -> Match {
    let mut players = Vec::new();
    let mut absentees = Vec::new();
    for entry in participation.iter().filter(|p| p.match_id == row.id) {
        match entry.status {
            ParticipationStatus::Played => players.push(Participation {
                player_id: entry.player_id,
                minutes_played: entry.minutes_played,
                substitution_time: entry.substitution_time,
                position: entry.position.clone(),
            }),
            ParticipationStatus::Absent => absentees.push(entry.player_id),
        }
    }
    Match {
        id: row.id,
        date: row.date,
        rival: row.rival.clone(),
        result: row.result(),
        players,
        absentees,
        venue: row.venue,
        coach: row.coach,
    }
}

fn record_from(input: &MatchInput) -> MatchRecord {
    MatchRecord {
        date: input.date,
        rival: input.rival.trim().to_string(),
        home_score: input.result.home_score,
        away_score: input.result.away_score,
        venue: input.venue.trim().to_string(),
        coach: input.coach.trim().to_string(),
    }
}

fn written_rows(entries: &[ParticipationEntry], match_id: Uuid) -> Vec<ParticipationRow> {
    entries
        .iter()
        .map(|entry| {
            let record = entry.for_match(match_id);
            ParticipationRow {
                id: Uuid::nil(),
                match_id: record.match_id,
                player_id: record.player_id,
                minutes_played: record.minutes_played,
                substitution_time: record.substitution_time,
                position: record.position,
                status: record.status,
            }
        })
        .collect()
}

pub struct MatchService<'a> {
    team: &'a Team,
}

impl<'a> MatchService<'a> {
    pub fn new(team: &'a Team) -> Self {
        Self { team }
    }

    async fn with_participation(&self, rows: Vec<MatchRow>) -> Result<Vec<Match>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let query = ParticipationQuery {
            match_ids: Some(rows.iter().map(|m| m.id).collect()),
            ..ParticipationQuery::default()
        };
        let participation = self
            .team
            .observe(
                "fetching match participation",
                self.team.store.list_participation(&query),
            )
            .await?;
        let mut grouped: HashMap<Uuid, Vec<ParticipationRow>> = HashMap::new();
        for row in participation {
            grouped.entry(row.match_id).or_default().push(row);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let children = grouped.remove(&row.id).unwrap_or_default();
                assemble_match(row, &children)
            })
            .collect())
    }

    async fn list(&self, operation: &'static str, query: MatchQuery) -> Result<Vec<Match>> {
        let rows = self
            .team
            .observe(operation, self.team.store.list_matches(&query))
            .await?;
        debug!("Loaded {} matches", rows.len());
        self.with_participation(rows).await
    }

    /// All matches, most recent first.
    pub async fn get_all(&self) -> Result<Vec<Match>> {
        self.list("fetching matches", MatchQuery::default()).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Match>> {
        let query = MatchQuery {
            limit: Some(limit),
            ..MatchQuery::default()
        };
        self.list("fetching recent matches", query).await
    }

    /// Matches in which the player took the field, most recent first.
    pub async fn for_player(&self, player_id: PlayerId) -> Result<Vec<Match>> {
        let query = ParticipationQuery {
            player_id: Some(player_id),
            status: Some(ParticipationStatus::Played),
            ..ParticipationQuery::default()
        };
        let played: HashSet<Uuid> = self
            .team
            .observe(
                "fetching player participation",
                self.team.store.list_participation(&query),
            )
            .await?
            .into_iter()
            .map(|p| p.match_id)
            .collect();
        if played.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .team
            .observe(
                "fetching matches",
                self.team.store.list_matches(&MatchQuery::default()),
            )
            .await?
            .into_iter()
            .filter(|m| played.contains(&m.id))
            .collect();
        self.with_participation(rows).await
    }

    /// Matches whose rival contains `term`, case-insensitively, most recent first.
    pub async fn search(&self, term: &str) -> Result<Vec<Match>> {
        let needle = term.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        let rows = self
            .team
            .observe(
                "searching matches",
                self.team.store.list_matches(&MatchQuery::default()),
            )
            .await?
            .into_iter()
            .filter(|m| m.rival.to_lowercase().contains(&needle))
            .collect();
        self.with_participation(rows).await
    }

    /// Distinct rival names, sorted.
    pub async fn rivals(&self) -> Result<Vec<String>> {
        let rows = self
            .team
            .observe(
                "fetching rivals",
                self.team.store.list_matches(&MatchQuery::default()),
            )
            .await?;
        let rivals: BTreeSet<String> = rows.into_iter().map(|m| m.rival).collect();
        Ok(rivals.into_iter().collect())
    }

    pub async fn create(&self, input: &MatchInput) -> Result<Match> {
        validate_match(input)?;
        let entries = participation_entries(input);
        let row = self
            .team
            .observe(
                "creating match",
                self.team.store.create_match(&record_from(input), &entries),
            )
            .await?;
        info!("Created match {} vs {} ({})", row.id, row.rival, row.result());
        let id = row.id;
        Ok(assemble_match(row, &written_rows(&entries, id)))
    }

    /// Replaces the match and its whole participation set.
    pub async fn update(&self, id: Uuid, input: &MatchInput) -> Result<Match> {
        validate_match(input)?;
        let entries = participation_entries(input);
        let row = self
            .team
            .observe(
                "updating match",
                self.team
                    .store
                    .update_match(id, &record_from(input), &entries),
            )
            .await?;
        Ok(assemble_match(row, &written_rows(&entries, id)))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.team
            .observe("deleting match", self.team.store.delete_match(id))
            .await?;
        info!("Deleted match {}", id);
        Ok(())
    }
}
