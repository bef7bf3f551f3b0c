//! Practices and their attendance rows.
//!
//! A practice is stored as one `practices` row plus one `practice_attendance`
//! row per listed player; `attendees` and `absentees` are rebuilt from the
//! status of those rows on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::players::MIN_SEARCH_LEN;
use crate::schema::{AttendanceEntry, AttendanceRow, PracticeRecord, PracticeRow};
use crate::store::{AttendanceQuery, PracticeQuery, SortOrder};
use crate::types::{AttendanceStatus, PlayerId, Practice, PracticeInput};
use crate::validation::validate_practice;
use crate::Team;

/// Dashboard entry for a practice that has not happened yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingPractice {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub attendee_count: usize,
}

/// One row per distinct player: attendees as present, then absentees as absent.
/// Repeats within a list collapse onto the first occurrence.
pub fn attendance_entries(input: &PracticeInput) -> Vec<AttendanceEntry> {
    let mut seen = HashSet::new();
    let present = input
        .attendees
        .iter()
        .map(|id| (*id, AttendanceStatus::Present));
    let absent = input
        .absentees
        .iter()
        .map(|id| (*id, AttendanceStatus::Absent));
    present
        .chain(absent)
        .filter(|(id, _)| seen.insert(*id))
        .map(|(player_id, status)| AttendanceEntry { player_id, status })
        .collect()
}

/// Rebuilds a practice from its row and the attendance rows that belong to it.
/// Rows of other practices are ignored.
pub fn assemble_practice(row: PracticeRow, attendance: &[AttendanceRow]) -> Practice {
    let mut attendees = Vec::new();
    let mut absentees = Vec::new();
    for entry in attendance.iter().filter(|a| a.practice_id == row.id) {
        match entry.status {
            AttendanceStatus::Present => attendees.push(entry.player_id),
            AttendanceStatus::Absent => absentees.push(entry.player_id),
        }
    }
    Practice {
        id: row.id,
        date: row.date,
        attendees,
        absentees,
        notes: row.notes,
    }
}

fn record_from(input: &PracticeInput) -> PracticeRecord {
    PracticeRecord {
        date: input.date,
        notes: input
            .notes
            .as_ref()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    }
}

fn group_by_practice(rows: Vec<AttendanceRow>) -> HashMap<Uuid, Vec<AttendanceRow>> {
    let mut grouped: HashMap<Uuid, Vec<AttendanceRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.practice_id).or_default().push(row);
    }
    grouped
}

pub struct PracticeService<'a> {
    team: &'a Team,
}

impl<'a> PracticeService<'a> {
    pub fn new(team: &'a Team) -> Self {
        Self { team }
    }

    async fn with_attendance(&self, rows: Vec<PracticeRow>) -> Result<Vec<Practice>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let query = AttendanceQuery {
            practice_ids: Some(rows.iter().map(|p| p.id).collect()),
            ..AttendanceQuery::default()
        };
        let attendance = self
            .team
            .observe(
                "fetching practice attendance",
                self.team.store.list_attendance(&query),
            )
            .await?;
        let mut grouped = group_by_practice(attendance);
        Ok(rows
            .into_iter()
            .map(|row| {
                let children = grouped.remove(&row.id).unwrap_or_default();
                assemble_practice(row, &children)
            })
            .collect())
    }

    /// All practices, most recent first, with their attendance.
    pub async fn get_all(&self) -> Result<Vec<Practice>> {
        let rows = self
            .team
            .observe(
                "fetching practices",
                self.team.store.list_practices(&PracticeQuery::default()),
            )
            .await?;
        debug!("Loaded {} practices", rows.len());
        self.with_attendance(rows).await
    }

    /// Practices whose notes contain `term`, case-insensitively, most recent first.
    pub async fn search(&self, term: &str) -> Result<Vec<Practice>> {
        let needle = term.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        let rows = self
            .team
            .observe(
                "searching practices",
                self.team.store.list_practices(&PracticeQuery::default()),
            )
            .await?
            .into_iter()
            .filter(|p| {
                p.notes
                    .as_ref()
                    .is_some_and(|notes| notes.to_lowercase().contains(&needle))
            })
            .collect();
        self.with_attendance(rows).await
    }

    /// Practices dated at or after `now`, soonest first.
    pub async fn upcoming(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<UpcomingPractice>> {
        let query = PracticeQuery {
            from: Some(now),
            order: SortOrder::Ascending,
            limit: Some(limit),
        };
        let rows = self
            .team
            .observe(
                "fetching upcoming practices",
                self.team.store.list_practices(&query),
            )
            .await?;
        Ok(self
            .with_attendance(rows)
            .await?
            .into_iter()
            .map(|p| UpcomingPractice {
                id: p.id,
                date: p.date,
                attendee_count: p.attendees.len(),
                notes: p.notes,
            })
            .collect())
    }

    /// Practices the player was marked present at, most recent first.
    pub async fn attended_by(&self, player_id: PlayerId) -> Result<Vec<Practice>> {
        let query = AttendanceQuery {
            player_id: Some(player_id),
            status: Some(AttendanceStatus::Present),
            ..AttendanceQuery::default()
        };
        let attended: HashSet<Uuid> = self
            .team
            .observe(
                "fetching player attendance",
                self.team.store.list_attendance(&query),
            )
            .await?
            .into_iter()
            .map(|a| a.practice_id)
            .collect();
        if attended.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .team
            .observe(
                "fetching practices",
                self.team.store.list_practices(&PracticeQuery::default()),
            )
            .await?
            .into_iter()
            .filter(|p| attended.contains(&p.id))
            .collect();
        self.with_attendance(rows).await
    }

    pub async fn create(&self, input: &PracticeInput) -> Result<Practice> {
        validate_practice(input)?;
        let entries = attendance_entries(input);
        let row = self
            .team
            .observe(
                "creating practice",
                self.team.store.create_practice(&record_from(input), &entries),
            )
            .await?;
        info!(
            "Created practice {} with {} attendance rows",
            row.id,
            entries.len()
        );
        let id = row.id;
        Ok(assemble_practice(row, &bind(&entries, id)))
    }

    /// Replaces the practice and its whole attendance set.
    pub async fn update(&self, id: Uuid, input: &PracticeInput) -> Result<Practice> {
        validate_practice(input)?;
        let entries = attendance_entries(input);
        let row = self
            .team
            .observe(
                "updating practice",
                self.team
                    .store
                    .update_practice(id, &record_from(input), &entries),
            )
            .await?;
        Ok(assemble_practice(row, &bind(&entries, id)))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.team
            .observe("deleting practice", self.team.store.delete_practice(id))
            .await?;
        info!("Deleted practice {}", id);
        Ok(())
    }
}

/// Attendance rows as they were written, for echoing a practice back.
fn bind(entries: &[AttendanceEntry], practice_id: Uuid) -> Vec<AttendanceRow> {
    entries
        .iter()
        .map(|entry| {
            let record = entry.for_practice(practice_id);
            AttendanceRow {
                id: Uuid::nil(),
                practice_id: record.practice_id,
                player_id: record.player_id,
                status: record.status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamConfig;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn input(attendees: Vec<Uuid>, absentees: Vec<Uuid>) -> PracticeInput {
        PracticeInput {
            date: Utc.with_ymd_and_hms(2026, 10, 20, 18, 30, 0).unwrap(),
            attendees,
            absentees,
            notes: Some("  Set pieces ".to_string()),
        }
    }

    #[test]
    fn test_entries_collapse_repeats() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entries = attendance_entries(&input(vec![a, b, a], vec![]));
        assert_eq!(
            entries,
            vec![
                AttendanceEntry {
                    player_id: a,
                    status: AttendanceStatus::Present
                },
                AttendanceEntry {
                    player_id: b,
                    status: AttendanceStatus::Present
                },
            ]
        );
    }

    #[test]
    fn test_assemble_splits_by_status_and_ignores_other_practices() {
        let practice_id = Uuid::new_v4();
        let (a, c) = (Uuid::new_v4(), Uuid::new_v4());
        let row = PracticeRow {
            id: practice_id,
            date: Utc.with_ymd_and_hms(2026, 10, 20, 18, 30, 0).unwrap(),
            notes: None,
        };
        let rows = vec![
            AttendanceRow {
                id: Uuid::new_v4(),
                practice_id,
                player_id: a,
                status: AttendanceStatus::Present,
            },
            AttendanceRow {
                id: Uuid::new_v4(),
                practice_id: Uuid::new_v4(),
                player_id: a,
                status: AttendanceStatus::Absent,
            },
            AttendanceRow {
                id: Uuid::new_v4(),
                practice_id,
                player_id: c,
                status: AttendanceStatus::Absent,
            },
        ];
        let practice = assemble_practice(row, &rows);
        assert_eq!(practice.attendees, vec![a]);
        assert_eq!(practice.absentees, vec![c]);
    }

    #[test]
    fn test_blank_notes_are_dropped() {
        assert_eq!(
            record_from(&input(vec![], vec![])).notes.as_deref(),
            Some("Set pieces")
        );
        let mut blank = input(vec![], vec![]);
        blank.notes = Some("   ".to_string());
        assert_eq!(record_from(&blank).notes, None);
    }

    #[tokio::test]
    async fn test_search_matches_notes() {
        let team = Team::new(Arc::new(MemoryStore::new()), TeamConfig::default());
        let mut rondo = input(vec![], vec![]);
        rondo.notes = Some("Rondos and pressing".to_string());
        team.practices().create(&input(vec![], vec![])).await.unwrap();
        team.practices().create(&rondo).await.unwrap();
        team.practices().create(&input(vec![], vec![])).await.unwrap();

        let found = team.practices().search("PRESS").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].notes.as_deref(), Some("Rondos and pressing"));
        assert_eq!(team.practices().search("set").await.unwrap().len(), 2);
        assert!(team.practices().search(" s ").await.unwrap().is_empty());
    }
}
