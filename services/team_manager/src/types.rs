use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type PlayerId = Uuid;
pub type PracticeId = Uuid;
pub type MatchId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub profile_photo: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub health_card_expiration: NaiveDate,
    pub goals_scored: i32,
    pub goals_against: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

/// A player as submitted from a form, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInput {
    #[serde(default)]
    pub profile_photo: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub health_card_expiration: NaiveDate,
    #[serde(default)]
    pub goals_scored: i32,
    #[serde(default)]
    pub goals_against: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
    pub id: PracticeId,
    pub date: DateTime<Utc>,
    pub attendees: Vec<PlayerId>,
    pub absentees: Vec<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeInput {
    #[serde(deserialize_with = "crate::utils::deserialize_datetime")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<PlayerId>,
    #[serde(default)]
    pub absentees: Vec<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub home_score: i32,
    pub away_score: i32,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.home_score, self.away_score)
    }
}

/// One player's involvement in a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub player_id: PlayerId,
    pub minutes_played: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution_time: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub date: DateTime<Utc>,
    pub rival: String,
    pub result: MatchResult,
    pub players: Vec<Participation>,
    pub absentees: Vec<PlayerId>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub coach: String,
}

impl Match {
    pub fn participation_of(&self, player_id: PlayerId) -> Option<&Participation> {
        self.players.iter().find(|p| p.player_id == player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInput {
    #[serde(deserialize_with = "crate::utils::deserialize_datetime")]
    pub date: DateTime<Utc>,
    pub rival: String,
    #[serde(default)]
    pub result: MatchResult,
    #[serde(default)]
    pub players: Vec<Participation>,
    #[serde(default)]
    pub absentees: Vec<PlayerId>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub coach: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "participation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipationStatus {
    Played,
    Absent,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Played => "played",
            ParticipationStatus::Absent => "absent",
        }
    }
}

/// Persisted relations, by table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Players,
    Practices,
    PracticeAttendance,
    Matches,
    MatchParticipation,
}

impl Relation {
    pub fn table_name(&self) -> &'static str {
        match self {
            Relation::Players => "players",
            Relation::Practices => "practices",
            Relation::PracticeAttendance => "practice_attendance",
            Relation::Matches => "matches",
            Relation::MatchParticipation => "match_participation",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
