//! Persisted (snake_case) rows and their mapping to the application schema.
//!
//! Rows serialize with the exact column names of the backing tables so the
//! same structs serve both the Postgres and the REST backends.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    AttendanceStatus, MatchResult, ParticipationStatus, Player, PlayerInput,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerRow {
    pub id: Uuid,
    pub profile_photo: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub health_card_expiration: NaiveDate,
    pub goals_scored: i32,
    pub goals_against: i32,
    pub position: Option<String>,
}

/// Column values written on insert or update of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub profile_photo: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub health_card_expiration: NaiveDate,
    pub goals_scored: i32,
    pub goals_against: i32,
    pub position: Option<String>,
}

impl PlayerRecord {
    pub fn into_row(self, id: Uuid) -> PlayerRow {
        PlayerRow {
            id,
            profile_photo: self.profile_photo,
            full_name: self.full_name,
            date_of_birth: self.date_of_birth,
            health_card_expiration: self.health_card_expiration,
            goals_scored: self.goals_scored,
            goals_against: self.goals_against,
            position: self.position,
        }
    }
}

impl From<&PlayerInput> for PlayerRecord {
    fn from(input: &PlayerInput) -> Self {
        Self {
            profile_photo: input.profile_photo.clone(),
            full_name: input.full_name.trim().to_string(),
            date_of_birth: input.date_of_birth,
            health_card_expiration: input.health_card_expiration,
            goals_scored: input.goals_scored,
            goals_against: input.goals_against,
            position: input
                .position
                .as_ref()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Self {
            id: row.id,
            profile_photo: row.profile_photo,
            full_name: row.full_name,
            date_of_birth: row.date_of_birth,
            health_card_expiration: row.health_card_expiration,
            goals_scored: row.goals_scored,
            goals_against: row.goals_against,
            position: row.position,
        }
    }
}

impl From<Player> for PlayerRow {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            profile_photo: player.profile_photo,
            full_name: player.full_name,
            date_of_birth: player.date_of_birth,
            health_card_expiration: player.health_card_expiration,
            goals_scored: player.goals_scored,
            goals_against: player.goals_against,
            position: player.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PracticeRow {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl PracticeRecord {
    pub fn into_row(self, id: Uuid) -> PracticeRow {
        PracticeRow {
            id,
            date: self.date,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: Uuid,
    pub practice_id: Uuid,
    pub player_id: Uuid,
    pub status: AttendanceStatus,
}

/// One attendance row to be written; `(practice_id, player_id)` is its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub practice_id: Uuid,
    pub player_id: Uuid,
    pub status: AttendanceStatus,
}

/// Attendance of one player, before it is bound to a practice id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub player_id: Uuid,
    pub status: AttendanceStatus,
}

impl AttendanceEntry {
    pub fn for_practice(&self, practice_id: Uuid) -> AttendanceRecord {
        AttendanceRecord {
            practice_id,
            player_id: self.player_id,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchRow {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub rival: String,
    pub home_score: i32,
    pub away_score: i32,
    pub venue: String,
    pub coach: String,
}

impl MatchRow {
    pub fn result(&self) -> MatchResult {
        MatchResult {
            home_score: self.home_score,
            away_score: self.away_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: DateTime<Utc>,
    pub rival: String,
    pub home_score: i32,
    pub away_score: i32,
    pub venue: String,
    pub coach: String,
}

impl MatchRecord {
    pub fn into_row(self, id: Uuid) -> MatchRow {
        MatchRow {
            id,
            date: self.date,
            rival: self.rival,
            home_score: self.home_score,
            away_score: self.away_score,
            venue: self.venue,
            coach: self.coach,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipationRow {
    pub id: Uuid,
    pub match_id: Uuid,
    pub player_id: Uuid,
    pub minutes_played: i32,
    pub substitution_time: Option<i32>,
    pub position: Option<String>,
    pub status: ParticipationStatus,
}

/// One participation row to be written; `(match_id, player_id)` is its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRecord {
    pub match_id: Uuid,
    pub player_id: Uuid,
    pub minutes_played: i32,
    pub substitution_time: Option<i32>,
    pub position: Option<String>,
    pub status: ParticipationStatus,
}

/// Participation of one player, before it is bound to a match id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationEntry {
    pub player_id: Uuid,
    pub minutes_played: i32,
    pub substitution_time: Option<i32>,
    pub position: Option<String>,
    pub status: ParticipationStatus,
}

impl ParticipationEntry {
    pub fn for_match(&self, match_id: Uuid) -> ParticipationRecord {
        ParticipationRecord {
            match_id,
            player_id: self.player_id,
            minutes_played: self.minutes_played,
            substitution_time: self.substitution_time,
            position: self.position.clone(),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_row() -> PlayerRow {
        PlayerRow {
            id: Uuid::new_v4(),
            profile_photo: "https://cdn.example.com/p/7.jpg".to_string(),
            full_name: "Lucía Fernández".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2009, 4, 12).unwrap(),
            health_card_expiration: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            goals_scored: 14,
            goals_against: 2,
            position: Some("Forward".to_string()),
        }
    }

    #[test]
    fn test_player_row_round_trip() {
        let row = sample_row();
        let player = Player::from(row.clone());
        assert_eq!(player.full_name, row.full_name);
        assert_eq!(player.health_card_expiration, row.health_card_expiration);
        assert_eq!(PlayerRow::from(player), row);

        let mut without_position = sample_row();
        without_position.position = None;
        assert_eq!(
            PlayerRow::from(Player::from(without_position.clone())),
            without_position
        );
    }

    #[test]
    fn test_field_names_on_the_wire() {
        let row = sample_row();
        let persisted = serde_json::to_value(&row).unwrap();
        for column in [
            "id",
            "profile_photo",
            "full_name",
            "date_of_birth",
            "health_card_expiration",
            "goals_scored",
            "goals_against",
            "position",
        ] {
            assert!(persisted.get(column).is_some(), "missing column {}", column);
        }

        let app = serde_json::to_value(Player::from(row)).unwrap();
        for field in [
            "id",
            "profilePhoto",
            "fullName",
            "dateOfBirth",
            "healthCardExpiration",
            "goalsScored",
            "goalsAgainst",
            "position",
        ] {
            assert!(app.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(app["dateOfBirth"], "2009-04-12");
    }

    #[test]
    fn test_record_trims_name_and_blank_position() {
        let input = PlayerInput {
            profile_photo: String::new(),
            full_name: "  Ana Ruiz ".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            health_card_expiration: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            goals_scored: 0,
            goals_against: 0,
            position: Some("   ".to_string()),
        };
        let record = PlayerRecord::from(&input);
        assert_eq!(record.full_name, "Ana Ruiz");
        assert_eq!(record.position, None);
    }
}
