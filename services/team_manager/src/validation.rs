//! Required-field and range checks applied before anything is sent to the backend.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{MatchInput, PlayerInput, PracticeInput};

pub const MAX_MINUTE: i32 = 90;

fn non_negative(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

fn within_match(field: &'static str, value: i32) -> Result<(), ValidationError> {
    if !(0..=MAX_MINUTE).contains(&value) {
        return Err(ValidationError::MinuteOutOfRange { field, value });
    }
    Ok(())
}

pub fn validate_player(input: &PlayerInput) -> Result<(), ValidationError> {
    if input.full_name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    non_negative("goalsScored", input.goals_scored)?;
    non_negative("goalsAgainst", input.goals_against)?;
    Ok(())
}

pub fn validate_practice(input: &PracticeInput) -> Result<(), ValidationError> {
    let attendees: HashSet<_> = input.attendees.iter().collect();
    if let Some(id) = input.absentees.iter().find(|id| attendees.contains(id)) {
        return Err(ValidationError::ConflictingAttendance(*id));
    }
    Ok(())
}

pub fn validate_match(input: &MatchInput) -> Result<(), ValidationError> {
    if input.rival.trim().is_empty() {
        return Err(ValidationError::MissingRival);
    }
    non_negative("homeScore", input.result.home_score)?;
    non_negative("awayScore", input.result.away_score)?;

    let mut seen = HashSet::new();
    for participation in &input.players {
        if !seen.insert(participation.player_id) {
            return Err(ValidationError::DuplicateParticipant(participation.player_id));
        }
        within_match("minutesPlayed", participation.minutes_played)?;
        if let Some(minute) = participation.substitution_time {
            within_match("substitutionTime", minute)?;
        }
    }
    if let Some(id) = input.absentees.iter().find(|id| seen.contains(*id)) {
        return Err(ValidationError::ConflictingAttendance(*id));
    }
    Ok(())
}
