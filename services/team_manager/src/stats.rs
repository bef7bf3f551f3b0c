//! Derived per-player and dashboard figures. Everything here works on
//! collections that were already fetched; nothing touches the backend.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::types::{Match, Player, PlayerId, Practice};
use crate::utils::{
    days_until, first_name, format_date, format_days_remaining, month_label, start_of_day,
};

/// Days of validity left at which a health card counts as expiring soon.
pub const EXPIRING_SOON_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthCardStatus {
    Expired,
    ExpiringSoon,
    Valid,
}

impl HealthCardStatus {
    pub fn from_days(days_remaining: i64) -> Self {
        if days_remaining < 0 {
            HealthCardStatus::Expired
        } else if days_remaining <= EXPIRING_SOON_DAYS {
            HealthCardStatus::ExpiringSoon
        } else {
            HealthCardStatus::Valid
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthCardStatus::Expired => "Expired",
            HealthCardStatus::ExpiringSoon => "Expiring soon",
            HealthCardStatus::Valid => "Valid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCard {
    pub days_remaining: i64,
    pub status: HealthCardStatus,
    /// "Expired", "Expires today", "N days remaining".
    pub description: String,
}

pub fn health_card(player: &Player, now: DateTime<Utc>) -> HealthCard {
    let days_remaining = days_until(player.health_card_expiration, now);
    HealthCard {
        days_remaining,
        status: HealthCardStatus::from_days(days_remaining),
        description: format_days_remaining(days_remaining),
    }
}

/// Players whose card expires in `[now, now + window_days]`.
pub fn count_expiring(players: &[Player], now: DateTime<Utc>, window_days: i64) -> usize {
    let until = now + Duration::days(window_days);
    players
        .iter()
        .filter(|p| {
            let expires = start_of_day(p.health_card_expiration);
            expires >= now && expires <= until
        })
        .count()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatistics {
    pub total_matches: usize,
    pub total_minutes: i64,
    pub average_minutes: i64,
    pub substitutions: usize,
}

/// Folds the player's participation over `matches`. Matches without a
/// participation record for the player are skipped.
pub fn player_match_stats(player_id: PlayerId, matches: &[Match]) -> MatchStatistics {
    let mut stats = MatchStatistics::default();
    for participation in matches.iter().filter_map(|m| m.participation_of(player_id)) {
        stats.total_matches += 1;
        stats.total_minutes += i64::from(participation.minutes_played);
        // Any recorded minute counts, including a substitution at 0'.
        if participation.substitution_time.is_some() {
            stats.substitutions += 1;
        }
    }
    stats.average_minutes = rounded_average(stats.total_minutes, stats.total_matches);
    stats
}

/// Integer mean rounded half up; 0 for an empty set.
fn rounded_average(total: i64, count: usize) -> i64 {
    if count == 0 {
        return 0;
    }
    let count = count as i64;
    (2 * total + count).div_euclid(2 * count)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAttendance {
    pub month: String,
    pub attendance: f64,
}

/// Share of each month's practices the player attended, oldest month first.
///
/// Given only the practices the player attended, every month comes out at
/// 100%; pass every scheduled practice to get a real rate.
pub fn monthly_attendance(player_id: PlayerId, practices: &[Practice]) -> Vec<MonthlyAttendance> {
    let mut buckets: BTreeMap<(i32, u32), (String, usize, usize)> = BTreeMap::new();
    for practice in practices {
        let key = (practice.date.year(), practice.date.month());
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| (month_label(practice.date), 0, 0));
        bucket.1 += 1;
        if practice.attendees.contains(&player_id) {
            bucket.2 += 1;
        }
    }
    buckets
        .into_values()
        .map(|(month, total, attended)| MonthlyAttendance {
            month,
            attendance: attended as f64 / total as f64 * 100.0,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatistics {
    pub total_matches: usize,
    pub matches_played: usize,
    pub matches_absent: usize,
    pub total_practices: usize,
    pub practices_attended: usize,
    pub practices_absent: usize,
    pub attendance_rate: f64,
    pub average_minutes_played: i64,
    pub total_goals_scored: i32,
    pub total_goals_against: i32,
}

/// Overall figures for one player against every match and practice on record.
pub fn player_statistics(
    player: &Player,
    matches: &[Match],
    practices: &[Practice],
) -> PlayerStatistics {
    let match_stats = player_match_stats(player.id, matches);
    let matches_absent = matches
        .iter()
        .filter(|m| m.absentees.contains(&player.id))
        .count();
    let practices_attended = practices
        .iter()
        .filter(|p| p.attendees.contains(&player.id))
        .count();
    let practices_absent = practices
        .iter()
        .filter(|p| p.absentees.contains(&player.id))
        .count();
    let attendance_rate = if practices.is_empty() {
        0.0
    } else {
        practices_attended as f64 / practices.len() as f64 * 100.0
    };

    PlayerStatistics {
        total_matches: matches.len(),
        matches_played: match_stats.total_matches,
        matches_absent,
        total_practices: practices.len(),
        practices_attended,
        practices_absent,
        attendance_rate,
        average_minutes_played: match_stats.average_minutes,
        total_goals_scored: player.goals_scored,
        total_goals_against: player.goals_against,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerBar {
    pub name: String,
    pub goals: i32,
}

/// Chart rows for the best `limit` scorers, labelled by first name.
pub fn top_scorers(players: &[Player], limit: usize) -> Vec<ScorerBar> {
    let mut ranked: Vec<&Player> = players.iter().collect();
    ranked.sort_by(|a, b| b.goals_scored.cmp(&a.goals_scored));
    ranked
        .into_iter()
        .take(limit)
        .map(|p| ScorerBar {
            name: first_name(&p.full_name).to_string(),
            goals: p.goals_scored,
        })
        .collect()
}

/// Lineup of a match as "Name, Other (Sub: 60')". Unknown players show an empty name.
pub fn participation_summary(game: &Match, players: &[Player]) -> String {
    let names: HashMap<PlayerId, &str> = players
        .iter()
        .map(|p| (p.id, p.full_name.as_str()))
        .collect();
    game.players
        .iter()
        .map(|p| {
            let name = names.get(&p.player_id).copied().unwrap_or("");
            match p.substitution_time {
                Some(minute) => format!("{} (Sub: {}')", name, minute),
                None => name.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentParticipation {
    pub match_id: uuid::Uuid,
    pub rival: String,
    pub date: String,
    pub score: String,
    pub minutes_played: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution_time: Option<i32>,
}

/// The first `limit` matches in the given order, with the player's minutes.
pub fn recent_participations(
    player_id: PlayerId,
    matches: &[Match],
    limit: usize,
) -> Vec<RecentParticipation> {
    matches
        .iter()
        .take(limit)
        .map(|m| {
            let participation = m.participation_of(player_id);
            RecentParticipation {
                match_id: m.id,
                rival: m.rival.clone(),
                date: format_date(m.date),
                score: m.result.to_string(),
                minutes_played: participation.map(|p| p.minutes_played),
                substitution_time: participation.and_then(|p| p.substitution_time),
            }
        })
        .collect()
}
