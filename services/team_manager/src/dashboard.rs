//! Read models assembled from several services: the dashboard, the player
//! profile page and the annotated match list.

use chrono::{DateTime, Utc};
use futures::try_join;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::practices::UpcomingPractice;
use crate::stats::{
    self, HealthCard, MatchStatistics, MonthlyAttendance, PlayerStatistics,
    RecentParticipation, ScorerBar,
};
use crate::types::{Match, Player, Practice, Relation};
use crate::utils::format_date;
use crate::Team;

const DASHBOARD_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub total_players: u64,
    pub total_practices: u64,
    pub total_matches: u64,
    pub expiring_health_cards: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub counts: DashboardCounts,
    pub upcoming_practices: Vec<UpcomingPractice>,
    pub recent_matches: Vec<Match>,
    pub top_scorers: Vec<ScorerBar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub player: Player,
    pub health_card: HealthCard,
    pub match_statistics: MatchStatistics,
    pub statistics: PlayerStatistics,
    pub practice_attendance: Vec<MonthlyAttendance>,
    pub recent_matches: Vec<RecentParticipation>,
    pub recent_practices: Vec<Practice>,
}

/// A player as shown in the team list, with the derived card status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerListEntry {
    #[serde(flatten)]
    pub player: Player,
    pub health_card: HealthCard,
}

/// A match as shown in the match list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListEntry {
    #[serde(flatten)]
    pub game: Match,
    pub date_label: String,
    pub score: String,
    pub players_summary: String,
}

pub async fn counts(team: &Team, now: DateTime<Utc>) -> Result<DashboardCounts> {
    let store = &team.store;
    let players = team.players();
    let (total_players, total_practices, total_matches, players) = try_join!(
        team.observe("counting players", store.count(Relation::Players)),
        team.observe("counting practices", store.count(Relation::Practices)),
        team.observe("counting matches", store.count(Relation::Matches)),
        players.get_all(),
    )?;
    let expiring_health_cards =
        stats::count_expiring(&players, now, team.config.expiry_window_days);
    debug!(
        "Dashboard counts: {} players, {} practices, {} matches, {} expiring",
        total_players, total_practices, total_matches, expiring_health_cards
    );
    Ok(DashboardCounts {
        total_players,
        total_practices,
        total_matches,
        expiring_health_cards,
    })
}

pub async fn dashboard(team: &Team, now: DateTime<Utc>) -> Result<Dashboard> {
    let practices = team.practices();
    let matches = team.matches();
    let players = team.players();
    let (counts, upcoming_practices, recent_matches, scorers) = try_join!(
        counts(team, now),
        practices.upcoming(now, DASHBOARD_LIMIT),
        matches.recent(DASHBOARD_LIMIT),
        players.top_scorers(DASHBOARD_LIMIT),
    )?;
    Ok(Dashboard {
        counts,
        upcoming_practices,
        recent_matches,
        top_scorers: stats::top_scorers(&scorers, DASHBOARD_LIMIT),
    })
}

pub async fn player_profile(
    team: &Team,
    player_id: Uuid,
    now: DateTime<Utc>,
) -> Result<PlayerProfile> {
    let players = team.players();
    let matches = team.matches();
    let practices = team.practices();
    let (player, all_matches, all_practices, attended) = try_join!(
        players.get(player_id),
        matches.get_all(),
        practices.get_all(),
        practices.attended_by(player_id),
    )?;

    let played: Vec<Match> = all_matches
        .iter()
        .filter(|m| m.participation_of(player_id).is_some())
        .cloned()
        .collect();
    // Rates only count practices that have already taken place.
    let held: Vec<Practice> = all_practices
        .into_iter()
        .filter(|p| p.date <= now)
        .collect();

    Ok(PlayerProfile {
        health_card: stats::health_card(&player, now),
        match_statistics: stats::player_match_stats(player_id, &played),
        statistics: stats::player_statistics(&player, &all_matches, &held),
        practice_attendance: stats::monthly_attendance(player_id, &held),
        recent_matches: stats::recent_participations(player_id, &played, DASHBOARD_LIMIT),
        recent_practices: attended.into_iter().take(DASHBOARD_LIMIT).collect(),
        player,
    })
}

pub fn player_list(players: Vec<Player>, now: DateTime<Utc>) -> Vec<PlayerListEntry> {
    players
        .into_iter()
        .map(|player| PlayerListEntry {
            health_card: stats::health_card(&player, now),
            player,
        })
        .collect()
}

pub async fn match_list(team: &Team) -> Result<Vec<MatchListEntry>> {
    let matches = team.matches();
    let players = team.players();
    let (games, players) = try_join!(matches.get_all(), players.get_all())?;
    Ok(games
        .into_iter()
        .map(|game| MatchListEntry {
            date_label: format_date(game.date),
            score: game.result.to_string(),
            players_summary: stats::participation_summary(&game, &players),
            game,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamConfig;
    use crate::store::MemoryStore;
    use crate::types::{MatchInput, MatchResult, Participation, PlayerInput, PracticeInput};
    use chrono::{Duration, NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
    }

    fn player(name: &str, goals: i32, expires: NaiveDate) -> PlayerInput {
        PlayerInput {
            profile_photo: String::new(),
            full_name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            health_card_expiration: expires,
            goals_scored: goals,
            goals_against: 0,
            position: None,
        }
    }

    #[tokio::test]
    async fn test_dashboard() {
        let team = Team::new(Arc::new(MemoryStore::new()), TeamConfig::default());
        let today = now().date_naive();
        let ana = team
            .players()
            .create(&player("Ana Ruiz", 4, today + Duration::days(30)))
            .await
            .unwrap();
        team.players()
            .create(&player("Eva Soto", 9, today + Duration::days(200)))
            .await
            .unwrap();

        for days in [-3, 2, 9] {
            team.practices()
                .create(&PracticeInput {
                    date: now() + Duration::days(days),
                    attendees: vec![ana.id],
                    absentees: vec![],
                    notes: None,
                })
                .await
                .unwrap();
        }
        team.matches()
            .create(&MatchInput {
                date: now() - Duration::days(1),
                rival: "Rayo".to_string(),
                result: MatchResult {
                    home_score: 2,
                    away_score: 2,
                },
                players: vec![Participation {
                    player_id: ana.id,
                    minutes_played: 60,
                    substitution_time: Some(60),
                    position: None,
                }],
                absentees: vec![],
                venue: String::new(),
                coach: String::new(),
            })
            .await
            .unwrap();

        let dashboard = dashboard(&team, now()).await.unwrap();
        assert_eq!(
            dashboard.counts,
            DashboardCounts {
                total_players: 2,
                total_practices: 3,
                total_matches: 1,
                expiring_health_cards: 1,
            }
        );
        assert_eq!(dashboard.upcoming_practices.len(), 2);
        assert!(dashboard.upcoming_practices[0].date < dashboard.upcoming_practices[1].date);
        assert_eq!(dashboard.upcoming_practices[0].attendee_count, 1);
        assert_eq!(dashboard.recent_matches.len(), 1);
        assert_eq!(dashboard.top_scorers[0].name, "Eva");

        let listed = match_list(&team).await.unwrap();
        assert_eq!(listed[0].players_summary, "Ana Ruiz (Sub: 60')");
        assert_eq!(listed[0].score, "2 - 2");

        let profile = player_profile(&team, ana.id, now()).await.unwrap();
        assert_eq!(profile.match_statistics.total_matches, 1);
        assert_eq!(profile.match_statistics.substitutions, 1);
        assert_eq!(profile.statistics.practices_attended, 1);
        assert_eq!(profile.statistics.total_practices, 1);
        assert_eq!(profile.statistics.attendance_rate, 100.0);
        assert_eq!(profile.recent_practices.len(), 3);
        assert_eq!(profile.health_card.description, "30 days remaining");
    }

    #[tokio::test]
    async fn test_profile_ignores_upcoming_practices() {
        let team = Team::new(Arc::new(MemoryStore::new()), TeamConfig::default());
        let today = now().date_naive();
        let ana = team
            .players()
            .create(&player("Ana Ruiz", 0, today + Duration::days(90)))
            .await
            .unwrap();

        let schedule = [
            (-14, vec![ana.id]),
            (-7, vec![ana.id]),
            (3, vec![]),
            (10, vec![]),
        ];
        for (days, attendees) in schedule {
            team.practices()
                .create(&PracticeInput {
                    date: now() + Duration::days(days),
                    attendees,
                    absentees: vec![],
                    notes: None,
                })
                .await
                .unwrap();
        }

        let profile = player_profile(&team, ana.id, now()).await.unwrap();
        assert_eq!(profile.statistics.total_practices, 2);
        assert_eq!(profile.statistics.practices_attended, 2);
        assert_eq!(profile.statistics.attendance_rate, 100.0);
        assert!(profile
            .practice_attendance
            .iter()
            .all(|month| month.attendance == 100.0));
    }

    #[tokio::test]
    async fn test_profile_of_unknown_player_is_not_found() {
        let team = Team::new(Arc::new(MemoryStore::new()), TeamConfig::default());
        let err = player_profile(&team, Uuid::new_v4(), now()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
