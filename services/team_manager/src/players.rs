use tracing::info;
use uuid::Uuid;

use crate::error::{PersistenceError, Result};
use crate::schema::PlayerRecord;
use crate::store::{PlayerOrder, PlayerQuery};
use crate::types::{Player, PlayerInput, Relation};
use crate::validation::validate_player;
use crate::Team;

/// Search terms shorter than this return no players.
pub const MIN_SEARCH_LEN: usize = 2;

pub struct PlayerService<'a> {
    team: &'a Team,
}

impl<'a> PlayerService<'a> {
    pub fn new(team: &'a Team) -> Self {
        Self { team }
    }

    /// All players ordered by full name.
    pub async fn get_all(&self) -> Result<Vec<Player>> {
        let rows = self
            .team
            .observe(
                "fetching players",
                self.team.store.list_players(&PlayerQuery::default()),
            )
            .await?;
        Ok(rows.into_iter().map(Player::from).collect())
    }

    /// Case-insensitive substring match on the full name.
    pub async fn search(&self, term: &str) -> Result<Vec<Player>> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        let rows = self
            .team
            .observe(
                "searching players",
                self.team.store.list_players(&PlayerQuery::search(term)),
            )
            .await?;
        Ok(rows.into_iter().map(Player::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Player> {
        let row = self
            .team
            .observe("fetching player", self.team.store.find_player(id))
            .await?;
        row.map(Player::from).ok_or_else(|| {
            PersistenceError::NotFound {
                relation: Relation::Players,
                id: id.to_string(),
            }
            .into()
        })
    }

    pub async fn top_scorers(&self, limit: usize) -> Result<Vec<Player>> {
        let query = PlayerQuery {
            order: PlayerOrder::GoalsScoredDesc,
            limit: Some(limit),
            ..PlayerQuery::default()
        };
        let rows = self
            .team
            .observe("fetching top scorers", self.team.store.list_players(&query))
            .await?;
        Ok(rows.into_iter().map(Player::from).collect())
    }

    pub async fn create(&self, input: &PlayerInput) -> Result<Player> {
        validate_player(input)?;
        let record = PlayerRecord::from(input);
        let row = self
            .team
            .observe("creating player", self.team.store.insert_player(&record))
            .await?;
        info!("Created player {} ({})", row.full_name, row.id);
        Ok(row.into())
    }

    pub async fn update(&self, id: Uuid, input: &PlayerInput) -> Result<Player> {
        validate_player(input)?;
        let record = PlayerRecord::from(input);
        let row = self
            .team
            .observe("updating player", self.team.store.update_player(id, &record))
            .await?;
        Ok(row.into())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.team
            .observe("deleting player", self.team.store.delete_player(id))
            .await?;
        info!("Deleted player {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamConfig;
    use crate::error::{TeamError, ValidationError};
    use crate::store::{MemoryStore, TeamStore};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn team() -> (Team, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Team::new(store.clone(), TeamConfig::default()), store)
    }

    fn input(name: &str, goals: i32) -> PlayerInput {
        PlayerInput {
            profile_photo: String::new(),
            full_name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2010, 6, 1).unwrap(),
            health_card_expiration: NaiveDate::from_ymd_opt(2027, 6, 1).unwrap(),
            goals_scored: goals,
            goals_against: 0,
            position: Some("Defender".to_string()),
        }
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let (team, _) = team();
        let players = team.players();

        let created = players.create(&input("Paula Nieto", 1)).await.unwrap();
        assert_eq!(players.get(created.id).await.unwrap(), created);

        let updated = players
            .update(created.id, &input("Paula Nieto", 4))
            .await
            .unwrap();
        assert_eq!(updated.goals_scored, 4);
        assert_eq!(updated.id, created.id);

        players.delete(created.id).await.unwrap();
        assert!(players.get(created.id).await.unwrap_err().is_not_found());
        assert!(players.delete(created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_search_needs_two_characters() {
        let (team, store) = team();
        team.players().create(&input("Inés Vidal", 0)).await.unwrap();

        store.set_unavailable(true);
        // Short terms never reach the backend.
        assert!(team.players().search("i").await.unwrap().is_empty());
        store.set_unavailable(false);

        let found = team.players().search("vid").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "Inés Vidal");
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_written() {
        let (team, store) = team();
        let err = team.players().create(&input("  ", 0)).await.unwrap_err();
        assert!(matches!(
            err,
            TeamError::Validation(ValidationError::MissingName)
        ));
        assert_eq!(store.count(Relation::Players).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_an_error_not_an_empty_list() {
        let (team, store) = team();
        store.set_unavailable(true);
        assert!(team.players().get_all().await.is_err());
        assert_eq!(team.metrics.get_metrics().failed_calls, 1);
    }
}
