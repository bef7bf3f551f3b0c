//! Confirm-before-delete flow, independent of any UI.
//!
//! `Idle -> AwaitingConfirmation -> Pending -> Resolved`, with `cancel`
//! returning to `Idle` before the delete starts. Only a confirmed (pending)
//! request ever reaches the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, TeamError};
use crate::Team;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Practice,
    Match,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Player => "player",
            EntityKind::Practice => "practice",
            EntityKind::Match => "match",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionTarget {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl DeletionTarget {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn prompt(&self) -> String {
        format!("Are you sure you want to delete this {}?", self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionOutcome {
    Deleted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletionState {
    #[default]
    Idle,
    AwaitingConfirmation(DeletionTarget),
    Pending(DeletionTarget),
    Resolved {
        target: DeletionTarget,
        outcome: DeletionOutcome,
    },
}

#[derive(Debug, Default)]
pub struct DeletionFlow {
    state: DeletionState,
}

impl DeletionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DeletionState {
        &self.state
    }

    /// Starts a new request. Refused while another one is pending.
    pub fn request(&mut self, target: DeletionTarget) -> bool {
        if matches!(self.state, DeletionState::Pending(_)) {
            return false;
        }
        self.state = DeletionState::AwaitingConfirmation(target);
        true
    }

    /// Question to show while awaiting confirmation.
    pub fn prompt(&self) -> Option<String> {
        match &self.state {
            DeletionState::AwaitingConfirmation(target) => Some(target.prompt()),
            _ => None,
        }
    }

    pub fn confirm(&mut self) -> bool {
        match self.state {
            DeletionState::AwaitingConfirmation(target) => {
                self.state = DeletionState::Pending(target);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) -> bool {
        match self.state {
            DeletionState::AwaitingConfirmation(_) => {
                self.state = DeletionState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Runs the confirmed delete and resolves the flow with its outcome.
    pub async fn execute(&mut self, team: &Team) -> Result<()> {
        let target = match &self.state {
            DeletionState::Pending(target) => *target,
            DeletionState::AwaitingConfirmation(target) => {
                return Err(TeamError::ConfirmationRequired(target.kind.to_string()));
            }
            _ => {
                return Err(TeamError::ConfirmationRequired(
                    "a deletion that was never requested".to_string(),
                ))
            }
        };

        let result = delete_entity(team, target).await;
        let outcome = match &result {
            Ok(()) => {
                info!("Deleted {} {}", target.kind, target.id);
                DeletionOutcome::Deleted
            }
            Err(e) => {
                warn!("Deleting {} {} failed: {}", target.kind, target.id, e);
                DeletionOutcome::Failed(e.to_string())
            }
        };
        self.state = DeletionState::Resolved { target, outcome };
        result
    }
}

pub async fn delete_entity(team: &Team, target: DeletionTarget) -> Result<()> {
    match target.kind {
        EntityKind::Player => team.players().delete(target.id).await,
        EntityKind::Practice => team.practices().delete(target.id).await,
        EntityKind::Match => team.matches().delete(target.id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamConfig;
    use crate::store::MemoryStore;
    use crate::types::PlayerInput;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn team() -> Team {
        Team::new(Arc::new(MemoryStore::new()), TeamConfig::default())
    }

    async fn some_player(team: &Team) -> Uuid {
        team.players()
            .create(&PlayerInput {
                profile_photo: String::new(),
                full_name: "Irene Castro".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2011, 2, 3).unwrap(),
                health_card_expiration: NaiveDate::from_ymd_opt(2027, 2, 3).unwrap(),
                goals_scored: 0,
                goals_against: 0,
                position: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_confirmed_delete_resolves() {
        let team = team();
        let id = some_player(&team).await;
        let target = DeletionTarget::new(EntityKind::Player, id);

        let mut flow = DeletionFlow::new();
        assert!(flow.request(target));
        assert_eq!(
            flow.prompt().as_deref(),
            Some("Are you sure you want to delete this player?")
        );
        assert!(flow.confirm());
        assert_eq!(flow.state(), &DeletionState::Pending(target));

        flow.execute(&team).await.unwrap();
        assert_eq!(
            flow.state(),
            &DeletionState::Resolved {
                target,
                outcome: DeletionOutcome::Deleted
            }
        );
        assert!(team.players().get(id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unconfirmed_delete_never_runs() {
        let team = team();
        let id = some_player(&team).await;
        let mut flow = DeletionFlow::new();
        flow.request(DeletionTarget::new(EntityKind::Player, id));

        let err = flow.execute(&team).await.unwrap_err();
        assert!(matches!(err, TeamError::ConfirmationRequired(_)));
        assert!(flow.cancel());
        assert_eq!(flow.state(), &DeletionState::Idle);
        assert!(!flow.confirm());
        assert!(team.players().get(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_delete_is_resolved_with_reason() {
        let team = team();
        let target = DeletionTarget::new(EntityKind::Match, Uuid::new_v4());
        let mut flow = DeletionFlow::new();
        flow.request(target);
        flow.confirm();

        assert!(flow.execute(&team).await.unwrap_err().is_not_found());
        assert!(matches!(
            flow.state(),
            DeletionState::Resolved {
                outcome: DeletionOutcome::Failed(_),
                ..
            }
        ));
        // A resolved flow accepts the next request.
        assert!(flow.request(target));
    }
}
