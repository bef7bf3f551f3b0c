use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::Relation;

/// The backend rejected or failed a read or write.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("No row in {relation} with id {id}")]
    NotFound { relation: Relation, id: String },
    #[error("Could not decode backend response: {0}")]
    Decode(String),
    #[error("{0}")]
    Unsupported(String),
}

/// A submitted form failed a required-field or range check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Full name is required")]
    MissingName,
    #[error("Rival is required")]
    MissingRival,
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: i32 },
    #[error("{field} must be between 0 and 90 (got {value})")]
    MinuteOutOfRange { field: &'static str, value: i32 },
    #[error("Player {0} is listed more than once in the match lineup")]
    DuplicateParticipant(uuid::Uuid),
    #[error("Player {0} cannot be both present and absent")]
    ConflictingAttendance(uuid::Uuid),
}

#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Deleting {0} requires confirmation")]
    ConfirmationRequired(String),
}

impl TeamError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TeamError::Persistence(PersistenceError::NotFound { .. })
        )
    }
}

impl From<sqlx::Error> for TeamError {
    fn from(e: sqlx::Error) -> Self {
        TeamError::Persistence(PersistenceError::Database(e))
    }
}

impl From<reqwest::Error> for TeamError {
    fn from(e: reqwest::Error) -> Self {
        TeamError::Persistence(PersistenceError::Http(e))
    }
}

impl IntoResponse for TeamError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            TeamError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed"),
            TeamError::ConfirmationRequired(_) => (StatusCode::CONFLICT, "Confirmation required"),
            TeamError::Persistence(PersistenceError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Not found")
            }
            TeamError::Persistence(_) => (StatusCode::BAD_GATEWAY, "Persistence error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, TeamError>;
pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = TeamError::from(PersistenceError::NotFound {
            relation: Relation::Players,
            id: "x".to_string(),
        });
        assert!(not_found.is_not_found());
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = TeamError::from(ValidationError::MissingName);
        assert_eq!(
            invalid.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let rejected = TeamError::from(PersistenceError::Rejected {
            status: 401,
            message: "JWT expired".to_string(),
        });
        assert_eq!(rejected.into_response().status(), StatusCode::BAD_GATEWAY);

        let unconfirmed = TeamError::ConfirmationRequired("player".to_string());
        assert_eq!(unconfirmed.into_response().status(), StatusCode::CONFLICT);
    }
}
