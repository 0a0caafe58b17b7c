//! Error taxonomy for the round engine.
//!
//! Everything here is caller-correctable and surfaced synchronously; no
//! condition is fatal to the process. Store errors are the one transient
//! class and map to 503 so clients know to retry later.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::types::Phase;

/// Failure of an external store (round state, dictionary, leaderboard).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("no active round")]
    NoActiveRound,

    #[error("not a participant in this round")]
    NotAParticipant,

    #[error("this action requires the {expected} phase")]
    WrongPhase { expected: Phase },

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match &self {
            GameError::NoActiveRound | GameError::WrongPhase { .. } | GameError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            GameError::NotAParticipant => StatusCode::FORBIDDEN,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("store failure: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GameError::NoActiveRound, StatusCode::BAD_REQUEST),
            (GameError::NotAParticipant, StatusCode::FORBIDDEN),
            (
                GameError::WrongPhase {
                    expected: Phase::Voting,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                GameError::Validation("text must not be empty".into()),
                StatusCode::BAD_REQUEST,
            ),
            (GameError::NotFound("category"), StatusCode::NOT_FOUND),
            (
                GameError::Store(StoreError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_wrong_phase_message_names_phase() {
        let err = GameError::WrongPhase {
            expected: Phase::Playing,
        };
        assert_eq!(err.to_string(), "this action requires the playing phase");
    }
}
