//! Request/response types for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{JoinOutcome, LiveScore};
use crate::types::{
    CategoryId, HighscoreEntry, LastResult, Phase, Round, Submission, UserId,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub token: String,
}

/// Public view of a round, with the phase-relative countdown computed at
/// response time.
#[derive(Debug, Clone, Serialize)]
pub struct RoundInfo {
    pub number: u64,
    pub letter: char,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub phase_end: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub participants: Vec<UserId>,
    pub categories: Vec<CategoryId>,
}

impl RoundInfo {
    pub fn from_round(round: Round, now: DateTime<Utc>) -> Self {
        Self {
            number: round.number,
            letter: round.letter,
            phase: round.phase,
            started_at: round.started_at,
            phase_end: round.phase_end,
            remaining_seconds: round.remaining_seconds(now),
            participants: round.participants,
            categories: round.categories,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JoinResponse {
    /// Caller participates in the returned round
    Joined { round: RoundInfo },
    /// A round is running; caller plays the next one
    Queued { round: RoundInfo, waiting: usize },
}

impl JoinResponse {
    pub fn from_outcome(outcome: JoinOutcome, now: DateTime<Utc>) -> Self {
        match outcome {
            JoinOutcome::Joined(round) => Self::Joined {
                round: RoundInfo::from_round(round, now),
            },
            JoinOutcome::Queued { round, waiting } => Self::Queued {
                round: RoundInfo::from_round(round, now),
                waiting,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub category_id: CategoryId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionInfo {
    pub category_id: CategoryId,
    pub original_text: String,
    pub normalized_text: String,
    pub matched: bool,
    pub similarity: f64,
    pub is_valid: bool,
}

impl From<Submission> for SubmissionInfo {
    fn from(s: Submission) -> Self {
        Self {
            category_id: s.category_id,
            original_text: s.original_text,
            normalized_text: s.normalized_text,
            matched: s.matched_term_id.is_some(),
            similarity: s.similarity,
            is_valid: s.is_valid,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub category_id: CategoryId,
    pub normalized_text: String,
    pub value: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreboardResponse {
    pub highscores: Vec<HighscoreEntry>,
    pub live: Vec<LiveScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyScoreResponse {
    pub user_id: UserId,
    pub total_points: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastResultResponse {
    pub user_id: UserId,
    pub last_result: Option<LastResult>,
}
