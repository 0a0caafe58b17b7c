use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type UserId = String;
pub type CategoryId = String;
pub type TermId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Playing,
    Voting,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Playing => write!(f, "playing"),
            Phase::Voting => write!(f, "voting"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub round_seconds: u32,
    pub vote_window_seconds: u32,
    pub similarity_threshold: f64,
    pub base_points: u32,
    pub unique_bonus: u32,
    pub candidate_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_seconds: 60,
            vote_window_seconds: 20,
            similarity_threshold: 0.80,
            base_points: 10,
            unique_bonus: 5,
            candidate_limit: 500,
        }
    }
}

impl GameConfig {
    /// Load game constants from environment variables, falling back to the
    /// documented defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        Self {
            round_seconds: env_parse("ROUND_SECONDS", defaults.round_seconds),
            vote_window_seconds: env_parse("VOTE_WINDOW_SECONDS", defaults.vote_window_seconds),
            similarity_threshold: env_parse("SIMILARITY_THRESHOLD", defaults.similarity_threshold),
            base_points: env_parse("BASE_POINTS", defaults.base_points),
            unique_bonus: env_parse("UNIQUE_BONUS", defaults.unique_bonus),
            candidate_limit: env_parse("CANDIDATE_LIMIT", defaults.candidate_limit),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// One timed play cycle. At most one round is active at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub number: u64,
    /// Required initial letter, 'A'..='Z'
    pub letter: char,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    /// End of the current phase window (reset when entering voting)
    pub phase_end: DateTime<Utc>,
    /// Fixed at round start; joiners during the round wait for the next one
    pub participants: Vec<UserId>,
    pub categories: Vec<CategoryId>,
}

impl Round {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn phase_over(&self, now: DateTime<Utc>) -> bool {
        now >= self.phase_end
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.phase_end - now).num_seconds().max(0)
    }
}

/// One participant's answer for one category in one round.
/// Keyed uniquely by (round, user, category); resubmission overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub round: u64,
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub original_text: String,
    pub normalized_text: String,
    pub matched_term_id: Option<TermId>,
    pub similarity: f64,
    /// Matched against the dictionary, or later approved by vote majority
    pub is_valid: bool,
    /// Computed once at finalization, false until then
    pub is_unique: bool,
}

impl Submission {
    /// Genuinely unknown: no dictionary match, not (yet) valid, but starting
    /// with the round's letter. These are the entries put up for peer voting.
    /// Letter-gate failures are conclusively invalid and never votable.
    pub fn is_unknown(&self, letter: char) -> bool {
        !self.is_valid
            && self.matched_term_id.is_none()
            && self
                .normalized_text
                .starts_with(letter.to_ascii_lowercase())
    }
}

/// An unknown (category, normalized text) pair with live vote counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnknownTermEntry {
    pub category_id: CategoryId,
    pub normalized_text: String,
    pub approvals: u32,
    pub rejections: u32,
}

/// Cumulative per-user points, durable across rounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighscoreEntry {
    pub user_id: UserId,
    pub total_points: u64,
}

/// Itemized outcome of one valid submission at finalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultLine {
    pub category_id: CategoryId,
    pub text: String,
    pub normalized: String,
    pub is_unique: bool,
    pub points: u32,
}

/// Per-user snapshot of the last finalized round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastResult {
    pub round: u64,
    pub gained_points: u32,
    pub valid_count: u32,
    pub breakdown: Vec<ResultLine>,
}

/// A registered user. The token is an opaque bearer credential; real
/// identity management lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub token: String,
    pub display_name: String,
}
