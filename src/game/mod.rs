//! Round lifecycle manager.
//!
//! `GameService` owns the state machine: it drives phase transitions, runs
//! the matching engine on submissions, records votes and finalizes rounds
//! into the leaderboard. All collaborators are injected so tests can run
//! against in-memory fakes.
//!
//! Phase transitions are evaluated lazily: there is no background timer, and
//! every read of round state first performs any due transition. Callers must
//! poll the current-round query to force timely progress.

mod round;
mod score;
mod submission;
mod vote;

#[cfg(test)]
pub(crate) mod testutil;

pub use round::JoinOutcome;
pub use score::LiveScore;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::dictionary::TermDictionary;
use crate::error::GameError;
use crate::leaderboard::Leaderboard;
use crate::matching::MatchEngine;
use crate::store::RoundStateStore;
use crate::types::{GameConfig, Round};

pub struct GameService {
    pub store: Arc<dyn RoundStateStore>,
    pub dictionary: Arc<dyn TermDictionary>,
    pub leaderboard: Arc<dyn Leaderboard>,
    pub config: GameConfig,
    matcher: MatchEngine,
    /// Serializes phase transitions and finalization. A second racer
    /// acquiring this after a finalize observes the cleared round and no-ops.
    progress: Mutex<()>,
}

impl GameService {
    pub fn new(
        store: Arc<dyn RoundStateStore>,
        dictionary: Arc<dyn TermDictionary>,
        leaderboard: Arc<dyn Leaderboard>,
        config: GameConfig,
    ) -> Self {
        let matcher = MatchEngine::new(dictionary.clone(), &config);
        Self {
            store,
            dictionary,
            leaderboard,
            config,
            matcher,
            progress: Mutex::new(()),
        }
    }

    pub(crate) fn matcher(&self) -> &MatchEngine {
        &self.matcher
    }

    /// Current round after a lazy progress check, or `None`.
    pub async fn current_round(&self) -> Result<Option<Round>, GameError> {
        self.ensure_round_progress().await?;
        Ok(self.store.active_round().await?)
    }
}
