//! Shared helpers for exercising the lifecycle manager against in-memory
//! stores with controlled letters and clocks.

use std::sync::Arc;

use chrono::{Duration, Utc};

use super::GameService;
use crate::dictionary::dictionary_with_terms;
use crate::leaderboard::InMemoryLeaderboard;
use crate::store::{InMemoryRoundStore, RoundStateStore};
use crate::types::{GameConfig, Round};

pub async fn service_with_terms(entries: &[(&str, &[&str])]) -> GameService {
    let store: Arc<dyn RoundStateStore> = Arc::new(InMemoryRoundStore::new());
    let dictionary = Arc::new(dictionary_with_terms(entries).await);
    let leaderboard = Arc::new(InMemoryLeaderboard::new());
    GameService::new(store, dictionary, leaderboard, GameConfig::default())
}

/// Pin the active round's letter (rounds pick one at random) and return the
/// updated round.
pub async fn force_letter(service: &GameService, letter: char) -> Round {
    let mut round = service.store.active_round().await.unwrap().unwrap();
    round.letter = letter;
    service.store.set_active_round(round.clone()).await.unwrap();
    round
}

/// Rewind the current phase window so the next progress check sees it as
/// expired.
pub async fn expire_phase(service: &GameService) {
    let mut round = service.store.active_round().await.unwrap().unwrap();
    round.phase_end = Utc::now() - Duration::seconds(1);
    service.store.set_active_round(round).await.unwrap();
}

/// A running round with the given participants and a pinned letter.
pub async fn multi_participant_round(
    service: &GameService,
    users: &[&str],
    letter: char,
) -> Round {
    service.join(&users[0].to_string()).await.unwrap();
    let mut round = service.store.active_round().await.unwrap().unwrap();
    round.letter = letter;
    round.participants = users.iter().map(|u| u.to_string()).collect();
    service.store.set_active_round(round.clone()).await.unwrap();
    round
}
