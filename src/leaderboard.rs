//! Persistent cumulative scores.
//!
//! The engine only ever adds points; there is no decrement operation.
//! Awards are applied per round as one atomic batch that takes effect
//! exactly once, so a finalization retried after a transient store failure
//! never credits anyone twice.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{HighscoreEntry, UserId};

#[async_trait]
pub trait Leaderboard: Send + Sync {
    /// Atomically add one round's awards to the totals, creating zero
    /// records as needed. Calling again with the same round number is a
    /// no-op.
    async fn apply_round_points(
        &self,
        round: u64,
        awards: &[(UserId, u32)],
    ) -> Result<(), StoreError>;

    async fn get_total(&self, user_id: &UserId) -> Result<u64, StoreError>;

    /// Top totals, descending. Ties break on user id for stable output.
    async fn top_n(&self, limit: usize) -> Result<Vec<HighscoreEntry>, StoreError>;
}

#[derive(Default)]
struct LeaderboardInner {
    totals: HashMap<UserId, u64>,
    applied_rounds: HashSet<u64>,
}

#[derive(Default)]
pub struct InMemoryLeaderboard {
    inner: RwLock<LeaderboardInner>,
}

impl InMemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Leaderboard for InMemoryLeaderboard {
    async fn apply_round_points(
        &self,
        round: u64,
        awards: &[(UserId, u32)],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.applied_rounds.insert(round) {
            return Ok(());
        }
        for (user_id, delta) in awards {
            *inner.totals.entry(user_id.clone()).or_insert(0) += u64::from(*delta);
        }
        Ok(())
    }

    async fn get_total(&self, user_id: &UserId) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .totals
            .get(user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn top_n(&self, limit: usize) -> Result<Vec<HighscoreEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<HighscoreEntry> = inner
            .totals
            .iter()
            .map(|(user_id, total)| HighscoreEntry {
                user_id: user_id.clone(),
                total_points: *total,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit);
        Ok(entries)
    }
}
