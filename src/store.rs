//! Round state store: the single active round plus its submissions, votes,
//! the waiting set and per-user last results.
//!
//! Round-scoped entries carry a time-to-live slightly longer than the phase
//! they belong to, so leaked state ages out even if finalization is never
//! triggered. Reads treat expired entries as absent.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{CategoryId, LastResult, Round, Submission, UserId};

/// TTL = remaining phase time + buffer, with a floor so freshly-expired
/// phases can still be finalized by the next request.
const TTL_BUFFER_SECONDS: i64 = 300;
const TTL_MIN_SECONDS: i64 = 60;

fn ttl_deadline(phase_end: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let remaining = (phase_end - now).num_seconds();
    now + Duration::seconds(remaining.max(0) + TTL_BUFFER_SECONDS).max(Duration::seconds(TTL_MIN_SECONDS))
}

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    fn new(value: T, phase_end: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: ttl_deadline(phase_end, Utc::now()),
        }
    }

    fn fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[async_trait]
pub trait RoundStateStore: Send + Sync {
    async fn set_active_round(&self, round: Round) -> Result<(), StoreError>;
    async fn active_round(&self) -> Result<Option<Round>, StoreError>;
    async fn clear_active_round(&self) -> Result<(), StoreError>;

    /// Next value of the monotonically increasing round counter.
    async fn next_round_number(&self) -> Result<u64, StoreError>;

    /// Upsert keyed by (round, user, category); last writer wins.
    async fn set_submission(
        &self,
        submission: Submission,
        phase_end: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn submissions_for_round(&self, round: u64) -> Result<Vec<Submission>, StoreError>;

    /// Upsert keyed by (round, category, normalized, user); last writer wins.
    async fn add_vote(
        &self,
        round: u64,
        category_id: &CategoryId,
        normalized: &str,
        user_id: &UserId,
        value: bool,
        phase_end: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn votes_for(
        &self,
        round: u64,
        category_id: &CategoryId,
        normalized: &str,
    ) -> Result<HashMap<UserId, bool>, StoreError>;

    /// Drop all submissions and votes of a finalized round.
    async fn clear_round_data(&self, round: u64) -> Result<(), StoreError>;

    async fn enqueue_waiting(&self, user_id: &UserId) -> Result<(), StoreError>;
    async fn waiting_users(&self) -> Result<Vec<UserId>, StoreError>;
    async fn clear_waiting(&self) -> Result<(), StoreError>;

    async fn set_last_result(&self, user_id: &UserId, result: LastResult)
        -> Result<(), StoreError>;
    async fn last_result(&self, user_id: &UserId) -> Result<Option<LastResult>, StoreError>;
}

type SubmissionKey = (u64, UserId, CategoryId);
type VoteKey = (u64, CategoryId, String);

#[derive(Default)]
pub struct InMemoryRoundStore {
    active: RwLock<Option<Expiring<Round>>>,
    round_counter: RwLock<u64>,
    submissions: RwLock<HashMap<SubmissionKey, Expiring<Submission>>>,
    votes: RwLock<HashMap<VoteKey, Expiring<HashMap<UserId, bool>>>>,
    waiting: RwLock<Vec<UserId>>,
    last_results: RwLock<HashMap<UserId, LastResult>>,
}

impl InMemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoundStateStore for InMemoryRoundStore {
    async fn set_active_round(&self, round: Round) -> Result<(), StoreError> {
        let phase_end = round.phase_end;
        *self.active.write().await = Some(Expiring::new(round, phase_end));
        Ok(())
    }

    async fn active_round(&self) -> Result<Option<Round>, StoreError> {
        let now = Utc::now();
        let mut active = self.active.write().await;
        match active.as_ref() {
            Some(entry) if entry.fresh(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                // Aged out without finalization; drop the leaked state.
                *active = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn clear_active_round(&self) -> Result<(), StoreError> {
        *self.active.write().await = None;
        Ok(())
    }

    async fn next_round_number(&self) -> Result<u64, StoreError> {
        let mut counter = self.round_counter.write().await;
        *counter += 1;
        Ok(*counter)
    }

    async fn set_submission(
        &self,
        submission: Submission,
        phase_end: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = (
            submission.round,
            submission.user_id.clone(),
            submission.category_id.clone(),
        );
        self.submissions
            .write()
            .await
            .insert(key, Expiring::new(submission, phase_end));
        Ok(())
    }

    async fn submissions_for_round(&self, round: u64) -> Result<Vec<Submission>, StoreError> {
        let now = Utc::now();
        let submissions = self.submissions.read().await;
        let mut found: Vec<Submission> = submissions
            .values()
            .filter(|entry| entry.fresh(now) && entry.value.round == round)
            .map(|entry| entry.value.clone())
            .collect();
        // Stable order keeps finalization and listings deterministic.
        found.sort_by(|a, b| {
            a.category_id
                .cmp(&b.category_id)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(found)
    }

    async fn add_vote(
        &self,
        round: u64,
        category_id: &CategoryId,
        normalized: &str,
        user_id: &UserId,
        value: bool,
        phase_end: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = (round, category_id.clone(), normalized.to_string());
        let now = Utc::now();
        let mut votes = self.votes.write().await;
        let entry = votes
            .entry(key)
            .and_modify(|existing| {
                if !existing.fresh(now) {
                    existing.value.clear();
                }
                existing.expires_at = ttl_deadline(phase_end, now);
            })
            .or_insert_with(|| Expiring::new(HashMap::new(), phase_end));
        entry.value.insert(user_id.clone(), value);
        Ok(())
    }

    async fn votes_for(
        &self,
        round: u64,
        category_id: &CategoryId,
        normalized: &str,
    ) -> Result<HashMap<UserId, bool>, StoreError> {
        let key = (round, category_id.clone(), normalized.to_string());
        let now = Utc::now();
        let votes = self.votes.read().await;
        Ok(votes
            .get(&key)
            .filter(|entry| entry.fresh(now))
            .map(|entry| entry.value.clone())
            .unwrap_or_default())
    }

    async fn clear_round_data(&self, round: u64) -> Result<(), StoreError> {
        self.submissions
            .write()
            .await
            .retain(|(r, _, _), _| *r != round);
        self.votes.write().await.retain(|(r, _, _), _| *r != round);
        Ok(())
    }

    async fn enqueue_waiting(&self, user_id: &UserId) -> Result<(), StoreError> {
        let mut waiting = self.waiting.write().await;
        if !waiting.contains(user_id) {
            waiting.push(user_id.clone());
        }
        Ok(())
    }

    async fn waiting_users(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.waiting.read().await.clone())
    }

    async fn clear_waiting(&self) -> Result<(), StoreError> {
        self.waiting.write().await.clear();
        Ok(())
    }

    async fn set_last_result(
        &self,
        user_id: &UserId,
        result: LastResult,
    ) -> Result<(), StoreError> {
        self.last_results
            .write()
            .await
            .insert(user_id.clone(), result);
        Ok(())
    }

    async fn last_result(&self, user_id: &UserId) -> Result<Option<LastResult>, StoreError> {
        Ok(self.last_results.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn round(number: u64) -> Round {
        let now = Utc::now();
        Round {
            number,
            letter: 'B',
            phase: Phase::Playing,
            started_at: now,
            phase_end: now + Duration::seconds(60),
            participants: vec!["alice".into()],
            categories: vec!["stadt".into()],
        }
    }

    fn submission(round_no: u64, user: &str, category: &str, text: &str) -> Submission {
        Submission {
            round: round_no,
            user_id: user.into(),
            category_id: category.into(),
            original_text: text.into(),
            normalized_text: text.to_lowercase(),
            matched_term_id: None,
            similarity: 0.0,
            is_valid: false,
            is_unique: false,
        }
    }

    #[tokio::test]
    async fn test_active_round_roundtrip() {
        let store = InMemoryRoundStore::new();
        assert!(store.active_round().await.unwrap().is_none());

        store.set_active_round(round(1)).await.unwrap();
        assert_eq!(store.active_round().await.unwrap().unwrap().number, 1);

        store.clear_active_round().await.unwrap();
        assert!(store.active_round().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_round_reads_as_absent() {
        let store = InMemoryRoundStore::new();
        let mut stale = round(1);
        stale.phase_end = Utc::now() - Duration::seconds(3600);
        // Bypass the TTL floor by planting the entry directly.
        *store.active.write().await = Some(Expiring {
            value: stale,
            expires_at: Utc::now() - Duration::seconds(1),
        });
        assert!(store.active_round().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_numbers_monotonic() {
        let store = InMemoryRoundStore::new();
        let first = store.next_round_number().await.unwrap();
        let second = store.next_round_number().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_submission_upsert_overwrites() {
        let store = InMemoryRoundStore::new();
        let phase_end = Utc::now() + Duration::seconds(60);

        store
            .set_submission(submission(1, "alice", "stadt", "Bonn"), phase_end)
            .await
            .unwrap();
        store
            .set_submission(submission(1, "alice", "stadt", "Berlin"), phase_end)
            .await
            .unwrap();

        let subs = store.submissions_for_round(1).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].original_text, "Berlin");
    }

    #[tokio::test]
    async fn test_submissions_scoped_to_round() {
        let store = InMemoryRoundStore::new();
        let phase_end = Utc::now() + Duration::seconds(60);
        store
            .set_submission(submission(1, "alice", "stadt", "Bonn"), phase_end)
            .await
            .unwrap();
        store
            .set_submission(submission(2, "alice", "stadt", "Kiel"), phase_end)
            .await
            .unwrap();

        assert_eq!(store.submissions_for_round(1).await.unwrap().len(), 1);
        store.clear_round_data(1).await.unwrap();
        assert!(store.submissions_for_round(1).await.unwrap().is_empty());
        assert_eq!(store.submissions_for_round(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vote_overwrite_per_user() {
        let store = InMemoryRoundStore::new();
        let phase_end = Utc::now() + Duration::seconds(20);
        let category: CategoryId = "land".into();

        store
            .add_vote(1, &category, "beligien", &"alice".into(), true, phase_end)
            .await
            .unwrap();
        store
            .add_vote(1, &category, "beligien", &"alice".into(), false, phase_end)
            .await
            .unwrap();
        store
            .add_vote(1, &category, "beligien", &"bob".into(), true, phase_end)
            .await
            .unwrap();

        let votes = store.votes_for(1, &category, "beligien").await.unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes.get("alice"), Some(&false));
        assert_eq!(votes.get("bob"), Some(&true));
    }

    #[tokio::test]
    async fn test_waiting_set_deduplicates() {
        let store = InMemoryRoundStore::new();
        store.enqueue_waiting(&"alice".into()).await.unwrap();
        store.enqueue_waiting(&"alice".into()).await.unwrap();
        store.enqueue_waiting(&"bob".into()).await.unwrap();

        assert_eq!(store.waiting_users().await.unwrap().len(), 2);
        store.clear_waiting().await.unwrap();
        assert!(store.waiting_users().await.unwrap().is_empty());
    }
}
