//! Joining, the waiting set and lazy phase progression.

use chrono::{Duration, Utc};
use rand::Rng;

use super::GameService;
use crate::error::GameError;
use crate::types::{Phase, Round, UserId};

/// Result of a join request.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The caller is a participant of the (possibly just started) round.
    Joined(Round),
    /// A round is already running; the caller plays next round.
    Queued { round: Round, waiting: usize },
}

fn random_letter() -> char {
    let mut rng = rand::rng();
    (b'A' + rng.random_range(0..26)) as char
}

impl GameService {
    /// Join the game. Starts a round immediately when none is active,
    /// otherwise queues the caller for the next one.
    pub async fn join(&self, user_id: &UserId) -> Result<JoinOutcome, GameError> {
        self.ensure_round_progress().await?;

        if let Some(round) = self.store.active_round().await? {
            if round.is_participant(user_id) {
                return Ok(JoinOutcome::Joined(round));
            }
        }

        self.store.enqueue_waiting(user_id).await?;
        self.ensure_round_progress().await?;

        match self.store.active_round().await? {
            Some(round) if round.is_participant(user_id) => Ok(JoinOutcome::Joined(round)),
            Some(round) => {
                let waiting = self.store.waiting_users().await?.len();
                Ok(JoinOutcome::Queued { round, waiting })
            }
            // A waiting user always triggers a round start above.
            None => Err(GameError::NoActiveRound),
        }
    }

    /// Lazy state machine step, called before answering any round read:
    ///
    /// - no round + waiting users → start a new round
    /// - playing expired, unknowns present → voting window
    /// - playing expired, no unknowns → finalize (and next round if waiting)
    /// - voting expired → finalize (and next round if waiting)
    pub async fn ensure_round_progress(&self) -> Result<(), GameError> {
        let _guard = self.progress.lock().await;

        let Some(round) = self.store.active_round().await? else {
            let waiting = self.store.waiting_users().await?;
            if !waiting.is_empty() {
                self.start_new_round(waiting).await?;
            }
            return Ok(());
        };

        let now = Utc::now();
        if !round.phase_over(now) {
            return Ok(());
        }

        match round.phase {
            Phase::Playing => {
                if self.unknowns_exist(&round).await? {
                    let mut voting = round;
                    voting.phase = Phase::Voting;
                    voting.phase_end = now + Duration::seconds(self.config.vote_window_seconds.into());
                    tracing::info!(round = voting.number, "playing window over, voting on unknowns");
                    self.store.set_active_round(voting).await?;
                } else {
                    self.finalize_and_score(&round).await?;
                }
            }
            Phase::Voting => self.finalize_and_score(&round).await?,
        }
        Ok(())
    }

    /// Start a round with the given participants and every known category.
    /// Callers must hold the progress lock (or be the admin path).
    pub(super) async fn start_new_round(&self, participants: Vec<UserId>) -> Result<Round, GameError> {
        debug_assert!(!participants.is_empty());
        let categories = self
            .dictionary
            .categories()
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let now = Utc::now();
        let round = Round {
            number: self.store.next_round_number().await?,
            letter: random_letter(),
            phase: Phase::Playing,
            started_at: now,
            phase_end: now + Duration::seconds(self.config.round_seconds.into()),
            participants,
            categories,
        };
        tracing::info!(
            round = round.number,
            letter = %round.letter,
            participants = round.participants.len(),
            "round started"
        );
        self.store.set_active_round(round.clone()).await?;
        self.store.clear_waiting().await?;
        Ok(round)
    }

    pub(super) async fn unknowns_exist(&self, round: &Round) -> Result<bool, GameError> {
        let submissions = self.store.submissions_for_round(round.number).await?;
        Ok(submissions.iter().any(|s| s.is_unknown(round.letter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testutil::{expire_phase, service_with_terms};
    use crate::game::JoinOutcome;

    #[tokio::test]
    async fn test_join_starts_round_when_none_active() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;

        let outcome = service.join(&"alice".to_string()).await.unwrap();
        let round = match outcome {
            JoinOutcome::Joined(round) => round,
            other => panic!("expected Joined, got {:?}", other),
        };
        assert_eq!(round.phase, Phase::Playing);
        assert_eq!(round.participants, vec!["alice".to_string()]);
        assert_eq!(round.categories.len(), 1);
        assert!(round.letter.is_ascii_uppercase());
        assert!(round.phase_end > round.started_at);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_for_participants() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;
        service.join(&"alice".to_string()).await.unwrap();

        let again = service.join(&"alice".to_string()).await.unwrap();
        assert!(matches!(again, JoinOutcome::Joined(_)));
        assert!(service.store.waiting_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_late_joiner_is_queued() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;
        service.join(&"alice".to_string()).await.unwrap();

        let outcome = service.join(&"bob".to_string()).await.unwrap();
        match outcome {
            JoinOutcome::Queued { round, waiting } => {
                assert!(!round.is_participant("bob"));
                assert_eq!(waiting, 1);
            }
            other => panic!("expected Queued, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_queued_joiner_enters_next_round() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;
        service.join(&"alice".to_string()).await.unwrap();
        service.join(&"bob".to_string()).await.unwrap();

        expire_phase(&service).await;
        service.ensure_round_progress().await.unwrap();

        let next = service.store.active_round().await.unwrap().unwrap();
        assert_eq!(next.number, 2);
        assert!(next.is_participant("bob"));
        // Next round participants are exactly the waiting set.
        assert!(!next.is_participant("alice"));
    }

    #[tokio::test]
    async fn test_expired_playing_without_unknowns_finalizes() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;
        service.join(&"alice".to_string()).await.unwrap();

        expire_phase(&service).await;
        service.ensure_round_progress().await.unwrap();

        // Nobody waiting, so no round remains.
        assert!(service.store.active_round().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_playing_with_unknowns_enters_voting() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;
        service.join(&"alice".to_string()).await.unwrap();
        let round = crate::game::testutil::force_letter(&service, 'B').await;

        service
            .submit(&"alice".to_string(), &round.categories[0], "Bxqzt")
            .await
            .unwrap();

        expire_phase(&service).await;
        service.ensure_round_progress().await.unwrap();

        let voting = service.store.active_round().await.unwrap().unwrap();
        assert_eq!(voting.phase, Phase::Voting);
        assert!(voting.phase_end > Utc::now());
    }

    #[tokio::test]
    async fn test_progress_is_noop_while_phase_running() {
        let service = service_with_terms(&[("Stadt", &["Berlin"][..])]).await;
        service.join(&"alice".to_string()).await.unwrap();
        let before = service.store.active_round().await.unwrap().unwrap();

        service.ensure_round_progress().await.unwrap();
        let after = service.store.active_round().await.unwrap().unwrap();
        assert_eq!(before.number, after.number);
        assert_eq!(before.phase, after.phase);
    }
}
