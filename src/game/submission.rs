//! Submitting answers during the playing phase.

use super::GameService;
use crate::error::GameError;
use crate::types::{CategoryId, Phase, Submission, UserId};

impl GameService {
    /// Upsert the caller's answer for one category. Runs auto-matching and
    /// stores the result keyed by (round, user, category); resubmitting
    /// during the playing phase overwrites the previous answer.
    pub async fn submit(
        &self,
        user_id: &UserId,
        category_id: &CategoryId,
        text: &str,
    ) -> Result<Submission, GameError> {
        self.ensure_round_progress().await?;

        let round = self
            .store
            .active_round()
            .await?
            .ok_or(GameError::NoActiveRound)?;
        if round.phase != Phase::Playing {
            return Err(GameError::WrongPhase {
                expected: Phase::Playing,
            });
        }
        if !round.is_participant(user_id) {
            return Err(GameError::NotAParticipant);
        }
        if !round.categories.contains(category_id) {
            return Err(GameError::NotFound("category"));
        }

        let outcome = self.matcher().auto_match(round.letter, category_id, text).await?;
        let submission = Submission {
            round: round.number,
            user_id: user_id.clone(),
            category_id: category_id.clone(),
            original_text: text.to_string(),
            normalized_text: outcome.normalized,
            matched_term_id: outcome.matched_term_id,
            similarity: outcome.similarity,
            is_valid: outcome.matched,
            is_unique: false,
        };
        self.store
            .set_submission(submission.clone(), round.phase_end)
            .await?;

        tracing::debug!(
            round = round.number,
            user = %user_id,
            category = %category_id,
            valid = submission.is_valid,
            similarity = submission.similarity,
            "submission stored"
        );
        Ok(submission)
    }
}
