//! Peer voting on unknown terms during the voting phase.

use std::collections::BTreeSet;

use super::GameService;
use crate::error::GameError;
use crate::text::normalize;
use crate::types::{CategoryId, Phase, Round, UnknownTermEntry, UserId};

impl GameService {
    /// Record the caller's approve/reject judgment on an unknown term.
    /// One vote per user per unknown; revoting overwrites. Returns the
    /// entry with updated counts.
    pub async fn vote_unknown(
        &self,
        user_id: &UserId,
        category_id: &CategoryId,
        normalized_text: &str,
        value: bool,
    ) -> Result<UnknownTermEntry, GameError> {
        self.ensure_round_progress().await?;

        let round = self
            .store
            .active_round()
            .await?
            .ok_or(GameError::NoActiveRound)?;
        if round.phase != Phase::Voting {
            return Err(GameError::WrongPhase {
                expected: Phase::Voting,
            });
        }
        if !round.is_participant(user_id) {
            return Err(GameError::NotAParticipant);
        }

        // Tolerate clients echoing slightly different text back.
        let normalized = normalize(normalized_text);
        let unknowns = self.unknown_entries(&round).await?;
        if !unknowns
            .iter()
            .any(|u| &u.category_id == category_id && u.normalized_text == normalized)
        {
            return Err(GameError::NotFound("unknown term"));
        }

        self.store
            .add_vote(
                round.number,
                category_id,
                &normalized,
                user_id,
                value,
                round.phase_end,
            )
            .await?;

        let votes = self
            .store
            .votes_for(round.number, category_id, &normalized)
            .await?;
        let approvals = votes.values().filter(|v| **v).count() as u32;
        Ok(UnknownTermEntry {
            category_id: category_id.clone(),
            normalized_text: normalized,
            approvals,
            rejections: votes.len() as u32 - approvals,
        })
    }

    /// Unknown terms of the active round with live counts. Only available
    /// during the voting phase and only to participants.
    pub async fn unknown_terms(&self, user_id: &UserId) -> Result<Vec<UnknownTermEntry>, GameError> {
        self.ensure_round_progress().await?;

        let round = self
            .store
            .active_round()
            .await?
            .ok_or(GameError::NoActiveRound)?;
        if round.phase != Phase::Voting {
            return Err(GameError::WrongPhase {
                expected: Phase::Voting,
            });
        }
        if !round.is_participant(user_id) {
            return Err(GameError::NotAParticipant);
        }

        self.unknown_entries(&round).await
    }

    /// Deduplicated (category, normalized text) pairs lacking a dictionary
    /// match, with their current vote counts, in stable order.
    pub(super) async fn unknown_entries(
        &self,
        round: &Round,
    ) -> Result<Vec<UnknownTermEntry>, GameError> {
        let submissions = self.store.submissions_for_round(round.number).await?;

        let mut keys: BTreeSet<(CategoryId, String)> = BTreeSet::new();
        for submission in &submissions {
            if submission.is_unknown(round.letter) {
                keys.insert((
                    submission.category_id.clone(),
                    submission.normalized_text.clone(),
                ));
            }
        }

        let mut entries = Vec::with_capacity(keys.len());
        for (category_id, normalized_text) in keys {
            let votes = self
                .store
                .votes_for(round.number, &category_id, &normalized_text)
                .await?;
            let approvals = votes.values().filter(|v| **v).count() as u32;
            entries.push(UnknownTermEntry {
                category_id,
                normalized_text,
                approvals,
                rejections: votes.len() as u32 - approvals,
            });
        }
        Ok(entries)
    }
}
