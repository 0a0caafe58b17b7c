//! Finalization, scoring and leaderboard queries.

use std::collections::HashMap;

use super::GameService;
use crate::error::GameError;
use crate::types::{
    CategoryId, HighscoreEntry, LastResult, ResultLine, Round, UserId,
};

/// Live per-participant estimate for the running round (no uniqueness bonus,
/// that is only known at finalization).
#[derive(Debug, Clone, serde::Serialize, PartialEq)]
pub struct LiveScore {
    pub user_id: UserId,
    pub valid_count: u32,
    pub points_estimate: u32,
}

impl GameService {
    /// Finalize one round: resolve unknowns by majority, mark uniques,
    /// snapshot last results, award points to the leaderboard, clear the
    /// round state and start the next round if anyone is waiting.
    ///
    /// A store failure anywhere in here leaves the round active and the
    /// finalize is retried on the next progress check. Retrying is safe:
    /// everything before the award is a read or an idempotent rewrite, and
    /// the leaderboard applies a round's awards at most once.
    ///
    /// Clearing the round is the final state mutation, so a second finalize
    /// attempt for the same round observes no active round and does nothing.
    /// Callers must hold the progress lock.
    pub(super) async fn finalize_and_score(&self, round: &Round) -> Result<(), GameError> {
        let mut submissions = self.store.submissions_for_round(round.number).await?;

        // 1) Resolve unknowns by majority: approvals > rejections wins,
        //    ties and unvoted entries stay invalid.
        for submission in &mut submissions {
            if submission.is_unknown(round.letter) {
                let votes = self
                    .store
                    .votes_for(round.number, &submission.category_id, &submission.normalized_text)
                    .await?;
                let approvals = votes.values().filter(|v| **v).count();
                let rejections = votes.len() - approvals;
                submission.is_valid = approvals > rejections;
            }
        }

        // 2) Uniqueness among the now-valid submissions, per (category,
        //    normalized text); only singleton groups count.
        let mut groups: HashMap<(CategoryId, String), Vec<usize>> = HashMap::new();
        for (idx, submission) in submissions.iter().enumerate() {
            if submission.is_valid {
                groups
                    .entry((
                        submission.category_id.clone(),
                        submission.normalized_text.clone(),
                    ))
                    .or_default()
                    .push(idx);
            }
        }
        for indices in groups.values() {
            if let [only] = indices[..] {
                submissions[only].is_unique = true;
            }
        }

        // 3) Points per participant.
        let mut points: HashMap<UserId, u32> = HashMap::new();
        let mut breakdown: HashMap<UserId, Vec<ResultLine>> = HashMap::new();
        for submission in &submissions {
            if !submission.is_valid {
                continue;
            }
            let pts = self.config.base_points
                + if submission.is_unique {
                    self.config.unique_bonus
                } else {
                    0
                };
            *points.entry(submission.user_id.clone()).or_insert(0) += pts;
            breakdown
                .entry(submission.user_id.clone())
                .or_default()
                .push(ResultLine {
                    category_id: submission.category_id.clone(),
                    text: submission.original_text.clone(),
                    normalized: submission.normalized_text.clone(),
                    is_unique: submission.is_unique,
                    points: pts,
                });
        }

        // 4) Last-result snapshot for every participant, including those
        //    who scored nothing. Written before any totals change: a failed
        //    write aborts the finalize with nothing awarded yet, and the
        //    retry rewrites identical snapshots.
        for user_id in &round.participants {
            let valid_count = submissions
                .iter()
                .filter(|s| &s.user_id == user_id && s.is_valid)
                .count() as u32;
            self.store
                .set_last_result(
                    user_id,
                    LastResult {
                        round: round.number,
                        gained_points: points.get(user_id).copied().unwrap_or(0),
                        valid_count,
                        breakdown: breakdown.get(user_id).cloned().unwrap_or_default(),
                    },
                )
                .await?;
        }

        // 5) Award the points as one batch the leaderboard applies at most
        //    once per round, so a finalize retried past this point cannot
        //    credit anyone twice.
        let awards: Vec<(UserId, u32)> = points.into_iter().collect();
        self.leaderboard
            .apply_round_points(round.number, &awards)
            .await?;

        tracing::info!(
            round = round.number,
            participants = round.participants.len(),
            awarded = awards.iter().map(|(_, pts)| *pts).sum::<u32>(),
            "round finalized"
        );

        // 6) Clear, then chain into the next round for the waiting set.
        self.store.clear_active_round().await?;
        self.store.clear_round_data(round.number).await?;
        let waiting = self.store.waiting_users().await?;
        if !waiting.is_empty() {
            self.start_new_round(waiting).await?;
        }
        Ok(())
    }

    /// Persistent top-N plus the live estimate for the running round.
    pub async fn scoreboard(
        &self,
        limit: usize,
    ) -> Result<(Vec<HighscoreEntry>, Vec<LiveScore>), GameError> {
        self.ensure_round_progress().await?;

        let highscores = self.leaderboard.top_n(limit).await?;

        let mut live = Vec::new();
        if let Some(round) = self.store.active_round().await? {
            let submissions = self.store.submissions_for_round(round.number).await?;
            for user_id in &round.participants {
                let valid_count = submissions
                    .iter()
                    .filter(|s| &s.user_id == user_id && s.is_valid)
                    .count() as u32;
                live.push(LiveScore {
                    user_id: user_id.clone(),
                    valid_count,
                    points_estimate: valid_count * self.config.base_points,
                });
            }
            live.sort_by(|a, b| {
                b.points_estimate
                    .cmp(&a.points_estimate)
                    .then_with(|| a.user_id.cmp(&b.user_id))
            });
        }

        Ok((highscores, live))
    }

    pub async fn my_total(&self, user_id: &UserId) -> Result<u64, GameError> {
        Ok(self.leaderboard.get_total(user_id).await?)
    }

    pub async fn my_last_result(&self, user_id: &UserId) -> Result<Option<LastResult>, GameError> {
        Ok(self.store.last_result(user_id).await?)
    }

    /// Admin shortcut: finalize whatever is running and start a fresh round
    /// right away. Fails if nobody would participate.
    pub async fn force_new_round(&self) -> Result<Round, GameError> {
        let _guard = self.progress.lock().await;

        if let Some(round) = self.store.active_round().await? {
            self.finalize_and_score(&round).await?;
        }
        if let Some(round) = self.store.active_round().await? {
            return Ok(round);
        }
        let waiting = self.store.waiting_users().await?;
        if waiting.is_empty() {
            return Err(GameError::Validation(
                "no players are waiting for a round".to_string(),
            ));
        }
        self.start_new_round(waiting).await
    }
}
