//! Auto-matching of free-text submissions against the term dictionary.

use std::sync::Arc;

use crate::dictionary::TermDictionary;
use crate::error::StoreError;
use crate::text::{first_letter_upper, normalize, similarity};
use crate::types::{CategoryId, GameConfig, TermId};

/// Verdict for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub matched: bool,
    pub normalized: String,
    /// Best similarity found, also reported for near misses
    pub similarity: f64,
    pub matched_term_id: Option<TermId>,
}

impl MatchOutcome {
    fn unmatched(normalized: String) -> Self {
        Self {
            matched: false,
            normalized,
            similarity: 0.0,
            matched_term_id: None,
        }
    }
}

pub struct MatchEngine {
    dictionary: Arc<dyn TermDictionary>,
    threshold: f64,
    candidate_limit: usize,
}

impl MatchEngine {
    pub fn new(dictionary: Arc<dyn TermDictionary>, config: &GameConfig) -> Self {
        Self {
            dictionary,
            threshold: config.similarity_threshold,
            candidate_limit: config.candidate_limit,
        }
    }

    /// Classify a raw submission for the round's required letter.
    ///
    /// The letter check is a hard game rule: a mismatch fails with similarity
    /// 0.0 no matter how close a dictionary term is. The fuzzy threshold only
    /// absorbs typos and pluralization within the correct letter.
    pub async fn auto_match(
        &self,
        letter: char,
        category: &CategoryId,
        raw: &str,
    ) -> Result<MatchOutcome, StoreError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Ok(MatchOutcome::unmatched(normalized));
        }
        if first_letter_upper(raw) != Some(letter) {
            return Ok(MatchOutcome::unmatched(normalized));
        }

        let candidates = self
            .dictionary
            .find_candidates(category, letter, self.candidate_limit)
            .await?;

        let mut best_sim = 0.0f64;
        let mut best_id: Option<TermId> = None;
        for candidate in &candidates {
            let sim = similarity(&normalized, &candidate.normalized_value);
            if sim > best_sim {
                best_sim = sim;
                best_id = Some(candidate.id.clone());
            }
        }

        if best_id.is_some() && best_sim >= self.threshold {
            Ok(MatchOutcome {
                matched: true,
                normalized,
                similarity: best_sim,
                matched_term_id: best_id,
            })
        } else {
            Ok(MatchOutcome {
                matched: false,
                normalized,
                similarity: best_sim,
                matched_term_id: None,
            })
        }
    }
}
