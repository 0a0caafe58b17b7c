//! Term dictionary: read-only lookup of approved terms per category.
//!
//! The engine only ever queries candidates by (category, first letter); the
//! dictionary contents are maintained by admin tooling outside this service.
//! The in-memory implementation exists for tests and single-node deployments
//! and can be seeded from a JSON file at startup.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::text::{first_letter_upper, normalize};
use crate::types::{Category, CategoryId, TermId};

/// A dictionary term as seen by the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TermCandidate {
    pub id: TermId,
    pub normalized_value: String,
}

#[async_trait]
pub trait TermDictionary: Send + Sync {
    /// All categories known to the dictionary; these become the categories
    /// of every new round.
    async fn categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Approved terms in `category` whose first letter matches, capped at
    /// `limit` to bound matching cost.
    async fn find_candidates(
        &self,
        category: &CategoryId,
        first_letter: char,
        limit: usize,
    ) -> Result<Vec<TermCandidate>, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredTerm {
    id: TermId,
    normalized_value: String,
    first_letter: Option<char>,
}

#[derive(Default)]
struct DictInner {
    categories: Vec<Category>,
    terms: HashMap<CategoryId, Vec<StoredTerm>>,
}

#[derive(Default)]
pub struct InMemoryDictionary {
    inner: RwLock<DictInner>,
}

/// Seed file format: category name → list of raw term values.
type SeedFile = HashMap<String, Vec<String>>;

impl InMemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category, reusing an existing one with the same name.
    pub async fn add_category(&self, name: &str) -> Category {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.categories.iter().find(|c| c.name == name) {
            return existing.clone();
        }
        let category = Category {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
        };
        inner.categories.push(category.clone());
        category
    }

    /// Add an approved term. Duplicates (same normalized value within the
    /// category) are ignored. Returns the term id actually stored.
    pub async fn add_term(&self, category_id: &CategoryId, value: &str) -> Option<TermId> {
        let normalized = normalize(value);
        if normalized.is_empty() {
            return None;
        }
        let mut inner = self.inner.write().await;
        if !inner.categories.iter().any(|c| &c.id == category_id) {
            return None;
        }
        let terms = inner.terms.entry(category_id.clone()).or_default();
        if let Some(existing) = terms.iter().find(|t| t.normalized_value == normalized) {
            return Some(existing.id.clone());
        }
        let term = StoredTerm {
            id: ulid::Ulid::new().to_string(),
            first_letter: first_letter_upper(value),
            normalized_value: normalized,
        };
        let id = term.id.clone();
        terms.push(term);
        Some(id)
    }

    /// Load `{ "Stadt": ["Berlin", ...], ... }` seed data. Returns the number
    /// of terms stored.
    pub async fn seed_from_json(&self, json: &str) -> Result<usize, serde_json::Error> {
        let seed: SeedFile = serde_json::from_str(json)?;
        let mut count = 0;
        for (category_name, values) in seed {
            let category = self.add_category(&category_name).await;
            for value in values {
                if self.add_term(&category.id, &value).await.is_some() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl TermDictionary for InMemoryDictionary {
    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.inner.read().await.categories.clone())
    }

    async fn find_candidates(
        &self,
        category: &CategoryId,
        first_letter: char,
        limit: usize,
    ) -> Result<Vec<TermCandidate>, StoreError> {
        let inner = self.inner.read().await;
        let candidates = inner
            .terms
            .get(category)
            .map(|terms| {
                terms
                    .iter()
                    .filter(|t| t.first_letter == Some(first_letter.to_ascii_uppercase()))
                    .take(limit)
                    .map(|t| TermCandidate {
                        id: t.id.clone(),
                        normalized_value: t.normalized_value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(candidates)
    }
}

/// Seed helper used by tests and `main`: a dictionary with the given
/// categories and terms.
pub async fn dictionary_with_terms(entries: &[(&str, &[&str])]) -> InMemoryDictionary {
    let dict = InMemoryDictionary::new();
    for (category_name, values) in entries {
        let category = dict.add_category(category_name).await;
        for value in *values {
            dict.add_term(&category.id, value).await;
        }
    }
    dict
}
