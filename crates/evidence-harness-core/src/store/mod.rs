//! Storage abstraction for Evidence Harness.
//!
//! The [`Store`] trait exposes the three independent search primitives the
//! retrieval tiers are built on, plus a single write used to seed a store.
//! How each primitive executes (vector index, FTS index, table scan) is the
//! backend's business.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Candidate, Passage};

/// Abstract passage store.
///
/// All search methods return candidates sorted by descending relevance and
/// treat "no matches" as `Ok(vec![])`. The `source_tier` each backend puts
/// on its candidates is informational; the calling adapter stamps the
/// authoritative tier.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`vector_search`](Store::vector_search) | Nearest neighbours by cosine similarity |
/// | [`lexical_search`](Store::lexical_search) | Ranked full-text match |
/// | [`substring_search`](Store::substring_search) | Case-insensitive containment scan |
/// | [`upsert_passage`](Store::upsert_passage) | Insert or replace a passage |
#[async_trait]
pub trait Store: Send + Sync {
    /// Nearest neighbours of `query_vec` within `scope`, excluding anything
    /// scoring below `min_score`.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        scope: Option<&str>,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<Candidate>>;

    /// Ranked full-text match of `query` within `scope`.
    async fn lexical_search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    /// Passages within `scope` whose content contains `query`, ignoring case.
    async fn substring_search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    /// Insert or replace a passage, optionally with its embedding.
    async fn upsert_passage(&self, passage: &Passage, vector: Option<&[f32]>) -> Result<()>;
}

/// Split text into lower-cased alphanumeric terms.
///
/// Shared by the lexical primitives and the diversity reranker so both
/// agree on what a "word" is.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
