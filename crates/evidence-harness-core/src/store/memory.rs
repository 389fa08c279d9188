//! In-memory [`Store`] implementation for tests and embedding callers that
//! keep their corpus in process.
//!
//! Passages live in a `Vec` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity; lexical search scores by matched query
//! terms; substring search is a linear scan.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Candidate, Passage, SourceTier};

use super::{tokenize, Store};

struct StoredPassage {
    passage: Passage,
    vector: Option<Vec<f32>>,
}

/// In-memory passage store.
pub struct InMemoryStore {
    passages: RwLock<Vec<StoredPassage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            passages: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.passages.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn in_scope(passage: &Passage, scope: Option<&str>) -> bool {
    match scope {
        Some(key) => passage.scope_key.as_deref() == Some(key),
        None => true,
    }
}

fn to_candidate(passage: &Passage, score: f64, tier: SourceTier) -> Candidate {
    Candidate {
        id: passage.id.clone(),
        content: passage.content.clone(),
        relevance_score: score,
        locator: passage.locator.clone(),
        source_tier: tier,
    }
}

fn sort_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn vector_search(
        &self,
        query_vec: &[f32],
        scope: Option<&str>,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<Candidate>> {
        let passages = self.passages.read().map_err(|_| poisoned())?;
        let mut candidates: Vec<Candidate> = passages
            .iter()
            .filter(|sp| in_scope(&sp.passage, scope))
            .filter_map(|sp| {
                let vector = sp.vector.as_ref()?;
                let sim = cosine_similarity(query_vec, vector) as f64;
                (sim >= min_score).then(|| to_candidate(&sp.passage, sim, SourceTier::Dense))
            })
            .collect();
        sort_desc(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn lexical_search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let passages = self.passages.read().map_err(|_| poisoned())?;
        let mut candidates: Vec<Candidate> = passages
            .iter()
            .filter(|sp| in_scope(&sp.passage, scope))
            .filter_map(|sp| {
                let words: HashSet<String> = tokenize(&sp.passage.content).into_iter().collect();
                let matches = terms.iter().filter(|t| words.contains(*t)).count();
                (matches > 0)
                    .then(|| to_candidate(&sp.passage, matches as f64, SourceTier::Lexical))
            })
            .collect();
        sort_desc(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn substring_search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let passages = self.passages.read().map_err(|_| poisoned())?;
        Ok(passages
            .iter()
            .filter(|sp| in_scope(&sp.passage, scope))
            .filter(|sp| sp.passage.content.to_lowercase().contains(&needle))
            .take(limit)
            .map(|sp| to_candidate(&sp.passage, 0.0, SourceTier::Substring))
            .collect())
    }

    async fn upsert_passage(&self, passage: &Passage, vector: Option<&[f32]>) -> Result<()> {
        let mut passages = self.passages.write().map_err(|_| poisoned())?;
        let stored = StoredPassage {
            passage: passage.clone(),
            vector: vector.map(|v| v.to_vec()),
        };
        match passages.iter_mut().find(|sp| sp.passage.id == passage.id) {
            Some(existing) => *existing = stored,
            None => passages.push(stored),
        }
        Ok(())
    }
}
