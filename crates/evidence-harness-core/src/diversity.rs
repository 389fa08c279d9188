//! Diversity reranking with Maximal Marginal Relevance (MMR).
//!
//! Given an over-fetched candidate list, picks a bounded top-K that trades
//! relevance against redundancy so downstream consumers see varied evidence
//! instead of several near-identical passages.
//!
//! # Algorithm
//!
//! 1. If there are no more than `k` candidates, return them unchanged.
//! 2. Seed the selection with the highest-relevance candidate.
//! 3. Until `k` are selected, pick the remaining candidate maximising
//!    `λ × relevance − (1 − λ) × max_similarity_to_selected`.
//!    Ties go to the candidate ranked earlier by relevance.
//! 4. Return candidates in selection order.
//!
//! Similarity is token-set Jaccard over lower-cased, punctuation-split
//! content: cheap, language-agnostic, and needs no extra embedding calls.
//! Each candidate's running maximum is updated against the most recent
//! selection only, so the whole pass costs `O(k × n)` comparisons.

use std::collections::HashSet;

use crate::models::Candidate;
use crate::store::tokenize;

/// Reranking knobs, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityParams {
    /// Relevance/diversity trade-off in `[0, 1]`; higher favours relevance.
    pub lambda: f64,
    /// Maximum results returned.
    pub k: usize,
    /// Below this many candidates no reranking happens; the list is only
    /// truncated to `k`.
    pub min_candidates: usize,
}

/// Lower-cased token set of a passage.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// `|A ∩ B| / |A ∪ B|`, or `0.0` when both sets are empty.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Greedy MMR selection of at most `k` mutually dissimilar candidates.
///
/// Returns an empty list for `k == 0` and the input untouched when it
/// already fits within `k`.
pub fn select_diverse(candidates: Vec<Candidate>, lambda: f64, k: usize) -> Vec<Candidate> {
    if k == 0 {
        return Vec::new();
    }
    if candidates.len() <= k {
        return candidates;
    }

    let n = candidates.len();
    let token_sets: Vec<HashSet<String>> =
        candidates.iter().map(|c| token_set(&c.content)).collect();

    // Stable sort: equal scores keep their input order.
    let mut by_relevance: Vec<usize> = (0..n).collect();
    by_relevance.sort_by(|&a, &b| {
        candidates[b]
            .relevance_score
            .partial_cmp(&candidates[a].relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    selected.push(by_relevance[0]);
    let mut remaining: Vec<usize> = by_relevance[1..].to_vec();
    let mut max_sim = vec![0.0f64; n];

    while selected.len() < k && !remaining.is_empty() {
        let last = selected[selected.len() - 1];
        for &i in &remaining {
            let sim = jaccard_similarity(&token_sets[i], &token_sets[last]);
            if sim > max_sim[i] {
                max_sim[i] = sim;
            }
        }

        let mut best_pos = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (pos, &i) in remaining.iter().enumerate() {
            let mmr = lambda * candidates[i].relevance_score - (1.0 - lambda) * max_sim[i];
            if mmr > best_score {
                best_score = mmr;
                best_pos = pos;
            }
        }
        selected.push(remaining.remove(best_pos));
    }

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    selected
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Apply [`DiversityParams`]: rerank with MMR when there are enough
/// candidates, otherwise keep adapter order and cap at `k`.
pub fn rerank(mut candidates: Vec<Candidate>, params: &DiversityParams) -> Vec<Candidate> {
    if candidates.len() < params.min_candidates {
        candidates.truncate(params.k);
        return candidates;
    }
    select_diverse(candidates, params.lambda, params.k)
}
