//! Core data models for the retrieval pipeline.
//!
//! These types describe the passages that flow from the store through the
//! fallback tiers, the diversity reranker and the confidence calculator.
//! All of them are request-scoped values: created fresh for each query and
//! never mutated after they are handed to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which retrieval strategy produced a candidate.
///
/// Scores are only comparable within a single tier, so a result set never
/// mixes tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    /// Embedding nearest-neighbour search.
    Dense,
    /// Ranked full-text match.
    Lexical,
    /// Case-insensitive substring containment.
    Substring,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Dense => "dense",
            SourceTier::Lexical => "lexical",
            SourceTier::Substring => "substring",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tier that ultimately answered a query, or `None` when every tier
/// came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierUsed {
    Dense,
    Lexical,
    Substring,
    None,
}

impl TierUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierUsed::Dense => "dense",
            TierUsed::Lexical => "lexical",
            TierUsed::Substring => "substring",
            TierUsed::None => "none",
        }
    }
}

impl From<SourceTier> for TierUsed {
    fn from(tier: SourceTier) -> Self {
        match tier {
            SourceTier::Dense => TierUsed::Dense,
            SourceTier::Lexical => TierUsed::Lexical,
            SourceTier::Substring => TierUsed::Substring,
        }
    }
}

impl fmt::Display for TierUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One retrieved passage, prior to reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Opaque passage identifier, stable across tiers.
    pub id: String,
    /// Passage text.
    pub content: String,
    /// Tier-local relevance; higher is better.
    pub relevance_score: f64,
    /// Position metadata (page range, collection id, ...). Passed through untouched.
    pub locator: serde_json::Value,
    /// Tier that produced this candidate.
    pub source_tier: SourceTier,
}

/// A passage as stored, independent of any query.
///
/// Used by [`Store::upsert_passage`](crate::store::Store::upsert_passage)
/// when seeding a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub id: String,
    pub scope_key: Option<String>,
    pub content: String,
    pub locator: serde_json::Value,
}

/// A candidate with its final 1-based rank after reranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub locator: serde_json::Value,
    pub source_tier: SourceTier,
    pub rank: usize,
}

impl RankedResult {
    /// Assign ranks to candidates in their current order, starting at 1.
    pub fn from_ordered(candidates: Vec<Candidate>) -> Vec<RankedResult> {
        candidates
            .into_iter()
            .enumerate()
            .map(|(i, c)| RankedResult {
                id: c.id,
                content: c.content,
                score: c.relevance_score,
                locator: c.locator,
                source_tier: c.source_tier,
                rank: i + 1,
            })
            .collect()
    }
}

/// Confidence signals derived from a final ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signals {
    /// Score of the first result, `0.0` when empty.
    pub top_score: f64,
    /// Mean score of the first three results, `0.0` when empty.
    pub avg_top3: f64,
    /// Results scoring at or above the strong-hit threshold.
    pub strong_hit_count: usize,
    /// No results, or a low-confidence marker was found in a result.
    pub is_weak: bool,
}

impl Signals {
    /// Signals for a query that produced nothing.
    pub fn empty() -> Self {
        Self {
            top_score: 0.0,
            avg_top3: 0.0,
            strong_hit_count: 0,
            is_weak: true,
        }
    }
}

/// The full answer to one retrieval request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieval {
    pub results: Vec<RankedResult>,
    pub signals: Signals,
    pub tier_used: TierUsed,
}

impl Retrieval {
    /// The terminal "no evidence found" state.
    pub fn exhausted() -> Self {
        Self {
            results: Vec::new(),
            signals: Signals::empty(),
            tier_used: TierUsed::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, score: f64) -> Candidate {
        Candidate {
            id: id.to_string(),
            content: format!("content of {}", id),
            relevance_score: score,
            locator: serde_json::json!({ "page": 1 }),
            source_tier: SourceTier::Lexical,
        }
    }

    #[test]
    fn test_ranks_start_at_one_in_order() {
        let ranked = RankedResult::from_ordered(vec![candidate("b", 0.2), candidate("a", 0.9)]);
        assert_eq!(ranked[0].id, "b");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].id, "a");
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[1].locator, serde_json::json!({ "page": 1 }));
    }

    #[test]
    fn test_retrieval_serializes_contract_shape() {
        let retrieval = Retrieval {
            results: RankedResult::from_ordered(vec![candidate("p1", 0.8)]),
            signals: Signals {
                top_score: 0.8,
                avg_top3: 0.8,
                strong_hit_count: 1,
                is_weak: false,
            },
            tier_used: TierUsed::Lexical,
        };
        let json = serde_json::to_value(&retrieval).unwrap();
        assert_eq!(json["tierUsed"], "lexical");
        assert_eq!(json["results"][0]["sourceTier"], "lexical");
        assert_eq!(json["results"][0]["rank"], 1);
        assert_eq!(json["signals"]["strongHitCount"], 1);
        assert_eq!(json["signals"]["isWeak"], false);
    }

    #[test]
    fn test_exhausted_is_weak_and_none() {
        let r = Retrieval::exhausted();
        assert!(r.results.is_empty());
        assert!(r.signals.is_weak);
        assert_eq!(r.tier_used, TierUsed::None);
        assert_eq!(serde_json::to_value(r.tier_used).unwrap(), "none");
    }
}
