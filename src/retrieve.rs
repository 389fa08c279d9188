//! Tiered retrieval: fallback orchestration, diversity reranking, and
//! confidence signals.
//!
//! # Pipeline
//!
//! 1. Reject an empty query with [`RetrievalError::InvalidInput`].
//! 2. Ask the dense tier for `dense_overfetch × target` candidates. If it
//!    returns anything, use it and stop.
//! 3. Otherwise ask the lexical tier for `lexical_overfetch × target`.
//! 4. Otherwise ask the substring tier for `substring_overfetch × target`.
//! 5. Rerank the winning tier's candidates with MMR down to `target`.
//! 6. Compute [`Signals`](evidence_harness_core::models::Signals).
//!
//! Tiers run sequentially, never concurrently, and their scores are never
//! merged: each tier's scale is different. A tier that errors or times out
//! is logged and treated exactly like an empty tier. When all tiers come
//! back empty the result is `tier_used = "none"`, no results, and
//! `is_weak = true`. That is a normal outcome, not an error.
//!
//! Dropping the future returned by [`Retriever::retrieve`] cancels the
//! in-flight tier call; no partial result is ever produced.

use anyhow::Result;
use std::sync::Arc;

use evidence_harness_core::diversity::rerank;
use evidence_harness_core::embedding::Embedder;
use evidence_harness_core::models::{Candidate, RankedResult, Retrieval, SourceTier};
use evidence_harness_core::signals::{compute_signals, Confidence, SignalThresholds};
use evidence_harness_core::store::Store;

use crate::adapters::{DenseAdapter, LexicalAdapter, SourceAdapter, SubstringAdapter};
use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::embedding;
use crate::error::RetrievalError;
use crate::sqlite_store::SqliteStore;

/// One tier in the fallback chain with its over-fetch multiplier.
struct FallbackTier {
    adapter: SourceAdapter,
    overfetch: usize,
}

/// The retrieval engine. Immutable after construction and safe to share
/// across concurrent requests behind an `Arc`.
pub struct Retriever {
    tiers: Vec<FallbackTier>,
    retrieval: RetrievalConfig,
    thresholds: SignalThresholds,
}

impl Retriever {
    /// Build the fallback chain. The dense tier is included only when an
    /// embedder is supplied; order is always dense, lexical, substring.
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Option<Arc<dyn Embedder>>,
        config: &Config,
    ) -> Self {
        let r = &config.retrieval;
        let timeout = r.adapter_timeout();
        let mut tiers = Vec::with_capacity(3);

        if let Some(embedder) = embedder {
            tiers.push(FallbackTier {
                adapter: SourceAdapter::Dense(DenseAdapter::new(
                    store.clone(),
                    embedder,
                    r.dense_min_score,
                    config.embedding.max_input_chars,
                    timeout,
                )),
                overfetch: r.dense_overfetch,
            });
        }
        tiers.push(FallbackTier {
            adapter: SourceAdapter::Lexical(LexicalAdapter::new(store.clone(), timeout)),
            overfetch: r.lexical_overfetch,
        });
        tiers.push(FallbackTier {
            adapter: SourceAdapter::Substring(SubstringAdapter::new(
                store,
                r.substring_score,
                timeout,
            )),
            overfetch: r.substring_overfetch,
        });

        Self {
            tiers,
            retrieval: r.clone(),
            thresholds: config.confidence.thresholds(),
        }
    }

    /// Build a retriever over `store` using the configured embedding
    /// provider, skipping the dense tier when embeddings are disabled.
    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Result<Self> {
        let embedder = if config.embedding.is_enabled() {
            Some(embedding::create_provider(&config.embedding)?)
        } else {
            None
        };
        Ok(Self::new(store, embedder, config))
    }

    pub fn default_target_count(&self) -> usize {
        self.retrieval.target_count
    }

    /// Threshold-based verdict for a finished retrieval.
    pub fn classify(&self, retrieval: &Retrieval) -> Confidence {
        self.thresholds.classify(&retrieval.signals)
    }

    /// Run the full pipeline for one query.
    ///
    /// # Errors
    ///
    /// Only [`RetrievalError::InvalidInput`], for a blank query. Tier
    /// failures are absorbed.
    pub async fn retrieve(
        &self,
        query: &str,
        scope: Option<&str>,
        target_count: usize,
    ) -> Result<Retrieval, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        if target_count == 0 {
            tracing::debug!(query, "Target count is zero; nothing to retrieve.");
            return Ok(Retrieval::exhausted());
        }

        let Some((tier, candidates)) = self.fallback_search(query, scope, target_count).await
        else {
            tracing::info!(query, scope, tier_used = "none", "No tier produced candidates.");
            return Ok(Retrieval::exhausted());
        };

        let candidate_count = candidates.len();
        let selected = rerank(candidates, &self.retrieval.diversity_params(target_count));
        let results = RankedResult::from_ordered(selected);
        let signals = compute_signals(&results, &self.thresholds);

        tracing::info!(
            query,
            scope,
            tier_used = %tier,
            candidates = candidate_count,
            results = results.len(),
            top_score = signals.top_score,
            is_weak = signals.is_weak,
            "Retrieval finished."
        );

        Ok(Retrieval {
            results,
            signals,
            tier_used: tier.into(),
        })
    }

    /// Walk the tiers in order and return the first non-empty candidate
    /// set, or `None` when every tier is empty or failed.
    pub async fn fallback_search(
        &self,
        query: &str,
        scope: Option<&str>,
        target_count: usize,
    ) -> Option<(SourceTier, Vec<Candidate>)> {
        for tier in &self.tiers {
            let name = tier.adapter.tier();
            let limit = target_count.saturating_mul(tier.overfetch);

            match tier.adapter.search(query, scope, limit).await {
                Ok(candidates) if !candidates.is_empty() => {
                    tracing::debug!(
                        tier = %name,
                        limit,
                        count = candidates.len(),
                        "Tier produced candidates."
                    );
                    return Some((name, candidates));
                }
                Ok(_) => {
                    tracing::debug!(
                        tier = %name,
                        limit,
                        "Tier returned no candidates; falling through."
                    );
                }
                Err(failure) => {
                    tracing::warn!(
                        tier = %failure.tier(),
                        query,
                        scope,
                        error = %failure,
                        "Retrieval tier failed; falling through."
                    );
                }
            }
        }

        None
    }
}

/// CLI entry point: retrieve against the configured SQLite store and print
/// either JSON or a human-readable listing.
pub async fn run_retrieve(
    config: &Config,
    query: &str,
    scope: Option<&str>,
    count: Option<usize>,
    json: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));
    let retriever = Retriever::from_config(store, config)?;

    let target = count.unwrap_or_else(|| retriever.default_target_count());
    let retrieval = retriever.retrieve(query, scope, target).await?;
    let confidence = retriever.classify(&retrieval);
    pool.close().await;

    if json {
        let mut value = serde_json::to_value(&retrieval)?;
        value["confidence"] = serde_json::to_value(confidence)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if retrieval.results.is_empty() {
        println!("No supporting evidence found.");
        return Ok(());
    }

    let s = &retrieval.signals;
    println!(
        "tier: {}  confidence: {:?}  top: {:.2}  avg3: {:.2}  strong hits: {}{}",
        retrieval.tier_used,
        confidence,
        s.top_score,
        s.avg_top3,
        s.strong_hit_count,
        if s.is_weak { "  (flagged weak)" } else { "" }
    );
    println!();

    for result in &retrieval.results {
        println!("{}. [{:.3}] {}", result.rank, result.score, result.id);
        if !result.locator.is_null() {
            println!("    locator: {}", result.locator);
        }
        let excerpt: String = result.content.chars().take(240).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!();
    }

    Ok(())
}
