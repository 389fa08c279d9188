//! Candidate source adapters: the three retrieval tiers.
//!
//! Each tier wraps one [`Store`] primitive behind the same contract,
//! `search(query, scope, limit) -> Result<Vec<Candidate>, AdapterFailure>`.
//! The set is closed; [`SourceAdapter`] is an enum over exactly three
//! variants and the orchestrator matches on it.
//!
//! | Tier | Primitive | Score |
//! |------|-----------|-------|
//! | [`DenseAdapter`] | embed query, then `vector_search` with a similarity floor | cosine |
//! | [`LexicalAdapter`] | `lexical_search` | store rank (e.g. `-bm25`) |
//! | [`SubstringAdapter`] | `substring_search` | fixed, equal, low |
//!
//! Every tier call runs under one `tokio::time::timeout`; for the dense tier
//! that bound covers embedding and vector search together.
//! An empty result is `Ok(vec![])`, never an error. Each returned candidate
//! is stamped with the adapter's tier.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use evidence_harness_core::embedding::{truncate_for_embedding, Embedder};
use evidence_harness_core::models::{Candidate, SourceTier};
use evidence_harness_core::store::Store;

use crate::error::AdapterFailure;

/// Embedding nearest-neighbour tier.
pub struct DenseAdapter {
    store: Arc<dyn Store>,
    embedder: Arc<dyn Embedder>,
    min_score: f64,
    max_input_chars: usize,
    timeout: Duration,
}

impl DenseAdapter {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn Embedder>,
        min_score: f64,
        max_input_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            min_score,
            max_input_chars,
            timeout,
        }
    }

    async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AdapterFailure> {
        let text = truncate_for_embedding(query, self.max_input_chars);
        // Embed and search share one bound.
        let search = async {
            let vector = self
                .embedder
                .embed(text)
                .await
                .map_err(|e| provider_failure(SourceTier::Dense, format!("{:#}", e)))?;
            self.store
                .vector_search(&vector, scope, limit, self.min_score)
                .await
                .map_err(|e| store_failure(SourceTier::Dense, format!("{:#}", e)))
        };
        let candidates = tokio::time::timeout(self.timeout, search)
            .await
            .map_err(|_| timed_out(SourceTier::Dense, self.timeout))??;

        Ok(stamp(candidates, SourceTier::Dense, None))
    }
}

/// Ranked full-text tier.
pub struct LexicalAdapter {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl LexicalAdapter {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AdapterFailure> {
        let candidates = bounded(
            SourceTier::Lexical,
            self.timeout,
            self.store.lexical_search(query, scope, limit),
            store_failure,
        )
        .await?;

        Ok(stamp(candidates, SourceTier::Lexical, None))
    }
}

/// Last-resort containment tier. There is no ranking signal, so every hit
/// gets the same configured score.
pub struct SubstringAdapter {
    store: Arc<dyn Store>,
    fixed_score: f64,
    timeout: Duration,
}

impl SubstringAdapter {
    pub fn new(store: Arc<dyn Store>, fixed_score: f64, timeout: Duration) -> Self {
        Self {
            store,
            fixed_score,
            timeout,
        }
    }

    async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AdapterFailure> {
        let candidates = bounded(
            SourceTier::Substring,
            self.timeout,
            self.store.substring_search(query.trim(), scope, limit),
            store_failure,
        )
        .await?;

        Ok(stamp(
            candidates,
            SourceTier::Substring,
            Some(self.fixed_score),
        ))
    }
}

/// One of the three retrieval tiers.
pub enum SourceAdapter {
    Dense(DenseAdapter),
    Lexical(LexicalAdapter),
    Substring(SubstringAdapter),
}

impl SourceAdapter {
    pub fn tier(&self) -> SourceTier {
        match self {
            SourceAdapter::Dense(_) => SourceTier::Dense,
            SourceAdapter::Lexical(_) => SourceTier::Lexical,
            SourceAdapter::Substring(_) => SourceTier::Substring,
        }
    }

    /// Fetch up to `limit` candidates from this tier.
    pub async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>, AdapterFailure> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match self {
            SourceAdapter::Dense(a) => a.search(query, scope, limit).await,
            SourceAdapter::Lexical(a) => a.search(query, scope, limit).await,
            SourceAdapter::Substring(a) => a.search(query, scope, limit).await,
        }
    }
}

fn provider_failure(tier: SourceTier, message: String) -> AdapterFailure {
    AdapterFailure::Provider { tier, message }
}

fn store_failure(tier: SourceTier, message: String) -> AdapterFailure {
    AdapterFailure::Store { tier, message }
}

/// Await `fut` for at most `limit`, mapping errors to an [`AdapterFailure`].
async fn bounded<T, F>(
    tier: SourceTier,
    limit: Duration,
    fut: F,
    on_error: fn(SourceTier, String) -> AdapterFailure,
) -> Result<T, AdapterFailure>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(on_error(tier, format!("{:#}", e))),
        Err(_) => Err(timed_out(tier, limit)),
    }
}

fn timed_out(tier: SourceTier, limit: Duration) -> AdapterFailure {
    AdapterFailure::Timeout {
        tier,
        after_ms: limit.as_millis() as u64,
    }
}

fn stamp(mut candidates: Vec<Candidate>, tier: SourceTier, score: Option<f64>) -> Vec<Candidate> {
    for c in &mut candidates {
        c.source_tier = tier;
        if let Some(s) = score {
            c.relevance_score = s;
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use evidence_harness_core::models::Passage;
    use evidence_harness_core::store::memory::InMemoryStore;
    use std::sync::Mutex;

    /// Records the text it was asked to embed; optionally hangs or fails.
    struct ScriptedEmbedder {
        seen: Mutex<Vec<String>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl ScriptedEmbedder {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                delay: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        fn model_name(&self) -> &str {
            "scripted"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.seen.lock().unwrap().push(text.to_string());
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                anyhow::bail!("provider returned 503");
            }
            Ok(vec![1.0, 0.0])
        }
    }

    /// Delays `vector_search` on top of an inner store.
    struct SlowVectorStore {
        inner: Arc<dyn Store>,
        delay: Duration,
    }

    #[async_trait]
    impl Store for SlowVectorStore {
        async fn vector_search(
            &self,
            query_vec: &[f32],
            scope: Option<&str>,
            limit: usize,
            min_score: f64,
        ) -> Result<Vec<Candidate>> {
            tokio::time::sleep(self.delay).await;
            self.inner
                .vector_search(query_vec, scope, limit, min_score)
                .await
        }
        async fn lexical_search(
            &self,
            query: &str,
            scope: Option<&str>,
            limit: usize,
        ) -> Result<Vec<Candidate>> {
            self.inner.lexical_search(query, scope, limit).await
        }
        async fn substring_search(
            &self,
            query: &str,
            scope: Option<&str>,
            limit: usize,
        ) -> Result<Vec<Candidate>> {
            self.inner.substring_search(query, scope, limit).await
        }
        async fn upsert_passage(&self, passage: &Passage, vector: Option<&[f32]>) -> Result<()> {
            self.inner.upsert_passage(passage, vector).await
        }
    }

    async fn store() -> Arc<dyn Store> {
        let store = InMemoryStore::new();
        for (id, content, vec) in [
            ("p1", "Hold the power button to reset the machine.", [1.0f32, 0.0]),
            ("p2", "Replace the filter every six months.", [0.0, 1.0]),
        ] {
            store
                .upsert_passage(
                    &Passage {
                        id: id.to_string(),
                        scope_key: None,
                        content: content.to_string(),
                        locator: serde_json::Value::Null,
                    },
                    Some(&vec),
                )
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_dense_truncates_input_and_applies_floor() {
        let embedder = Arc::new(ScriptedEmbedder::new());
        let adapter = SourceAdapter::Dense(DenseAdapter::new(
            store().await,
            embedder.clone(),
            0.5,
            5,
            Duration::from_secs(1),
        ));
        let results = adapter.search("reset the machine", None, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "p1");
        assert_eq!(results[0].source_tier, SourceTier::Dense);
        assert_eq!(embedder.seen.lock().unwrap().as_slice(), ["reset"]);
    }

    #[tokio::test]
    async fn test_dense_timeout_is_adapter_failure() {
        let embedder = Arc::new(ScriptedEmbedder {
            delay: Some(Duration::from_millis(500)),
            ..ScriptedEmbedder::new()
        });
        let adapter = SourceAdapter::Dense(DenseAdapter::new(
            store().await,
            embedder,
            0.0,
            100,
            Duration::from_millis(20),
        ));
        let err = adapter.search("reset", None, 10).await.unwrap_err();
        assert!(matches!(
            err,
            AdapterFailure::Timeout {
                tier: SourceTier::Dense,
                after_ms: 20
            }
        ));
    }

    #[tokio::test]
    async fn test_dense_embed_and_search_share_one_timeout() {
        let embedder = Arc::new(ScriptedEmbedder {
            delay: Some(Duration::from_millis(150)),
            ..ScriptedEmbedder::new()
        });
        let slow = Arc::new(SlowVectorStore {
            inner: store().await,
            delay: Duration::from_millis(150),
        });
        let adapter = SourceAdapter::Dense(DenseAdapter::new(
            slow,
            embedder.clone(),
            0.0,
            100,
            Duration::from_millis(250),
        ));

        let err = adapter.search("reset", None, 10).await.unwrap_err();
        assert!(matches!(
            err,
            AdapterFailure::Timeout {
                tier: SourceTier::Dense,
                after_ms: 250
            }
        ));
        assert_eq!(embedder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dense_provider_error_is_adapter_failure() {
        let embedder = Arc::new(ScriptedEmbedder {
            fail: true,
            ..ScriptedEmbedder::new()
        });
        let adapter = SourceAdapter::Dense(DenseAdapter::new(
            store().await,
            embedder,
            0.0,
            100,
            Duration::from_secs(1),
        ));
        let err = adapter.search("reset", None, 10).await.unwrap_err();
        assert!(matches!(err, AdapterFailure::Provider { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_substring_assigns_fixed_score() {
        let adapter = SourceAdapter::Substring(SubstringAdapter::new(
            store().await,
            0.05,
            Duration::from_secs(1),
        ));
        let results = adapter.search("  FILTER ", None, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].relevance_score, 0.05);
        assert_eq!(results[0].source_tier, SourceTier::Substring);
    }

    #[tokio::test]
    async fn test_zero_matches_is_ok_empty() {
        let adapter =
            SourceAdapter::Lexical(LexicalAdapter::new(store().await, Duration::from_secs(1)));
        assert!(adapter.search("xyzzy", None, 10).await.unwrap().is_empty());
        assert!(adapter.search("reset", None, 0).await.unwrap().is_empty());
    }
}
