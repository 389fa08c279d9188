//! JSONL passage import.
//!
//! Each non-blank line of the input is one passage:
//!
//! ```json
//! {"id": "manual-12", "content": "Hold Reset for ten seconds.", "scope_key": "router", "locator": {"page": 12}}
//! ```
//!
//! | Field | Required | Notes |
//! |-------|----------|-------|
//! | `content` | yes | must not be blank |
//! | `id` | no | a UUID v4 is generated when absent |
//! | `scope_key` | no | corpus partition used by scoped retrieval |
//! | `locator` | no | arbitrary JSON, returned unchanged with results |
//! | `embedding` | no | precomputed vector; computed by the provider otherwise |
//!
//! Import stops at the first malformed line and reports its line number.
//! Lines before it are already committed.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use evidence_harness_core::embedding::{truncate_for_embedding, Embedder};
use evidence_harness_core::models::Passage;
use evidence_harness_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Deserialize)]
pub struct ImportRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub scope_key: Option<String>,
    #[serde(default)]
    pub locator: serde_json::Value,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub embedded: usize,
    pub without_vector: usize,
}

/// Read JSONL passages from `reader` into `store`.
///
/// When `embedder` is supplied, passages without an `embedding` field are
/// embedded (input truncated to `max_input_chars`). When it is `None`,
/// such passages are stored without a vector and are reachable only
/// through the lexical and substring tiers.
pub async fn import_passages<R: BufRead>(
    store: &dyn Store,
    embedder: Option<&dyn Embedder>,
    max_input_chars: usize,
    reader: R,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ImportRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid passage on line {}", line_no))?;
        if record.content.trim().is_empty() {
            bail!("Passage on line {} has empty content", line_no);
        }

        let vector = match (record.embedding, embedder) {
            (Some(v), _) => Some(v),
            (None, Some(e)) => {
                let text = truncate_for_embedding(&record.content, max_input_chars);
                let v = e
                    .embed(text)
                    .await
                    .with_context(|| format!("Failed to embed passage on line {}", line_no))?;
                stats.embedded += 1;
                Some(v)
            }
            (None, None) => None,
        };
        if vector.is_none() {
            stats.without_vector += 1;
        }

        let passage = Passage {
            id: record
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            scope_key: record.scope_key,
            content: record.content,
            locator: record.locator,
        };
        store.upsert_passage(&passage, vector.as_deref()).await?;
        stats.imported += 1;
    }

    Ok(stats)
}

/// CLI entry point for `evh import`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder: Option<Arc<dyn Embedder>> = if config.embedding.is_enabled() {
        Some(embedding::create_provider(&config.embedding)?)
    } else {
        None
    };

    let stats = import_passages(
        &store,
        embedder.as_deref(),
        config.embedding.max_input_chars,
        std::io::BufReader::new(file),
    )
    .await?;
    pool.close().await;

    tracing::info!(
        file = %path.display(),
        imported = stats.imported,
        embedded = stats.embedded,
        without_vector = stats.without_vector,
        "Import finished."
    );
    println!(
        "Imported {} passages ({} embedded, {} without vectors)",
        stats.imported, stats.embedded, stats.without_vector
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use evidence_harness_core::store::memory::InMemoryStore;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.chars().count() as f32, 1.0])
        }
    }

    #[tokio::test]
    async fn test_import_generates_ids_and_skips_blank_lines() {
        let store = InMemoryStore::new();
        let input = "{\"content\": \"alpha passage\"}\n\n{\"id\": \"b\", \"content\": \"beta\", \"scope_key\": \"s\", \"locator\": {\"page\": 2}}\n";
        let stats = import_passages(&store, None, 100, input.as_bytes())
            .await
            .unwrap();
        assert_eq!(stats.imported, 2);
        assert_eq!(stats.without_vector, 2);
        assert_eq!(store.len(), 2);

        let hits = store.lexical_search("beta", Some("s"), 10).await.unwrap();
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].locator, serde_json::json!({ "page": 2 }));
    }

    #[tokio::test]
    async fn test_import_embeds_missing_vectors() {
        let store = InMemoryStore::new();
        let input = "{\"id\": \"a\", \"content\": \"abcdef\"}\n{\"id\": \"b\", \"content\": \"x\", \"embedding\": [0.0, 1.0]}\n";
        let embedder: &dyn Embedder = &LengthEmbedder;
        let stats = import_passages(&store, Some(embedder), 3, input.as_bytes())
            .await
            .unwrap();
        assert_eq!(stats.embedded, 1);
        assert_eq!(stats.without_vector, 0);

        // "abcdef" truncated to 3 chars embeds as [3, 1]
        let hits = store.vector_search(&[3.0, 1.0], None, 1, 0.99).await.unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_import_reports_line_of_bad_record() {
        let store = InMemoryStore::new();
        let input = "{\"content\": \"ok\"}\n{\"content\": \"   \"}\n";
        let err = import_passages(&store, None, 100, input.as_bytes())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = import_passages(&store, None, 100, "not json\n".as_bytes())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
