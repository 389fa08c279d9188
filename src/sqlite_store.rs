//! SQLite-backed [`Store`] implementation.
//!
//! Each search primitive maps to one query against the schema created by
//! [`migrate::create_schema`](crate::migrate::create_schema):
//!
//! | Primitive | Query | Score |
//! |-----------|-------|-------|
//! | `vector_search` | scan `passage_vectors`, cosine in Rust | cosine similarity |
//! | `lexical_search` | `passages_fts MATCH` with OR-joined quoted terms | `-bm25` |
//! | `substring_search` | scan `passages`, Unicode lowercase containment in Rust | `0.0` (stamped later) |

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use evidence_harness_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use evidence_harness_core::models::{Candidate, Passage, SourceTier};
use evidence_harness_core::store::{tokenize, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Build an FTS5 query that matches any of the query's terms.
///
/// Terms are quoted so FTS5 operators in user input are treated as text.
/// Returns `None` when the query has no searchable terms.
pub fn fts_match_expr(query: &str) -> Option<String> {
    let terms = tokenize(query);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn parse_locator(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or(serde_json::Value::Null)
}

fn row_to_candidate(row: &SqliteRow, score: f64, tier: SourceTier) -> Candidate {
    let locator_json: String = row.get("locator_json");
    Candidate {
        id: row.get("id"),
        content: row.get("content"),
        relevance_score: score,
        locator: parse_locator(&locator_json),
        source_tier: tier,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn vector_search(
        &self,
        query_vec: &[f32],
        scope: Option<&str>,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.content, p.locator_json, pv.embedding
            FROM passage_vectors pv
            JOIN passages p ON p.id = pv.passage_id
            WHERE (?1 IS NULL OR p.scope_key = ?1)
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<Candidate> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                (similarity >= min_score)
                    .then(|| row_to_candidate(row, similarity, SourceTier::Dense))
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        Ok(candidates)
    }

    async fn lexical_search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let Some(expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.content, p.locator_json, bm25(passages_fts) AS rank
            FROM passages_fts
            JOIN passages p ON p.id = passages_fts.passage_id
            WHERE passages_fts MATCH ?1
              AND (?2 IS NULL OR p.scope_key = ?2)
            ORDER BY rank
            LIMIT ?3
            "#,
        )
        .bind(&expr)
        .bind(scope)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                row_to_candidate(row, -rank, SourceTier::Lexical)
            })
            .collect())
    }

    async fn substring_search(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        // SQLite's lower() folds ASCII only, so matching happens here.
        let rows = sqlx::query(
            r#"
            SELECT id, content, locator_json
            FROM passages
            WHERE (?1 IS NULL OR scope_key = ?1)
            ORDER BY rowid
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter(|row| {
                let content: String = row.get("content");
                content.to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|row| row_to_candidate(row, 0.0, SourceTier::Substring))
            .collect())
    }

    async fn upsert_passage(&self, passage: &Passage, vector: Option<&[f32]>) -> Result<()> {
        let locator_json = serde_json::to_string(&passage.locator)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO passages (id, scope_key, content, locator_json)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                scope_key = excluded.scope_key,
                content = excluded.content,
                locator_json = excluded.locator_json
            "#,
        )
        .bind(&passage.id)
        .bind(&passage.scope_key)
        .bind(&passage.content)
        .bind(&locator_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM passages_fts WHERE passage_id = ?")
            .bind(&passage.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO passages_fts (passage_id, scope_key, content) VALUES (?, ?, ?)")
            .bind(&passage.id)
            .bind(&passage.scope_key)
            .bind(&passage.content)
            .execute(&mut *tx)
            .await?;

        match vector {
            Some(vec) => {
                sqlx::query(
                    r#"
                    INSERT INTO passage_vectors (passage_id, embedding, dims)
                    VALUES (?, ?, ?)
                    ON CONFLICT(passage_id) DO UPDATE SET
                        embedding = excluded.embedding,
                        dims = excluded.dims
                    "#,
                )
                .bind(&passage.id)
                .bind(vec_to_blob(vec))
                .bind(vec.len() as i64)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM passage_vectors WHERE passage_id = ?")
                    .bind(&passage.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
