//! # Evidence Harness Core
//!
//! Runtime-free logic for Evidence Harness: the passage data model, the
//! store and embedder abstractions, the MMR diversity reranker, and the
//! confidence signal calculator.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Timeouts, fallback orchestration and concrete backends live in the
//! `evidence-harness` app crate.

pub mod diversity;
pub mod embedding;
pub mod models;
pub mod signals;
pub mod store;
