//! # Evidence Harness
//!
//! Tiered passage retrieval for grounding generated answers in a corpus.
//!
//! A query is answered by the first retrieval tier that produces anything:
//! embedding similarity, then ranked full-text match, then plain substring
//! containment. The winning tier's candidates are reranked for diversity
//! with Maximal Marginal Relevance, and the final list carries confidence
//! signals a caller can use to decide whether the evidence is good enough.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────────┐   ┌────────────┐
//! │  Import   │──▶│           SQLite             │   │  Embedder  │
//! │  (JSONL)  │   │ passages + FTS5 + vectors    │   │ OpenAI/    │
//! └───────────┘   └──────────────┬───────────────┘   │ Ollama     │
//!                                │                   └─────┬──────┘
//!                                ▼                         │
//!              ┌─────────────────────────────────┐         │
//!              │ dense ─▶ lexical ─▶ substring   │◀────────┘
//!              │   (first non-empty tier wins)   │
//!              └────────────────┬────────────────┘
//!                               ▼
//!                  MMR rerank ─▶ rank ─▶ signals
//!                               │
//!                  ┌────────────┴────────────┐
//!                  ▼                         ▼
//!             ┌─────────┐              ┌──────────┐
//!             │   CLI   │              │   HTTP   │
//!             │  (evh)  │              │ /retrieve│
//!             └─────────┘              └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evh init                          # create database
//! evh import passages.jsonl         # load passages
//! evh retrieve "reset the router"   # query from the terminal
//! evh serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and env overrides |
//! | [`adapters`] | The three retrieval tiers |
//! | [`retrieve`] | Fallback orchestration and the `retrieve` entry point |
//! | [`embedding`] | Embedding provider implementations |
//! | [`sqlite_store`] | SQLite-backed store |
//! | [`import`] | JSONL passage import |
//! | [`server`] | HTTP server |
//! | [`error`] | Typed errors |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod adapters;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod import;
pub mod migrate;
pub mod retrieve;
pub mod server;
pub mod sqlite_store;
