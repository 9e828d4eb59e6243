//! # PICC content hub
//!
//! Application crate around [`picc_core`]: the SQLite store, the HTTP page
//! fetcher, the LLM and embedding clients, the scrape orchestrator, and the
//! `picc` CLI and HTTP API that drive them.
//!
//! ## Data flow
//!
//! ```text
//! scrape_sources ──▶ fetch ──▶ extract ──▶ dedup by content_hash
//!                                              │
//!                                              ▼
//!                  scraped_content ──▶ content_chunks ──▶ chunk_vectors
//!                                              │               │
//!                                              ▼               ▼
//!                                       lexical search   semantic search
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and secret resolution |
//! | [`db`] / [`migrate`] | SQLite pool and schema |
//! | [`sqlite_store`] | [`Store`](picc_core::store::Store) over SQLite |
//! | [`fetch`] | HTTP fetch plus main-content extraction |
//! | [`scrape`] | Per-source scrape, job bookkeeping, batch runs |
//! | [`llm`] / [`analyze`] | Transcript and image analysis |
//! | [`embedding`] | Chunk embedding backfill and query vectors |
//! | [`search`] / [`folders`] / [`sources`] / [`quotes`] / [`stats`] | CLI commands |
//! | [`server`] | JSON HTTP API |

pub mod analyze;
pub mod config;
pub mod db;
pub mod embedding;
pub mod fetch;
pub mod folders;
pub mod llm;
pub mod migrate;
pub mod quotes;
pub mod scrape;
pub mod search;
pub mod server;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
