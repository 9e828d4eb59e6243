//! # PICC Core
//!
//! Shared logic for the Palm Island Community Company content hub: data
//! models, content hashing and sentence chunking, HTML extraction, the
//! smart-folder rule engine, the store abstraction, the search facade, and
//! parsing of LLM analysis output.
//!
//! This crate performs no network or database I/O. The `picc` app crate
//! supplies the HTTP fetcher, the LLM client, and the SQLite store.

pub mod analysis;
pub mod chunk;
pub mod embedding;
pub mod extract;
pub mod llm_json;
pub mod models;
pub mod rules;
pub mod search;
pub mod store;
