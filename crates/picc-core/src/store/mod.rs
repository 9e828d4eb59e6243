//! Storage boundary for the content hub.
//!
//! The [`Store`] trait covers every query shape the pipelines issue:
//! hash-keyed content dedup, batch chunk insertion, job bookkeeping, the
//! catalog lookups behind search, and vector nearest-neighbour search.
//! The SQLite implementation lives in the `picc` app crate; [`memory`]
//! provides an in-process implementation for tests.
//!
//! Implementations must be `Send + Sync` and enforce uniqueness of
//! `content_hash` themselves: two concurrent inserts of the same hash
//! yield one [`InsertOutcome::Inserted`] and one [`InsertOutcome::Duplicate`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::ImageAnalysis;
use crate::models::{
    ContentChunk, ExtractedQuote, JobCompletion, MediaRecord, ScrapeJob, ScrapedContent,
    SmartFolder, Source,
};
use crate::search::{CatalogRecord, ChunkMatch, EntityQuery};

/// Result of inserting a [`ScrapedContent`] row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New row; carries its id.
    Inserted(String),
    /// A row with the same hash already existed; carries the existing id.
    Duplicate(String),
}

impl InsertOutcome {
    pub fn id(&self) -> &str {
        match self {
            InsertOutcome::Inserted(id) | InsertOutcome::Duplicate(id) => id,
        }
    }
}

/// A chunk that has no embedding yet.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub chunk_id: String,
    pub content_id: String,
    pub text: String,
}

/// Review-queue selection over stored quotes. `None` fields do not filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteFilter {
    pub theme: Option<String>,
    pub validated: Option<bool>,
    pub suggested_for_report: Option<bool>,
    pub limit: usize,
}

pub const DEFAULT_QUOTE_LIMIT: usize = 20;

impl Default for QuoteFilter {
    fn default() -> Self {
        Self {
            theme: None,
            validated: None,
            suggested_for_report: None,
            limit: DEFAULT_QUOTE_LIMIT,
        }
    }
}

impl QuoteFilter {
    pub fn matches(&self, quote: &ExtractedQuote) -> bool {
        self.theme.as_deref().map_or(true, |t| quote.theme == t)
            && self.validated.map_or(true, |v| quote.is_validated() == v)
            && self
                .suggested_for_report
                .map_or(true, |s| quote.suggested_for_report == s)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentStats {
    pub sources: i64,
    pub active_sources: i64,
    pub content: i64,
    pub chunks: i64,
    pub embedded_chunks: i64,
    pub quotes: i64,
    pub validated_quotes: i64,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Abstract storage backend.
///
/// | Group | Methods |
/// |-------|---------|
/// | Sources | [`list_sources`](Store::list_sources), [`get_source`](Store::get_source), [`add_source`](Store::add_source), [`set_source_active`](Store::set_source_active), [`touch_source`](Store::touch_source) |
/// | Content | [`find_content_by_hash`](Store::find_content_by_hash), [`insert_content`](Store::insert_content), [`insert_chunks`](Store::insert_chunks) |
/// | Jobs | [`create_job`](Store::create_job), [`finish_job`](Store::finish_job), [`recent_jobs`](Store::recent_jobs) |
/// | Media | [`get_smart_folder`](Store::get_smart_folder), [`list_media`](Store::list_media), [`save_media_analysis`](Store::save_media_analysis) |
/// | Search | [`search_entities`](Store::search_entities), [`pending_chunks`](Store::pending_chunks), [`upsert_chunk_vector`](Store::upsert_chunk_vector), [`vector_search`](Store::vector_search) |
/// | Quotes | [`insert_quotes`](Store::insert_quotes) |
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>>;

    async fn get_source(&self, id: &str) -> Result<Option<Source>>;

    async fn add_source(&self, source: &Source) -> Result<()>;

    /// Returns `false` when no source has that id.
    async fn set_source_active(&self, id: &str, active: bool) -> Result<bool>;

    /// Record that `id` was just scraped, whatever the outcome.
    async fn touch_source(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Id of the content row with this hash, if any.
    async fn find_content_by_hash(&self, content_hash: &str) -> Result<Option<String>>;

    async fn insert_content(&self, content: &ScrapedContent) -> Result<InsertOutcome>;

    /// Insert all chunks of one document in a single batch.
    async fn insert_chunks(&self, chunks: &[ContentChunk]) -> Result<()>;

    /// Create a job in the `running` state.
    async fn create_job(&self, source_id: &str, started_at: DateTime<Utc>) -> Result<ScrapeJob>;

    /// Apply the single terminal update to a running job.
    async fn finish_job(&self, job_id: &str, completion: &JobCompletion) -> Result<()>;

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>>;

    async fn get_smart_folder(&self, slug: &str) -> Result<Option<SmartFolder>>;

    async fn list_media(&self) -> Result<Vec<MediaRecord>>;

    /// Returns `false` when no media record has that id.
    async fn save_media_analysis(&self, media_id: &str, analysis: &ImageAnalysis) -> Result<bool>;

    /// Rows of `query.entity` matching the text and every populated filter,
    /// at most `query.limit` of them.
    async fn search_entities(&self, query: &EntityQuery) -> Result<Vec<CatalogRecord>>;

    async fn pending_chunks(&self, limit: usize) -> Result<Vec<PendingChunk>>;

    async fn upsert_chunk_vector(&self, chunk_id: &str, content_id: &str, vector: &[f32]) -> Result<()>;

    /// Nearest chunks by cosine similarity, best first. Similarity is raw.
    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ChunkMatch>>;

    /// Returns the number of rows written.
    async fn insert_quotes(&self, quotes: &[ExtractedQuote]) -> Result<usize>;

    /// Quotes matching `filter`, newest first, at most `filter.limit`.
    async fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<ExtractedQuote>>;

    async fn content_stats(&self) -> Result<ContentStats>;
}
