//! In-memory [`Store`] implementation for tests.
//!
//! Tables are `HashMap`/`Vec` values behind `std::sync::RwLock`. Catalog
//! search applies [`EntityQuery::matches`] to every seeded row; vector
//! search is brute-force cosine similarity.
//!
//! Every trait call bumps a counter ([`InMemoryStore::calls`]) and a few
//! switches inject write failures, so callers' error paths can be tested.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::analysis::ImageAnalysis;
use crate::embedding::cosine_similarity;
use crate::models::{
    ContentChunk, ExtractedQuote, JobCompletion, JobStatus, MediaRecord, ScrapeJob, ScrapedContent,
    SmartFolder, Source,
};
use crate::search::{CatalogRecord, ChunkMatch, EntityQuery};

use super::{ContentStats, InsertOutcome, PendingChunk, QuoteFilter, Store};

struct StoredVector {
    chunk_id: String,
    content_id: String,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Tables {
    sources: Vec<Source>,
    content: Vec<ScrapedContent>,
    chunks: Vec<ContentChunk>,
    jobs: Vec<ScrapeJob>,
    media: Vec<MediaRecord>,
    media_analyses: HashMap<String, ImageAnalysis>,
    folders: Vec<SmartFolder>,
    catalog: Vec<CatalogRecord>,
    vectors: Vec<StoredVector>,
    quotes: Vec<ExtractedQuote>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
    fail_content_writes: AtomicBool,
    fail_chunk_writes: AtomicBool,
    fail_source_listing: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`Store`] methods invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_content_writes(&self, fail: bool) {
        self.fail_content_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_chunk_writes(&self, fail: bool) {
        self.fail_chunk_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_source_listing(&self, fail: bool) {
        self.fail_source_listing.store(fail, Ordering::SeqCst);
    }

    pub fn seed_source(&self, source: Source) -> Result<()> {
        self.write()?.sources.push(source);
        Ok(())
    }

    pub fn seed_catalog(&self, record: CatalogRecord) -> Result<()> {
        self.write()?.catalog.push(record);
        Ok(())
    }

    pub fn seed_media(&self, record: MediaRecord) -> Result<()> {
        self.write()?.media.push(record);
        Ok(())
    }

    pub fn seed_folder(&self, folder: SmartFolder) -> Result<()> {
        self.write()?.folders.push(folder);
        Ok(())
    }

    pub fn content_rows(&self) -> Result<Vec<ScrapedContent>> {
        Ok(self.read()?.content.clone())
    }

    pub fn chunk_rows(&self) -> Result<Vec<ContentChunk>> {
        Ok(self.read()?.chunks.clone())
    }

    pub fn job_rows(&self) -> Result<Vec<ScrapeJob>> {
        Ok(self.read()?.jobs.clone())
    }

    pub fn quote_rows(&self) -> Result<Vec<ExtractedQuote>> {
        Ok(self.read()?.quotes.clone())
    }

    pub fn media_analysis(&self, media_id: &str) -> Result<Option<ImageAnalysis>> {
        Ok(self.read()?.media_analyses.get(media_id).cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>> {
        self.tick();
        if self.fail_source_listing.load(Ordering::SeqCst) {
            bail!("source listing unavailable");
        }
        let mut sources: Vec<Source> = self
            .read()?
            .sources
            .iter()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        self.tick();
        Ok(self.read()?.sources.iter().find(|s| s.id == id).cloned())
    }

    async fn add_source(&self, source: &Source) -> Result<()> {
        self.tick();
        let mut t = self.write()?;
        if t.sources.iter().any(|s| s.id == source.id) {
            bail!("source {} already exists", source.id);
        }
        t.sources.push(source.clone());
        Ok(())
    }

    async fn set_source_active(&self, id: &str, active: bool) -> Result<bool> {
        self.tick();
        let mut t = self.write()?;
        match t.sources.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_source(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.tick();
        if let Some(s) = self.write()?.sources.iter_mut().find(|s| s.id == id) {
            s.last_scraped_at = Some(at);
        }
        Ok(())
    }

    async fn find_content_by_hash(&self, content_hash: &str) -> Result<Option<String>> {
        self.tick();
        Ok(self
            .read()?
            .content
            .iter()
            .find(|c| c.content_hash == content_hash)
            .map(|c| c.id.clone()))
    }

    async fn insert_content(&self, content: &ScrapedContent) -> Result<InsertOutcome> {
        self.tick();
        if self.fail_content_writes.load(Ordering::SeqCst) {
            bail!("content insert rejected");
        }
        let mut t = self.write()?;
        if let Some(existing) = t.content.iter().find(|c| c.content_hash == content.content_hash) {
            return Ok(InsertOutcome::Duplicate(existing.id.clone()));
        }
        t.content.push(content.clone());
        Ok(InsertOutcome::Inserted(content.id.clone()))
    }

    async fn insert_chunks(&self, chunks: &[ContentChunk]) -> Result<()> {
        self.tick();
        if self.fail_chunk_writes.load(Ordering::SeqCst) {
            bail!("chunk insert rejected");
        }
        self.write()?.chunks.extend_from_slice(chunks);
        Ok(())
    }

    async fn create_job(&self, source_id: &str, started_at: DateTime<Utc>) -> Result<ScrapeJob> {
        self.tick();
        let job = ScrapeJob {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            status: JobStatus::Running,
            pages_scraped: 0,
            chunks_created: 0,
            duplicates_found: 0,
            error_message: None,
            started_at,
            completed_at: None,
        };
        self.write()?.jobs.push(job.clone());
        Ok(job)
    }

    async fn finish_job(&self, job_id: &str, completion: &JobCompletion) -> Result<()> {
        self.tick();
        let mut t = self.write()?;
        let job = t
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;
        if job.status.is_terminal() {
            bail!("job {} already {}", job_id, job.status.as_str());
        }
        job.status = completion.status;
        job.pages_scraped = completion.pages_scraped;
        job.chunks_created = completion.chunks_created;
        job.duplicates_found = completion.duplicates_found;
        job.error_message = completion.error_message.clone();
        job.completed_at = Some(completion.completed_at);
        Ok(())
    }

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>> {
        self.tick();
        let mut jobs = self.read()?.jobs.clone();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn get_smart_folder(&self, slug: &str) -> Result<Option<SmartFolder>> {
        self.tick();
        Ok(self.read()?.folders.iter().find(|f| f.slug == slug).cloned())
    }

    async fn list_media(&self) -> Result<Vec<MediaRecord>> {
        self.tick();
        let mut media = self.read()?.media.clone();
        media.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(media)
    }

    async fn save_media_analysis(&self, media_id: &str, analysis: &ImageAnalysis) -> Result<bool> {
        self.tick();
        let mut t = self.write()?;
        if !t.media.iter().any(|m| m.id == media_id) {
            return Ok(false);
        }
        t.media_analyses.insert(media_id.to_string(), analysis.clone());
        Ok(true)
    }

    async fn search_entities(&self, query: &EntityQuery) -> Result<Vec<CatalogRecord>> {
        self.tick();
        Ok(self
            .read()?
            .catalog
            .iter()
            .filter(|r| query.matches(r))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn pending_chunks(&self, limit: usize) -> Result<Vec<PendingChunk>> {
        self.tick();
        let t = self.read()?;
        Ok(t.chunks
            .iter()
            .filter(|c| !t.vectors.iter().any(|v| v.chunk_id == c.id))
            .take(limit)
            .map(|c| PendingChunk {
                chunk_id: c.id.clone(),
                content_id: c.content_id.clone(),
                text: c.text.clone(),
            })
            .collect())
    }

    async fn upsert_chunk_vector(&self, chunk_id: &str, content_id: &str, vector: &[f32]) -> Result<()> {
        self.tick();
        let mut t = self.write()?;
        t.vectors.retain(|v| v.chunk_id != chunk_id);
        t.vectors.push(StoredVector {
            chunk_id: chunk_id.to_string(),
            content_id: content_id.to_string(),
            vector: vector.to_vec(),
        });
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ChunkMatch>> {
        self.tick();
        let t = self.read()?;
        let mut matches: Vec<ChunkMatch> = t
            .vectors
            .iter()
            .filter_map(|v| {
                let chunk = t.chunks.iter().find(|c| c.id == v.chunk_id)?;
                let parent = t.content.iter().find(|c| c.id == v.content_id);
                Some(ChunkMatch {
                    chunk_id: v.chunk_id.clone(),
                    content_id: v.content_id.clone(),
                    title: parent.map(|p| p.title.clone()).unwrap_or_default(),
                    url: parent.map(|p| p.url.clone()).unwrap_or_default(),
                    text: chunk.text.clone(),
                    similarity: cosine_similarity(query_vec, &v.vector) as f64,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn insert_quotes(&self, quotes: &[ExtractedQuote]) -> Result<usize> {
        self.tick();
        self.write()?.quotes.extend_from_slice(quotes);
        Ok(quotes.len())
    }

    async fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<ExtractedQuote>> {
        self.tick();
        let mut quotes: Vec<ExtractedQuote> = self
            .read()?
            .quotes
            .iter()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        quotes.truncate(filter.limit);
        Ok(quotes)
    }

    async fn content_stats(&self) -> Result<ContentStats> {
        self.tick();
        let t = self.read()?;
        Ok(ContentStats {
            sources: t.sources.len() as i64,
            active_sources: t.sources.iter().filter(|s| s.is_active).count() as i64,
            content: t.content.len() as i64,
            chunks: t.chunks.len() as i64,
            embedded_chunks: t.vectors.len() as i64,
            quotes: t.quotes.len() as i64,
            validated_quotes: t.quotes.iter().filter(|q| q.is_validated()).count() as i64,
            last_scraped_at: t.sources.iter().filter_map(|s| s.last_scraped_at).max(),
        })
    }
}
