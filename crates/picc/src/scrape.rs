//! Scrape orchestration: fetch, dedup, store, chunk, and job bookkeeping.
//!
//! [`scrape_and_store`] handles one URL and never returns an error; every
//! failure is a [`ScrapeOutcome`] with `success = false`. [`run_all_scrapes`]
//! folds over the active sources one at a time, finalizes one
//! [`ScrapeJob`](picc_core::models::ScrapeJob) per source, and collects
//! per-source errors into a [`BatchResult`].

use anyhow::{bail, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use picc_core::chunk::{build_chunks, content_hash};
use picc_core::models::{JobCompletion, ScrapedContent, Source};
use picc_core::store::{InsertOutcome, Store};

use crate::config::Config;
use crate::fetch::{HttpFetcher, PageFetcher};

#[derive(Debug, Clone, Copy)]
pub struct ScrapeSettings {
    pub chunk_size: usize,
}

impl ScrapeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub content_id: Option<String>,
    pub chunks_created: usize,
    pub is_duplicate: bool,
    pub error: Option<String>,
}

impl ScrapeOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn duplicate(content_id: String) -> Self {
        Self {
            success: true,
            content_id: Some(content_id),
            is_duplicate: true,
            ..Default::default()
        }
    }

    fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// Fetch `url`, store its text once per content hash, and chunk it.
pub async fn scrape_and_store(
    store: &dyn Store,
    fetcher: &dyn PageFetcher,
    settings: &ScrapeSettings,
    source_id: &str,
    url: &str,
) -> ScrapeOutcome {
    let page = match fetcher.fetch_and_extract(url).await {
        Ok(page) if page.success => page,
        Ok(page) => return ScrapeOutcome::failed(page.error.unwrap_or_else(|| "fetch failed".to_string())),
        Err(e) => return ScrapeOutcome::failed(e.to_string()),
    };

    let hash = content_hash(&page.content);

    match store.find_content_by_hash(&hash).await {
        Ok(Some(existing)) => return ScrapeOutcome::duplicate(existing),
        Ok(None) => {}
        Err(e) => return ScrapeOutcome::failed(e.to_string()),
    }

    let row = ScrapedContent {
        id: Uuid::new_v4().to_string(),
        source_id: source_id.to_string(),
        url: page.url.clone(),
        title: page.title,
        content: page.content,
        content_hash: hash,
        created_at: Utc::now(),
    };

    let content_id = match store.insert_content(&row).await {
        Ok(InsertOutcome::Inserted(id)) => id,
        Ok(InsertOutcome::Duplicate(existing)) => return ScrapeOutcome::duplicate(existing),
        Err(e) => return ScrapeOutcome::failed(e.to_string()),
    };

    let chunks = build_chunks(&content_id, &row.content_hash, &row.content, settings.chunk_size);
    if !chunks.is_empty() {
        if let Err(e) = store.insert_chunks(&chunks).await {
            warn!(content_id = %content_id, error = %e, "chunk insert failed; content kept without chunks");
        }
    }

    ScrapeOutcome {
        success: true,
        content_id: Some(content_id),
        chunks_created: chunks.len(),
        is_duplicate: false,
        error: None,
    }
}

/// Scrape one source with full job bookkeeping.
///
/// The job, if it could be created, is finalized exactly once, and the
/// source's `last_scraped_at` is touched whatever the outcome.
pub async fn run_source(
    store: &dyn Store,
    fetcher: &dyn PageFetcher,
    settings: &ScrapeSettings,
    source: &Source,
) -> ScrapeOutcome {
    let job = match store.create_job(&source.id, Utc::now()).await {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(source = %source.name, error = %e, "could not create scrape job");
            None
        }
    };

    let outcome = scrape_and_store(store, fetcher, settings, &source.id, &source.url).await;

    if let Some(job) = job {
        let completion = if outcome.success {
            JobCompletion::completed(1, outcome.chunks_created as i64, outcome.is_duplicate as i64)
        } else {
            JobCompletion::failed(outcome.error_text())
        };
        if let Err(e) = store.finish_job(&job.id, &completion).await {
            warn!(job_id = %job.id, error = %e, "could not finalize scrape job");
        }
    }

    if let Err(e) = store.touch_source(&source.id, Utc::now()).await {
        warn!(source = %source.name, error = %e, "could not update last_scraped_at");
    }

    outcome
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub sources_processed: usize,
    pub pages_scraped: usize,
    pub chunks_created: usize,
    pub duplicates_found: usize,
    pub errors: Vec<String>,
}

impl BatchResult {
    fn new() -> Self {
        Self {
            success: true,
            sources_processed: 0,
            pages_scraped: 0,
            chunks_created: 0,
            duplicates_found: 0,
            errors: Vec::new(),
        }
    }

    fn record(mut self, source: &Source, outcome: &ScrapeOutcome) -> Self {
        self.sources_processed += 1;
        if !outcome.success {
            self.errors.push(format!("{}: {}", source.name, outcome.error_text()));
        } else if outcome.is_duplicate {
            self.duplicates_found += 1;
        } else {
            self.pages_scraped += 1;
            self.chunks_created += outcome.chunks_created;
        }
        self
    }
}

/// Scrape every active source sequentially.
pub async fn run_all_scrapes(
    store: &dyn Store,
    fetcher: &dyn PageFetcher,
    settings: &ScrapeSettings,
) -> BatchResult {
    let sources = match store.list_sources(true).await {
        Ok(sources) => sources,
        Err(e) => {
            return BatchResult {
                success: false,
                errors: vec![e.to_string()],
                ..BatchResult::new()
            }
        }
    };

    info!(count = sources.len(), "starting scrape run");

    let mut result = BatchResult::new();
    for source in &sources {
        let outcome = run_source(store, fetcher, settings, source).await;
        result = result.record(source, &outcome);
    }

    info!(
        sources = result.sources_processed,
        pages = result.pages_scraped,
        chunks = result.chunks_created,
        errors = result.errors.len(),
        "scrape run finished"
    );
    result
}

/// Scrape a single configured source by id.
pub async fn scrape_source(
    store: &dyn Store,
    fetcher: &dyn PageFetcher,
    settings: &ScrapeSettings,
    source_id: &str,
) -> Result<ScrapeOutcome> {
    let Some(source) = store.get_source(source_id).await? else {
        bail!("no source with id {}", source_id);
    };
    Ok(run_source(store, fetcher, settings, &source).await)
}

/// `picc scrape [--source ID]`
pub async fn run_scrape(config: &Config, store: &dyn Store, source: Option<&str>) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.scraper)?;
    let settings = ScrapeSettings::from_config(config);

    if let Some(id) = source {
        let outcome = scrape_source(store, &fetcher, &settings, id).await?;
        if outcome.success {
            println!(
                "ok  content={}  chunks={}{}",
                outcome.content_id.as_deref().unwrap_or("-"),
                outcome.chunks_created,
                if outcome.is_duplicate { "  (duplicate)" } else { "" }
            );
        } else {
            println!("failed: {}", outcome.error_text());
        }
        return Ok(());
    }

    let result = run_all_scrapes(store, &fetcher, &settings).await;
    println!("Sources processed: {}", result.sources_processed);
    println!("Pages scraped:     {}", result.pages_scraped);
    println!("Chunks created:    {}", result.chunks_created);
    println!("Duplicates:        {}", result.duplicates_found);
    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &result.errors {
            println!("  {}", e);
        }
    }
    if !result.success {
        bail!("scrape run could not start");
    }
    Ok(())
}
