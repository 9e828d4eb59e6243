//! Scrape orchestration against the in-memory store and a scripted fetcher.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use picc::fetch::{FetchResult, PageFetcher};
use picc::scrape::{run_all_scrapes, run_source, scrape_and_store, scrape_source, ScrapeSettings};
use picc_core::chunk::content_hash;
use picc_core::models::{JobStatus, Source};
use picc_core::store::memory::InMemoryStore;
use picc_core::store::Store;

// ─── Test Fetcher ───────────────────────────────────────────────────

enum Scripted {
    Page { title: &'static str, content: String },
    Unreachable(&'static str),
    Fault(&'static str),
}

#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, Scripted>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, title: &'static str, content: impl Into<String>) -> Self {
        self.pages.insert(
            url.to_string(),
            Scripted::Page {
                title,
                content: content.into(),
            },
        );
        self
    }

    fn unreachable(mut self, url: &str, error: &'static str) -> Self {
        self.pages.insert(url.to_string(), Scripted::Unreachable(error));
        self
    }

    fn fault(mut self, url: &str, error: &'static str) -> Self {
        self.pages.insert(url.to_string(), Scripted::Fault(error));
        self
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Result<FetchResult> {
        match self.pages.get(url) {
            Some(Scripted::Page { title, content }) => {
                Ok(FetchResult::ok(url, title.to_string(), content.clone()))
            }
            Some(Scripted::Unreachable(e)) => Ok(FetchResult::failed(url, *e)),
            Some(Scripted::Fault(e)) => Err(anyhow!(*e)),
            None => Ok(FetchResult::failed(url, "HTTP 404: Not Found")),
        }
    }
}

fn source(id: &str, name: &str, url: &str) -> Source {
    Source {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        source_type: "news".to_string(),
        is_active: true,
        last_scraped_at: None,
    }
}

fn article(topic: &str) -> String {
    (1..=12)
        .map(|i| format!("Sentence {} about the {} on Palm Island.", i, topic))
        .collect::<Vec<_>>()
        .join(" ")
}

const SETTINGS: ScrapeSettings = ScrapeSettings { chunk_size: 200 };

// ─── scrape_and_store ───────────────────────────────────────────────

#[tokio::test]
async fn test_scrape_stores_content_and_chunks() {
    let store = InMemoryStore::new();
    let text = article("bakery");
    let fetcher = ScriptedFetcher::default().page("https://a.example/1", "Bakery", text.clone());

    let out = scrape_and_store(&store, &fetcher, &SETTINGS, "src-1", "https://a.example/1").await;

    assert!(out.success);
    assert!(!out.is_duplicate);
    assert!(out.chunks_created > 1);

    let rows = store.content_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content_hash, content_hash(&text));
    assert_eq!(Some(rows[0].id.clone()), out.content_id);

    let chunks = store.chunk_rows().unwrap();
    assert_eq!(chunks.len(), out.chunks_created);
    let indexes: Vec<i64> = chunks.iter().map(|c| c.chunk_index).collect();
    assert_eq!(indexes, (0..chunks.len() as i64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_same_text_at_two_urls_is_stored_once() {
    let store = InMemoryStore::new();
    let text = article("fishing competition");
    let fetcher = ScriptedFetcher::default()
        .page("https://a.example/x", "A", text.clone())
        .page("https://mirror.example/x", "Mirror", text);

    let first = scrape_and_store(&store, &fetcher, &SETTINGS, "s", "https://a.example/x").await;
    let chunks_after_first = store.chunk_rows().unwrap().len();
    let second = scrape_and_store(&store, &fetcher, &SETTINGS, "s", "https://mirror.example/x").await;

    assert!(second.success);
    assert!(second.is_duplicate);
    assert_eq!(second.chunks_created, 0);
    assert_eq!(second.content_id, first.content_id);
    assert_eq!(store.content_rows().unwrap().len(), 1);
    assert_eq!(store.chunk_rows().unwrap().len(), chunks_after_first);
}

#[tokio::test]
async fn test_fetch_failure_is_an_outcome_not_an_error() {
    let store = InMemoryStore::new();
    let fetcher = ScriptedFetcher::default().unreachable("https://down.example", "HTTP 503: Service Unavailable");

    let out = scrape_and_store(&store, &fetcher, &SETTINGS, "s", "https://down.example").await;

    assert!(!out.success);
    assert_eq!(out.error.as_deref(), Some("HTTP 503: Service Unavailable"));
    assert!(store.content_rows().unwrap().is_empty());
}

#[tokio::test]
async fn test_content_write_failure_reports_error() {
    let store = InMemoryStore::new();
    store.fail_content_writes(true);
    let fetcher = ScriptedFetcher::default().page("https://a.example", "A", article("ranger program"));

    let out = scrape_and_store(&store, &fetcher, &SETTINGS, "s", "https://a.example").await;

    assert!(!out.success);
    assert!(out.error.is_some());
}

#[tokio::test]
async fn test_chunk_write_failure_keeps_content() {
    let store = InMemoryStore::new();
    store.fail_chunk_writes(true);
    let fetcher = ScriptedFetcher::default().page("https://a.example", "A", article("women's group"));

    let out = scrape_and_store(&store, &fetcher, &SETTINGS, "s", "https://a.example").await;

    assert!(out.success);
    assert!(out.chunks_created > 0);
    assert_eq!(store.content_rows().unwrap().len(), 1);
    assert!(store.chunk_rows().unwrap().is_empty());
}

// ─── Jobs ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_job_completed_with_counts_and_source_touched() {
    let store = InMemoryStore::new();
    let src = source("s1", "Council news", "https://council.example");
    store.seed_source(src.clone()).unwrap();
    let fetcher = ScriptedFetcher::default().page("https://council.example", "Council", article("council meeting"));

    let out = run_source(&store, &fetcher, &SETTINGS, &src).await;

    let jobs = store.job_rows().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].pages_scraped, 1);
    assert_eq!(jobs[0].chunks_created, out.chunks_created as i64);
    assert!(jobs[0].completed_at.is_some());

    let touched = store.get_source("s1").await.unwrap().unwrap();
    assert!(touched.last_scraped_at.is_some());
}

#[tokio::test]
async fn test_job_failed_on_fetcher_fault_and_source_still_touched() {
    let store = InMemoryStore::new();
    let src = source("s1", "Broken", "https://broken.example");
    store.seed_source(src.clone()).unwrap();
    let fetcher = ScriptedFetcher::default().fault("https://broken.example", "connector exploded");

    let out = run_source(&store, &fetcher, &SETTINGS, &src).await;

    assert!(!out.success);
    let jobs = store.job_rows().unwrap();
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert_eq!(jobs[0].error_message.as_deref(), Some("connector exploded"));
    assert!(store.get_source("s1").await.unwrap().unwrap().last_scraped_at.is_some());
}

#[tokio::test]
async fn test_scrape_source_unknown_id_errors() {
    let store = InMemoryStore::new();
    let fetcher = ScriptedFetcher::default();
    assert!(scrape_source(&store, &fetcher, &SETTINGS, "nope").await.is_err());
}

// ─── run_all_scrapes ────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_continues_past_a_faulting_source() {
    let store = InMemoryStore::new();
    for (id, name, url) in [
        ("s1", "Source One", "https://one.example"),
        ("s2", "Source Two", "https://two.example"),
        ("s3", "Source Three", "https://three.example"),
    ] {
        store.seed_source(source(id, name, url)).unwrap();
    }
    let fetcher = ScriptedFetcher::default()
        .page("https://one.example", "One", article("health clinic"))
        .fault("https://two.example", "socket closed")
        .page("https://three.example", "Three", article("school holidays"));

    let result = run_all_scrapes(&store, &fetcher, &SETTINGS).await;

    assert!(result.success);
    assert_eq!(result.sources_processed, 3);
    assert_eq!(result.pages_scraped, 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0], "Source Two: socket closed");

    let jobs = store.job_rows().unwrap();
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.status.is_terminal()));
    assert_eq!(jobs.iter().filter(|j| j.status == JobStatus::Failed).count(), 1);
}

#[tokio::test]
async fn test_batch_counts_duplicates_separately() {
    let store = InMemoryStore::new();
    let text = article("land rights");
    store.seed_source(source("s1", "A", "https://a.example")).unwrap();
    store.seed_source(source("s2", "B", "https://b.example")).unwrap();
    let fetcher = ScriptedFetcher::default()
        .page("https://a.example", "A", text.clone())
        .page("https://b.example", "B", text);

    let result = run_all_scrapes(&store, &fetcher, &SETTINGS).await;

    assert_eq!(result.pages_scraped, 1);
    assert_eq!(result.duplicates_found, 1);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_batch_skips_inactive_sources() {
    let store = InMemoryStore::new();
    let mut inactive = source("s1", "Old", "https://old.example");
    inactive.is_active = false;
    store.seed_source(inactive).unwrap();

    let result = run_all_scrapes(&store, &ScriptedFetcher::default(), &SETTINGS).await;

    assert_eq!(result.sources_processed, 0);
    assert!(store.job_rows().unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_reports_source_listing_failure() {
    let store = InMemoryStore::new();
    store.fail_source_listing(true);

    let result = run_all_scrapes(&store, &ScriptedFetcher::default(), &SETTINGS).await;

    assert!(!result.success);
    assert_eq!(result.sources_processed, 0);
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_scrapes_store_one_row() {
    let store = Arc::new(InMemoryStore::new());
    let text = article("footy carnival");
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("https://a.example", "A", text.clone())
            .page("https://b.example", "B", text),
    );

    let handles: Vec<_> = ["https://a.example", "https://b.example"]
        .into_iter()
        .map(|url| {
            let store = store.clone();
            let fetcher = fetcher.clone();
            tokio::spawn(async move {
                scrape_and_store(store.as_ref(), fetcher.as_ref(), &SETTINGS, "s", url).await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for h in handles {
        outcomes.push(h.await.unwrap());
    }

    assert!(outcomes.iter().all(|o| o.success));
    assert_eq!(outcomes.iter().filter(|o| o.is_duplicate).count(), 1);
    assert_eq!(store.content_rows().unwrap().len(), 1);
}
