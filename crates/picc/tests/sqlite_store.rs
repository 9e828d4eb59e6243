//! SqliteStore against a real database file in a temp directory.

use std::sync::Arc;

use chrono::{Duration, Utc};
use picc::db;
use picc::folders::load_folder_view;
use picc::migrate::run_migrations;
use picc::sqlite_store::SqliteStore;
use picc_core::analysis::ImageAnalysis;
use picc_core::chunk::{build_chunks, content_hash};
use picc_core::models::{ExtractedQuote, JobCompletion, JobStatus, ScrapedContent, Source};
use picc_core::search::{search, CatalogRecord, EntityType, SearchRequest, StructuredFilters};
use picc_core::store::memory::InMemoryStore;
use picc_core::store::{InsertOutcome, QuoteFilter, Store};
use tempfile::TempDir;

async fn open() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("data/picc.sqlite"))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

fn content(text: &str) -> ScrapedContent {
    ScrapedContent {
        id: uuid::Uuid::new_v4().to_string(),
        source_id: "src".to_string(),
        url: "https://example.org/a".to_string(),
        title: "A".to_string(),
        content: text.to_string(),
        content_hash: content_hash(text),
        created_at: Utc::now(),
    }
}

async fn exec(store: &SqliteStore, sql: &str) {
    sqlx::query(sql).execute(store.pool()).await.unwrap();
}

// ─── Schema ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (_tmp, store) = open().await;
    run_migrations(store.pool()).await.unwrap();
    run_migrations(store.pool()).await.unwrap();
}

// ─── Content dedup ──────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_hash_returns_existing_id() {
    let (_tmp, store) = open().await;
    let first = content("Palm Island bakery reopens after repairs.");
    let second = content("Palm Island bakery reopens after repairs.");

    let a = store.insert_content(&first).await.unwrap();
    let b = store.insert_content(&second).await.unwrap();

    assert_eq!(a, InsertOutcome::Inserted(first.id.clone()));
    assert_eq!(b, InsertOutcome::Duplicate(first.id.clone()));
    assert_eq!(
        store.find_content_by_hash(&first.content_hash).await.unwrap(),
        Some(first.id)
    );
}

#[tokio::test]
async fn test_concurrent_duplicate_inserts_yield_one_row() {
    let (_tmp, store) = open().await;
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .insert_content(&content("Same body text from eight mirrors."))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut inserted = 0;
    for h in handles {
        if let InsertOutcome::Inserted(_) = h.await.unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scraped_content")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_chunks_vectors_and_pending() {
    let (_tmp, store) = open().await;
    let text = "First sentence here. Second sentence follows. Third one ends it.";
    let row = content(text);
    store.insert_content(&row).await.unwrap();
    let chunks = build_chunks(&row.id, &row.content_hash, text, 25);
    store.insert_chunks(&chunks).await.unwrap();

    let pending = store.pending_chunks(100).await.unwrap();
    assert_eq!(pending.len(), chunks.len());

    store
        .upsert_chunk_vector(&chunks[0].id, &row.id, &[1.0, 0.0])
        .await
        .unwrap();
    for c in &chunks[1..] {
        store.upsert_chunk_vector(&c.id, &row.id, &[0.0, 1.0]).await.unwrap();
    }
    assert!(store.pending_chunks(100).await.unwrap().is_empty());

    let hits = store.vector_search(&[1.0, 0.1], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, chunks[0].id);
    assert_eq!(hits[0].title, "A");
}

// ─── Sources and jobs ───────────────────────────────────────────────

#[tokio::test]
async fn test_source_lifecycle() {
    let (_tmp, store) = open().await;
    let source = Source {
        id: "s1".to_string(),
        name: "Townsville Bulletin".to_string(),
        url: "https://example.org/news".to_string(),
        source_type: "news".to_string(),
        is_active: true,
        last_scraped_at: None,
    };
    store.add_source(&source).await.unwrap();
    assert_eq!(store.list_sources(true).await.unwrap().len(), 1);

    let at = Utc::now();
    store.touch_source("s1", at).await.unwrap();
    let touched = store.get_source("s1").await.unwrap().unwrap();
    assert_eq!(
        touched.last_scraped_at.map(|t| t.timestamp_micros()),
        Some(at.timestamp_micros())
    );

    assert!(store.set_source_active("s1", false).await.unwrap());
    assert!(!store.set_source_active("missing", false).await.unwrap());
    assert!(store.list_sources(true).await.unwrap().is_empty());
    assert_eq!(store.list_sources(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_job_finalized_exactly_once() {
    let (_tmp, store) = open().await;
    let job = store.create_job("s1", Utc::now()).await.unwrap();
    assert_eq!(job.status, JobStatus::Running);

    store
        .finish_job(&job.id, &JobCompletion::completed(1, 4, 0))
        .await
        .unwrap();
    assert!(store
        .finish_job(&job.id, &JobCompletion::failed("late"))
        .await
        .is_err());

    let jobs = store.recent_jobs(10).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[0].chunks_created, 4);
    assert!(jobs[0].error_message.is_none());
}

// ─── Catalog search ─────────────────────────────────────────────────

async fn seed_catalog(store: &SqliteStore) {
    exec(
        store,
        "INSERT INTO knowledge_entries (id, title, summary, content, category, created_at) VALUES
         ('e1', 'Bakery history', 'How it started', '', 'enterprise', '2023-06-01T00:00:00Z'),
         ('e2', 'Ranger program', 'Land care', 'Mentions the 100% rule', 'environment', '2024-01-05T00:00:00Z')",
    )
    .await;
    exec(
        store,
        "INSERT INTO timeline_events (id, title, description, category, location, event_date) VALUES
         ('t1', 'Bakery opens', 'Ribbon cutting', 'enterprise', 'Palm Island', '2007-03-14'),
         ('t2', 'Bakery tour', 'Visitors', 'enterprise', 'Townsville', '2019-08-01')",
    )
    .await;
    exec(
        store,
        "INSERT INTO financial_records (id, category, subcategory, description, amount, fiscal_year, record_type) VALUES
         ('f1', 'enterprise', 'food', 'Bakery revenue', '120000', '2023-24', 'revenue'),
         ('f2', 'enterprise', 'food', 'Bakery wages', '80000', '2023-24', 'expense')",
    )
    .await;
}

#[tokio::test]
async fn test_search_is_case_insensitive_and_isolated_by_type() {
    let (_tmp, store) = open().await;
    seed_catalog(&store).await;

    let mut req = SearchRequest::new("BAKERY", 20);
    req.types = vec![EntityType::Timeline];
    let resp = search(&store, &req).await.unwrap();

    assert_eq!(resp.results.len(), 1);
    let ids: Vec<&str> = resp.results[&EntityType::Timeline]
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["t2", "t1"]);
    assert_eq!(
        resp.results[&EntityType::Timeline][0].field("location"),
        Some("Townsville")
    );
}

#[tokio::test]
async fn test_search_applies_structured_filters() {
    let (_tmp, store) = open().await;
    seed_catalog(&store).await;

    let mut req = SearchRequest::new("bakery", 20);
    req.filters = StructuredFilters {
        record_type: Some("expense".to_string()),
        location: Some("palm".to_string()),
        ..Default::default()
    };
    let resp = search(&store, &req).await.unwrap();

    let financial: Vec<&str> = resp.results[&EntityType::Financial]
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(financial, vec!["f2"]);
    let timeline: Vec<&str> = resp.results[&EntityType::Timeline]
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(timeline, vec!["t1"]);
    assert_eq!(resp.summary.by_type[&EntityType::Profiles], 0);
}

#[tokio::test]
async fn test_search_treats_wildcard_characters_literally() {
    let (_tmp, store) = open().await;
    seed_catalog(&store).await;

    let mut req = SearchRequest::new("100%", 20);
    req.types = vec![EntityType::Entries];
    let resp = search(&store, &req).await.unwrap();
    assert_eq!(resp.summary.total, 1);

    let mut req = SearchRequest::new("%%", 20);
    req.types = vec![EntityType::Entries];
    assert_eq!(search(&store, &req).await.unwrap().summary.total, 0);
}

#[tokio::test]
async fn test_search_folds_non_ascii_case_like_memory_store() {
    let (_tmp, store) = open().await;
    exec(
        &store,
        "INSERT INTO stories (id, title, content, excerpt, created_at) VALUES
         ('s1', 'ÉLAN at the Café', 'Coffee mornings', '', '2024-03-01T00:00:00Z'),
         ('s2', 'Élan returns', '', 'SMÖRGÅSBORD night', '2024-04-01T00:00:00Z')",
    )
    .await;
    let memory = InMemoryStore::new();
    memory
        .seed_catalog(
            CatalogRecord::new(EntityType::Stories, "s1")
                .with("title", "ÉLAN at the Café")
                .with("created_at", "2024-03-01T00:00:00Z"),
        )
        .unwrap();
    memory
        .seed_catalog(
            CatalogRecord::new(EntityType::Stories, "s2")
                .with("title", "Élan returns")
                .with("excerpt", "SMÖRGÅSBORD night")
                .with("created_at", "2024-04-01T00:00:00Z"),
        )
        .unwrap();

    for (text, expected) in [("élan", 2), ("CAFÉ", 1), ("smörgåsbord", 1)] {
        let mut req = SearchRequest::new(text, 20);
        req.types = vec![EntityType::Stories];
        let sqlite_hits = search(&store, &req).await.unwrap().summary.total;
        let memory_hits = search(&memory, &req).await.unwrap().summary.total;
        assert_eq!(sqlite_hits, expected, "{}", text);
        assert_eq!(sqlite_hits, memory_hits, "{}", text);
    }
}

#[tokio::test]
async fn test_search_limit_applies_after_text_match() {
    let (_tmp, store) = open().await;
    seed_catalog(&store).await;

    let mut req = SearchRequest::new("bakery", 1);
    req.types = vec![EntityType::Timeline];
    let resp = search(&store, &req).await.unwrap();
    let ids: Vec<&str> = resp.results[&EntityType::Timeline]
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["t2"]);
}

// ─── Media and smart folders ────────────────────────────────────────

#[tokio::test]
async fn test_folder_view_from_stored_rules() {
    let (_tmp, store) = open().await;
    let now = Utc::now();
    let recent = (now - Duration::minutes(1)).to_rfc3339();
    let old = (now - Duration::days(400)).to_rfc3339();
    sqlx::query(
        "INSERT INTO media_records (id, filename, url, tags, quality_score, created_at) VALUES
         ('m1', 'elder.jpg', 'https://cdn/m1', '[\"elders\",\"portrait\"]', 8.5, ?),
         ('m2', 'beach.jpg', 'https://cdn/m2', '[\"landscape\"]', 9.0, ?),
         ('m3', 'blurry.jpg', 'https://cdn/m3', '[\"elders\"]', 3.0, ?),
         ('m4', 'broken.jpg', 'https://cdn/m4', 'not json', 9.0, ?)",
    )
    .bind(&recent)
    .bind(&recent)
    .bind(&recent)
    .bind(&old)
    .execute(store.pool())
    .await
    .unwrap();
    exec(
        &store,
        r#"INSERT INTO smart_folders (id, slug, name, description, query_rules) VALUES
           ('f1', 'elders-best', 'Elders, best shots', NULL,
            '{"filters":[{"field":"tags","operator":"contains","value":"elders"},{"field":"quality_score","operator":">=","value":"7"}]}'),
           ('f2', 'no-rules', 'No rules', NULL, '{"sort":"created_at"}'),
           ('f3', 'untagged', 'Untagged', NULL, '{"filters":[{"field":"tags","operator":"empty"}]}')"#,
    )
    .await;

    let view = load_folder_view(&store, "elders-best", now).await.unwrap().unwrap();
    assert_eq!(view.count, 1);
    assert_eq!(view.media[0].id, "m1");

    let view = load_folder_view(&store, "no-rules", now).await.unwrap().unwrap();
    assert_eq!(view.count, 0);

    let view = load_folder_view(&store, "untagged", now).await.unwrap().unwrap();
    assert_eq!(view.media.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m4"]);

    assert!(load_folder_view(&store, "missing", now).await.unwrap().is_none());
}

#[tokio::test]
async fn test_media_analysis_saved_on_record() {
    let (_tmp, store) = open().await;
    sqlx::query(
        "INSERT INTO media_records (id, filename, url, created_at) VALUES ('m1', 'a.jpg', 'https://cdn/a', ?)",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(store.pool())
    .await
    .unwrap();

    assert!(store
        .save_media_analysis("m1", &ImageAnalysis::fallback())
        .await
        .unwrap());
    assert!(!store
        .save_media_analysis("nope", &ImageAnalysis::fallback())
        .await
        .unwrap());

    let sensitivity: Option<String> =
        sqlx::query_scalar("SELECT cultural_sensitivity FROM media_records WHERE id = 'm1'")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(sensitivity.as_deref(), Some("community"));
}

// ─── Quotes and stats ───────────────────────────────────────────────

#[tokio::test]
async fn test_quotes_stored_unvalidated_and_counted() {
    let (_tmp, store) = open().await;
    let quotes: Vec<ExtractedQuote> = ["We built this ourselves.", "The reef is our pantry."]
        .into_iter()
        .map(|text| {
            ExtractedQuote::pending(
                None,
                text.to_string(),
                "Community Member".to_string(),
                String::new(),
                "self-determination".to_string(),
                "positive".to_string(),
                "community".to_string(),
                true,
                serde_json::json!({ "source": "direct_transcript" }),
            )
        })
        .collect();

    assert_eq!(store.insert_quotes(&quotes).await.unwrap(), 2);

    let stats = store.content_stats().await.unwrap();
    assert_eq!(stats.quotes, 2);
    assert_eq!(stats.validated_quotes, 0);
    assert_eq!(stats.content, 0);
    assert!(stats.last_scraped_at.is_none());
}

#[tokio::test]
async fn test_quote_review_queue_filters_and_orders() {
    let (_tmp, store) = open().await;
    let now = Utc::now();
    let quote = |id: &str, theme: &str, report: bool, age_days: i64| {
        ExtractedQuote::pending(
            Some("p1".to_string()),
            format!("Quote {}", id),
            "Uncle Ray".to_string(),
            "ranger program".to_string(),
            theme.to_string(),
            "positive".to_string(),
            "youth".to_string(),
            report,
            serde_json::json!({ "source": "interview", "interview_id": "int-7" }),
        )
        .restore(id.to_string(), false, now - Duration::days(age_days))
    };
    store
        .insert_quotes(&[
            quote("q1", "employment", true, 3),
            quote("q2", "culture", false, 1),
            quote("q3", "employment", false, 2),
        ])
        .await
        .unwrap();

    let all = store.list_quotes(&QuoteFilter::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["q2", "q3", "q1"]);
    assert!(all.iter().all(|q| !q.is_validated()));
    assert_eq!(all[0].profile_id.as_deref(), Some("p1"));
    assert_eq!(all[0].context, "ranger program");
    assert_eq!(all[0].metadata["interview_id"], "int-7");

    let employment = store
        .list_quotes(&QuoteFilter {
            theme: Some("employment".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(employment.len(), 2);

    let for_report = store
        .list_quotes(&QuoteFilter {
            suggested_for_report: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(for_report.len(), 1);
    assert_eq!(for_report[0].id, "q1");

    let validated = store
        .list_quotes(&QuoteFilter {
            validated: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(validated.is_empty());

    let limited = store
        .list_quotes(&QuoteFilter {
            limit: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "q2");
}
