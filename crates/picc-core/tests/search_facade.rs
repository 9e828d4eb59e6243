//! Search facade tests against the in-memory store.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use picc_core::chunk::build_chunks;
use picc_core::models::ScrapedContent;
use picc_core::search::{
    search, semantic_search, CatalogRecord, EntityType, SearchError, SearchRequest,
    SemanticRequest, StructuredFilters,
};
use picc_core::store::memory::InMemoryStore;
use picc_core::store::{InsertOutcome, Store};

fn seeded() -> InMemoryStore {
    let store = InMemoryStore::new();
    let rows = [
        CatalogRecord::new(EntityType::Entries, "e1")
            .with("title", "Bakery history")
            .with("summary", "How the island bakery started")
            .with("category", "enterprise")
            .with("created_at", "2023-06-01T00:00:00Z"),
        CatalogRecord::new(EntityType::Timeline, "t1")
            .with("title", "Bakery opens")
            .with("description", "Ribbon cutting")
            .with("location", "Palm Island")
            .with("event_date", "2007-03-14"),
        CatalogRecord::new(EntityType::Stories, "s1")
            .with("title", "Working at the bakery")
            .with("content", "Early mornings and fresh bread.")
            .with("created_at", "2024-02-10T08:00:00Z"),
        CatalogRecord::new(EntityType::Stories, "s2")
            .with("title", "Fishing with grandad")
            .with("content", "We went out past the jetty.")
            .with("created_at", "2024-05-01T08:00:00Z"),
        CatalogRecord::new(EntityType::Financial, "f1")
            .with("category", "enterprise")
            .with("description", "Bakery revenue")
            .with("fiscal_year", "2023-24")
            .with("record_type", "revenue"),
        CatalogRecord::new(EntityType::Profiles, "p1")
            .with("full_name", "Aunty May")
            .with("community_role", "Head baker"),
    ];
    for row in rows {
        store.seed_catalog(row).unwrap();
    }
    store
}

// ─── Type isolation ─────────────────────────────────────────────────

#[tokio::test]
async fn test_restricted_types_return_only_those_types() {
    let store = seeded();
    let mut req = SearchRequest::new("bak", 20);
    req.types = vec![EntityType::Stories];

    let resp = search(&store, &req).await.unwrap();
    assert_eq!(resp.results.len(), 1);
    let stories = &resp.results[&EntityType::Stories];
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].id, "s1");
    assert_eq!(resp.summary.total, 1);
    assert_eq!(resp.summary.by_type.get(&EntityType::Entries), None);
}

#[tokio::test]
async fn test_all_types_by_default_with_summary() {
    let store = seeded();
    let resp = search(&store, &SearchRequest::new("BAKER", 20)).await.unwrap();

    assert_eq!(resp.results.len(), EntityType::ALL.len());
    for ty in [
        EntityType::Entries,
        EntityType::Timeline,
        EntityType::Stories,
        EntityType::Financial,
        EntityType::Profiles,
    ] {
        assert_eq!(resp.summary.by_type[&ty], 1, "{:?}", ty);
    }
    assert_eq!(resp.summary.by_type[&EntityType::Sources], 0);
    assert_eq!(resp.summary.total, 5);

    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["summary"]["by_type"]["stories"], 1);
    assert_eq!(json["results"]["profiles"][0]["full_name"], "Aunty May");
}

// ─── Validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_one_char_query_never_reaches_store() {
    let store = seeded();
    let before = store.calls();

    let err = search(&store, &SearchRequest::new("b", 20)).await.unwrap_err();
    assert!(matches!(err, SearchError::QueryTooShort));

    let sem = SemanticRequest {
        query: " x ",
        query_vec: &[1.0, 0.0],
        limit: 5,
        min_similarity: 0.0,
    };
    assert!(matches!(
        semantic_search(&store, &sem).await,
        Err(SearchError::QueryTooShort)
    ));
    assert_eq!(store.calls(), before);
}

// ─── Filters and limits ─────────────────────────────────────────────

#[tokio::test]
async fn test_structured_filters_and_with_text() {
    let store = seeded();
    let mut req = SearchRequest::new("bakery", 20);
    req.filters = StructuredFilters {
        date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
        category: Some("enterprise".into()),
        fiscal_year: Some("2022-23".into()),
        ..Default::default()
    };
    let resp = search(&store, &req).await.unwrap();

    // Entry is enterprise but older than date_from.
    assert_eq!(resp.summary.by_type[&EntityType::Entries], 0);
    // Timeline row has no category and an event_date in 2007.
    assert_eq!(resp.summary.by_type[&EntityType::Timeline], 0);
    assert_eq!(resp.summary.by_type[&EntityType::Stories], 1);
    // Wrong fiscal year.
    assert_eq!(resp.summary.by_type[&EntityType::Financial], 0);
}

#[tokio::test]
async fn test_per_type_limits() {
    let store = seeded();
    let mut req = SearchRequest::new("the", 20);
    req.types = vec![EntityType::Stories];
    let resp = search(&store, &req).await.unwrap();
    assert_eq!(resp.summary.by_type[&EntityType::Stories], 2);

    req.limits = HashMap::from([(EntityType::Stories, 1)]);
    let resp = search(&store, &req).await.unwrap();
    assert_eq!(resp.summary.by_type[&EntityType::Stories], 1);
}

// ─── Semantic ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_semantic_search_clamps_and_thresholds() {
    let store = InMemoryStore::new();
    let text = "Fresh bread every morning. The bakery employs locals.";
    let hash = picc_core::chunk::content_hash(text);
    let content = ScrapedContent {
        id: "c1".into(),
        source_id: "src".into(),
        url: "https://picc.com.au/bakery".into(),
        title: "Bakery".into(),
        content: text.into(),
        content_hash: hash.clone(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    };
    assert_eq!(
        store.insert_content(&content).await.unwrap(),
        InsertOutcome::Inserted("c1".into())
    );
    let chunks = build_chunks("c1", &hash, text, 30);
    assert_eq!(chunks.len(), 2);
    store.insert_chunks(&chunks).await.unwrap();
    store.upsert_chunk_vector(&chunks[0].id, "c1", &[1.0, 0.0]).await.unwrap();
    store.upsert_chunk_vector(&chunks[1].id, "c1", &[-1.0, 0.0]).await.unwrap();

    let req = SemanticRequest {
        query: "bread",
        query_vec: &[1.0, 0.0],
        limit: 10,
        min_similarity: 0.0,
    };
    let resp = semantic_search(&store, &req).await.unwrap();
    assert_eq!(resp.chunks.len(), 2);
    assert!((resp.chunks[0].similarity - 1.0).abs() < 1e-6);
    assert_eq!(resp.chunks[0].title, "Bakery");
    assert_eq!(resp.chunks[1].similarity, 0.0);

    let strict = SemanticRequest { min_similarity: 0.5, ..req };
    let resp = semantic_search(&store, &strict).await.unwrap();
    assert_eq!(resp.chunks.len(), 1);
}
