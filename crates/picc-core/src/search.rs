//! Cross-entity retrieval facade.
//!
//! Two strategies, chosen per request and never blended:
//!
//! - **Lexical** ([`search`]): for each requested [`EntityType`], an
//!   independent case-insensitive substring match over that type's text
//!   fields, ANDed with whichever structured filters apply to the type.
//!   Results are grouped by type with a per-type count summary.
//! - **Semantic** ([`semantic_search`]): nearest-neighbour lookup over chunk
//!   embeddings. The caller embeds the query; similarities are clamped to
//!   `[0, 1]`.
//!
//! Query validation happens before the store is touched.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Store;

/// Shortest accepted query, in characters, after trimming.
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must be at least 2 characters")]
    QueryTooShort,
    #[error("unknown entity type: {0}")]
    UnknownType(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// The searchable catalog types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Entries,
    Timeline,
    Sources,
    Financial,
    Stories,
    Profiles,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Entries,
        EntityType::Timeline,
        EntityType::Sources,
        EntityType::Financial,
        EntityType::Stories,
        EntityType::Profiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Entries => "entries",
            EntityType::Timeline => "timeline",
            EntityType::Sources => "sources",
            EntityType::Financial => "financial",
            EntityType::Stories => "stories",
            EntityType::Profiles => "profiles",
        }
    }

    /// Accepts the canonical names plus a few aliases used by older clients.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entries" | "knowledge" => Some(EntityType::Entries),
            "timeline" | "events" => Some(EntityType::Timeline),
            "sources" | "research" => Some(EntityType::Sources),
            "financial" => Some(EntityType::Financial),
            "stories" => Some(EntityType::Stories),
            "profiles" | "people" => Some(EntityType::Profiles),
            _ => None,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityType::Entries => "knowledge_entries",
            EntityType::Timeline => "timeline_events",
            EntityType::Sources => "research_sources",
            EntityType::Financial => "financial_records",
            EntityType::Stories => "stories",
            EntityType::Profiles => "profiles",
        }
    }

    /// Columns matched by the free-text query.
    pub fn text_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::Entries => &["title", "summary", "content"],
            EntityType::Timeline => &["title", "description"],
            EntityType::Sources => &["title", "description", "author"],
            EntityType::Financial => &["category", "subcategory", "description"],
            EntityType::Stories => &["title", "content", "excerpt"],
            EntityType::Profiles => &["full_name", "bio", "community_role"],
        }
    }

    /// Every stored column except `id`.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityType::Entries => &["title", "summary", "content", "category", "created_at"],
            EntityType::Timeline => &["title", "description", "category", "location", "event_date"],
            EntityType::Sources => &["title", "description", "author", "url", "created_at"],
            EntityType::Financial => &[
                "category",
                "subcategory",
                "description",
                "amount",
                "fiscal_year",
                "record_type",
            ],
            EntityType::Stories => &["title", "content", "excerpt", "created_at"],
            EntityType::Profiles => &["full_name", "bio", "community_role"],
        }
    }

    pub fn title_field(&self) -> &'static str {
        match self {
            EntityType::Financial => "description",
            EntityType::Profiles => "full_name",
            _ => "title",
        }
    }

    /// Column the `date_from`/`date_to` range applies to, if any.
    pub fn date_field(&self) -> Option<&'static str> {
        match self {
            EntityType::Entries | EntityType::Stories => Some("created_at"),
            EntityType::Timeline => Some("event_date"),
            _ => None,
        }
    }

    pub fn has_category(&self) -> bool {
        matches!(
            self,
            EntityType::Entries | EntityType::Timeline | EntityType::Financial
        )
    }
}

/// Resolve requested type names. Empty input or `all` selects every type.
pub fn parse_types<S: AsRef<str>>(names: &[S]) -> Result<Vec<EntityType>, SearchError> {
    let mut out = BTreeSet::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        if name.eq_ignore_ascii_case("all") {
            return Ok(EntityType::ALL.to_vec());
        }
        let ty = EntityType::parse(name).ok_or_else(|| SearchError::UnknownType(name.to_string()))?;
        out.insert(ty);
    }
    if out.is_empty() {
        return Ok(EntityType::ALL.to_vec());
    }
    Ok(out.into_iter().collect())
}

/// One row of a catalog table, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub entity: EntityType,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl CatalogRecord {
    pub fn new(entity: EntityType, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.field(self.entity.title_field())
    }

    /// The record's date for range filtering. Accepts `YYYY-MM-DD` or any
    /// timestamp that starts with one.
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.field(self.entity.date_field()?)?;
        let day = raw.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Structured constraints supplied alongside the text query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StructuredFilters {
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub fiscal_year: Option<String>,
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// The per-type query handed to [`Store::search_entities`].
///
/// Only filters meaningful for `entity` are kept, so store implementations
/// can apply every populated field unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    pub entity: EntityType,
    pub text: String,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub category: Option<String>,
    pub fiscal_year: Option<String>,
    pub record_type: Option<String>,
    pub location: Option<String>,
    pub limit: usize,
}

impl EntityQuery {
    pub fn for_entity(entity: EntityType, text: &str, filters: &StructuredFilters, limit: usize) -> Self {
        let dated = entity.date_field().is_some();
        let financial = entity == EntityType::Financial;
        Self {
            entity,
            text: text.trim().to_string(),
            date_from: filters.date_from.filter(|_| dated),
            date_to: filters.date_to.filter(|_| dated),
            category: filters.category.clone().filter(|_| entity.has_category()),
            fiscal_year: filters.fiscal_year.clone().filter(|_| financial),
            record_type: filters.record_type.clone().filter(|_| financial),
            location: filters
                .location
                .clone()
                .filter(|_| entity == EntityType::Timeline),
            limit,
        }
    }

    /// Reference predicate: text match AND every populated filter.
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        if record.entity != self.entity {
            return false;
        }

        let needle = self.text.to_lowercase();
        let text_hit = self.entity.text_fields().iter().any(|f| {
            record
                .field(f)
                .map(|v| v.to_lowercase().contains(&needle))
                .unwrap_or(false)
        });
        if !text_hit {
            return false;
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(date) = record.date() else {
                return false;
            };
            if self.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        let exact = |want: &Option<String>, field: &str| match want {
            Some(w) => record.field(field) == Some(w.as_str()),
            None => true,
        };
        if !exact(&self.category, "category")
            || !exact(&self.fiscal_year, "fiscal_year")
            || !exact(&self.record_type, "record_type")
        {
            return false;
        }

        if let Some(loc) = &self.location {
            let loc = loc.to_lowercase();
            let hit = record
                .field("location")
                .map(|v| v.to_lowercase().contains(&loc))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Empty means every type.
    pub types: Vec<EntityType>,
    pub filters: StructuredFilters,
    pub default_limit: usize,
    pub limits: HashMap<EntityType, usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, default_limit: usize) -> Self {
        Self {
            query: query.into(),
            types: Vec::new(),
            filters: StructuredFilters::default(),
            default_limit,
            limits: HashMap::new(),
        }
    }

    pub fn limit_for(&self, entity: EntityType) -> usize {
        self.limits.get(&entity).copied().unwrap_or(self.default_limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub total: usize,
    pub by_type: BTreeMap<EntityType, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: BTreeMap<EntityType, Vec<CatalogRecord>>,
    pub summary: SearchSummary,
}

pub fn validate_query(query: &str) -> Result<&str, SearchError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Err(SearchError::QueryTooShort);
    }
    Ok(trimmed)
}

/// Run a lexical search across the requested entity types.
pub async fn search<S: Store + ?Sized>(store: &S, req: &SearchRequest) -> Result<SearchResponse, SearchError> {
    let query = validate_query(&req.query)?;

    let types: BTreeSet<EntityType> = if req.types.is_empty() {
        EntityType::ALL.into_iter().collect()
    } else {
        req.types.iter().copied().collect()
    };

    let mut results = BTreeMap::new();
    let mut by_type = BTreeMap::new();
    let mut total = 0;

    for entity in types {
        let limit = req.limit_for(entity);
        let q = EntityQuery::for_entity(entity, query, &req.filters, limit);
        let mut rows = store.search_entities(&q).await?;
        rows.truncate(limit);

        total += rows.len();
        by_type.insert(entity, rows.len());
        results.insert(entity, rows);
    }

    Ok(SearchResponse {
        query: query.to_string(),
        results,
        summary: SearchSummary { total, by_type },
    })
}

/// A chunk returned by the semantic strategy.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub content_id: String,
    pub title: String,
    pub url: String,
    pub text: String,
    /// Cosine similarity clamped into `[0, 1]`.
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct SemanticRequest<'a> {
    pub query: &'a str,
    pub query_vec: &'a [f32],
    pub limit: usize,
    pub min_similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticResponse {
    pub query: String,
    pub chunks: Vec<ChunkMatch>,
}

pub async fn semantic_search<S: Store + ?Sized>(
    store: &S,
    req: &SemanticRequest<'_>,
) -> Result<SemanticResponse, SearchError> {
    let query = validate_query(req.query)?;

    let mut chunks: Vec<ChunkMatch> = store
        .vector_search(req.query_vec, req.limit)
        .await?
        .into_iter()
        .map(|mut m| {
            m.similarity = m.similarity.clamp(0.0, 1.0);
            m
        })
        .filter(|m| m.similarity >= req.min_similarity)
        .collect();

    chunks.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    chunks.truncate(req.limit);

    Ok(SemanticResponse {
        query: query.to_string(),
        chunks,
    })
}

/// Assemble `[title]: text` blocks for an LLM prompt, stopping before the
/// total would pass `max_tokens * 4` characters.
pub fn build_context(chunks: &[ChunkMatch], max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    let mut parts = Vec::new();
    let mut total = 0;

    for chunk in chunks {
        let label = if chunk.title.is_empty() { &chunk.url } else { &chunk.title };
        let part = format!("[{}]: {}", label, chunk.text);
        let len = part.chars().count();
        if total + len > max_chars {
            break;
        }
        total += len;
        parts.push(part);
    }

    parts.join("\n\n")
}
