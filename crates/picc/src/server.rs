//! JSON HTTP API over the content hub.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/search` | Lexical search, query-string form |
//! | `POST` | `/api/search` | Lexical search with filters and per-type limits |
//! | `POST` | `/api/search/semantic` | Chunk similarity search, optional RAG context |
//! | `POST` | `/api/scrape/run` | Scrape every active source |
//! | `POST` | `/api/scrape/sources/{id}` | Scrape one source |
//! | `GET`  | `/api/folders/{slug}` | Evaluate a smart folder |
//! | `POST` | `/api/interviews/analyze` | Extract quotes from a transcript |
//! | `POST` | `/api/media/analyze` | Describe an image |
//! | `GET`  | `/api/quotes` | Quote review queue (`theme`, `validated`, `for_report`, `limit`) |
//! | `GET`  | `/api/stats` | Content counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must be at least 2 characters" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream` (502),
//! `internal` (500). Malformed query strings and JSON bodies are
//! `bad_request` too.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use picc_core::analysis::{AnalysisError, ImageAnalysis};
use picc_core::search::{
    build_context, parse_types, search, semantic_search, ChunkMatch, EntityType, SearchError,
    SearchRequest, SearchResponse, SemanticRequest, StructuredFilters,
};
use picc_core::models::ExtractedQuote;
use picc_core::store::{ContentStats, QuoteFilter, Store, DEFAULT_QUOTE_LIMIT};

use crate::analyze::{analyze_image, analyze_transcript, ImageRequest, TranscriptReport, TranscriptRequest};
use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::folders::{load_folder_view, FolderView};
use crate::llm::{create_client, LlmClient};
use crate::scrape::{run_all_scrapes, scrape_source, BatchResult, ScrapeOutcome, ScrapeSettings};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl AppState {
    /// Wire the configured HTTP fetcher, LLM client and embedder.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        Ok(Self {
            config: Arc::new(config.clone()),
            store,
            fetcher: Arc::new(HttpFetcher::new(&config.scraper)?),
            llm: create_client(&config.llm)?,
            embedder: create_embedder(&config.embedding)?,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/search", get(handle_search_get).post(handle_search_post))
        .route("/api/search/semantic", post(handle_semantic))
        .route("/api/scrape/run", post(handle_scrape_run))
        .route("/api/scrape/sources/{id}", post(handle_scrape_source))
        .route("/api/folders/{slug}", get(handle_folder))
        .route("/api/interviews/analyze", post(handle_analyze_transcript))
        .route("/api/media/analyze", post(handle_analyze_image))
        .route("/api/quotes", get(handle_quotes))
        .route("/api/stats", get(handle_stats))
        .layer(cors)
        .with_state(state)
}

/// `picc serve`: bind `[server].bind` and serve until the process exits.
pub async fn run_server(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<()> {
    let state = AppState::from_config(config, store)?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("PICC API listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn upstream(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::QueryTooShort | SearchError::UnknownType(_) => bad_request(err.to_string()),
            SearchError::Store(e) => internal(e),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        bad_request(err.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        bad_request(err.body_text())
    }
}

/// Analysis failures: bad input is the caller's fault, unusable model
/// output or a failed LLM call is upstream's.
fn classify_analysis_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::EmptyTranscript) => bad_request(err.to_string()),
        Some(_) => upstream(err.to_string()),
        None => upstream(format!("{:#}", err)),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ /api/search ============

#[derive(Deserialize)]
struct SearchQueryParams {
    q: String,
    /// Comma-separated type names; absent or `all` means every type.
    #[serde(default)]
    types: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    date_from: Option<NaiveDate>,
    #[serde(default)]
    date_to: Option<NaiveDate>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    fiscal_year: Option<String>,
    #[serde(default)]
    record_type: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

async fn handle_search_get(
    State(state): State<AppState>,
    params: Result<Query<SearchQueryParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params?;
    let type_names: Vec<&str> = params
        .types
        .as_deref()
        .map(|t| t.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let mut req = SearchRequest::new(
        params.q,
        params.limit.unwrap_or(state.config.search.default_limit),
    );
    req.types = parse_types(&type_names)?;
    req.filters = StructuredFilters {
        date_from: params.date_from,
        date_to: params.date_to,
        category: params.category,
        fiscal_year: params.fiscal_year,
        record_type: params.record_type,
        location: params.location,
    };

    Ok(Json(search(state.store.as_ref(), &req).await?))
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    filters: StructuredFilters,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    limits: HashMap<EntityType, usize>,
}

async fn handle_search_post(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(body) = body?;
    let mut req = SearchRequest::new(
        body.query,
        body.limit.unwrap_or(state.config.search.default_limit),
    );
    req.types = parse_types(&body.types)?;
    req.filters = body.filters;
    req.limits = body.limits;

    Ok(Json(search(state.store.as_ref(), &req).await?))
}

// ============ POST /api/search/semantic ============

#[derive(Deserialize)]
struct SemanticBody {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    min_similarity: Option<f64>,
    #[serde(default)]
    include_context: bool,
}

#[derive(Serialize)]
struct SemanticResult {
    query: String,
    chunks: Vec<ChunkMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

async fn handle_semantic(
    State(state): State<AppState>,
    body: Result<Json<SemanticBody>, JsonRejection>,
) -> Result<Json<SemanticResult>, AppError> {
    let Json(body) = body?;
    let Some(embedder) = state.embedder.as_ref() else {
        return Err(bad_request("semantic search requires an embedding provider"));
    };
    let min_similarity = body
        .min_similarity
        .unwrap_or(state.config.search.min_similarity);
    if !(0.0..=1.0).contains(&min_similarity) {
        return Err(bad_request("min_similarity must be in [0.0, 1.0]"));
    }

    picc_core::search::validate_query(&body.query)?;
    let query_vec = embed_query(embedder.as_ref(), &body.query)
        .await
        .map_err(|e| upstream(format!("{:#}", e)))?;

    let resp = semantic_search(
        state.store.as_ref(),
        &SemanticRequest {
            query: &body.query,
            query_vec: &query_vec,
            limit: body.limit.unwrap_or(state.config.search.semantic_limit),
            min_similarity,
        },
    )
    .await?;

    let context = body
        .include_context
        .then(|| build_context(&resp.chunks, state.config.search.context_tokens));

    Ok(Json(SemanticResult {
        query: resp.query,
        chunks: resp.chunks,
        context,
    }))
}

// ============ /api/scrape ============

async fn handle_scrape_run(State(state): State<AppState>) -> Json<BatchResult> {
    let settings = ScrapeSettings::from_config(&state.config);
    Json(run_all_scrapes(state.store.as_ref(), state.fetcher.as_ref(), &settings).await)
}

async fn handle_scrape_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScrapeOutcome>, AppError> {
    if state.store.get_source(&id).await.map_err(internal)?.is_none() {
        return Err(not_found(format!("no source with id {}", id)));
    }
    let settings = ScrapeSettings::from_config(&state.config);
    let outcome = scrape_source(state.store.as_ref(), state.fetcher.as_ref(), &settings, &id)
        .await
        .map_err(internal)?;
    Ok(Json(outcome))
}

// ============ GET /api/folders/{slug} ============

async fn handle_folder(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<FolderView>, AppError> {
    load_folder_view(state.store.as_ref(), &slug, Utc::now())
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("no smart folder with slug '{}'", slug)))
}

// ============ AI analysis ============

fn require_llm(state: &AppState) -> Result<&Arc<dyn LlmClient>, AppError> {
    state
        .llm
        .as_ref()
        .ok_or_else(|| bad_request("AI analysis requires an llm provider"))
}

async fn handle_analyze_transcript(
    State(state): State<AppState>,
    req: Result<Json<TranscriptRequest>, JsonRejection>,
) -> Result<Json<TranscriptReport>, AppError> {
    let Json(req) = req?;
    if req.transcript.trim().is_empty() {
        return Err(bad_request(AnalysisError::EmptyTranscript.to_string()));
    }
    let llm = require_llm(&state)?;
    let report = analyze_transcript(llm.as_ref(), state.store.as_ref(), &req)
        .await
        .map_err(classify_analysis_error)?;
    Ok(Json(report))
}

async fn handle_analyze_image(
    State(state): State<AppState>,
    req: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<ImageAnalysis>, AppError> {
    let Json(req) = req?;
    if !(req.image_url.starts_with("http://") || req.image_url.starts_with("https://")) {
        return Err(bad_request("image_url must be an http(s) URL"));
    }
    let llm = require_llm(&state)?;
    let analysis = analyze_image(llm.as_ref(), state.store.as_ref(), &req)
        .await
        .map_err(classify_analysis_error)?;
    Ok(Json(analysis))
}

// ============ GET /api/quotes ============

#[derive(Deserialize)]
struct QuoteQueryParams {
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    validated: Option<bool>,
    #[serde(default)]
    for_report: Option<bool>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_quotes(
    State(state): State<AppState>,
    params: Result<Query<QuoteQueryParams>, QueryRejection>,
) -> Result<Json<Vec<ExtractedQuote>>, AppError> {
    let Query(params) = params?;
    let filter = QuoteFilter {
        theme: params.theme.filter(|t| !t.trim().is_empty()),
        validated: params.validated,
        suggested_for_report: params.for_report,
        limit: params.limit.unwrap_or(DEFAULT_QUOTE_LIMIT),
    };
    Ok(Json(state.store.list_quotes(&filter).await.map_err(internal)?))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<ContentStats>, AppError> {
    Ok(Json(state.store.content_stats().await.map_err(internal)?))
}
