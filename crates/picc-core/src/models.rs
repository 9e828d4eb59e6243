//! Core data models for the ingestion, folder, and analysis pipelines.
//!
//! Rows flow from the scrape orchestrator into the store as
//! [`ScrapedContent`] and [`ContentChunk`]; every orchestration run leaves a
//! [`ScrapeJob`] behind. [`MediaRecord`] and [`SmartFolder`] are owned by the
//! upload pipeline and only read here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rules::QueryRules;

/// A configured scrape target.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub source_type: String,
    pub is_active: bool,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// One deduplicated fetched document. `content_hash` is the identity key.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedContent {
    pub id: String,
    pub source_id: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A bounded-length slice of a [`ScrapedContent`]'s text.
#[derive(Debug, Clone, Serialize)]
pub struct ContentChunk {
    pub id: String,
    pub content_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub chunk_hash: String,
    pub token_count: i64,
}

/// Lifecycle of a [`ScrapeJob`]: `running -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Execution record for one source within one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeJob {
    pub id: String,
    pub source_id: String,
    pub status: JobStatus,
    pub pages_scraped: i64,
    pub chunks_created: i64,
    pub duplicates_found: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The single terminal update applied to a running [`ScrapeJob`].
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub status: JobStatus,
    pub pages_scraped: i64,
    pub chunks_created: i64,
    pub duplicates_found: i64,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl JobCompletion {
    pub fn completed(pages_scraped: i64, chunks_created: i64, duplicates_found: i64) -> Self {
        Self {
            status: JobStatus::Completed,
            pages_scraped,
            chunks_created,
            duplicates_found,
            error_message: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            pages_scraped: 0,
            chunks_created: 0,
            duplicates_found: 0,
            error_message: Some(error.into()),
            completed_at: Utc::now(),
        }
    }
}

/// A stored media asset, consumed read-only by the smart-folder filter.
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub tags: Option<Vec<String>>,
    pub quality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .map(|tags| tags.iter().any(|t| t == tag))
            .unwrap_or(false)
    }
}

/// A saved, rule-defined dynamic view over media records.
///
/// `query_rules` is `None` when the stored rules carry no `filters` list;
/// such a folder matches nothing.
#[derive(Debug, Clone, Serialize)]
pub struct SmartFolder {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub query_rules: Option<QueryRules>,
}

/// A quote pulled from a transcript, pending human validation.
///
/// The validation flag is private: [`ExtractedQuote::pending`] sets it to
/// `false`, [`ExtractedQuote::restore`] copies it from a stored row, and
/// nothing in this workspace flips it.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedQuote {
    pub id: String,
    pub profile_id: Option<String>,
    pub quote_text: String,
    pub attribution: String,
    pub context: String,
    pub theme: String,
    pub sentiment: String,
    pub impact_area: String,
    pub suggested_for_report: bool,
    is_validated: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ExtractedQuote {
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        profile_id: Option<String>,
        quote_text: String,
        attribution: String,
        context: String,
        theme: String,
        sentiment: String,
        impact_area: String,
        suggested_for_report: bool,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            profile_id,
            quote_text,
            attribution,
            context,
            theme,
            sentiment,
            impact_area,
            suggested_for_report,
            is_validated: false,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// Give a quote built by [`ExtractedQuote::pending`] the identity and
    /// review state of a persisted row. Store implementations use this when
    /// loading; the flag still cannot be set on a live quote.
    pub fn restore(
        self,
        id: String,
        is_validated: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            is_validated,
            created_at,
            ..self
        }
    }

    pub fn is_validated(&self) -> bool {
        self.is_validated
    }
}
