//! SQLite-backed [`Store`] implementation.
//!
//! Timestamps are stored as RFC 3339 text, tag lists and JSON blobs as
//! serialized text, and embeddings as little-endian `f32` BLOBs. Content
//! uniqueness rests on the `UNIQUE(content_hash)` constraint: a losing
//! concurrent insert becomes [`InsertOutcome::Duplicate`].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use picc_core::analysis::ImageAnalysis;
use picc_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use picc_core::models::{
    ContentChunk, ExtractedQuote, JobCompletion, JobStatus, MediaRecord, ScrapeJob, ScrapedContent,
    SmartFolder, Source,
};
use picc_core::rules::QueryRules;
use picc_core::search::{CatalogRecord, ChunkMatch, EntityQuery};
use picc_core::store::{ContentStats, InsertOutcome, PendingChunk, QuoteFilter, Store};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width so that text ordering matches time ordering.
fn to_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("bad timestamp in database: {}", raw))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    Ok(Source {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        source_type: row.get("source_type"),
        is_active: row.get::<i64, _>("is_active") != 0,
        last_scraped_at: parse_opt_ts(row.get("last_scraped_at"))?,
    })
}

fn job_from_row(row: &SqliteRow) -> Result<ScrapeJob> {
    let status: String = row.get("status");
    Ok(ScrapeJob {
        id: row.get("id"),
        source_id: row.get("source_id"),
        status: JobStatus::parse(&status).ok_or_else(|| anyhow!("unknown job status: {}", status))?,
        pages_scraped: row.get("pages_scraped"),
        chunks_created: row.get("chunks_created"),
        duplicates_found: row.get("duplicates_found"),
        error_message: row.get("error_message"),
        started_at: parse_ts(&row.get::<String, _>("started_at"))?,
        completed_at: parse_opt_ts(row.get("completed_at"))?,
    })
}

fn media_from_row(row: &SqliteRow) -> Result<MediaRecord> {
    let id: String = row.get("id");
    let tags = match row.get::<Option<String>, _>("tags") {
        Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(tags) => Some(tags),
            Err(e) => {
                tracing::warn!(media_id = %id, error = %e, "ignoring malformed tag list");
                None
            }
        },
        None => None,
    };
    Ok(MediaRecord {
        filename: row.get("filename"),
        url: row.get("url"),
        tags,
        quality_score: row.get("quality_score"),
        created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        id,
    })
}

fn quote_from_row(row: &SqliteRow) -> Result<ExtractedQuote> {
    let id: String = row.get("id");
    let raw_meta: String = row.get("metadata");
    let metadata = serde_json::from_str(&raw_meta).unwrap_or_else(|e| {
        tracing::warn!(quote_id = %id, error = %e, "ignoring malformed quote metadata");
        serde_json::Value::Object(Default::default())
    });
    let created_at = parse_ts(&row.get::<String, _>("created_at"))?;
    Ok(ExtractedQuote::pending(
        row.get("profile_id"),
        row.get("quote_text"),
        row.get("attribution"),
        row.get("context"),
        row.get("theme"),
        row.get("sentiment"),
        row.get("impact_area"),
        row.get::<i64, _>("suggested_for_report") != 0,
        metadata,
    )
    .restore(id, row.get::<i64, _>("is_validated") != 0, created_at))
}

fn folder_from_row(row: &SqliteRow) -> SmartFolder {
    let slug: String = row.get("slug");
    let query_rules = row
        .get::<Option<String>, _>("query_rules")
        .and_then(|raw| match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(v) => QueryRules::from_json(&v),
            Err(e) => {
                tracing::warn!(folder = %slug, error = %e, "smart folder rules are not valid JSON");
                None
            }
        });
    SmartFolder {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        query_rules,
        slug,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>> {
        let sql = if active_only {
            "SELECT * FROM scrape_sources WHERE is_active = 1 ORDER BY name"
        } else {
            "SELECT * FROM scrape_sources ORDER BY name"
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(source_from_row).collect()
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM scrape_sources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn add_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_sources (id, name, url, source_type, is_active, last_scraped_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.id)
        .bind(&source.name)
        .bind(&source.url)
        .bind(&source.source_type)
        .bind(source.is_active as i64)
        .bind(source.last_scraped_at.as_ref().map(to_ts))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_source_active(&self, id: &str, active: bool) -> Result<bool> {
        let res = sqlx::query("UPDATE scrape_sources SET is_active = ? WHERE id = ?")
            .bind(active as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn touch_source(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE scrape_sources SET last_scraped_at = ? WHERE id = ?")
            .bind(to_ts(&at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_content_by_hash(&self, content_hash: &str) -> Result<Option<String>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM scraped_content WHERE content_hash = ?")
                .bind(content_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    async fn insert_content(&self, content: &ScrapedContent) -> Result<InsertOutcome> {
        let res = sqlx::query(
            r#"
            INSERT INTO scraped_content (id, source_id, url, title, content, content_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_hash) DO NOTHING
            "#,
        )
        .bind(&content.id)
        .bind(&content.source_id)
        .bind(&content.url)
        .bind(&content.title)
        .bind(&content.content)
        .bind(&content.content_hash)
        .bind(to_ts(&content.created_at))
        .execute(&self.pool)
        .await?;

        if res.rows_affected() > 0 {
            return Ok(InsertOutcome::Inserted(content.id.clone()));
        }

        match self.find_content_by_hash(&content.content_hash).await? {
            Some(existing) => Ok(InsertOutcome::Duplicate(existing)),
            None => bail!("content insert for {} was ignored but no row holds its hash", content.url),
        }
    }

    async fn insert_chunks(&self, chunks: &[ContentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO content_chunks (id, content_id, chunk_index, text, chunk_hash, token_count)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.content_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.chunk_hash)
            .bind(chunk.token_count)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn create_job(&self, source_id: &str, started_at: DateTime<Utc>) -> Result<ScrapeJob> {
        let job = ScrapeJob {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            status: JobStatus::Running,
            pages_scraped: 0,
            chunks_created: 0,
            duplicates_found: 0,
            error_message: None,
            started_at,
            completed_at: None,
        };
        sqlx::query(
            "INSERT INTO scrape_jobs (id, source_id, status, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.source_id)
        .bind(job.status.as_str())
        .bind(to_ts(&job.started_at))
        .execute(&self.pool)
        .await?;
        Ok(job)
    }

    async fn finish_job(&self, job_id: &str, completion: &JobCompletion) -> Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = ?, pages_scraped = ?, chunks_created = ?, duplicates_found = ?,
                error_message = ?, completed_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.pages_scraped)
        .bind(completion.chunks_created)
        .bind(completion.duplicates_found)
        .bind(&completion.error_message)
        .bind(to_ts(&completion.completed_at))
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            bail!("job {} is not running", job_id);
        }
        Ok(())
    }

    async fn recent_jobs(&self, limit: usize) -> Result<Vec<ScrapeJob>> {
        let rows = sqlx::query("SELECT * FROM scrape_jobs ORDER BY started_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn get_smart_folder(&self, slug: &str) -> Result<Option<SmartFolder>> {
        let row = sqlx::query("SELECT * FROM smart_folders WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(folder_from_row))
    }

    async fn list_media(&self) -> Result<Vec<MediaRecord>> {
        let rows = sqlx::query(
            "SELECT id, filename, url, tags, quality_score, created_at FROM media_records ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(media_from_row).collect()
    }

    async fn save_media_analysis(&self, media_id: &str, analysis: &ImageAnalysis) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE media_records
            SET ai_description = ?, alt_text = ?, ai_tags = ?, cultural_sensitivity = ?, analyzed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&analysis.description)
        .bind(&analysis.alt_text)
        .bind(serde_json::to_string(&analysis.tags)?)
        .bind(analysis.cultural_sensitivity.as_str())
        .bind(to_ts(&Utc::now()))
        .bind(media_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Exact and date filters run in SQL. Text and location containment use
    /// [`EntityQuery::matches`] because SQLite `LIKE` folds ASCII case only.
    async fn search_entities(&self, query: &EntityQuery) -> Result<Vec<CatalogRecord>> {
        let entity = query.entity;
        let columns = entity.columns();

        let mut clauses = vec!["1 = 1".to_string()];
        let mut binds: Vec<String> = Vec::new();

        if let Some(date_field) = entity.date_field() {
            if let Some(from) = query.date_from {
                clauses.push(format!("substr({}, 1, 10) >= ?", date_field));
                binds.push(from.format("%Y-%m-%d").to_string());
            }
            if let Some(to) = query.date_to {
                clauses.push(format!("substr({}, 1, 10) <= ?", date_field));
                binds.push(to.format("%Y-%m-%d").to_string());
            }
        }
        for (field, value) in [
            ("category", &query.category),
            ("fiscal_year", &query.fiscal_year),
            ("record_type", &query.record_type),
        ] {
            if let Some(v) = value {
                clauses.push(format!("{} = ?", field));
                binds.push(v.clone());
            }
        }

        let order = match entity.date_field() {
            Some(f) => format!("{} DESC, id", f),
            None => "id".to_string(),
        };
        let sql = format!(
            "SELECT id, {} FROM {} WHERE {} ORDER BY {}",
            columns.join(", "),
            entity.table(),
            clauses.join(" AND "),
            order
        );

        let mut q = sqlx::query(&sql);
        for b in &binds {
            q = q.bind(b);
        }
        let rows = q.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut record = CatalogRecord::new(entity, row.get::<String, _>("id"));
                for col in columns {
                    if let Some(v) = row.get::<Option<String>, _>(*col) {
                        record.fields.insert(col.to_string(), v);
                    }
                }
                record
            })
            .filter(|record| query.matches(record))
            .take(query.limit)
            .collect())
    }

    async fn pending_chunks(&self, limit: usize) -> Result<Vec<PendingChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.content_id, c.text
            FROM content_chunks c
            LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id
            WHERE cv.chunk_id IS NULL
            ORDER BY c.content_id, c.chunk_index
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PendingChunk {
                chunk_id: row.get("id"),
                content_id: row.get("content_id"),
                text: row.get("text"),
            })
            .collect())
    }

    async fn upsert_chunk_vector(&self, chunk_id: &str, content_id: &str, vector: &[f32]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, content_id, dims, embedding)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                content_id = excluded.content_id,
                dims = excluded.dims,
                embedding = excluded.embedding
            "#,
        )
        .bind(chunk_id)
        .bind(content_id)
        .bind(vector.len() as i64)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ChunkMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, cv.content_id, cv.embedding, c.text, sc.title, sc.url
            FROM chunk_vectors cv
            JOIN content_chunks c ON c.id = cv.chunk_id
            JOIN scraped_content sc ON sc.id = cv.content_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<ChunkMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ChunkMatch {
                    chunk_id: row.get("chunk_id"),
                    content_id: row.get("content_id"),
                    title: row.get("title"),
                    url: row.get("url"),
                    text: row.get("text"),
                    similarity: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                }
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
        let mut tx = self.pool.begin().await?;
        for q in quotes {
            sqlx::query(
                r#"
                INSERT INTO extracted_quotes (id, profile_id, quote_text, attribution, context, theme,
                                              sentiment, impact_area, suggested_for_report,
                                              is_validated, metadata, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&q.id)
            .bind(&q.profile_id)
            .bind(&q.quote_text)
            .bind(&q.attribution)
            .bind(&q.context)
            .bind(&q.theme)
            .bind(&q.sentiment)
            .bind(&q.impact_area)
            .bind(q.suggested_for_report as i64)
            .bind(q.is_validated() as i64)
            .bind(q.metadata.to_string())
            .bind(to_ts(&q.created_at))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(quotes.len())
    }

    async fn list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<ExtractedQuote>> {
        let mut clauses = vec!["1 = 1"];
        if filter.theme.is_some() {
            clauses.push("theme = ?");
        }
        if filter.validated.is_some() {
            clauses.push("is_validated = ?");
        }
        if filter.suggested_for_report.is_some() {
            clauses.push("suggested_for_report = ?");
        }
        let sql = format!(
            "SELECT * FROM extracted_quotes WHERE {} ORDER BY created_at DESC, id LIMIT ?",
            clauses.join(" AND ")
        );

        let mut q = sqlx::query(&sql);
        if let Some(theme) = &filter.theme {
            q = q.bind(theme);
        }
        if let Some(v) = filter.validated {
            q = q.bind(v as i64);
        }
        if let Some(s) = filter.suggested_for_report {
            q = q.bind(s as i64);
        }
        let rows = q.bind(filter.limit as i64).fetch_all(&self.pool).await?;
        rows.iter().map(quote_from_row).collect()
    }

    async fn content_stats(&self) -> Result<ContentStats> {
        let count = |sql: &'static str| sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool);

        let last: Option<String> =
            sqlx::query_scalar("SELECT MAX(last_scraped_at) FROM scrape_sources")
                .fetch_one(&self.pool)
                .await?;

        Ok(ContentStats {
            sources: count("SELECT COUNT(*) FROM scrape_sources").await?,
            active_sources: count("SELECT COUNT(*) FROM scrape_sources WHERE is_active = 1").await?,
            content: count("SELECT COUNT(*) FROM scraped_content").await?,
            chunks: count("SELECT COUNT(*) FROM content_chunks").await?,
            embedded_chunks: count("SELECT COUNT(*) FROM chunk_vectors").await?,
            quotes: count("SELECT COUNT(*) FROM extracted_quotes").await?,
            validated_quotes: count("SELECT COUNT(*) FROM extracted_quotes WHERE is_validated = 1").await?,
            last_scraped_at: parse_opt_ts(last)?,
        })
    }
}
