//! Idempotent schema setup. Every statement is `IF NOT EXISTS`, so
//! `picc init` can be re-run safely.

use anyhow::Result;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS scrape_sources (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        source_type TEXT NOT NULL DEFAULT 'website',
        is_active INTEGER NOT NULL DEFAULT 1,
        last_scraped_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scraped_content (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        content_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_chunks (
        id TEXT PRIMARY KEY,
        content_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        chunk_hash TEXT NOT NULL,
        token_count INTEGER NOT NULL,
        UNIQUE(content_id, chunk_index),
        FOREIGN KEY (content_id) REFERENCES scraped_content(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scrape_jobs (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        status TEXT NOT NULL,
        pages_scraped INTEGER NOT NULL DEFAULT 0,
        chunks_created INTEGER NOT NULL DEFAULT 0,
        duplicates_found INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS media_records (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        url TEXT NOT NULL,
        tags TEXT,
        quality_score REAL,
        created_at TEXT NOT NULL,
        ai_description TEXT,
        alt_text TEXT,
        ai_tags TEXT,
        cultural_sensitivity TEXT,
        analyzed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS smart_folders (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT,
        query_rules TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS extracted_quotes (
        id TEXT PRIMARY KEY,
        profile_id TEXT,
        quote_text TEXT NOT NULL,
        attribution TEXT NOT NULL,
        context TEXT NOT NULL DEFAULT '',
        theme TEXT NOT NULL DEFAULT '',
        sentiment TEXT NOT NULL DEFAULT '',
        impact_area TEXT NOT NULL DEFAULT '',
        suggested_for_report INTEGER NOT NULL DEFAULT 0,
        is_validated INTEGER NOT NULL DEFAULT 0,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunk_vectors (
        chunk_id TEXT PRIMARY KEY,
        content_id TEXT NOT NULL,
        dims INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        FOREIGN KEY (chunk_id) REFERENCES content_chunks(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_entries (
        id TEXT PRIMARY KEY,
        title TEXT, summary TEXT, content TEXT, category TEXT, created_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timeline_events (
        id TEXT PRIMARY KEY,
        title TEXT, description TEXT, category TEXT, location TEXT, event_date TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS research_sources (
        id TEXT PRIMARY KEY,
        title TEXT, description TEXT, author TEXT, url TEXT, created_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS financial_records (
        id TEXT PRIMARY KEY,
        category TEXT, subcategory TEXT, description TEXT, amount TEXT,
        fiscal_year TEXT, record_type TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stories (
        id TEXT PRIMARY KEY,
        title TEXT, content TEXT, excerpt TEXT, created_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        full_name TEXT, bio TEXT, community_role TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chunks_content_id ON content_chunks(content_id)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_started_at ON scrape_jobs(started_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_sources_active ON scrape_sources(is_active)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
