//! Content hub statistics: source, content, chunk, embedding and quote
//! counts, plus the most recent scrape jobs.

use anyhow::Result;
use chrono::{DateTime, Utc};

use picc_core::store::Store;

use crate::config::Config;

/// `picc stats`
pub async fn run_stats(config: &Config, store: &dyn Store) -> Result<()> {
    let stats = store.content_stats().await?;
    let jobs = store.recent_jobs(5).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("PICC content hub");
    println!("================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Sources:     {} ({} active)", stats.sources, stats.active_sources);
    println!("  Content:     {}", stats.content);
    println!("  Chunks:      {}", stats.chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.embedded_chunks,
        stats.chunks,
        percent(stats.embedded_chunks, stats.chunks)
    );
    println!(
        "  Quotes:      {} ({} validated)",
        stats.quotes, stats.validated_quotes
    );
    println!(
        "  Last scrape: {}",
        stats
            .last_scraped_at
            .map(|t| format_relative(t, Utc::now()))
            .unwrap_or_else(|| "never".to_string())
    );

    if !jobs.is_empty() {
        println!();
        println!("  Recent jobs:");
        println!(
            "  {:<10} {:>6} {:>7} {:>5}   {}",
            "STATUS", "PAGES", "CHUNKS", "DUPS", "STARTED"
        );
        println!("  {}", "-".repeat(60));
        for job in &jobs {
            println!(
                "  {:<10} {:>6} {:>7} {:>5}   {}{}",
                job.status.as_str(),
                job.pages_scraped,
                job.chunks_created,
                job.duplicates_found,
                format_relative(job.started_at, Utc::now()),
                job.error_message
                    .as_deref()
                    .map(|e| format!("  ({})", e))
                    .unwrap_or_default()
            );
        }
    }
    println!();
    Ok(())
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}
