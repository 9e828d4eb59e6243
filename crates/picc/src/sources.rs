use anyhow::{bail, Result};
use uuid::Uuid;

use picc_core::models::Source;
use picc_core::store::Store;

const SOURCE_TYPES: &[&str] = &["website", "news", "government", "research"];

/// `picc sources [--all]`
pub async fn list_sources(store: &dyn Store, all: bool) -> Result<()> {
    let sources = store.list_sources(!all).await?;
    if sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<24} {:<10} {:<6}  {:<20}  URL",
        "ID", "NAME", "TYPE", "ACTIVE", "LAST SCRAPED"
    );
    for s in &sources {
        let last = s
            .last_scraped_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<36}  {:<24} {:<10} {:<6}  {:<20}  {}",
            s.id,
            truncate(&s.name, 24),
            s.source_type,
            s.is_active,
            last,
            s.url
        );
    }
    Ok(())
}

/// Validate and build a new active source.
pub fn new_source(name: &str, url: &str, source_type: &str) -> Result<Source> {
    let name = name.trim();
    if name.is_empty() {
        bail!("source name must not be empty");
    }
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("source url must be http(s): {}", url);
    }
    if !SOURCE_TYPES.contains(&source_type) {
        bail!(
            "unknown source type '{}'. Must be one of: {}",
            source_type,
            SOURCE_TYPES.join(", ")
        );
    }
    Ok(Source {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        url: url.to_string(),
        source_type: source_type.to_string(),
        is_active: true,
        last_scraped_at: None,
    })
}

/// `picc source add NAME URL [--type T]`
pub async fn add_source(store: &dyn Store, name: &str, url: &str, source_type: &str) -> Result<()> {
    let source = new_source(name, url, source_type)?;
    store.add_source(&source).await?;
    println!("Added source {} ({})", source.name, source.id);
    Ok(())
}

/// `picc source deactivate ID`
pub async fn deactivate_source(store: &dyn Store, id: &str) -> Result<()> {
    if !store.set_source_active(id, false).await? {
        bail!("no source with id {}", id);
    }
    println!("Deactivated {}", id);
    Ok(())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
