//! Smart folder evaluation over the stored media records.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use picc_core::models::{MediaRecord, SmartFolder};
use picc_core::rules::filter_matches;
use picc_core::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct FolderView {
    pub folder: SmartFolder,
    pub count: usize,
    pub media: Vec<MediaRecord>,
}

/// Resolve `slug` and evaluate its rules at `now`. `None` if no such folder.
pub async fn load_folder_view(
    store: &dyn Store,
    slug: &str,
    now: DateTime<Utc>,
) -> Result<Option<FolderView>> {
    let Some(folder) = store.get_smart_folder(slug).await? else {
        return Ok(None);
    };
    let records = store.list_media().await?;
    let media: Vec<MediaRecord> = filter_matches(&folder, &records, now)
        .into_iter()
        .cloned()
        .collect();

    Ok(Some(FolderView {
        count: media.len(),
        folder,
        media,
    }))
}

/// `picc folder SLUG`
pub async fn run_folder(store: &dyn Store, slug: &str) -> Result<()> {
    let Some(view) = load_folder_view(store, slug, Utc::now()).await? else {
        bail!("no smart folder with slug '{}'", slug);
    };

    println!("{} ({} items)", view.folder.name, view.count);
    if view.folder.query_rules.is_none() {
        println!("  folder has no filters and matches nothing");
    }
    for m in &view.media {
        println!(
            "  {}  {}  {}",
            m.created_at.format("%Y-%m-%d"),
            m.filename,
            m.quality_score.map(|q| format!("{:.1}", q)).unwrap_or_default()
        );
    }
    Ok(())
}
