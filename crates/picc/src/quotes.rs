//! `picc quotes`: the human review queue for extracted quotes.
//!
//! Read-only. Quotes arrive unvalidated from transcript analysis and nothing
//! here changes that.

use anyhow::Result;

use picc_core::models::ExtractedQuote;
use picc_core::store::{QuoteFilter, Store};

use crate::sources::truncate;

pub async fn run_quotes(store: &dyn Store, filter: &QuoteFilter) -> Result<()> {
    let quotes = store.list_quotes(filter).await?;
    if quotes.is_empty() {
        println!("No quotes.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20} {:<18} {:<9} {:<6}  QUOTE",
        "ID", "ATTRIBUTION", "THEME", "VALIDATED", "REPORT"
    );
    for q in &quotes {
        println!("{}", quote_line(q));
    }
    println!();
    println!("{} quote(s)", quotes.len());
    Ok(())
}

fn quote_line(q: &ExtractedQuote) -> String {
    format!(
        "{:<36}  {:<20} {:<18} {:<9} {:<6}  \"{}\"",
        q.id,
        truncate(&q.attribution, 20),
        truncate(&q.theme, 18),
        if q.is_validated() { "yes" } else { "no" },
        if q.suggested_for_report { "yes" } else { "no" },
        truncate(&q.quote_text, 60)
    )
}
