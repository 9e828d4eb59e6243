//! `picc search`: lexical catalog search or semantic chunk search.

use anyhow::{bail, Result};

use picc_core::search::{
    build_context, parse_types, search, semantic_search, SearchRequest, SemanticRequest,
    StructuredFilters,
};
use picc_core::store::Store;

use crate::config::Config;
use crate::embedding::{create_embedder, embed_query};

#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub mode: String,
    pub types: Vec<String>,
    pub filters: StructuredFilters,
    pub limit: Option<usize>,
    /// Print the assembled LLM context instead of the hit list (semantic only).
    pub context: bool,
}

pub async fn run_search(config: &Config, store: &dyn Store, args: &SearchArgs) -> Result<()> {
    match args.mode.as_str() {
        "lexical" => run_lexical(config, store, args).await,
        "semantic" => run_semantic(config, store, args).await,
        other => bail!("Unknown search mode: '{}'. Must be lexical or semantic.", other),
    }
}

async fn run_lexical(config: &Config, store: &dyn Store, args: &SearchArgs) -> Result<()> {
    let mut req = SearchRequest::new(
        args.query.clone(),
        args.limit.unwrap_or(config.search.default_limit),
    );
    req.types = parse_types(&args.types)?;
    req.filters = args.filters.clone();

    let resp = search(store, &req).await?;
    if resp.summary.total == 0 {
        println!("No results.");
        return Ok(());
    }

    for (entity, rows) in &resp.results {
        if rows.is_empty() {
            continue;
        }
        println!("{} ({})", entity.as_str(), rows.len());
        for row in rows {
            let date = row
                .entity
                .date_field()
                .and_then(|f| row.field(f))
                .unwrap_or("");
            println!("  {}  {}  {}", row.id, row.title().unwrap_or("(untitled)"), date);
        }
        println!();
    }
    println!("{} results", resp.summary.total);
    Ok(())
}

async fn run_semantic(config: &Config, store: &dyn Store, args: &SearchArgs) -> Result<()> {
    let Some(embedder) = create_embedder(&config.embedding)? else {
        bail!("semantic search requires an embedding provider; set [embedding] provider");
    };
    let query_vec = embed_query(embedder.as_ref(), &args.query).await?;

    let resp = semantic_search(
        store,
        &SemanticRequest {
            query: &args.query,
            query_vec: &query_vec,
            limit: args.limit.unwrap_or(config.search.semantic_limit),
            min_similarity: config.search.min_similarity,
        },
    )
    .await?;

    if args.context {
        println!("{}", build_context(&resp.chunks, config.search.context_tokens));
        return Ok(());
    }

    if resp.chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, m) in resp.chunks.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, m.similarity, m.title);
        println!("    url: {}", m.url);
        println!("    {}", snippet(&m.text, 200));
        println!();
    }
    Ok(())
}

fn snippet(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}
