//! AI analysis adapters: transcript quote extraction and image description.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use picc_core::analysis::{
    image_prompt, parse_image_analysis, parse_transcript_analysis, quotes_for_storage,
    transcript_prompt, AnalysisError, ImageAnalysis, TranscriptAnalysis,
};
use picc_core::store::Store;

use crate::config::Config;
use crate::llm::{create_client, LlmClient};

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptRequest {
    pub transcript: String,
    #[serde(default)]
    pub interview_id: Option<String>,
    #[serde(default)]
    pub storyteller_name: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptReport {
    pub analysis: TranscriptAnalysis,
    pub quotes_stored: usize,
}

/// Analyse a transcript and store its quotes as unvalidated.
///
/// Fails without storing anything when the model output cannot be parsed.
/// A failure to store quotes is logged and reported as `quotes_stored = 0`.
pub async fn analyze_transcript(
    llm: &dyn LlmClient,
    store: &dyn Store,
    req: &TranscriptRequest,
) -> Result<TranscriptReport> {
    if req.transcript.trim().is_empty() {
        return Err(AnalysisError::EmptyTranscript.into());
    }

    let prompt = transcript_prompt(req.storyteller_name.as_deref(), &req.transcript);
    let response = llm.complete(&prompt).await.context("transcript analysis request failed")?;
    let analysis = parse_transcript_analysis(&response)?;

    let quotes = quotes_for_storage(
        &analysis,
        req.profile_id.as_deref(),
        req.storyteller_name.as_deref(),
        req.interview_id.as_deref(),
        Utc::now(),
    );

    let quotes_stored = if quotes.is_empty() {
        0
    } else {
        match store.insert_quotes(&quotes).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to store extracted quotes");
                0
            }
        }
    };

    info!(
        themes = analysis.key_themes.len(),
        quotes = analysis.quotes.len(),
        stored = quotes_stored,
        "transcript analysed"
    );

    Ok(TranscriptReport {
        analysis,
        quotes_stored,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRequest {
    pub image_url: String,
    #[serde(default)]
    pub media_id: Option<String>,
}

/// Describe an image. Unparseable model output yields
/// [`ImageAnalysis::fallback`]; transport errors still propagate. When
/// `media_id` is given the result, fallback included, is saved on that record.
pub async fn analyze_image(
    llm: &dyn LlmClient,
    store: &dyn Store,
    req: &ImageRequest,
) -> Result<ImageAnalysis> {
    let response = llm
        .describe_image(image_prompt(), &req.image_url)
        .await
        .context("image analysis request failed")?;

    let analysis = parse_image_analysis(&response);
    if analysis.is_fallback {
        warn!(url = %req.image_url, "image analysis unparseable; using fallback");
    }

    if let Some(media_id) = &req.media_id {
        if !store.save_media_analysis(media_id, &analysis).await? {
            warn!(media_id = %media_id, "no media record to attach analysis to");
        }
    }

    Ok(analysis)
}

/// `picc analyze transcript FILE [--interview ID] [--storyteller NAME] [--profile ID]`
pub async fn run_analyze_transcript(
    config: &Config,
    store: &dyn Store,
    file: &Path,
    interview_id: Option<String>,
    storyteller_name: Option<String>,
    profile_id: Option<String>,
) -> Result<()> {
    let Some(llm) = create_client(&config.llm)? else {
        bail!("llm.provider is disabled");
    };
    let transcript = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read transcript: {}", file.display()))?;

    let req = TranscriptRequest {
        transcript,
        interview_id,
        storyteller_name,
        profile_id,
    };
    let report = analyze_transcript(llm.as_ref(), store, &req).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `picc analyze image URL [--media ID]`
pub async fn run_analyze_image(
    config: &Config,
    store: &dyn Store,
    image_url: &str,
    media_id: Option<String>,
) -> Result<()> {
    let Some(llm) = create_client(&config.llm)? else {
        bail!("llm.provider is disabled");
    };
    let req = ImageRequest {
        image_url: image_url.to_string(),
        media_id,
    };
    let analysis = analyze_image(llm.as_ref(), store, &req).await?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
