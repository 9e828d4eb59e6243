//! Prompt construction and response parsing for the AI analysis adapters.
//!
//! The two adapters fail differently on an unparseable model response:
//! transcript analysis returns an [`AnalysisError`] and nothing is stored,
//! while image analysis degrades to [`ImageAnalysis::fallback`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm_json::{extract_json_object, JsonExtraction};
use crate::models::ExtractedQuote;

/// Attribution used when no storyteller name is supplied.
pub const DEFAULT_ATTRIBUTION: &str = "Community Member";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transcript is empty")]
    EmptyTranscript,
    #[error("model response contained no JSON object")]
    NoJson,
    #[error("model response contained malformed JSON: {0}")]
    Malformed(String),
    #[error("model response did not match the expected shape: {0}")]
    Schema(String),
}

/// One quote proposed by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteCandidate {
    pub quote_text: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub impact_area: String,
    #[serde(default)]
    pub significance: String,
    #[serde(default)]
    pub suggested_for_report: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptAnalysis {
    pub summary: String,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default, alias = "extracted_quotes")]
    pub quotes: Vec<QuoteCandidate>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

pub fn transcript_prompt(storyteller_name: Option<&str>, transcript: &str) -> String {
    let speaker = storyteller_name.unwrap_or(DEFAULT_ATTRIBUTION);
    format!(
        r#"You are analysing an interview transcript for Palm Island Community Company, an Aboriginal community-controlled organisation.

Identify the most meaningful quotes from {speaker}. Prefer quotes that show community impact, cultural strength, program outcomes, or lived experience. Quote the speaker's words exactly.

Respond with a single JSON object and nothing else:
{{
  "summary": "two or three sentence summary of the interview",
  "key_themes": ["theme", "..."],
  "extracted_quotes": [
    {{
      "quote_text": "exact words",
      "context": "what the speaker was discussing",
      "theme": "short theme label",
      "sentiment": "positive | neutral | negative | mixed",
      "impact_area": "e.g. youth, health, culture, employment",
      "significance": "why this quote matters",
      "suggested_for_report": true
    }}
  ],
  "recommendations": ["follow-up or reporting suggestion"]
}}

Transcript:
{transcript}"#
    )
}

/// Strictly parse a transcript analysis out of model output.
pub fn parse_transcript_analysis(response: &str) -> Result<TranscriptAnalysis, AnalysisError> {
    let value = match extract_json_object(response) {
        JsonExtraction::Found(v) => v,
        JsonExtraction::NotFound => return Err(AnalysisError::NoJson),
        JsonExtraction::Malformed(e) => return Err(AnalysisError::Malformed(e)),
    };
    let mut analysis: TranscriptAnalysis =
        serde_json::from_value(value).map_err(|e| AnalysisError::Schema(e.to_string()))?;
    analysis.quotes.retain(|q| !q.quote_text.trim().is_empty());
    Ok(analysis)
}

/// Where a transcript came from, recorded on each quote's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    Interview,
    Direct,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Interview => "interview",
            TranscriptSource::Direct => "direct_transcript",
        }
    }
}

/// Convert model candidates into unvalidated quote rows.
pub fn quotes_for_storage(
    analysis: &TranscriptAnalysis,
    profile_id: Option<&str>,
    storyteller_name: Option<&str>,
    interview_id: Option<&str>,
    extracted_at: DateTime<Utc>,
) -> Vec<ExtractedQuote> {
    let attribution = storyteller_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_ATTRIBUTION);
    let source = if interview_id.is_some() {
        TranscriptSource::Interview
    } else {
        TranscriptSource::Direct
    };

    analysis
        .quotes
        .iter()
        .map(|q| {
            let metadata = json!({
                "significance": q.significance,
                "source": source.as_str(),
                "interview_id": interview_id,
                "extraction_date": extracted_at.to_rfc3339(),
            });
            ExtractedQuote::pending(
                profile_id.map(str::to_string),
                q.quote_text.trim().to_string(),
                attribution.to_string(),
                q.context.clone(),
                q.theme.clone(),
                q.sentiment.clone(),
                q.impact_area.clone(),
                q.suggested_for_report,
                metadata,
            )
        })
        .collect()
}

/// Cultural sensitivity of an image. Unknown labels become `Community`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Public,
    Community,
    Restricted,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Public => "public",
            Sensitivity::Community => "community",
            Sensitivity::Restricted => "restricted",
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Sensitivity::Public,
            "restricted" => Sensitivity::Restricted,
            _ => Sensitivity::Community,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAnalysis {
    pub description: String,
    pub alt_text: String,
    pub tags: Vec<String>,
    pub cultural_sensitivity: Sensitivity,
    /// True when the model response could not be used.
    pub is_fallback: bool,
}

impl ImageAnalysis {
    pub fn fallback() -> Self {
        Self {
            description: "Image analysis failed".to_string(),
            alt_text: "Image".to_string(),
            tags: Vec::new(),
            cultural_sensitivity: Sensitivity::Community,
            is_fallback: true,
        }
    }
}

pub fn image_prompt() -> &'static str {
    r#"Describe this photo for a community media library on Palm Island.

Respond with a single JSON object and nothing else:
{
  "description": "two or three sentences describing the scene",
  "altText": "short alt text for screen readers",
  "tags": ["lowercase", "keywords"],
  "culturalSensitivity": "public | community | restricted"
}

Use "restricted" if the image may show ceremony, sacred sites, or people who may have passed away. Use "community" if unsure."#
}

/// Parse an image description. Never fails; bad output yields the fallback.
pub fn parse_image_analysis(response: &str) -> ImageAnalysis {
    let Some(value) = extract_json_object(response).into_value() else {
        return ImageAnalysis::fallback();
    };

    let Some(description) = str_field(&value, &["description"]) else {
        return ImageAnalysis::fallback();
    };
    let alt_text = str_field(&value, &["altText", "alt_text"]).unwrap_or_else(|| "Image".to_string());
    let tags = value
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let cultural_sensitivity = str_field(&value, &["culturalSensitivity", "cultural_sensitivity"])
        .map(|s| Sensitivity::parse_lenient(&s))
        .unwrap_or(Sensitivity::Community);

    ImageAnalysis {
        description,
        alt_text,
        tags,
        cultural_sensitivity,
        is_fallback: false,
    }
}

/// First non-blank string among `keys`.
fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
