//! Analysis entry point — the caching boundary in front of the orchestrator.
//!
//! Flow: fingerprint → cache → prompt → orchestrator → normalize →
//! validate → deterministic field extraction → cache → result.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use super::cache::{fingerprint, AnalysisCache};
use super::extract::{extract_document_date, extract_sender_agency, parse_date};
use super::normalize::{parse_array_lenient, ModelReply};
use super::ollama::{LlmClient, QueryOptions, QueryOrchestrator};
use super::prompt::{build_analysis_prompt, build_classification_prompt};
use super::{LlmError, PipelineError};
use crate::models::{AnalysisResult, AttachmentAnalysis, Violation};

/// Inputs shorter than this are rejected before any prompt is built.
pub const MIN_INPUT_LENGTH: usize = 10;

/// Sampling temperature in strict mode; strictness never changes the
/// prompt text, only this.
pub const STRICT_TEMPERATURE: f32 = 0.1;
pub const NORMAL_TEMPERATURE: f32 = 0.3;

/// Analyzes legal text through the shared cache and the orchestrator.
pub struct DocumentAnalyzer<C> {
    orchestrator: QueryOrchestrator<C>,
    cache: Arc<AnalysisCache>,
}

/// Model-reported analysis shape; every field optional, defaults applied
/// field by field.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawAnalysis {
    summary: String,
    key_excerpts: Vec<Value>,
    violations: Vec<Value>,
    document_date: Option<String>,
    sender_agency: Option<String>,
}

impl<C: LlmClient> DocumentAnalyzer<C> {
    pub fn new(orchestrator: QueryOrchestrator<C>, cache: Arc<AnalysisCache>) -> Self {
        Self {
            orchestrator,
            cache,
        }
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub async fn analyze(
        &self,
        text: &str,
        instructions: &str,
        strict: bool,
    ) -> Result<AnalysisResult, PipelineError> {
        self.analyze_with_deadline(text, instructions, strict, None)
            .await
    }

    /// Analyze with an optional deadline bounding prompt + network +
    /// normalization. A cache hit costs no network call at all.
    pub async fn analyze_with_deadline(
        &self,
        text: &str,
        instructions: &str,
        strict: bool,
        deadline: Option<Instant>,
    ) -> Result<AnalysisResult, PipelineError> {
        if text.trim().chars().count() < MIN_INPUT_LENGTH {
            return Err(PipelineError::Validation("text"));
        }

        let key = fingerprint(text, instructions);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("analysis cache hit");
            return Ok(hit);
        }

        let prompt = build_analysis_prompt(text, instructions);
        let options = QueryOptions {
            temperature: Some(if strict {
                STRICT_TEMPERATURE
            } else {
                NORMAL_TEMPERATURE
            }),
            ..QueryOptions::default()
        };
        let reply = self
            .orchestrator
            .query_with_deadline(&prompt, &options, deadline)
            .await?;

        let mut result = parse_analysis_reply(reply)?;

        // Deterministic extraction over the original input wins over the
        // model's own guess for these two fields.
        if let Some(date) = extract_document_date(text) {
            result.document_date = Some(date);
        }
        if let Some(agency) = extract_sender_agency(text) {
            result.sender_agency = Some(agency);
        }

        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Availability-over-transparency variant: failures come back as a
    /// result with a diagnostic placeholder summary, never as an error.
    pub async fn analyze_or_placeholder(
        &self,
        text: &str,
        instructions: &str,
        strict: bool,
    ) -> AnalysisResult {
        match self.analyze(text, instructions, strict).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(error = %error, "analysis failed, returning placeholder");
                AnalysisResult::placeholder(error)
            }
        }
    }

    /// Classify one attachment's extracted text. Not routed through the
    /// analysis cache — attachments are seen once, at import time.
    pub async fn classify_attachment(
        &self,
        text: &str,
    ) -> Result<AttachmentAnalysis, PipelineError> {
        if text.trim().chars().count() < MIN_INPUT_LENGTH {
            return Err(PipelineError::Validation("text"));
        }

        let prompt = build_classification_prompt(text);
        let reply = self
            .orchestrator
            .query(&prompt, &QueryOptions::default())
            .await?;

        let value = match reply {
            ModelReply::Structured(value) => value,
            ModelReply::FreeText(_) => {
                return Err(LlmError::InvalidResponse("documentType".into()).into())
            }
        };
        let mut analysis: AttachmentAnalysis =
            serde_json::from_value(normalize_classification(value))
                .map_err(|e| LlmError::Decode(e.to_string()))?;

        if let Some(date) = extract_document_date(text) {
            analysis.sent_date = Some(date);
        }
        if let Some(agency) = extract_sender_agency(text) {
            analysis.sender_agency = Some(agency);
        }
        Ok(analysis)
    }
}

/// The classification shape reaches us with a string date; rewrite it so
/// serde sees either a proper ISO date or null.
fn normalize_classification(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        let parsed = map
            .get("sentDate")
            .and_then(Value::as_str)
            .and_then(parse_date);
        map.insert(
            "sentDate".to_string(),
            parsed
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        );
    }
    value
}

/// Interpret a normalized reply as an analysis result. A reply without a
/// non-empty summary is invalid for this task — free-text answers included.
fn parse_analysis_reply(reply: ModelReply) -> Result<AnalysisResult, LlmError> {
    let value = match reply {
        ModelReply::Structured(value) => value,
        ModelReply::FreeText(_) => return Err(LlmError::InvalidResponse("summary".into())),
    };
    let raw: RawAnalysis =
        serde_json::from_value(value).map_err(|e| LlmError::Decode(e.to_string()))?;
    if raw.summary.trim().is_empty() {
        return Err(LlmError::InvalidResponse("summary".into()));
    }

    let key_excerpts = raw
        .key_excerpts
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let violations: Vec<Violation> = parse_array_lenient(&raw.violations);

    Ok(AnalysisResult {
        summary: raw.summary,
        key_excerpts,
        violations,
        document_date: raw.document_date.as_deref().and_then(parse_date),
        sender_agency: raw
            .sender_agency
            .filter(|agency| !agency.trim().is_empty() && agency != "null"),
    })
}
