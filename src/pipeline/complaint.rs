//! Complaint aggregation pipeline.
//!
//! Resolves the target document and its related documents, builds the
//! complaint prompt, invokes the orchestrator, and falls back to a
//! deterministic template on any model failure. As long as the main
//! document resolves, this call cannot fail on the model's account — only
//! validation, lookup and persistence errors surface. The swallowed model
//! cause goes to the log, never into the returned value.

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use super::normalize::ModelReply;
use super::ollama::{LlmClient, QueryOptions, QueryOrchestrator};
use super::prompt::build_complaint_prompt;
use super::PipelineError;
use crate::models::{Complaint, ComplaintDocument, ComplaintRequest, ComplaintStatus};
use crate::store::DocumentStore;

/// Temperature for requests arriving with their documents attached.
const REQUEST_TEMPERATURE: f32 = 0.6;

/// Temperature for the store-resolving convenience path.
const DOCUMENT_TEMPERATURE: f32 = 0.5;

/// Complaints run longer than analyses; raise the output ceiling.
const COMPLAINT_MAX_TOKENS: u32 = 6000;

pub struct ComplaintPipeline<C, S> {
    orchestrator: QueryOrchestrator<C>,
    store: S,
}

impl<C: LlmClient, S: DocumentStore> ComplaintPipeline<C, S> {
    pub fn new(orchestrator: QueryOrchestrator<C>, store: S) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    /// Generate a complaint for an explicit request.
    pub async fn generate(&self, request: &ComplaintRequest) -> Result<Complaint, PipelineError> {
        self.generate_at(request, REQUEST_TEMPERATURE, None).await
    }

    /// Same, bounded by a caller deadline. Deadline expiry counts as a
    /// model failure and lands in the fallback, not in an error.
    pub async fn generate_with_deadline(
        &self,
        request: &ComplaintRequest,
        deadline: Option<Instant>,
    ) -> Result<Complaint, PipelineError> {
        self.generate_at(request, REQUEST_TEMPERATURE, deadline).await
    }

    /// Convenience path: complaint for a stored document by id.
    pub async fn draft_for_document(
        &self,
        document_id: Uuid,
        agency: &str,
    ) -> Result<Complaint, PipelineError> {
        let request = ComplaintRequest {
            agency: agency.to_string(),
            main_document_id: Some(document_id),
            ..ComplaintRequest::default()
        };
        self.generate_at(&request, DOCUMENT_TEMPERATURE, None).await
    }

    async fn generate_at(
        &self,
        request: &ComplaintRequest,
        temperature: f32,
        deadline: Option<Instant>,
    ) -> Result<Complaint, PipelineError> {
        if request.agency.trim().is_empty() {
            return Err(PipelineError::Validation("agency"));
        }

        let main = match &request.main_document {
            Some(doc) => doc.clone(),
            None => {
                let id = request
                    .main_document_id
                    .ok_or(PipelineError::Validation("mainDocument"))?;
                let stored = self
                    .store
                    .find_document(id)?
                    .ok_or(PipelineError::NotFound(id))?;
                ComplaintDocument::from(&stored)
            }
        };

        let related = match &request.related_documents {
            Some(docs) => docs.clone(),
            None => self.related_from_store(&main)?,
        };

        let prompt = build_complaint_prompt(&request.agency, &main, &related);
        let options = QueryOptions {
            temperature: Some(temperature),
            max_tokens: Some(COMPLAINT_MAX_TOKENS),
            ..QueryOptions::default()
        };

        let content = match self
            .orchestrator
            .query_with_deadline(&prompt, &options, deadline)
            .await
        {
            Ok(reply) => complaint_content(reply),
            Err(error) => {
                tracing::warn!(
                    agency = %request.agency,
                    error = %error,
                    "model-backed complaint generation failed, using fallback"
                );
                None
            }
        };
        let content =
            content.unwrap_or_else(|| fallback_complaint(&request.agency, &main));

        let now = Utc::now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            document_id: main.id,
            agency: request.agency.trim().to_string(),
            content,
            related_document_ids: related.iter().map(|d| d.id).collect(),
            status: ComplaintStatus::Draft,
            created_at: now,
            updated_at: now,
            violations: main.violations.clone(),
        };

        // Persistence failures propagate unchanged. Linking only applies to
        // documents the store actually holds — inline-supplied documents
        // have nothing to link to.
        self.store.append_complaint(&complaint)?;
        if self.store.find_document(main.id)?.is_some() {
            self.store.link_complaint(main.id, complaint.id)?;
        }

        tracing::info!(
            complaint_id = %complaint.id,
            document_id = %complaint.document_id,
            related = complaint.related_document_ids.len(),
            "complaint generated"
        );
        Ok(complaint)
    }

    /// Related context: every other stored document whose date does not
    /// postdate the main document's date. Equal dates are included; store
    /// order is preserved as the tie-break.
    fn related_from_store(
        &self,
        main: &ComplaintDocument,
    ) -> Result<Vec<ComplaintDocument>, PipelineError> {
        let Some(main_date) = main.document_date else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .list_documents()?
            .iter()
            .filter(|d| d.id != main.id)
            .filter(|d| d.document_date.is_some_and(|date| date <= main_date))
            .map(ComplaintDocument::from)
            .collect())
    }
}

fn complaint_content(reply: ModelReply) -> Option<String> {
    match reply {
        ModelReply::Structured(value) => value
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string),
        // The prompt demands {"content": ...}; prose without it means the
        // model ignored the format, and the fallback takes over.
        ModelReply::FreeText(_) => None,
    }
}

/// Deterministic complaint used whenever model-backed generation fails.
/// Always non-empty and always names the agency verbatim.
pub fn fallback_complaint(agency: &str, main: &ComplaintDocument) -> String {
    let summary = if main.summary.trim().is_empty() {
        "Подробные обстоятельства изложены в приложенном документе."
    } else {
        main.summary.trim()
    };
    let document_date = main
        .document_date
        .map(|date| date.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "не указана".to_string());
    let today = Utc::now().format("%d.%m.%Y");

    format!(
        "Жалоба в {agency}\n\n\
         Я обращаюсь с жалобой в связи со следующими обстоятельствами.\n\n\
         {summary}\n\n\
         Дата рассматриваемого документа: {document_date}.\n\n\
         Прошу провести проверку по изложенным фактам и принять меры \
         реагирования в соответствии с действующим законодательством.\n\n\
         {today}"
    )
}
