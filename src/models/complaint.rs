use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::Violation;
use super::document::StoredDocument;

/// Complaint lifecycle status. Export/status transitions happen in the
/// store layer; this crate only ever creates `Draft` complaints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Draft,
    Final,
}

/// A generated complaint letter. Constructed once by the pipeline and never
/// mutated by this crate afterwards; `content` is always non-empty (model
/// output or the deterministic fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: Uuid,
    pub document_id: Uuid,
    pub agency: String,
    pub content: String,
    pub related_document_ids: Vec<Uuid>,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Copied from the main document at generation time.
    pub violations: Vec<Violation>,
}

/// Uniform document shape the prompt builder works with. Every field has a
/// serde default so upstream payloads with missing keys normalize to empty
/// values instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplaintDocument {
    pub id: Uuid,
    pub original_text: String,
    pub summary: String,
    pub key_excerpts: Vec<String>,
    pub violations: Vec<Violation>,
    pub document_date: Option<NaiveDate>,
    pub sender_agency: Option<String>,
}

impl From<&StoredDocument> for ComplaintDocument {
    fn from(doc: &StoredDocument) -> Self {
        Self {
            id: doc.id,
            original_text: doc.original_text.clone(),
            summary: doc.summary.clone(),
            key_excerpts: doc.key_excerpts.clone(),
            violations: doc.violations.clone(),
            document_date: doc.document_date,
            sender_agency: doc.sender_agency.clone(),
        }
    }
}

/// Input to complaint generation. `agency` is required; the main document is
/// either supplied inline or looked up by id in the store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplaintRequest {
    pub agency: String,
    pub main_document: Option<ComplaintDocument>,
    pub main_document_id: Option<Uuid>,
    /// When absent, related documents are derived by scanning the store.
    pub related_documents: Option<Vec<ComplaintDocument>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_missing_keys_normalizes_to_defaults() {
        let request: ComplaintRequest =
            serde_json::from_str(r#"{"agency":"ФССП","mainDocument":{"originalText":"текст"}}"#)
                .unwrap();
        let doc = request.main_document.unwrap();
        assert_eq!(doc.original_text, "текст");
        assert!(doc.summary.is_empty());
        assert!(doc.key_excerpts.is_empty());
        assert!(doc.document_date.is_none());
    }

    #[test]
    fn complaint_document_from_stored_copies_analysis() {
        let mut stored = StoredDocument::new("Ответ пристава");
        stored.summary = "Кратко".into();
        stored.violations.push(Violation {
            article: "ст. 64".into(),
            ..Violation::default()
        });
        let doc = ComplaintDocument::from(&stored);
        assert_eq!(doc.id, stored.id);
        assert_eq!(doc.summary, "Кратко");
        assert_eq!(doc.violations.len(), 1);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ComplaintStatus::Draft).unwrap(),
            "\"draft\""
        );
    }
}
