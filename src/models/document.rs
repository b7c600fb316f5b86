use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::{AttachmentAnalysis, Violation};

/// One uploaded attachment. Text extraction happens upstream; this crate
/// only consumes `extracted_text` when it is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    pub filename: String,
    pub extracted_text: Option<String>,
    pub analysis: Option<AttachmentAnalysis>,
}

/// A document as the external store keeps it. Analysis fields are embedded
/// by the store layer after [`crate::pipeline::DocumentAnalyzer`] runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    pub original_text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_excerpts: Vec<String>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub document_date: Option<NaiveDate>,
    #[serde(default)]
    pub sender_agency: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub complaint_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Fresh unanalyzed document around the given text.
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            original_text: original_text.into(),
            summary: String::new(),
            key_excerpts: Vec::new(),
            violations: Vec::new(),
            document_date: None,
            sender_agency: None,
            attachments: Vec::new(),
            complaint_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Same document with an explicit date, for building store fixtures.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.document_date = Some(date);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_fresh_id_and_empty_analysis() {
        let doc = StoredDocument::new("текст письма");
        assert_ne!(doc.id, Uuid::nil());
        assert!(doc.summary.is_empty());
        assert!(doc.attachments.is_empty());
    }

    #[test]
    fn deserializes_with_minimal_fields() {
        let doc: StoredDocument = serde_json::from_str(
            r#"{"id":"b9e7f65c-6618-45e0-b8a6-0b26fd4a78d2","originalText":"текст","createdAt":"2024-02-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(doc.original_text, "текст");
        assert!(doc.violations.is_empty());
        assert!(doc.document_date.is_none());
    }
}
