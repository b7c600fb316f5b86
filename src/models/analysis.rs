use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One detected legal violation, tied to a verbatim quote from the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Violation {
    pub law: String,
    pub article: String,
    pub description: String,
    pub evidence_quote: String,
}

/// Structured result of analyzing one piece of legal text.
///
/// `summary` is non-empty in every value handed to a caller: when the model
/// fails, [`AnalysisResult::placeholder`] substitutes a diagnostic summary
/// instead of surfacing an error. Not persisted standalone — the store layer
/// embeds it into its document record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub summary: String,
    /// Verbatim quotes, in document order.
    pub key_excerpts: Vec<String>,
    pub violations: Vec<Violation>,
    pub document_date: Option<NaiveDate>,
    pub sender_agency: Option<String>,
}

impl AnalysisResult {
    /// Diagnostic stand-in when analysis failed. Keeps the non-empty-summary
    /// invariant so callers never observe an empty result.
    pub fn placeholder(reason: impl std::fmt::Display) -> Self {
        Self {
            summary: format!("Не удалось проанализировать документ: {reason}"),
            ..Self::default()
        }
    }
}

/// Result of classifying one attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentAnalysis {
    pub document_type: String,
    pub sent_date: Option<NaiveDate>,
    pub sender_agency: Option<String>,
    pub summary: String,
    pub key_excerpts: Vec<String>,
}

impl AttachmentAnalysis {
    /// Diagnostic stand-in when one attachment's classification failed.
    pub fn placeholder(reason: impl std::fmt::Display) -> Self {
        Self {
            summary: format!("Не удалось проанализировать вложение: {reason}"),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_summary_is_never_empty() {
        let result = AnalysisResult::placeholder("таймаут");
        assert!(!result.summary.is_empty());
        assert!(result.summary.contains("таймаут"));
        assert!(result.violations.is_empty());
    }

    #[test]
    fn violation_deserializes_camel_case() {
        let v: Violation = serde_json::from_str(
            r#"{"law":"ЗПП","article":"ст. 25 ЗПП","description":"","evidenceQuote":"цитата"}"#,
        )
        .unwrap();
        assert_eq!(v.article, "ст. 25 ЗПП");
        assert_eq!(v.evidence_quote, "цитата");
    }

    #[test]
    fn violation_missing_fields_default_to_empty() {
        let v: Violation = serde_json::from_str(r#"{"article":"ст. 7"}"#).unwrap();
        assert_eq!(v.article, "ст. 7");
        assert!(v.law.is_empty());
        assert!(v.evidence_quote.is_empty());
    }
}
