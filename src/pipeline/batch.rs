//! Whole-document batch analysis: main text first, then every attachment
//! with extractable text, one at a time. Attachments are processed
//! sequentially to bound load on the shared model backend, and a failure on
//! one attachment degrades to a placeholder for that attachment alone —
//! partial success is the normal case here, not an exception.

use serde::Serialize;
use uuid::Uuid;

use super::analysis::DocumentAnalyzer;
use super::ollama::LlmClient;
use crate::models::{AnalysisResult, AttachmentAnalysis};

/// Input to batch analysis. Attachment text extraction happens upstream.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub id: Uuid,
    pub text: String,
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Debug, Clone)]
pub struct AttachmentInput {
    pub filename: String,
    pub extracted_text: Option<String>,
}

/// Per-attachment outcome within one batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReport {
    pub filename: String,
    pub analysis: AttachmentAnalysis,
}

/// Combined result: the main document's analysis plus one report per
/// attachment that carried text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub attachments: Vec<AttachmentReport>,
}

impl<C: LlmClient> DocumentAnalyzer<C> {
    /// Analyze a document and all of its attachments. Never fails: the main
    /// analysis degrades to a diagnostic placeholder, and so does each
    /// attachment independently.
    pub async fn analyze_document(&self, document: &DocumentInput) -> DocumentAnalysis {
        tracing::info!(
            doc_id = %document.id,
            attachments = document.attachments.len(),
            "batch analysis started"
        );
        let analysis = self
            .analyze_or_placeholder(&document.text, "", false)
            .await;

        let mut attachments = Vec::new();
        for attachment in &document.attachments {
            let analysis = match &attachment.extracted_text {
                Some(text) if !text.trim().is_empty() => {
                    match self.classify_attachment(text).await {
                        Ok(result) => result,
                        Err(error) => {
                            tracing::warn!(
                                doc_id = %document.id,
                                filename = %attachment.filename,
                                error = %error,
                                "attachment analysis failed, degrading to placeholder"
                            );
                            AttachmentAnalysis::placeholder(error)
                        }
                    }
                }
                _ => AttachmentAnalysis::placeholder("текст вложения не был извлечён"),
            };
            attachments.push(AttachmentReport {
                filename: attachment.filename.clone(),
                analysis,
            });
        }

        DocumentAnalysis {
            analysis,
            attachments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cache::AnalysisCache;
    use crate::pipeline::ollama::{MockLlmClient, QueryOrchestrator, ScriptedReply};
    use serde_json::json;
    use std::sync::Arc;

    fn analyzer(client: MockLlmClient) -> DocumentAnalyzer<MockLlmClient> {
        DocumentAnalyzer::new(
            QueryOrchestrator::new(client, "llama3.1:8b"),
            Arc::new(AnalysisCache::default()),
        )
    }

    fn document(attachments: Vec<AttachmentInput>) -> DocumentInput {
        DocumentInput {
            id: Uuid::new_v4(),
            text: "Постановление пристава о взыскании долга".to_string(),
            attachments,
        }
    }

    fn analysis_json() -> String {
        json!({
            "summary": "Постановление о взыскании.",
            "keyExcerpts": ["о взыскании долга"],
            "violations": []
        })
        .to_string()
    }

    fn classification_json() -> String {
        json!({
            "documentType": "постановление",
            "sentDate": null,
            "senderAgency": null,
            "summary": "Сопроводительное письмо.",
            "keyExcerpts": []
        })
        .to_string()
    }

    #[tokio::test]
    async fn analyzes_main_text_and_each_attachment() {
        let client = MockLlmClient::scripted(vec![
            ScriptedReply::Text(analysis_json()),
            ScriptedReply::Text(classification_json()),
            ScriptedReply::Text(classification_json()),
        ]);
        let analyzer = analyzer(client.clone());
        let doc = document(vec![
            AttachmentInput {
                filename: "scan1.pdf".into(),
                extracted_text: Some("Сопроводительное письмо со всеми деталями".into()),
            },
            AttachmentInput {
                filename: "scan2.pdf".into(),
                extracted_text: Some("Ещё одно сопроводительное письмо".into()),
            },
        ]);

        let result = analyzer.analyze_document(&doc).await;

        assert_eq!(client.calls(), 3);
        assert_eq!(result.analysis.summary, "Постановление о взыскании.");
        assert_eq!(result.attachments.len(), 2);
        assert_eq!(result.attachments[0].analysis.document_type, "постановление");
    }

    #[tokio::test]
    async fn one_failing_attachment_does_not_abort_the_batch() {
        let client = MockLlmClient::scripted(vec![
            ScriptedReply::Text(analysis_json()),
            ScriptedReply::Text("{ сломанный json }".into()),
            ScriptedReply::Text(classification_json()),
        ]);
        let analyzer = analyzer(client);
        let doc = document(vec![
            AttachmentInput {
                filename: "bad.pdf".into(),
                extracted_text: Some("Нечитаемый скан с артефактами распознавания".into()),
            },
            AttachmentInput {
                filename: "good.pdf".into(),
                extracted_text: Some("Нормальное сопроводительное письмо".into()),
            },
        ]);

        let result = analyzer.analyze_document(&doc).await;

        assert_eq!(result.attachments.len(), 2);
        assert!(result.attachments[0]
            .analysis
            .summary
            .contains("Не удалось проанализировать вложение"));
        assert_eq!(result.attachments[1].analysis.summary, "Сопроводительное письмо.");
    }

    #[tokio::test]
    async fn attachment_without_text_gets_placeholder_without_model_call() {
        let client = MockLlmClient::text(&analysis_json());
        let analyzer = analyzer(client.clone());
        let doc = document(vec![AttachmentInput {
            filename: "photo.jpg".into(),
            extracted_text: None,
        }]);

        let result = analyzer.analyze_document(&doc).await;

        assert_eq!(client.calls(), 1, "only the main text hits the model");
        assert!(result.attachments[0]
            .analysis
            .summary
            .contains("текст вложения не был извлечён"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_main_analysis_degrades_to_placeholder() {
        let client = MockLlmClient::scripted(vec![ScriptedReply::ConnectionRefused]);
        let analyzer = analyzer(client);
        let doc = document(vec![]);

        let result = analyzer.analyze_document(&doc).await;
        assert!(!result.analysis.summary.is_empty());
        assert!(result.analysis.summary.contains("Не удалось"));
    }
}
