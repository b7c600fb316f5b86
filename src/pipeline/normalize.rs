//! Response normalizer.
//!
//! A local model asked for JSON may answer with plain JSON, JSON buried in
//! surrounding prose, or free text with no structure at all. The normalizer
//! reduces all of that to an explicit two-variant [`ModelReply`] instead of
//! probing shapes ad hoc; it never fabricates data — substituting fallbacks
//! is the caller's job.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::LlmError;

/// What the backend actually sent, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    /// The body was already a structured object (or array/number).
    Json(Value),
    /// The body carried generated text (an Ollama-style `response` field
    /// or a bare string).
    Text(String),
}

impl RawReply {
    /// Split a decoded HTTP body into its raw form.
    pub fn from_body(body: Value) -> Self {
        match body {
            Value::Object(mut map) => match map.remove("response") {
                Some(Value::String(text)) => RawReply::Text(text),
                Some(other) => {
                    map.insert("response".to_string(), other);
                    RawReply::Json(Value::Object(map))
                }
                None => RawReply::Json(Value::Object(map)),
            },
            Value::String(text) => RawReply::Text(text),
            other => RawReply::Json(other),
        }
    }
}

/// Normalized model reply, handled exhaustively by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Structured(Value),
    FreeText(String),
}

impl ModelReply {
    /// Uniform JSON view: free text becomes `{"response": text}`.
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::FreeText(text) => serde_json::json!({ "response": text }),
        }
    }
}

/// Extract a structured result from a raw reply.
///
/// Structured input passes through unchanged. Text input is scanned for a
/// `{...}` span (first `{` to last `}`) and parsed; a span that fails to
/// parse is a [`LlmError::Decode`]. Text with no span at all is a valid
/// free-text answer for some task types and comes back as `FreeText`.
pub fn normalize(raw: RawReply) -> Result<ModelReply, LlmError> {
    match raw {
        RawReply::Json(value) => Ok(ModelReply::Structured(value)),
        RawReply::Text(text) => {
            let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
                return Ok(ModelReply::FreeText(text));
            };
            if start > end {
                // A lone '}' before the first '{' is prose, not a span.
                return Ok(ModelReply::FreeText(text));
            }
            serde_json::from_str(&text[start..=end])
                .map(ModelReply::Structured)
                .map_err(|e| LlmError::Decode(e.to_string()))
        }
    }
}

/// Parse an array of values leniently — items that fail to deserialize are
/// skipped instead of poisoning the whole reply.
pub fn parse_array_lenient<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_payload_passes_through_unchanged() {
        let payload = json!({"summary": "кратко", "violations": []});
        let reply = normalize(RawReply::Json(payload.clone())).unwrap();
        assert_eq!(reply, ModelReply::Structured(payload));
    }

    #[test]
    fn normalizing_twice_is_idempotent() {
        let payload = json!({"content": "Жалоба"});
        let once = normalize(RawReply::Json(payload)).unwrap();
        let value = once.clone().into_value();
        let twice = normalize(RawReply::Json(value)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn json_embedded_in_prose_is_carved_out() {
        let text = "Вот результат анализа:\n{\"summary\": \"кратко\"}\nНадеюсь, это поможет.";
        let reply = normalize(RawReply::Text(text.to_string())).unwrap();
        assert_eq!(reply, ModelReply::Structured(json!({"summary": "кратко"})));
    }

    #[test]
    fn free_text_without_braces_is_wrapped_not_failed() {
        let reply = normalize(RawReply::Text("Просто текст ответа.".to_string())).unwrap();
        assert_eq!(reply, ModelReply::FreeText("Просто текст ответа.".to_string()));
        assert_eq!(
            reply.into_value(),
            json!({"response": "Просто текст ответа."})
        );
    }

    #[test]
    fn broken_brace_span_is_a_decode_error() {
        let result = normalize(RawReply::Text("{ сломанный json".to_string() + "}"));
        assert!(matches!(result, Err(LlmError::Decode(_))));
    }

    #[test]
    fn closing_brace_before_opening_is_free_text() {
        let reply = normalize(RawReply::Text("} а потом {".to_string())).unwrap();
        assert!(matches!(reply, ModelReply::FreeText(_)));
    }

    #[test]
    fn body_with_response_string_becomes_text() {
        let raw = RawReply::from_body(json!({"response": "{\"summary\": \"s\"}"}));
        assert_eq!(raw, RawReply::Text("{\"summary\": \"s\"}".to_string()));
    }

    #[test]
    fn body_without_response_stays_json() {
        let raw = RawReply::from_body(json!({"summary": "s"}));
        assert_eq!(raw, RawReply::Json(json!({"summary": "s"})));
    }

    #[test]
    fn body_with_non_string_response_stays_json() {
        let raw = RawReply::from_body(json!({"response": 42}));
        assert_eq!(raw, RawReply::Json(json!({"response": 42})));
    }

    #[test]
    fn lenient_parsing_skips_bad_items() {
        use crate::models::Violation;
        let items = vec![
            json!({"law": "ЗПП", "article": "ст. 25", "description": "", "evidenceQuote": ""}),
            json!("не объект"),
            json!({"article": "ст. 7"}),
        ];
        let parsed: Vec<Violation> = parse_array_lenient(&items);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].article, "ст. 25");
        assert_eq!(parsed[1].article, "ст. 7");
    }
}
