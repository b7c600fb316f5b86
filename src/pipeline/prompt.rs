//! Prompt builders — pure and deterministic, no I/O.
//!
//! Input text is cut to a fixed per-task character ceiling, counted from the
//! start of the text rather than at a semantic boundary. That is a cost
//! trade-off, not a correctness guarantee: local models choke on oversized
//! prompts long before they run out of context window.

use crate::models::ComplaintDocument;

/// Character ceiling for summary analysis input.
pub const ANALYSIS_INPUT_LIMIT: usize = 10_000;

/// Character ceiling for the primary document in complaint generation.
pub const COMPLAINT_MAIN_LIMIT: usize = 5_000;

/// Character ceiling per related document in complaint generation.
pub const COMPLAINT_RELATED_LIMIT: usize = 2_000;

/// Character ceiling for attachment classification input.
pub const CLASSIFICATION_INPUT_LIMIT: usize = 7_000;

/// At most this many key excerpts of the main document go into the
/// complaint prompt.
pub const COMPLAINT_MAX_EXCERPTS: usize = 10;

/// Statute families the analysis always checks the document against.
pub const STATUTE_CHECKLIST: &[&str] = &[
    "Закон РФ «О защите прав потребителей»",
    "Гражданский кодекс РФ",
    "Жилищный кодекс РФ",
    "Трудовой кодекс РФ",
    "КоАП РФ",
    "ФЗ «Об исполнительном производстве»",
    "ФЗ «О персональных данных»",
    "ФЗ «О порядке рассмотрения обращений граждан»",
];

/// Cut `text` to at most `limit` characters, respecting UTF-8 boundaries.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Analysis task prompt: 3–5 sentence summary, exactly 3 verbatim excerpts,
/// date/agency extraction, violations checked against [`STATUTE_CHECKLIST`].
///
/// Strict mode does not change this text — it only lowers the sampling
/// temperature on the orchestrator side.
pub fn build_analysis_prompt(text: &str, instructions: &str) -> String {
    let text = truncate_chars(text, ANALYSIS_INPUT_LIMIT);
    let checklist = STATUTE_CHECKLIST
        .iter()
        .map(|law| format!("- {law}"))
        .collect::<Vec<_>>()
        .join("\n");
    let instructions_block = if instructions.trim().is_empty() {
        String::new()
    } else {
        format!("Дополнительные указания: {}\n\n", instructions.trim())
    };

    format!(
        r#"Ты — юридический ассистент. Проанализируй текст документа и верни СТРОГО один JSON-объект без пояснений вокруг него.

{instructions_block}<document>
{text}
</document>

Требования к полям:
- "summary": краткое изложение сути документа, 3–5 предложений.
- "keyExcerpts": РОВНО 3 дословные цитаты из документа, без изменений.
- "violations": найденные нарушения законодательства. Проверь документ по списку:
{checklist}
  Для каждого нарушения укажи закон, статью, описание и дословную цитату-доказательство.
- "documentDate": дата документа в формате ГГГГ-ММ-ДД или null.
- "senderAgency": орган или организация — отправитель документа, или null.

Формат ответа:
{{
  "summary": "...",
  "keyExcerpts": ["...", "...", "..."],
  "violations": [
    {{"law": "...", "article": "...", "description": "...", "evidenceQuote": "..."}}
  ],
  "documentDate": "ГГГГ-ММ-ДД",
  "senderAgency": "..."
}}"#
    )
}

/// Complaint task prompt: condensed main document, count-only view of the
/// related documents (their summaries are clipped hard — never full text),
/// and formatting instructions demanding a single-field JSON object.
pub fn build_complaint_prompt(
    agency: &str,
    main: &ComplaintDocument,
    related: &[ComplaintDocument],
) -> String {
    let mut prompt = format!(
        "Ты — юрист, составляющий официальную жалобу от первого лица.\n\
         Адресат жалобы: {agency}.\n\n"
    );

    prompt.push_str("Основной документ:\n");
    if !main.summary.trim().is_empty() {
        prompt.push_str(&format!("Краткое содержание: {}\n", main.summary.trim()));
    }
    let text = truncate_chars(&main.original_text, COMPLAINT_MAIN_LIMIT);
    if !text.trim().is_empty() {
        prompt.push_str(&format!("Текст документа:\n{text}\n"));
    }
    if !main.key_excerpts.is_empty() {
        prompt.push_str("Ключевые цитаты:\n");
        for excerpt in main.key_excerpts.iter().take(COMPLAINT_MAX_EXCERPTS) {
            prompt.push_str(&format!("- {excerpt}\n"));
        }
    }
    if !main.violations.is_empty() {
        prompt.push_str("Выявленные нарушения:\n");
        for violation in &main.violations {
            prompt.push_str(&format!(
                "- {} {}: {}\n",
                violation.law, violation.article, violation.description
            ));
        }
    }
    if let Some(date) = main.document_date {
        prompt.push_str(&format!("Дата документа: {}\n", date.format("%d.%m.%Y")));
    }
    if let Some(sender) = &main.sender_agency {
        prompt.push_str(&format!("Отправитель: {sender}\n"));
    }

    prompt.push_str(&format!(
        "\nСвязанных документов в деле: {}.\n",
        related.len()
    ));
    for doc in related {
        let summary = truncate_chars(&doc.summary, COMPLAINT_RELATED_LIMIT);
        if !summary.trim().is_empty() {
            let date = doc
                .document_date
                .map(|d| d.format("%d.%m.%Y").to_string())
                .unwrap_or_else(|| "без даты".to_string());
            prompt.push_str(&format!("- ({date}) {summary}\n"));
        }
    }

    prompt.push_str(
        "\nНапиши текст жалобы: официальный стиль, от первого лица, со ссылками \
         на конкретные статьи законов из выявленных нарушений.\n\
         Верни СТРОГО один JSON-объект вида {\"content\": \"полный текст жалобы\"} \
         без какого-либо текста вокруг него.",
    );

    prompt
}

/// Attachment classification prompt: fixed JSON shape, nothing else.
pub fn build_classification_prompt(text: &str) -> String {
    let text = truncate_chars(text, CLASSIFICATION_INPUT_LIMIT);
    format!(
        r#"Определи тип приложенного документа и его реквизиты. Верни СТРОГО один JSON-объект.

<document>
{text}
</document>

Формат ответа:
{{
  "documentType": "постановление | ответ на обращение | уведомление | справка | договор | иное",
  "sentDate": "ГГГГ-ММ-ДД или null",
  "senderAgency": "орган-отправитель или null",
  "summary": "краткое содержание, 2-3 предложения",
  "keyExcerpts": ["дословная цитата", "дословная цитата"]
}}"#
    )
}
