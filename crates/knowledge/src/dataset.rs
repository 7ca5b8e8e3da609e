//! Counselling-conversation dataset loader.
//!
//! Reads JSON-lines exports where each row carries a client `Context` and a
//! therapist `Response`. Paired rows become conversation exemplars; rows
//! with only one side are kept as concern or response material. Rows with
//! neither fall back to the first common free-text field.

use cbtsim_core::error::KnowledgeError;
use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeKind};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

const TEXT_FIELDS: &[&str] = &["text", "content", "question", "answer", "dialogue", "conversation"];

fn field<'a>(row: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| row.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Convert one dataset row into a knowledge entry.
pub fn entry_from_row(row: &Value, source: &str) -> Option<KnowledgeEntry> {
    let context = field(row, &["Context", "context"]);
    let response = field(row, &["Response", "response"]);

    let entry = match (context, response) {
        (Some(c), Some(r)) => KnowledgeEntry::new(
            format!("Client: {c}\nTherapist: {r}"),
            KnowledgeKind::TherapyConversation,
        )
        .with_metadata("client_message", c)
        .with_metadata("therapist_response", r),
        (Some(c), None) => {
            KnowledgeEntry::new(format!("Client concern: {c}"), KnowledgeKind::ClientConcern)
        }
        (None, Some(r)) => KnowledgeEntry::new(
            format!("Therapeutic response: {r}"),
            KnowledgeKind::TherapeuticResponse,
        ),
        (None, None) => KnowledgeEntry::new(field(row, TEXT_FIELDS)?, KnowledgeKind::Reference),
    };

    let kind_type = entry_type(&entry);
    Some(entry.with_metadata("type", kind_type).with_source(source))
}

fn entry_type(entry: &KnowledgeEntry) -> &'static str {
    match entry.kind {
        KnowledgeKind::Reference => "therapy_dataset",
        other => other.as_str(),
    }
}

/// Parse JSONL content, reading at most `limit` usable rows.
///
/// Malformed lines and rows without usable text are skipped.
pub fn parse_jsonl(content: &str, source: &str, limit: Option<usize>) -> Vec<KnowledgeEntry> {
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in content.lines().enumerate() {
        if limit.is_some_and(|max| entries.len() >= max) {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping malformed dataset row");
                skipped += 1;
                continue;
            }
        };
        match entry_from_row(&row, source) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }

    debug!(source, loaded = entries.len(), skipped, "Dataset parsed");
    entries
}

/// Load a JSONL dataset file.
pub async fn load_jsonl(path: &Path, limit: Option<usize>) -> Result<Vec<KnowledgeEntry>, KnowledgeError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        KnowledgeError::InvalidDocument(format!("cannot read {}: {e}", path.display()))
    })?;

    let source = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    Ok(parse_jsonl(&content, source, limit))
}
