use serde_json::Value;
use tracing::debug;

use crate::client::{GenerationClient, GenerationError, GenerationRequest};

const LOG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("model output is not valid JSON: {error}")]
    MalformedOutput { error: String, raw_output: String },
}

impl StageError {
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            StageError::Generation(_) => None,
            StageError::MalformedOutput { raw_output, .. } => Some(raw_output),
        }
    }
}

pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// First balanced `{...}` block in `text`, skipping braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_model_json(raw: &str) -> Result<Value, StageError> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(error) => extract_json_object(cleaned)
            .and_then(|candidate| serde_json::from_str(candidate).ok())
            .ok_or_else(|| StageError::MalformedOutput {
                error: error.to_string(),
                raw_output: raw.to_string(),
            }),
    }
}

pub async fn generate_json<C>(client: &C, request: GenerationRequest<'_>) -> Result<Value, StageError>
where
    C: GenerationClient + ?Sized,
{
    debug!(stage = %request.stage, prompt = %preview(request.prompt), "prompt");
    let raw = client.generate(request).await?;
    debug!(stage = %request.stage, bytes = raw.len(), output = %preview(&raw), "model output");
    parse_model_json(&raw)
}

pub(crate) fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
