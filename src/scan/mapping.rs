//! Template outline + scan markdown → address/value mapping

use super::prompts::mapping_prompt;
use super::{LanguageModel, PromptPart};
use crate::error::{SheetfillError, SheetfillResult};
use crate::types::AddressValueMap;
use serde_json::Value;
use tracing::{debug, info};

const RESPONSE_EXCERPT_CHARS: usize = 500;

/// Ask the model which template cells receive which scanned values
pub async fn compute_mapping(
    model: &dyn LanguageModel,
    template_text: &str,
    scan_markdown: &str,
) -> SheetfillResult<AddressValueMap> {
    let prompt = mapping_prompt(template_text, scan_markdown);
    debug!(prompt_chars = prompt.len(), "Requesting cell mapping");

    let response = model.generate(vec![PromptPart::Text(prompt)]).await?;
    let mapping = parse_mapping_response(&response)?;

    info!(entries = mapping.len(), "Cell mapping computed");
    Ok(mapping)
}

/// Parse the model's answer into a flat address → scalar map.
///
/// Tolerates a surrounding code fence and prose around the object.
pub fn parse_mapping_response(raw: &str) -> SheetfillResult<AddressValueMap> {
    let cleaned = strip_code_fence(raw);

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(first_error) => outermost_object(cleaned)
            .and_then(|candidate| serde_json::from_str(candidate).ok())
            .ok_or_else(|| invalid_mapping(&first_error.to_string(), raw))?,
    };

    AddressValueMap::from_json_value(value).map_err(|reason| invalid_mapping(&reason, raw))
}

/// Remove a leading ```` ```lang ```` and trailing ```` ``` ```` fence
pub fn strip_code_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let lang_end = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        s = &rest[lang_end..];
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn invalid_mapping(reason: &str, raw: &str) -> SheetfillError {
    let excerpt: String = raw.chars().take(RESPONSE_EXCERPT_CHARS).collect();
    SheetfillError::UpstreamCallFailure(format!(
        "Gemini returned an invalid mapping: {}\nRaw response: {}",
        reason, excerpt
    ))
}
