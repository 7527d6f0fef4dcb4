//! Page images + OCR context → markdown transcription

use super::prompts::{raw_text_context, table_context, ENHANCEMENT_PROMPT};
use super::raster::PageImage;
use super::{strip_code_fence, LanguageModel, PromptPart};
use crate::error::SheetfillResult;
use std::path::Path;
use tracing::info;

pub async fn enhance_to_markdown(
    model: &dyn LanguageModel,
    pages: &[PageImage],
    raw_text_path: &Path,
    table_path: &Path,
) -> SheetfillResult<String> {
    let raw_text = tokio::fs::read_to_string(raw_text_path).await?;
    let tables = tokio::fs::read_to_string(table_path).await?;

    let mut parts = vec![
        PromptPart::text(ENHANCEMENT_PROMPT),
        PromptPart::Text(raw_text_context(&raw_text)),
        PromptPart::Text(table_context(&tables)),
    ];
    for page in pages {
        parts.push(PromptPart::Image {
            mime_type: page.mime_type.to_string(),
            data: tokio::fs::read(&page.path).await?,
        });
    }

    let response = model.generate(parts).await?;
    let markdown = strip_code_fence(&response).to_string();

    info!(pages = pages.len(), chars = markdown.len(), "Scan transcribed to markdown");
    Ok(markdown)
}
