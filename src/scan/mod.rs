//! Scanned-document collaborators
//!
//! The OCR service and the language model sit behind the [`TextExtractor`]
//! and [`LanguageModel`] traits. Concrete clients (AWS Textract, Gemini) are
//! built once per process from configuration and handed to the pipeline as
//! [`Collaborators`]; tests substitute fakes.

pub mod gemini;
pub mod layout;
pub mod mapping;
pub mod markdown;
pub mod prompts;
pub mod raster;
pub mod textract;

use crate::config::ServiceConfig;
use crate::error::{SheetfillError, SheetfillResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub use layout::{extract_text_and_tables, BlockKind, LayoutBlock, PageText};
pub use mapping::{compute_mapping, parse_mapping_response, strip_code_fence};
pub use markdown::enhance_to_markdown;
pub use raster::{PageImage, Rasterizer, SCAN_EXTENSIONS};

/// OCR / layout analysis of a single page image
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Analyze one page (PNG or JPEG bytes) and return its layout blocks
    async fn analyze_page(&self, image: &[u8]) -> SheetfillResult<Vec<LayoutBlock>>;
}

/// One piece of a multimodal prompt
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl PromptPart {
    pub fn text(s: impl Into<String>) -> Self {
        PromptPart::Text(s.into())
    }
}

/// Text generation from a multimodal prompt
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, parts: Vec<PromptPart>) -> SheetfillResult<String>;
}

/// Process-wide clients shared by every request.
///
/// A collaborator that could not be constructed (missing credentials) is
/// kept as the reason it is unavailable; requests that need it fail with
/// `UpstreamUnavailable`, the rest of the service keeps working.
#[derive(Clone)]
pub struct Collaborators {
    extractor: Result<Arc<dyn TextExtractor>, String>,
    model: Result<Arc<dyn LanguageModel>, String>,
    rasterizer: Rasterizer,
}

impl Collaborators {
    pub fn new(extractor: Arc<dyn TextExtractor>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            extractor: Ok(extractor),
            model: Ok(model),
            rasterizer: Rasterizer::default(),
        }
    }

    /// No OCR or model available; workbook-only routes still work
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            extractor: Err(reason.clone()),
            model: Err(reason),
            rasterizer: Rasterizer::default(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let extractor: Result<Arc<dyn TextExtractor>, String> =
            match (&config.aws_access_key_id, &config.aws_secret_access_key) {
                (Some(key_id), Some(secret)) => {
                    info!(region = %config.aws_region, "AWS Textract client configured");
                    Ok(Arc::new(textract::TextractExtractor::new(
                        &config.aws_region,
                        key_id,
                        secret,
                    )))
                }
                _ => {
                    warn!("AWS credentials not found; scan routes will be unavailable");
                    Err("AWS credentials not found in environment variables".to_string())
                }
            };

        let model: Result<Arc<dyn LanguageModel>, String> = match &config.gemini_api_key {
            Some(key) => gemini::GeminiModel::new(key, &config.gemini_model)
                .map(|m| {
                    info!(model = %config.gemini_model, "Gemini client configured");
                    Arc::new(m) as Arc<dyn LanguageModel>
                })
                .map_err(|e| format!("Failed to initialize Gemini client: {}", e)),
            None => {
                warn!("GEMINI_API_KEY not found; scan routes will be unavailable");
                Err("GEMINI_API_KEY not found in environment variables".to_string())
            }
        };

        Self {
            extractor,
            model,
            rasterizer: Rasterizer::new(config.pdftoppm.clone()).with_dpi(config.pdf_dpi),
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Rasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn extractor(&self) -> SheetfillResult<Arc<dyn TextExtractor>> {
        self.extractor
            .clone()
            .map_err(SheetfillError::UpstreamUnavailable)
    }

    pub fn model(&self) -> SheetfillResult<Arc<dyn LanguageModel>> {
        self.model.clone().map_err(SheetfillError::UpstreamUnavailable)
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_collaborators_report_reason() {
        let collaborators = Collaborators::unavailable("GEMINI_API_KEY not found");
        match collaborators.model() {
            Err(SheetfillError::UpstreamUnavailable(reason)) => {
                assert_eq!(reason, "GEMINI_API_KEY not found")
            }
            _ => panic!("expected UpstreamUnavailable"),
        }
        assert!(collaborators.extractor().is_err());
    }

    #[test]
    fn test_from_config_without_credentials() {
        let config = ServiceConfig::default();
        let collaborators = Collaborators::from_config(&config);

        let err = collaborators.extractor().err().unwrap();
        assert!(err.to_string().contains("AWS credentials not found"));
        let err = collaborators.model().err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY not found"));
        assert_eq!(collaborators.rasterizer().dpi(), 200);
    }

    #[test]
    fn test_from_config_applies_pdf_dpi() {
        let config = ServiceConfig {
            pdf_dpi: 150,
            ..ServiceConfig::default()
        };
        let collaborators = Collaborators::from_config(&config);
        assert_eq!(collaborators.rasterizer().dpi(), 150);
    }
}
