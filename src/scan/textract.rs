//! AWS Textract layout analysis

use super::layout::{BlockKind, LayoutBlock};
use super::TextExtractor;
use crate::error::{SheetfillError, SheetfillResult};
use async_trait::async_trait;
use aws_sdk_textract::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::primitives::Blob;
use aws_sdk_textract::types::{Block, Document, FeatureType, RelationshipType};
use aws_sdk_textract::{Client, Config};
use tracing::debug;

/// `AnalyzeDocument` with tables, forms and signatures
pub struct TextractExtractor {
    client: Client,
}

impl TextractExtractor {
    pub fn new(region: &str, access_key_id: &str, secret_access_key: &str) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "sheetfill",
        );
        let config = Config::builder()
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .behavior_version(BehaviorVersion::latest())
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl TextExtractor for TextractExtractor {
    async fn analyze_page(&self, image: &[u8]) -> SheetfillResult<Vec<LayoutBlock>> {
        debug!(bytes = image.len(), "Calling Textract AnalyzeDocument");
        let output = self
            .client
            .analyze_document()
            .document(Document::builder().bytes(Blob::new(image.to_vec())).build())
            .feature_types(FeatureType::Tables)
            .feature_types(FeatureType::Forms)
            .feature_types(FeatureType::Signatures)
            .send()
            .await
            .map_err(|e| {
                SheetfillError::UpstreamCallFailure(DisplayErrorContext(&e).to_string())
            })?;

        Ok(output.blocks().iter().map(convert_block).collect())
    }
}

fn convert_block(block: &Block) -> LayoutBlock {
    let kind = block
        .block_type()
        .map(|t| BlockKind::from_name(t.as_str()))
        .unwrap_or_else(|| BlockKind::Other(String::new()));

    let children = block
        .relationships()
        .iter()
        .filter(|r| r.r#type() == Some(&RelationshipType::Child))
        .flat_map(|r| r.ids().iter().cloned())
        .collect();

    LayoutBlock {
        id: block.id().unwrap_or_default().to_string(),
        kind,
        text: block.text().map(str::to_string),
        row_index: block.row_index().and_then(|i| u32::try_from(i).ok()),
        column_index: block.column_index().and_then(|i| u32::try_from(i).ok()),
        children,
    }
}
