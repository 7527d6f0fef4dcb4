//! OCR layout blocks and their plain-text rendering
//!
//! Each page contributes to two text files: the raw text of every non-cell
//! block, and the page's tables laid out as fixed-width rows.

use super::raster::PageImage;
use super::TextExtractor;
use crate::artifacts::ArtifactSet;
use crate::error::{SheetfillError, SheetfillResult};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info};

const CELL_WIDTH: usize = 20;
const TABLE_RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Cell,
    Table,
    /// Pages, lines, words, key-value sets and anything else
    Other(String),
}

impl BlockKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "CELL" => BlockKind::Cell,
            "TABLE" => BlockKind::Table,
            other => BlockKind::Other(other.to_string()),
        }
    }
}

/// One element of a page's layout analysis
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBlock {
    pub id: String,
    pub kind: BlockKind,
    pub text: Option<String>,
    /// 1-based, cells only
    pub row_index: Option<u32>,
    pub column_index: Option<u32>,
    /// Ids of CHILD relationships
    pub children: Vec<String>,
}

impl LayoutBlock {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            text: None,
            row_index: None,
            column_index: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn at(mut self, row: u32, column: u32) -> Self {
        self.row_index = Some(row);
        self.column_index = Some(column);
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }
}

/// Rendered text of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub raw_text: String,
    pub tables: String,
}

pub fn render_page(page_number: usize, blocks: &[LayoutBlock]) -> PageText {
    let banner = format!("\n\n=== Page {} ===\n\n", page_number);
    let mut raw_text = banner.clone();
    let mut tables = banner;

    for block in blocks {
        if block.kind == BlockKind::Cell {
            continue;
        }
        if let Some(text) = &block.text {
            raw_text.push_str(text);
            raw_text.push('\n');
        }
    }

    let by_id: HashMap<&str, &LayoutBlock> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();
    let table_blocks: Vec<&LayoutBlock> =
        blocks.iter().filter(|b| b.kind == BlockKind::Table).collect();

    if !table_blocks.is_empty() {
        tables.push_str(&format!(
            "Found {} tables on page {}\n\n",
            table_blocks.len(),
            page_number
        ));
        for (i, table) in table_blocks.iter().enumerate() {
            tables.push_str(&format!("Table {}:\n", i + 1));
            if table.children.is_empty() {
                continue;
            }
            tables.push_str(&render_table(table, &by_id));
            tables.push('\n');
            tables.push_str(&"-".repeat(TABLE_RULE_WIDTH));
            tables.push_str("\n\n");
        }
    }

    PageText { raw_text, tables }
}

fn render_table(table: &LayoutBlock, by_id: &HashMap<&str, &LayoutBlock>) -> String {
    let mut cells: BTreeMap<(u32, u32), String> = BTreeMap::new();
    let mut max_row = 0;
    let mut max_col = 0;

    for cell in table
        .children
        .iter()
        .filter_map(|id| by_id.get(id.as_str()))
        .filter(|b| b.kind == BlockKind::Cell)
    {
        let (Some(row), Some(col)) = (cell.row_index, cell.column_index) else {
            continue;
        };
        max_row = max_row.max(row);
        max_col = max_col.max(col);

        let content: Vec<&str> = cell
            .children
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .filter_map(|word| word.text.as_deref())
            .collect();
        cells.insert((row, col), content.join(" ").trim().to_string());
    }

    let mut out = String::new();
    for row in 1..=max_row {
        let formatted: Vec<String> = (1..=max_col)
            .map(|col| {
                let text = cells.get(&(row, col)).map(String::as_str).unwrap_or("");
                format!("{:<width$}", text, width = CELL_WIDTH)
            })
            .collect();
        out.push_str(&formatted.join(" | "));
        out.push('\n');
    }
    out
}

/// Run layout analysis over every page and write the raw-text and table
/// files. Both paths are registered in `artifacts`.
pub async fn extract_text_and_tables(
    extractor: &dyn TextExtractor,
    pages: &[PageImage],
    artifacts: &mut ArtifactSet,
) -> SheetfillResult<(PathBuf, PathBuf)> {
    let raw_path = artifacts.reserve("_rawtext.txt");
    let table_path = artifacts.reserve("_tables.txt");

    let mut raw_text = String::new();
    let mut tables = String::new();

    for (i, page) in pages.iter().enumerate() {
        let page_number = i + 1;
        let image = tokio::fs::read(&page.path).await?;
        let blocks = extractor.analyze_page(&image).await.map_err(|e| match e {
            SheetfillError::UpstreamCallFailure(msg) => SheetfillError::UpstreamCallFailure(
                format!("AWS Textract API error on page {}: {}", page_number, msg),
            ),
            other => other,
        })?;
        debug!(page = page_number, blocks = blocks.len(), "Page analyzed");

        let rendered = render_page(page_number, &blocks);
        raw_text.push_str(&rendered.raw_text);
        tables.push_str(&rendered.tables);
    }

    tokio::fs::write(&raw_path, raw_text).await?;
    tokio::fs::write(&table_path, tables).await?;

    info!(pages = pages.len(), "Text and tables extracted");
    Ok((raw_path, table_path))
}
