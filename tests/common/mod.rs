//! Shared fixtures: generated workbooks, fake collaborators, multipart bodies

#![allow(dead_code)]

use async_trait::async_trait;
use royalbit_sheetfill::error::{SheetfillError, SheetfillResult};
use royalbit_sheetfill::scan::{
    BlockKind, Collaborators, LanguageModel, LayoutBlock, PromptPart, TextExtractor,
};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Two-sheet inspection template:
///
/// - Inspection: A1 title, A2:C2 "Customer" merged, A4:E4 "JOB #:" merged,
///   F4 empty, A6 = 58.427
/// - Notes: A1 "second sheet"
pub fn inspection_template(path: &Path) {
    let mut workbook = Workbook::new();
    let merged = Format::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Inspection").unwrap();
    sheet.write_string(0, 0, "INSPECTION REPORT").unwrap();
    sheet.merge_range(1, 0, 1, 2, "Customer", &merged).unwrap();
    sheet.merge_range(3, 0, 3, 4, "JOB #:", &merged).unwrap();
    sheet.write_number(5, 0, 58.427).unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "second sheet").unwrap();

    workbook.save(path).unwrap();
}

pub fn inspection_template_bytes(dir: &Path) -> Vec<u8> {
    let path = dir.join("fixture-template.xlsx");
    inspection_template(&path);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    bytes
}

/// Single-sheet workbook with `rows` rows of 40 numbers each
pub fn bulky_template_bytes(dir: &Path, rows: u32) -> Vec<u8> {
    let path = dir.join("fixture-bulky.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Readings").unwrap();
    for row in 0..rows {
        for col in 0..40u16 {
            sheet
                .write_number(row, col, f64::from(row) * 0.5 + f64::from(col))
                .unwrap();
        }
    }
    workbook.save(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    bytes
}

/// Cell value as text from a saved workbook (empty when unset)
pub fn cell_text(path: &Path, sheet: &str, address: &str) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    book.get_sheet_by_name(sheet)
        .unwrap()
        .get_cell(address)
        .map(|c| c.get_value().to_string())
        .unwrap_or_default()
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// OCR fake returning the same blocks for every page
pub struct FakeExtractor {
    blocks: Vec<LayoutBlock>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn with_lines(lines: &[&str]) -> Self {
        let blocks = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                LayoutBlock::new(format!("line-{}", i), BlockKind::Other("LINE".into()))
                    .with_text(*line)
            })
            .collect();
        Self {
            blocks,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn analyze_page(&self, _image: &[u8]) -> SheetfillResult<Vec<LayoutBlock>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blocks.clone())
    }
}

/// Model fake answering from a script, recording every prompt
pub struct ScriptedModel {
    replies: Mutex<VecDeque<SheetfillResult<String>>>,
    pub prompts: Mutex<Vec<Vec<PromptPart>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<SheetfillResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Text parts of the n-th prompt, joined
    pub fn prompt_text(&self, n: usize) -> String {
        self.prompts.lock().unwrap()[n]
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, parts: Vec<PromptPart>) -> SheetfillResult<String> {
        self.prompts.lock().unwrap().push(parts);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SheetfillError::UpstreamCallFailure("script exhausted".into())))
    }
}

/// Collaborators for the F4 scenario: the scan reads "Job Number: 205274-101"
/// and the model maps it to F4
pub fn job_number_collaborators() -> (Collaborators, Arc<FakeExtractor>, Arc<ScriptedModel>) {
    let extractor = Arc::new(FakeExtractor::with_lines(&["Job Number: 205274-101"]));
    let model = Arc::new(ScriptedModel::replying(&[
        "```markdown\n# Inspection\n\nJob Number: 205274-101\n```",
        "```json\n{\"F4\": \"205274-101\"}\n```",
    ]));
    let collaborators = Collaborators::new(extractor.clone(), model.clone());
    (collaborators, extractor, model)
}

/// Minimal multipart/form-data encoder
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "sheetfill-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    /// (content type, body)
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
