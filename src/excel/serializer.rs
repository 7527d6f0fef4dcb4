//! Grid serializer - workbook (.xlsx) → address-keyed text outline
//!
//! Output shape, one line per populated cell:
//!
//! ```text
//! # template.xlsx
//!
//!
//! ## Sheet1
//!
//! A4: "JOB #:" (merged range: A4:E4)
//! F4: "205274-101"
//! ```

use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::address::CellAddress;
use crate::excel::merged::{MergeBounds, MergedRegionIndex};
use calamine::{open_workbook, Data, Dimensions, Range, Reader, Xlsx};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Substituted for a cell whose value cannot be rendered as text
pub const CONVERSION_SENTINEL: &str = "[Error converting value]";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date serials beyond this many days cannot be turned into a timestamp
const MAX_DATE_SERIAL_DAYS: f64 = 1.0e11;

/// One populated cell, value already rendered
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotCell {
    pub address: CellAddress,
    pub value: String,
}

/// Populated cells of a sheet in row-major, then column order
pub type SheetSnapshot = Vec<SnapshotCell>;

/// Serializes every sheet of a workbook into the text outline
pub struct GridSerializer {
    path: PathBuf,
    title: Option<String>,
}

impl GridSerializer {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            title: None,
        }
    }

    /// Header title; defaults to the workbook's file name
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn serialize(&self) -> SheetfillResult<String> {
        let shown = self.path.display().to_string();
        info!(path = %shown, "Serializing workbook");

        if !self.path.exists() {
            return Err(SheetfillError::UnreadableWorkbook(format!(
                "Excel file not found at path: {}",
                shown
            )));
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(|e| {
            SheetfillError::UnreadableWorkbook(format!(
                "Invalid or corrupted Excel file {}: {}",
                shown, e
            ))
        })?;

        let merges_loaded = match workbook.load_merged_regions() {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %shown, error = %e, "Could not read merged regions, continuing without them");
                false
            }
        };

        let title = self.title.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| shown.clone())
        });

        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(SheetfillError::SheetNotFound(format!(
                "{} contains no worksheets",
                shown
            )));
        }

        let mut output = vec![format!("# {}\n", title)];
        let mut rendered_sheets = 0;

        for sheet_name in sheet_names {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    warn!(sheet = %sheet_name, error = %e, "Skipping unreadable worksheet");
                    continue;
                }
            };

            let index = if merges_loaded {
                MergedRegionIndex::build(
                    workbook
                        .merged_regions_by_sheet(&sheet_name)
                        .into_iter()
                        .map(|(_, _, dims)| bounds_from_dimensions(dims)),
                )
            } else {
                MergedRegionIndex::default()
            };

            output.push(format!("\n## {}\n", sheet_name));
            output.extend(render_sheet_lines(&range, &index));
            rendered_sheets += 1;
        }

        if rendered_sheets == 0 {
            return Err(SheetfillError::SheetNotFound(format!(
                "no readable worksheets in {}",
                shown
            )));
        }

        info!(path = %shown, sheets = rendered_sheets, "Workbook serialized");
        Ok(output.join("\n"))
    }
}

/// calamine reports merges as 0-based (row, col) corners
fn bounds_from_dimensions(dims: &Dimensions) -> MergeBounds {
    MergeBounds::new(
        dims.start.0 + 1,
        dims.start.1 + 1,
        dims.end.0 + 1,
        dims.end.1 + 1,
    )
}

/// Populated cells of a range with their absolute addresses
pub fn snapshot(range: &Range<Data>) -> SheetSnapshot {
    let Some((row0, col0)) = range.start() else {
        return Vec::new();
    };

    range
        .cells()
        .filter_map(|(r, c, data)| {
            let address = CellAddress::new(row0 + r as u32 + 1, col0 + c as u32 + 1).ok()?;
            let value = match stringify(data) {
                Ok(value) => value,
                Err(reason) => {
                    warn!(cell = %address, %reason, "Value conversion failed, using sentinel");
                    CONVERSION_SENTINEL.to_string()
                }
            };
            if value.trim().is_empty() {
                return None;
            }
            Some(SnapshotCell { address, value })
        })
        .collect()
}

/// Data lines for one sheet, annotated with merge ranges
pub fn render_sheet_lines(range: &Range<Data>, index: &MergedRegionIndex) -> Vec<String> {
    let cells = snapshot(range);
    debug!(cells = cells.len(), merged = index.len(), "Rendering sheet");

    cells
        .into_iter()
        .map(|cell| {
            let merge_info = index
                .get(&cell.address)
                .map(|target| format!(" (merged range: {})", target.range))
                .unwrap_or_default();
            format!("{}: \"{}\"{}  ", cell.address, cell.value, merge_info)
        })
        .collect()
}

/// Locale-independent text for a cell value
fn stringify(cell: &Data) -> Result<String, String> {
    match cell {
        Data::Empty => Ok(String::new()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Ok(s.clone()),
        Data::Int(i) => Ok(i.to_string()),
        Data::Float(f) => Ok(f.to_string()),
        Data::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Ok(e.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if !serial.is_finite() || serial.abs() > MAX_DATE_SERIAL_DAYS {
                return Err(format!("date serial {} is out of range", serial));
            }
            dt.as_datetime()
                .map(|d: chrono::NaiveDateTime| d.format(DATETIME_FORMAT).to_string())
                .ok_or_else(|| format!("date serial {} is out of range", serial))
        }
    }
}
