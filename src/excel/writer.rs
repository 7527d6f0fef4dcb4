//! Grid writer - apply address → value assignments onto a template
//!
//! Writes aimed at any cell of a merged region land on the region's
//! canonical (top-left) cell. Bad entries are recorded and skipped; only
//! workbook-level failures abort the fill.

use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::address::{parse_address, CellAddress};
use crate::excel::merged::{MergeBounds, MergedRegionIndex};
use crate::types::{AddressValueMap, CellValue};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use umya_spreadsheet::Worksheet;

/// Which sheet of the template receives the values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SheetSelector {
    /// First sheet in workbook order
    #[default]
    Primary,
    Named(String),
}

impl SheetSelector {
    fn describe(&self) -> String {
        match self {
            SheetSelector::Primary => "primary sheet".to_string(),
            SheetSelector::Named(name) => format!("sheet '{}'", name),
        }
    }
}

/// What happened to one requested assignment
#[derive(Debug, Clone, PartialEq)]
pub enum CellOutcome {
    Written { target: CellAddress },
    Redirected { target: CellAddress, range: String },
    Skipped { reason: String },
}

/// Per-entry outcomes of a fill, in the order the entries were applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    pub outcomes: Vec<(String, CellOutcome)>,
}

impl FillReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, CellOutcome::Skipped { .. }))
            .count()
    }

    /// Addresses that were not written, with the reason
    pub fn skipped(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(address, outcome)| match outcome {
                CellOutcome::Skipped { reason } => Some((address.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self, address: &str) -> Option<&CellOutcome> {
        self.outcomes
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, o)| o)
    }
}

/// Fills a template workbook and saves the result elsewhere
pub struct GridWriter {
    template: PathBuf,
    sheet: SheetSelector,
}

impl GridWriter {
    pub fn new<P: AsRef<Path>>(template: P) -> Self {
        Self {
            template: template.as_ref().to_path_buf(),
            sheet: SheetSelector::default(),
        }
    }

    pub fn with_sheet(mut self, sheet: SheetSelector) -> Self {
        self.sheet = sheet;
        self
    }

    /// Apply `values` to the selected sheet and save to `output`.
    ///
    /// The template itself is left unchanged.
    pub fn fill(&self, values: &AddressValueMap, output: &Path) -> SheetfillResult<FillReport> {
        let template = self.template.display().to_string();
        info!(template = %template, entries = values.len(), "Filling template");

        if !self.template.exists() {
            return Err(SheetfillError::TemplateNotFound(template));
        }

        let mut book = umya_spreadsheet::reader::xlsx::read(&self.template)
            .map_err(|e| SheetfillError::InvalidWorkbook(format!("{}: {}", template, e)))?;

        let sheet = match &self.sheet {
            SheetSelector::Primary => book.get_sheet_mut(&0),
            SheetSelector::Named(name) => book.get_sheet_by_name_mut(name),
        }
        .ok_or_else(|| {
            SheetfillError::RequiredSheetMissing(format!(
                "{} not found in {}",
                self.sheet.describe(),
                template
            ))
        })?;

        let index = merged_index(sheet);
        let report = apply_values(sheet, &index, values);

        umya_spreadsheet::writer::xlsx::write(&book, output).map_err(|e| {
            SheetfillError::WriteFailure(format!("{}: {}", output.display(), e))
        })?;

        info!(
            output = %output.display(),
            written = report.written(),
            skipped = report.skipped().len(),
            "Template filled"
        );
        Ok(report)
    }
}

/// Merged-region index for a loaded worksheet
pub fn merged_index(sheet: &Worksheet) -> MergedRegionIndex {
    MergedRegionIndex::build(
        sheet
            .get_merge_cells()
            .iter()
            .map(|range| MergeBounds::from_range(&range.get_range())),
    )
}

/// Write every entry, redirecting merged cells to their canonical cell.
///
/// Never fails as a whole: each entry gets an outcome.
pub fn apply_values(
    sheet: &mut Worksheet,
    index: &MergedRegionIndex,
    values: &AddressValueMap,
) -> FillReport {
    let mut report = FillReport::default();

    for (address, value) in values.iter() {
        let outcome = match resolve_target(address, index) {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(cell = %address, value = %value, %reason, "Skipping cell");
                CellOutcome::Skipped { reason }
            }
        };

        match &outcome {
            CellOutcome::Written { target } | CellOutcome::Redirected { target, .. } => {
                write_value(sheet, *target, value);
            }
            CellOutcome::Skipped { .. } => {}
        }
        report.outcomes.push((address.clone(), outcome));
    }

    report
}

fn resolve_target(address: &str, index: &MergedRegionIndex) -> Result<CellOutcome, String> {
    let (row, col) = parse_address(address).map_err(|e| e.to_string())?;
    let cell = CellAddress::new(row, col).map_err(|e| e.to_string())?;

    Ok(match index.get(&cell) {
        Some(target) if target.canonical != cell => CellOutcome::Redirected {
            target: target.canonical,
            range: target.range.clone(),
        },
        _ => CellOutcome::Written { target: cell },
    })
}

/// The value's own type decides the cell type; nothing is coerced
fn write_value(sheet: &mut Worksheet, target: CellAddress, value: &CellValue) {
    let cell = sheet.get_cell_mut((target.col, target.row));
    match value {
        CellValue::Text(s) => {
            cell.set_value_string(s.clone());
        }
        CellValue::Number(n) => {
            cell.set_value_number(*n);
        }
        CellValue::Bool(b) => {
            cell.set_value_bool(*b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_at(sheet: &Worksheet, address: &str) -> String {
        sheet
            .get_cell(address)
            .map(|c| c.get_value().to_string())
            .unwrap_or_default()
    }

    fn sheet_with_merge(range: &str) -> umya_spreadsheet::Spreadsheet {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        sheet.add_merge_cells(range);
        book
    }

    #[test]
    fn test_write_into_merged_cell_redirects_to_canonical() {
        let mut book = sheet_with_merge("A2:C2");
        let sheet = book.get_sheet_mut(&0).unwrap();
        let index = merged_index(sheet);

        let values: AddressValueMap = [("B2", "X")].into_iter().collect();
        let report = apply_values(sheet, &index, &values);

        assert_eq!(value_at(sheet, "A2"), "X");
        assert_eq!(value_at(sheet, "B2"), "");
        assert_eq!(
            report.outcome("B2"),
            Some(&CellOutcome::Redirected {
                target: CellAddress::parse("A2").unwrap(),
                range: "A2:C2".to_string(),
            })
        );
    }

    #[test]
    fn test_unmerged_cell_written_directly() {
        let mut book = sheet_with_merge("A4:E4");
        let sheet = book.get_sheet_mut(&0).unwrap();
        sheet.get_cell_mut("A4").set_value_string("JOB #:");
        let index = merged_index(sheet);

        let values: AddressValueMap = [("F4", "205274-101")].into_iter().collect();
        let report = apply_values(sheet, &index, &values);

        assert_eq!(value_at(sheet, "F4"), "205274-101");
        assert_eq!(value_at(sheet, "A4"), "JOB #:");
        assert_eq!(report.written(), 1);
        assert!(report.skipped().is_empty());
    }

    #[test]
    fn test_bad_entries_are_skipped_not_fatal() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        let index = merged_index(sheet);

        let mut values = AddressValueMap::new();
        values.insert("not-a-cell", "a");
        values.insert("ZZZZ1", "b");
        values.insert("C3", 42.5);

        let report = apply_values(sheet, &index, &values);

        assert_eq!(report.written(), 1);
        let skipped: Vec<&str> = report.skipped().iter().map(|(a, _)| *a).collect();
        assert_eq!(skipped, vec!["ZZZZ1", "not-a-cell"]);
        assert_eq!(value_at(sheet, "C3"), "42.5");
    }

    #[test]
    fn test_values_keep_their_type() {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        let index = MergedRegionIndex::default();

        let mut values = AddressValueMap::new();
        values.insert("A1", "58.427");
        values.insert("A2", 58.427);
        values.insert("A3", CellValue::Bool(true));
        apply_values(sheet, &index, &values);

        assert_eq!(sheet.get_cell("A1").unwrap().get_value_number(), None);
        assert_eq!(sheet.get_cell("A2").unwrap().get_value_number(), Some(58.427));
        assert_eq!(value_at(sheet, "A3"), "TRUE");
    }

    #[test]
    fn test_missing_template() {
        let result = GridWriter::new("/no/such/template.xlsx")
            .fill(&AddressValueMap::new(), Path::new("/tmp/out.xlsx"));
        assert!(matches!(result, Err(SheetfillError::TemplateNotFound(_))));
    }
}
