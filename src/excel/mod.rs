//! Spreadsheet grid handling
//!
//! - Addressing: (row, column) ↔ "C7"
//! - Merged regions: covered cell → canonical top-left cell
//! - Serializer: workbook → address-keyed text outline (calamine)
//! - Writer: address → value assignments onto a template (umya-spreadsheet)

pub mod address;
pub mod merged;
pub mod serializer;
pub mod writer;

pub use address::{parse_address, to_address, CellAddress, MAX_COLUMN, MAX_ROW};
pub use merged::{MergeBounds, MergeTarget, MergedRegion, MergedRegionIndex};
pub use serializer::{GridSerializer, SheetSnapshot, SnapshotCell, CONVERSION_SENTINEL};
pub use writer::{apply_values, CellOutcome, FillReport, GridWriter, SheetSelector};

/// Template extensions accepted for serialization and filling
pub const WORKBOOK_EXTENSIONS: &[&str] = &[".xlsx", ".xlsm"];

/// Filled-output path for a template: `<stem>_filled.xlsx` alongside it
pub fn filled_output_path(template: &std::path::Path) -> std::path::PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string());
    template.with_file_name(format!("{}_filled.xlsx", stem))
}

/// Download name for a filled upload; `filled_template.xlsx` when unnamed
pub fn filled_download_name(uploaded: Option<&str>) -> String {
    match uploaded {
        Some(name) if !name.is_empty() => match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => format!("{}_filled.xlsx", stem),
            _ => format!("{}_filled.xlsx", name),
        },
        _ => "filled_template.xlsx".to_string(),
    }
}
