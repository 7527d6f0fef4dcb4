//! Sheetfill - spreadsheet template filling
//!
//! This library outlines workbooks as address-keyed text, writes
//! address → value assignments into templates, and maps values read from
//! scanned documents onto templates through an OCR service and a language
//! model.
//!
//! # Features
//!
//! - Cell addressing ("C7" ↔ row 7, column 3)
//! - Merged-cell aware reading and writing
//! - Request-scoped temporary files, removed on every exit path
//! - HTTP upload API (axum) and CLI
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetfill::excel::{GridSerializer, GridWriter};
//! use royalbit_sheetfill::types::AddressValueMap;
//! use std::path::Path;
//!
//! let outline = GridSerializer::new("template.xlsx").serialize()?;
//! println!("{}", outline);
//!
//! let values = AddressValueMap::parse_json(r#"{"F4": "205274-101"}"#)?;
//! let report = GridWriter::new("template.xlsx").fill(&values, Path::new("filled.xlsx"))?;
//! println!("{} cells written", report.written());
//! # Ok::<(), royalbit_sheetfill::error::SheetfillError>(())
//! ```

pub mod api;
pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod excel;
pub mod pipeline;
pub mod scan;
pub mod types;

// Re-export commonly used types
pub use error::{SheetfillError, SheetfillResult};
pub use pipeline::{FilledWorkbook, Pipeline, Stage};
pub use types::{AddressValueMap, CellValue, DocumentInput};
