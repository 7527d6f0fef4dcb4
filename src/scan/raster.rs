//! Scanned document → page images
//!
//! PDFs are rasterized with poppler's `pdftoppm`; PNG and JPEG uploads are
//! used as a single page as-is.

use crate::artifacts::ArtifactSet;
use crate::config::DEFAULT_PDF_DPI;
use crate::error::{SheetfillError, SheetfillResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Scan extensions accepted by the scan routes
pub const SCAN_EXTENSIONS: &[&str] = &[".pdf", ".png", ".jpg", ".jpeg"];

/// One page ready for OCR and the model
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub path: PathBuf,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct Rasterizer {
    program: PathBuf,
    dpi: u32,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl Rasterizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            dpi: DEFAULT_PDF_DPI,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Page images of `document`, in page order.
    ///
    /// Rendered pages live in a scratch directory registered in `artifacts`.
    pub async fn pages(
        &self,
        document: &Path,
        artifacts: &mut ArtifactSet,
    ) -> SheetfillResult<Vec<PageImage>> {
        let extension = document
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        match extension.as_str() {
            ".pdf" => self.rasterize_pdf(document, artifacts).await,
            ".png" => Ok(vec![PageImage {
                path: document.to_path_buf(),
                mime_type: "image/png",
            }]),
            ".jpg" | ".jpeg" => Ok(vec![PageImage {
                path: document.to_path_buf(),
                mime_type: "image/jpeg",
            }]),
            _ => Err(SheetfillError::UnsupportedExtension(format!(
                "'{}' is not a supported scan type; expected one of {}",
                document.display(),
                SCAN_EXTENSIONS.join(", ")
            ))),
        }
    }

    async fn rasterize_pdf(
        &self,
        document: &Path,
        artifacts: &mut ArtifactSet,
    ) -> SheetfillResult<Vec<PageImage>> {
        let dir = artifacts.reserve_dir("sheetfill-pages-")?;
        debug!(document = %document.display(), dir = %dir.display(), dpi = self.dpi, "Rasterizing PDF");

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(document)
            .arg(dir.join("page"))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SheetfillError::UpstreamUnavailable(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(SheetfillError::UpstreamCallFailure(format!(
                "Failed to convert PDF to images: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // pdftoppm zero-pads page numbers, so name order is page order
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "png"))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(SheetfillError::UpstreamCallFailure(format!(
                "Failed to convert PDF to images: no pages rendered from {}",
                document.display()
            )));
        }

        info!(pages = paths.len(), "PDF rasterized");
        Ok(paths
            .into_iter()
            .map(|path| PageImage {
                path,
                mime_type: "image/png",
            })
            .collect())
    }
}
