//! Request pipeline: template + scan → filled workbook
//!
//! One [`Pipeline`] serves one request. Stages run strictly in order and
//! every scratch file lands in the pipeline's [`ArtifactSet`]; a failing
//! stage releases all of them before the error is returned.
//!
//! ```text
//! Start → TemplateSaved → TemplateSerialized → ScanSaved → ScanExtracted
//!       → ScanEnhanced → MappingComputed → TemplateFilled → Done
//! ```

use crate::artifacts::{self, ArtifactSet, ClosedFlag};
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::{
    filled_output_path, FillReport, GridSerializer, GridWriter, SheetSelector, WORKBOOK_EXTENSIONS,
};
use crate::scan::{self, Collaborators, SCAN_EXTENSIONS};
use crate::types::{AddressValueMap, DocumentInput};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    TemplateSaved,
    TemplateSerialized,
    ScanSaved,
    ScanExtracted,
    ScanEnhanced,
    MappingComputed,
    TemplateFilled,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::TemplateSaved => "template_saved",
            Stage::TemplateSerialized => "template_serialized",
            Stage::ScanSaved => "scan_saved",
            Stage::ScanExtracted => "scan_extracted",
            Stage::ScanEnhanced => "scan_enhanced",
            Stage::MappingComputed => "mapping_computed",
            Stage::TemplateFilled => "template_filled",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A filled workbook still owned by its request.
///
/// The output file is one of `artifacts`; it disappears when they are
/// released, so stream or copy it first.
#[derive(Debug)]
pub struct FilledWorkbook {
    pub path: PathBuf,
    pub report: FillReport,
    /// Values requested by the mapping step (scan fills only)
    pub mapping: Option<AddressValueMap>,
    pub artifacts: ArtifactSet,
}

impl FilledWorkbook {
    /// Copy the output to `destination`, then release every artifact
    pub fn persist_to(mut self, destination: &Path) -> SheetfillResult<PathBuf> {
        std::fs::copy(&self.path, destination).map_err(|e| {
            SheetfillError::WriteFailure(format!("{}: {}", destination.display(), e))
        })?;
        self.artifacts.release_all();
        Ok(destination.to_path_buf())
    }
}

pub struct Pipeline {
    request_id: String,
    artifacts: ArtifactSet,
    collaborators: Collaborators,
    stage: Stage,
}

impl Pipeline {
    pub fn new(
        request_id: impl Into<String>,
        temp_root: impl Into<PathBuf>,
        collaborators: Collaborators,
    ) -> Self {
        let request_id = request_id.into();
        Self {
            artifacts: ArtifactSet::new(temp_root, request_id.clone()),
            request_id,
            collaborators,
            stage: Stage::Start,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Template → address-keyed text outline
    pub async fn excel_to_markdown(mut self, template: DocumentInput) -> SheetfillResult<String> {
        let result = self.run_excel_to_markdown(template).await;
        self.finish(result)
    }

    /// Template + caller-supplied values → filled workbook
    pub async fn fill_with_json(
        mut self,
        template: DocumentInput,
        values: AddressValueMap,
        sheet: SheetSelector,
    ) -> SheetfillResult<FilledWorkbook> {
        match self.run_fill(template, values, sheet).await {
            Ok((path, report)) => Ok(self.into_filled(path, report, None)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Scanned document → markdown transcription
    pub async fn scan_to_markdown(mut self, scan: DocumentInput) -> SheetfillResult<String> {
        let result = self.run_scan_to_markdown(scan).await;
        self.finish(result)
    }

    /// Template + scanned document → filled workbook
    pub async fn fill_with_scan(
        mut self,
        template: DocumentInput,
        scan: DocumentInput,
    ) -> SheetfillResult<FilledWorkbook> {
        match self.run_fill_with_scan(template, scan).await {
            Ok((path, report, mapping)) => Ok(self.into_filled(path, report, Some(mapping))),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_excel_to_markdown(&mut self, template: DocumentInput) -> SheetfillResult<String> {
        check_extension(&template, WORKBOOK_EXTENSIONS)?;
        let title = template.display_name();
        let path = self.save(template, Stage::TemplateSaved).await?;
        self.serialize(path, title).await
    }

    async fn run_fill(
        &mut self,
        template: DocumentInput,
        values: AddressValueMap,
        sheet: SheetSelector,
    ) -> SheetfillResult<(PathBuf, FillReport)> {
        check_extension(&template, WORKBOOK_EXTENSIONS)?;
        let path = self.save(template, Stage::TemplateSaved).await?;
        self.fill(path, values, sheet).await
    }

    async fn run_scan_to_markdown(&mut self, scan: DocumentInput) -> SheetfillResult<String> {
        check_extension(&scan, SCAN_EXTENSIONS)?;
        let extractor = self.collaborators.extractor()?;
        let model = self.collaborators.model()?;

        let scan_path = self.save(scan, Stage::ScanSaved).await?;
        self.transcribe(&scan_path, extractor.as_ref(), model.as_ref())
            .await
    }

    async fn run_fill_with_scan(
        &mut self,
        template: DocumentInput,
        scan: DocumentInput,
    ) -> SheetfillResult<(PathBuf, FillReport, AddressValueMap)> {
        check_extension(&template, WORKBOOK_EXTENSIONS)?;
        check_extension(&scan, SCAN_EXTENSIONS)?;
        let extractor = self.collaborators.extractor()?;
        let model = self.collaborators.model()?;

        let title = template.display_name();
        let template_path = self.save(template, Stage::TemplateSaved).await?;
        let template_text = self.serialize(template_path.clone(), title).await?;

        let scan_path = self.save(scan, Stage::ScanSaved).await?;
        let scan_markdown = self
            .transcribe(&scan_path, extractor.as_ref(), model.as_ref())
            .await?;

        let mapping = scan::compute_mapping(model.as_ref(), &template_text, &scan_markdown).await?;
        self.advance(Stage::MappingComputed);

        let (path, report) = self
            .fill(template_path, mapping.clone(), SheetSelector::Primary)
            .await?;
        Ok((path, report, mapping))
    }

    /// Persist an upload as an artifact; existing paths are used in place
    async fn save(&mut self, input: DocumentInput, next: Stage) -> SheetfillResult<PathBuf> {
        let suffix = input.extension().unwrap_or_default();
        let path = match input {
            DocumentInput::Uploaded { bytes, .. } => {
                self.artifacts.acquire(bytes.as_ref(), &suffix).await?
            }
            DocumentInput::ExistingPath(path) => {
                if !path.exists() {
                    return Err(SheetfillError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} does not exist", path.display()),
                    )));
                }
                path
            }
        };
        self.advance(next);
        Ok(path)
    }

    async fn serialize(&mut self, path: PathBuf, title: Option<String>) -> SheetfillResult<String> {
        let text = blocking(move || {
            let serializer = GridSerializer::new(&path);
            match title {
                Some(title) => serializer.with_title(title).serialize(),
                None => serializer.serialize(),
            }
        })
        .await?;
        self.advance(Stage::TemplateSerialized);
        Ok(text)
    }

    async fn transcribe(
        &mut self,
        scan_path: &Path,
        extractor: &dyn scan::TextExtractor,
        model: &dyn scan::LanguageModel,
    ) -> SheetfillResult<String> {
        let rasterizer = self.collaborators.rasterizer().clone();
        let pages = rasterizer.pages(scan_path, &mut self.artifacts).await?;

        let (raw_path, table_path) =
            scan::extract_text_and_tables(extractor, &pages, &mut self.artifacts).await?;
        self.advance(Stage::ScanExtracted);

        let markdown = scan::enhance_to_markdown(model, &pages, &raw_path, &table_path).await?;
        self.advance(Stage::ScanEnhanced);
        Ok(markdown)
    }

    async fn fill(
        &mut self,
        template: PathBuf,
        values: AddressValueMap,
        sheet: SheetSelector,
    ) -> SheetfillResult<(PathBuf, FillReport)> {
        // One directory per output; a writer outliving the request removes it whole
        let dir = self.artifacts.reserve_dir("sheetfill-out-")?;
        let output = dir.join(output_file_name(&template));
        let closed = self.artifacts.closed_flag();

        let target = output.clone();
        let report = blocking(move || {
            write_filled(&template, &values, sheet, &target, &dir, &closed)
        })
        .await?;
        self.advance(Stage::TemplateFilled);
        Ok((output, report))
    }

    fn advance(&mut self, stage: Stage) {
        debug!(request_id = %self.request_id, from = %self.stage, to = %stage, "Pipeline stage");
        self.stage = stage;
    }

    fn finish<T>(mut self, result: SheetfillResult<T>) -> SheetfillResult<T> {
        match result {
            Ok(value) => {
                self.advance(Stage::Done);
                self.artifacts.release_all();
                Ok(value)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, e: SheetfillError) -> SheetfillError {
        error!(
            request_id = %self.request_id,
            stage = %self.stage,
            code = e.category().code(),
            error = %e,
            "Pipeline failed"
        );
        self.artifacts.release_all();
        e
    }

    fn into_filled(
        mut self,
        path: PathBuf,
        report: FillReport,
        mapping: Option<AddressValueMap>,
    ) -> FilledWorkbook {
        self.advance(Stage::Done);
        info!(
            request_id = %self.request_id,
            written = report.written(),
            skipped = report.skipped().len(),
            "Workbook filled"
        );
        FilledWorkbook {
            path,
            report,
            mapping,
            artifacts: self.artifacts,
        }
    }
}

fn check_extension(input: &DocumentInput, allowed: &[&str]) -> SheetfillResult<()> {
    match input.extension() {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(SheetfillError::UnsupportedExtension(format!(
            "'{}' is not supported; expected one of {}",
            input.display_name().unwrap_or_default(),
            allowed.join(", ")
        ))),
    }
}

fn output_file_name(template: &Path) -> PathBuf {
    filled_output_path(template)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("filled.xlsx"))
}

/// Fill `template` into `output` inside the scratch directory `dir`.
///
/// Runs on a blocking thread that can outlive a cancelled request. When the
/// owning set closed meanwhile, `dir` is removed here and the fill reports
/// an interruption.
fn write_filled(
    template: &Path,
    values: &AddressValueMap,
    sheet: SheetSelector,
    output: &Path,
    dir: &Path,
    closed: &ClosedFlag,
) -> SheetfillResult<FillReport> {
    let result = GridWriter::new(template)
        .with_sheet(sheet)
        .fill(values, output);
    if closed.is_closed() {
        artifacts::release(&[dir]);
        debug!(dir = %dir.display(), "Discarded output of cancelled fill");
        return Err(SheetfillError::Io(std::io::Error::new(
            std::io::ErrorKind::Interrupted,
            "request ended before the workbook was written",
        )));
    }
    result
}

/// Workbook parsing and saving are synchronous; keep them off the reactor
async fn blocking<T, F>(f: F) -> SheetfillResult<T>
where
    F: FnOnce() -> SheetfillResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SheetfillError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{LanguageModel, LayoutBlock, PromptPart, TextExtractor};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NoText;

    #[async_trait]
    impl TextExtractor for NoText {
        async fn analyze_page(&self, _image: &[u8]) -> SheetfillResult<Vec<LayoutBlock>> {
            Ok(Vec::new())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn generate(&self, _parts: Vec<PromptPart>) -> SheetfillResult<String> {
            Err(SheetfillError::UpstreamCallFailure("quota exceeded".to_string()))
        }
    }

    fn upload(name: &str, bytes: &'static [u8]) -> DocumentInput {
        DocumentInput::Uploaded {
            file_name: Some(name.to_string()),
            bytes: axum::body::Bytes::from_static(bytes),
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_check_extension_is_case_insensitive() {
        assert!(check_extension(&upload("T.XLSX", b""), WORKBOOK_EXTENSIONS).is_ok());
        assert!(check_extension(&upload("scan.JPeG", b""), SCAN_EXTENSIONS).is_ok());
        assert!(matches!(
            check_extension(&upload("data.csv", b""), WORKBOOK_EXTENSIONS),
            Err(SheetfillError::UnsupportedExtension(_))
        ));
        assert!(check_extension(&upload("noext", b""), WORKBOOK_EXTENSIONS).is_err());
    }

    #[tokio::test]
    async fn test_rejected_extension_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new("req", dir.path(), Collaborators::unavailable("n/a"));

        let result = pipeline
            .fill_with_json(upload("data.csv", b"a,b"), AddressValueMap::new(), SheetSelector::Primary)
            .await;

        assert!(matches!(result, Err(SheetfillError::UnsupportedExtension(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_corrupt_template_is_released() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new("req", dir.path(), Collaborators::unavailable("n/a"));

        let result = pipeline
            .excel_to_markdown(upload("broken.xlsx", b"not a zip"))
            .await;

        assert!(matches!(result, Err(SheetfillError::UnreadableWorkbook(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_collaborator_fails_before_saving() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            "req",
            dir.path(),
            Collaborators::unavailable("GEMINI_API_KEY not found in environment variables"),
        );

        let result = pipeline.scan_to_markdown(upload("scan.png", b"png")).await;

        assert!(matches!(result, Err(SheetfillError::UpstreamUnavailable(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_model_failure_releases_extraction_files() {
        let dir = TempDir::new().unwrap();
        let collaborators = Collaborators::new(Arc::new(NoText), Arc::new(FailingModel));
        let pipeline = Pipeline::new("req", dir.path(), collaborators);

        let result = pipeline.scan_to_markdown(upload("scan.png", b"png")).await;

        match result {
            Err(SheetfillError::UpstreamCallFailure(msg)) => assert_eq!(msg, "quota exceeded"),
            other => panic!("expected UpstreamCallFailure, got {:?}", other),
        }
        assert_eq!(entries(dir.path()), 0);
    }

    #[test]
    fn test_fill_after_set_dropped_leaves_nothing() {
        let fixtures = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let template = fixtures.path().join("template.xlsx");
        std::fs::write(&template, b"unused").unwrap();

        let mut set = ArtifactSet::new(scratch.path(), "req");
        let dir = set.reserve_dir("sheetfill-out-").unwrap();
        let closed = set.closed_flag();
        drop(set);
        assert_eq!(entries(scratch.path()), 0);

        // A writer that still gets its directory back must not keep it
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("template_filled.xlsx"), b"late").unwrap();
        let values: AddressValueMap = [("A1", "x")].into_iter().collect();
        let result = write_filled(
            &template,
            &values,
            SheetSelector::Primary,
            &dir.join("template_filled.xlsx"),
            &dir,
            &closed,
        );

        assert!(result.is_err());
        assert_eq!(entries(scratch.path()), 0);
        assert!(template.exists());
    }

    #[test]
    fn test_output_file_name_follows_template() {
        assert_eq!(
            output_file_name(Path::new("/tmp/sheetfill-abc.xlsx")),
            PathBuf::from("sheetfill-abc_filled.xlsx")
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::MappingComputed.to_string(), "mapping_computed");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}
