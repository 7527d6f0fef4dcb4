//! API request handlers
//!
//! Upload routes take `multipart/form-data`. Markdown comes back as
//! `text/markdown`, filled workbooks as an attachment; every failure is a
//! JSON [`ApiResponse`] carrying the error category in `code`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifacts::ReleasingStream;
use crate::error::{SheetfillError, SheetfillResult};
use crate::excel::{filled_download_name, SheetSelector};
use crate::pipeline::FilledWorkbook;
use crate::types::{AddressValueMap, DocumentInput};

use super::server::AppState;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MARKDOWN_MIME: &str = "text/markdown; charset=utf-8";

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error category, e.g. `input_validation`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn err(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
            code: Some(code.into()),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// A failed request: HTTP status plus the error envelope contents
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl From<SheetfillError> for ApiError {
    fn from(e: SheetfillError) -> Self {
        let category = e.category();
        let status = if category.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            code: category.code(),
            message: e.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self {
            status: e.status(),
            code: "input_validation",
            message: e.body_text(),
        }
    }
}

impl ApiError {
    fn into_response_for(self, request_id: &str) -> Response {
        let body: ApiResponse<()> =
            ApiResponse::err(self.message, self.code).with_request_id(request_id);
        (self.status, Json(body)).into_response()
    }
}

/// Run one upload route inside a request span and turn failures into the
/// JSON error envelope
async fn handle<F>(route: &'static str, request_id: String, work: F) -> Response
where
    F: Future<Output = Result<Response, ApiError>>,
{
    let span = info_span!("request", request_id = %request_id, route);
    async move {
        info!("Request received");
        match work.await {
            Ok(response) => {
                info!("Request completed");
                response
            }
            Err(e) => {
                if e.status.is_client_error() {
                    warn!(status = %e.status, code = e.code, error = %e.message, "Request rejected");
                } else {
                    error!(status = %e.status, code = e.code, error = %e.message, "Request failed");
                }
                e.into_response_for(&request_id)
            }
        }
    }
    .instrument(span)
    .await
}

/// Multipart fields of an upload request, split into files and text
#[derive(Default)]
pub struct UploadForm {
    files: HashMap<String, DocumentInput>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    form.files.insert(
                        name,
                        DocumentInput::Uploaded {
                            file_name: Some(file_name),
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn file(&mut self, name: &str) -> SheetfillResult<DocumentInput> {
        self.files
            .remove(name)
            .ok_or_else(|| SheetfillError::MissingField(name.to_string()))
    }

    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn markdown_response(markdown: String) -> Response {
    ([(header::CONTENT_TYPE, MARKDOWN_MIME)], markdown).into_response()
}

/// Stream the filled workbook; its artifacts are released once the body
/// has been sent or abandoned
async fn workbook_response(filled: FilledWorkbook, download_name: &str) -> SheetfillResult<Response> {
    let FilledWorkbook {
        path, artifacts, ..
    } = filled;
    let stream = ReleasingStream::open(&path, artifacts).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(download_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(path: &str, method: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

pub fn endpoints() -> Vec<EndpointInfo> {
    vec![
        EndpointInfo::new("/health", "GET", "Health check endpoint"),
        EndpointInfo::new("/version", "GET", "Get server version"),
        EndpointInfo::new(
            "/excel-to-markdown",
            "POST",
            "Outline a workbook's populated cells (form field: excel_file)",
        ),
        EndpointInfo::new(
            "/fill-excel-with-json",
            "POST",
            "Fill a template from a JSON object of cell → value (excel_template, data_json, sheet_name)",
        ),
        EndpointInfo::new(
            "/scan-to-markdown",
            "POST",
            "Transcribe a scanned PDF/PNG/JPG to markdown (pdf_file)",
        ),
        EndpointInfo::new(
            "/fill-excel-with-scan",
            "POST",
            "Fill a template with data read from a scan (excel_template, pdf_file)",
        ),
    ]
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(RootResponse {
        name: "Sheetfill API Server".to_string(),
        version: state.version.clone(),
        description: "Fill spreadsheet templates from JSON or scanned documents".to_string(),
        endpoints: endpoints(),
    }))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec![
            "excel-to-markdown".to_string(),
            "fill-excel-with-json".to_string(),
            "scan-to-markdown".to_string(),
            "fill-excel-with-scan".to_string(),
        ],
    }))
}

/// POST /excel-to-markdown
pub async fn excel_to_markdown(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let request_id = new_request_id();
    handle("excel-to-markdown", request_id.clone(), async move {
        let mut form = UploadForm::read(multipart).await?;
        let workbook = form.file("excel_file")?;

        let markdown = state
            .pipeline(&request_id)
            .excel_to_markdown(workbook)
            .await?;
        Ok(markdown_response(markdown))
    })
    .await
}

/// POST /fill-excel-with-json
pub async fn fill_excel_with_json(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let request_id = new_request_id();
    handle("fill-excel-with-json", request_id.clone(), async move {
        let mut form = UploadForm::read(multipart).await?;
        let template = form.file("excel_template")?;
        let data_json = form
            .text("data_json")
            .ok_or_else(|| SheetfillError::MissingField("data_json".to_string()))?;
        let values = AddressValueMap::parse_json(&data_json)?;
        let sheet = form
            .text("sheet_name")
            .filter(|name| !name.trim().is_empty())
            .map(SheetSelector::Named)
            .unwrap_or_default();

        let download_name = filled_download_name(template.display_name().as_deref());
        let filled = state
            .pipeline(&request_id)
            .fill_with_json(template, values, sheet)
            .await?;
        Ok(workbook_response(filled, &download_name).await?)
    })
    .await
}

/// POST /scan-to-markdown
pub async fn scan_to_markdown(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let request_id = new_request_id();
    handle("scan-to-markdown", request_id.clone(), async move {
        let mut form = UploadForm::read(multipart).await?;
        let scan = form.file("pdf_file")?;

        let markdown = state.pipeline(&request_id).scan_to_markdown(scan).await?;
        Ok(markdown_response(markdown))
    })
    .await
}

/// POST /fill-excel-with-scan
pub async fn fill_excel_with_scan(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let request_id = new_request_id();
    handle("fill-excel-with-scan", request_id.clone(), async move {
        let mut form = UploadForm::read(multipart).await?;
        let template = form.file("excel_template")?;
        let scan = form.file("pdf_file")?;

        let download_name = filled_download_name(template.display_name().as_deref());
        let filled = state
            .pipeline(&request_id)
            .fill_with_scan(template, scan)
            .await?;
        Ok(workbook_response(filled, &download_name).await?)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ApiResponse Tests ====================

    #[test]
    fn test_api_response_ok_creates_success_response() {
        let response = ApiResponse::ok("test data");
        assert!(response.success);
        assert!(response.data.is_some());
        assert!(response.error.is_none());
        assert!(response.code.is_none());
        assert!(!response.request_id.is_empty());
    }

    #[test]
    fn test_api_response_err_creates_error_response() {
        let response: ApiResponse<()> = ApiResponse::err("boom", "resource_failure");
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert_eq!(response.code.as_deref(), Some("resource_failure"));
    }

    #[test]
    fn test_api_response_request_id_is_unique() {
        let a = ApiResponse::ok(1);
        let b = ApiResponse::ok(2);
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_api_response_error_serializes_without_data() {
        let response: ApiResponse<()> =
            ApiResponse::err("Unsupported file extension: x", "input_validation")
                .with_request_id("req-1");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "request_id": "req-1",
                "error": "Unsupported file extension: x",
                "code": "input_validation"
            })
        );
    }

    #[test]
    fn test_api_response_serializes_without_none_fields() {
        let json = serde_json::to_string(&ApiResponse::ok(42)).unwrap();
        assert!(json.contains("\"data\":42"));
        assert!(!json.contains("error"));
        assert!(!json.contains("code"));
    }

    // ==================== ApiError Tests ====================

    #[test]
    fn test_input_errors_map_to_400() {
        let e = ApiError::from(SheetfillError::MalformedJson("expected value".into()));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "input_validation");
        assert_eq!(e.message, "Invalid data_json format: expected value");
    }

    #[test]
    fn test_upstream_errors_map_to_500() {
        let e = ApiError::from(SheetfillError::UpstreamUnavailable(
            "GEMINI_API_KEY not found in environment variables".into(),
        ));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "upstream_unavailable");
    }

    // ==================== Form Parsing Tests ====================

    #[test]
    fn test_missing_form_file() {
        let mut form = UploadForm::default();
        assert!(matches!(
            form.file("excel_template"),
            Err(SheetfillError::MissingField(name)) if name == "excel_template"
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report_filled.xlsx"), "report_filled.xlsx");
        assert_eq!(sanitize_filename("my \"q\".xlsx"), "my _q_.xlsx");
        assert_eq!(sanitize_filename("résumé.xlsx"), "r_sum_.xlsx");
    }

    #[test]
    fn test_root_lists_upload_routes() {
        let paths: Vec<String> = endpoints().into_iter().map(|e| e.path).collect();
        assert!(paths.contains(&"/fill-excel-with-scan".to_string()));
        assert_eq!(paths.len(), 6);
    }
}
