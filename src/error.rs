use thiserror::Error;

pub type SheetfillResult<T> = Result<T, SheetfillError>;

#[derive(Error, Debug)]
pub enum SheetfillError {
    #[error("Invalid coordinate: row {row}, column {col}")]
    InvalidCoordinate { row: u64, col: u64 },

    #[error("Invalid cell address: '{0}'")]
    InvalidAddress(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Invalid data_json format: {0}")]
    MalformedJson(String),

    #[error("Missing form field: {0}")]
    MissingField(String),

    #[error("Unreadable workbook: {0}")]
    UnreadableWorkbook(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Template file not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid Excel file: {0}")]
    InvalidWorkbook(String),

    #[error("Required sheet missing: {0}")]
    RequiredSheetMissing(String),

    #[error("Failed to write workbook: {0}")]
    WriteFailure(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream call failed: {0}")]
    UpstreamCallFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputValidation,
    UpstreamUnavailable,
    UpstreamCallFailure,
    ResourceFailure,
}

impl ErrorCategory {
    /// Machine-readable code carried in error responses
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::InputValidation => "input_validation",
            ErrorCategory::UpstreamUnavailable => "upstream_unavailable",
            ErrorCategory::UpstreamCallFailure => "upstream_call_failure",
            ErrorCategory::ResourceFailure => "resource_failure",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorCategory::InputValidation)
    }
}

impl SheetfillError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SheetfillError::InvalidCoordinate { .. }
            | SheetfillError::InvalidAddress(_)
            | SheetfillError::UnsupportedExtension(_)
            | SheetfillError::MalformedJson(_)
            | SheetfillError::MissingField(_) => ErrorCategory::InputValidation,
            SheetfillError::UpstreamUnavailable(_) => ErrorCategory::UpstreamUnavailable,
            SheetfillError::UpstreamCallFailure(_) => ErrorCategory::UpstreamCallFailure,
            SheetfillError::UnreadableWorkbook(_)
            | SheetfillError::SheetNotFound(_)
            | SheetfillError::TemplateNotFound(_)
            | SheetfillError::InvalidWorkbook(_)
            | SheetfillError::RequiredSheetMissing(_)
            | SheetfillError::WriteFailure(_)
            | SheetfillError::Io(_) => ErrorCategory::ResourceFailure,
        }
    }
}
