//! Service configuration (flags, environment, `.env`)

use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_AWS_REGION: &str = "us-east-2";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 25;
pub const DEFAULT_PDF_DPI: u32 = 200;

/// Settings shared by the server and the scanning CLI commands.
///
/// Credentials are optional: without them the scan routes answer with
/// `upstream_unavailable` while the workbook routes keep working.
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// Directory for temporary artifacts (defaults to the system temp dir)
    #[arg(long, env = "SHEETFILL_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// AWS region for Textract
    #[arg(long, default_value = DEFAULT_AWS_REGION, env = "AWS_REGION")]
    pub aws_region: String,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub aws_access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL, env = "GEMINI_MODEL")]
    pub gemini_model: String,

    /// pdftoppm executable used to rasterize PDF scans
    #[arg(long, default_value = "pdftoppm", env = "SHEETFILL_PDFTOPPM")]
    pub pdftoppm: PathBuf,

    /// Resolution for rasterized PDF pages
    #[arg(long, default_value_t = DEFAULT_PDF_DPI, env = "SHEETFILL_PDF_DPI")]
    pub pdf_dpi: u32,

    /// Maximum request body size in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB, env = "SHEETFILL_MAX_UPLOAD_MB")]
    pub max_upload_mb: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            aws_region: DEFAULT_AWS_REGION.to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            pdftoppm: PathBuf::from("pdftoppm"),
            pdf_dpi: DEFAULT_PDF_DPI,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl ServiceConfig {
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
