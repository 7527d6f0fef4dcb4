//! Sheetfill API Server binary
//!
//! HTTP upload API for outlining and filling spreadsheet templates.

use clap::Parser;
use royalbit_sheetfill::api::{run_api_server, ApiConfig};
use royalbit_sheetfill::config::ServiceConfig;

#[derive(Parser, Debug)]
#[command(name = "sheetfill-server")]
#[command(version)]
#[command(author = "RoyalBit Inc. <admin@royalbit.ca>")]
#[command(about = "Sheetfill API Server - fill spreadsheet templates from JSON or scanned documents")]
#[command(long_about = r#"
Sheetfill API Server

Upload endpoints (multipart/form-data):
  - POST /excel-to-markdown     - excel_file → address-keyed outline
  - POST /fill-excel-with-json  - excel_template + data_json [+ sheet_name] → filled .xlsx
  - POST /scan-to-markdown      - pdf_file (PDF/PNG/JPG) → markdown
  - POST /fill-excel-with-scan  - excel_template + pdf_file → filled .xlsx

Additional endpoints:
  - GET  /health                - Health check
  - GET  /version               - Server version info
  - GET  /                      - API documentation

Features:
  - CORS enabled for cross-origin requests
  - Graceful shutdown on SIGINT/SIGTERM
  - JSON error responses with request IDs and error codes
  - Every temporary upload and intermediate file removed per request

Scan endpoints need AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and
GEMINI_API_KEY (environment or .env); without them they answer 500
with code "upstream_unavailable".

Example usage:
  sheetfill-server                           # Start on localhost:8080
  sheetfill-server --host 0.0.0.0 --port 3000

  curl -X POST http://localhost:8080/fill-excel-with-json \
    -F excel_template=@template.xlsx \
    -F 'data_json={"F4": "205274-101"}' -o filled.xlsx
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "SHEETFILL_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "SHEETFILL_PORT")]
    port: u16,

    #[command(flatten)]
    service: ServiceConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        service: args.service,
    };

    run_api_server(config).await
}
