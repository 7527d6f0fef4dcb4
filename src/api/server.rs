//! Sheetfill API Server implementation
//!
//! HTTP server using Axum. Upload endpoints: excel-to-markdown,
//! fill-excel-with-json, scan-to-markdown, fill-excel-with-scan.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::config::ServiceConfig;
use crate::pipeline::Pipeline;
use crate::scan::Collaborators;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub service: ServiceConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            service: ServiceConfig::default(),
        }
    }
}

/// Shared application state; read-only after startup
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub collaborators: Collaborators,
    pub temp_root: PathBuf,
}

impl AppState {
    pub fn new(collaborators: Collaborators, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            collaborators,
            temp_root: temp_root.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(Collaborators::from_config(config), config.temp_root())
    }

    /// Fresh pipeline for one request
    pub fn pipeline(&self, request_id: &str) -> Pipeline {
        Pipeline::new(
            request_id,
            self.temp_root.clone(),
            self.collaborators.clone(),
        )
    }
}

/// Default log filter for the server when `RUST_LOG` is unset
pub const SERVER_LOG_FILTER: &str = "sheetfill_server=info,royalbit_sheetfill=info,tower_http=info";

/// Install the global tracing subscriber (no-op if one is already set)
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// All routes, with and without a trailing slash
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Upload endpoints
        .route("/excel-to-markdown", post(handlers::excel_to_markdown))
        .route("/excel-to-markdown/", post(handlers::excel_to_markdown))
        .route("/fill-excel-with-json", post(handlers::fill_excel_with_json))
        .route("/fill-excel-with-json/", post(handlers::fill_excel_with_json))
        .route("/scan-to-markdown", post(handlers::scan_to_markdown))
        .route("/scan-to-markdown/", post(handlers::scan_to_markdown))
        .route("/fill-excel-with-scan", post(handlers::fill_excel_with_scan))
        .route("/fill-excel-with-scan/", post(handlers::fill_excel_with_scan))
        // State and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    init_tracing(SERVER_LOG_FILTER);

    let temp_root = config.service.temp_root();
    std::fs::create_dir_all(&temp_root)?;

    let state = Arc::new(AppState::from_config(&config.service));
    let app = router(state, config.service.max_upload_bytes());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("📄 Sheetfill API Server starting on http://{}", addr);
    info!("   Endpoints: /excel-to-markdown, /fill-excel-with-json, /scan-to-markdown, /fill-excel-with-scan");
    info!("   Health: /health, Version: /version");
    info!(
        "   Temp dir: {}, upload limit: {} MB",
        temp_root.display(),
        config.service.max_upload_mb
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sheetfill API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ApiConfig Tests ====================

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.service.max_upload_mb, 25);
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
            ..ApiConfig::default()
        };
        let addr_str = format!("{}:{}", config.host, config.port);
        let addr: SocketAddr = addr_str.parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    // ==================== AppState Tests ====================

    #[test]
    fn test_app_state_version() {
        let state = AppState::new(Collaborators::unavailable("n/a"), "/tmp");
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(state.temp_root, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_app_state_in_arc() {
        let state = Arc::new(AppState::from_config(&ServiceConfig::default()));
        let state_clone = Arc::clone(&state);
        assert_eq!(state.version, state_clone.version);
        assert_eq!(Arc::strong_count(&state), 2);
        assert!(state.collaborators.model().is_err());
    }

    #[test]
    fn test_pipeline_uses_temp_root() {
        let state = AppState::new(Collaborators::unavailable("n/a"), "/var/tmp/sheetfill");
        let pipeline = state.pipeline("req-9");
        assert_eq!(pipeline.artifacts().root(), PathBuf::from("/var/tmp/sheetfill"));
        assert_eq!(pipeline.artifacts().owner(), "req-9");
    }
}
