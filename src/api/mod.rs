//! Sheetfill API Server module
//!
//! Provides the HTTP upload API.
//! Run with `sheetfill serve` or `sheetfill-server`.

pub mod handlers;
pub mod server;

pub use server::{router, run_api_server, ApiConfig, AppState};
