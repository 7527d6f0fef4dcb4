//! CLI command handlers

pub mod commands;

pub use commands::{fill, scan, serve, to_markdown};
