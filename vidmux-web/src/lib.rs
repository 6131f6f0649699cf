//! Vidmux Web - HTTP API layer
//!
//! Thin axum surface over `vidmux-core`: one endpoint to resolve a locator
//! into its variant lists and one to run the download-and-combine pipeline,
//! streaming the muxed file back as an attachment.

pub mod handlers;
pub mod server;

pub use server::{AppState, router, run_server};
