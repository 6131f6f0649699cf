//! Vidmux Core - media resolution and download-combine pipeline
//!
//! This crate provides the building blocks for the Vidmux service: source
//! locator validation, variant resolution through an external metadata
//! provider, the concurrent download-and-mux pipeline, and configuration
//! management.

pub mod config;
pub mod pipeline;
pub mod resolver;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::VidmuxConfig;
pub use pipeline::{Deliverable, PipelineError, PipelineJob, PipelineOrchestrator};
pub use resolver::{MetadataProvider, ResolveError, ResolvedMedia, SourceLocator, YtDlpProvider};

pub type Result<T> = std::result::Result<T, PipelineError>;
