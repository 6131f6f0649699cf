//! Integration tests for Vidmux
//!
//! These tests run the full download-and-combine pipeline against an
//! in-process HTTP fixture serving variant bytes, with a canned metadata
//! provider and a muxer stand-in, so nothing here touches the network or
//! requires external binaries.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/pipeline_flow.rs"]
mod pipeline_flow;

#[path = "integration/concurrent_jobs.rs"]
mod concurrent_jobs;

#[path = "integration/api_surface.rs"]
mod api_surface;
