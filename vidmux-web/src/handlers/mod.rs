//! Request handlers for the Vidmux API.

pub mod api;

pub use api::{download_media, health, resolve_media};
