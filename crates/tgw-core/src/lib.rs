//! Core domain + application logic for the text gateway.
//!
//! This crate is intentionally transport-agnostic. SMS providers, Telegram and
//! the content collaborators (URL→Markdown, weather, ...) live behind ports
//! (traits) implemented in adapter crates; this crate owns the segmentation
//! pipeline, the per-sender quota state machine and request orchestration.

pub mod config;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod ports;
pub mod quota;
pub mod segment;
pub mod transport;

pub use errors::{Error, Result};
