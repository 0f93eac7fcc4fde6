//! Drivefetch Core Library
//!
//! Fetches files from a hosted drive service that does not offer a stable
//! direct-download API, following confirmation pages and falling back
//! across endpoints until real file content is obtained.
//!
//! # Architecture
//!
//! - [`fetch`] - Endpoint chain, response classification, streaming transfer
//! - [`identifier`] - File identifier extraction from share URLs
//! - [`config`] - Policy knobs for the fetch loop

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod identifier;
mod user_agent;

// Re-export commonly used types
pub use config::FetchConfig;
pub use fetch::{
    DriveFetcher, ErrorCategory, FetchError, FetchEvent, FetchObserver, ProgressEvent,
    TransferResult,
};
pub use identifier::{IdentifierError, extract_file_id};
pub use user_agent::tool_identity;
