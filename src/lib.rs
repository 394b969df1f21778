//! # Scholar Search
//!
//! Literature search across Google Scholar and PubMed, with every answer
//! converging onto one [`Study`] shape.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Study, SearchQuery, identifier lists)
//! - [`sources`]: Provider traits, the Google Scholar scraper and the PubMed
//!   E-utilities pipeline
//! - [`orchestrator`]: Pipeline selection and stage sequencing
//! - [`utils`]: HTTP client and result rendering
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod orchestrator;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{SearchMode, SearchQuery, SourceKind, Study};
pub use orchestrator::{OrchestratorResult, SearchOrchestrator};
pub use sources::{DetailStrategy, SourceError, Stage};
