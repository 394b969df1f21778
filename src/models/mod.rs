//! Core data models shared by every search provider.

mod search;
mod study;

pub use search::{
    CitationIdList, CitationRecordSet, SearchMode, SearchQuery, SourceKind, DEFAULT_MIN_YEAR,
};
pub use study::Study;
