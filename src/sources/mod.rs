//! Search providers and the traits the orchestrator drives them through.
//!
//! Each remote hop is one *stage*: a single HTTP call plus the parse of its
//! response. Providers are reached only through the traits below so that the
//! orchestrator can be exercised against fakes (see [`mock`]).
//!
//! - [`HtmlSearchProvider`]: one-stage scraped search ([`GoogleScholarSource`])
//! - [`CitationIdResolver`]: first PubMed stage, query to identifiers
//!   ([`PubMedIdResolver`])
//! - [`CitationDetailFetcher`]: second PubMed stage, identifiers to studies,
//!   either full records ([`PubMedRecordFetcher`]) or cross-reference links
//!   ([`PubMedLinkFetcher`])

mod google_scholar;
pub mod mock;
mod pubmed;

pub use google_scholar::GoogleScholarSource;
pub use mock::{MockDetailFetcher, MockHtmlProvider, MockIdResolver};
pub use pubmed::{OneOrMany, PubMedIdResolver, PubMedLinkFetcher, PubMedRecordFetcher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{CitationIdList, CitationRecordSet, SearchQuery, SourceKind, Study};

/// A scraped search engine offering single and top-ten result searches.
#[async_trait]
pub trait HtmlSearchProvider: Send + Sync + std::fmt::Debug {
    /// The most relevant usable result, with title, link, author line and snippet
    async fn search_first(&self, query: &SearchQuery) -> Result<Study, SourceError>;

    /// Up to ten results in source order, title and link only
    async fn search_top_ten(&self, query: &SearchQuery) -> Result<Vec<Study>, SourceError>;
}

/// Resolves free text to an ordered list of citation identifiers.
#[async_trait]
pub trait CitationIdResolver: Send + Sync + std::fmt::Debug {
    /// Resolve `terms` published from `min_year` on, keeping at most `limit` ids
    async fn resolve(
        &self,
        terms: &str,
        min_year: &str,
        limit: usize,
    ) -> Result<CitationIdList, SourceError>;
}

/// Turns resolved identifiers into studies.
#[async_trait]
pub trait CitationDetailFetcher: Send + Sync + std::fmt::Debug {
    /// Which retrieval strategy this fetcher implements
    fn strategy(&self) -> DetailStrategy;

    /// Fetch one study per identifier, in identifier order
    async fn fetch_details(&self, ids: CitationIdList) -> Result<CitationRecordSet, SourceError>;
}

/// How identifiers are turned into studies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailStrategy {
    /// Batched full bibliographic records (title, authors, abstract)
    #[default]
    FullRecord,
    /// Outbound provider links only; titles are not available
    CrossReference,
}

/// The remote hop a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ScholarSearch,
    CitationSearch,
    CitationFetch,
    CitationLinks,
}

impl Stage {
    /// The source this stage belongs to
    pub fn source(&self) -> SourceKind {
        match self {
            Stage::ScholarSearch => SourceKind::Html,
            Stage::CitationSearch | Stage::CitationFetch | Stage::CitationLinks => {
                SourceKind::Citation
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ScholarSearch => "Google Scholar search",
            Stage::CitationSearch => "PubMed ESearch",
            Stage::CitationFetch => "PubMed EFetch",
            Stage::CitationLinks => "PubMed ELink",
        };
        write!(f, "{}", name)
    }
}

/// Errors a search stage can end with. None of them is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The caller supplied an empty or malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure, non-success status or undecodable response
    #[error("{stage} unavailable: {reason}")]
    ProviderUnavailable { stage: Stage, reason: String },

    /// Well-formed response with nothing usable in it
    #[error("{stage} returned no usable results")]
    NotFound { stage: Stage },
}

impl SourceError {
    pub fn unavailable(stage: Stage, reason: impl Into<String>) -> Self {
        SourceError::ProviderUnavailable {
            stage,
            reason: reason.into(),
        }
    }

    pub fn not_found(stage: Stage) -> Self {
        SourceError::NotFound { stage }
    }

    /// The stage that failed, if the failure came from a remote hop
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SourceError::InvalidInput(_) => None,
            SourceError::ProviderUnavailable { stage, .. } | SourceError::NotFound { stage } => {
                Some(*stage)
            }
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::InvalidInput(_) => "invalid_input",
            SourceError::ProviderUnavailable { .. } => "provider_unavailable",
            SourceError::NotFound { .. } => "not_found",
        }
    }

    /// Generic notice for end users, without protocol detail
    pub fn user_message(&self) -> String {
        match self {
            SourceError::InvalidInput(_) => {
                "An error happened when retrieving the query".to_string()
            }
            SourceError::ProviderUnavailable { stage, .. } => format!(
                "An error happened when retrieving the studies from {}",
                stage.source()
            ),
            SourceError::NotFound { stage } => {
                format!("No studies found on {} for this query", stage.source())
            }
        }
    }
}
