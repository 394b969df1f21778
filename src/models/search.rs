//! Search request models and the intermediate values passed between stages.

use serde::{Deserialize, Serialize};

use super::Study;
use crate::sources::SourceError;

/// Minimum publication year used when the caller does not give one
pub const DEFAULT_MIN_YEAR: &str = "2015";

/// How many results a search should surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// The single most relevant study
    First,
    /// Up to ten studies in source order
    TopTen,
}

impl SearchMode {
    /// Maximum number of results for this mode
    pub fn limit(self) -> usize {
        match self {
            SearchMode::First => 1,
            SearchMode::TopTen => 10,
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::First => write!(f, "first"),
            SearchMode::TopTen => write!(f, "top-ten"),
        }
    }
}

/// The external source a search is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Scraped academic search engine (Google Scholar)
    Html,
    /// Biomedical citation API (PubMed E-utilities)
    Citation,
}

impl SourceKind {
    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Html => "Google Scholar",
            SourceKind::Citation => "PubMed",
        }
    }

    /// Returns the source identifier
    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::Html => "scholar",
            SourceKind::Citation => "pubmed",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A validated search request.
///
/// Fields are private: a query is checked once when it is built and cannot be
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    terms: String,
    min_year: String,
    mode: SearchMode,
}

impl SearchQuery {
    /// Create a query with the default minimum year
    pub fn new(terms: impl Into<String>, mode: SearchMode) -> Result<Self, SourceError> {
        let terms = terms.into().trim().to_string();
        if terms.is_empty() {
            return Err(SourceError::InvalidInput(
                "search terms must not be empty".to_string(),
            ));
        }

        Ok(Self {
            terms,
            min_year: DEFAULT_MIN_YEAR.to_string(),
            mode,
        })
    }

    /// Replace the minimum publication year (four digits, e.g. "2019")
    pub fn with_min_year(mut self, year: impl Into<String>) -> Result<Self, SourceError> {
        let year = year.into().trim().to_string();
        if !is_year(&year) {
            return Err(SourceError::InvalidInput(format!(
                "minimum year must be a four digit year, got {:?}",
                year
            )));
        }
        self.min_year = year;
        Ok(self)
    }

    /// Free-text search terms
    pub fn terms(&self) -> &str {
        &self.terms
    }

    /// Minimum publication year
    pub fn min_year(&self) -> &str {
        &self.min_year
    }

    /// Result mode
    pub fn mode(&self) -> SearchMode {
        self.mode
    }
}

fn is_year(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Ordered citation identifiers produced by the resolver stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationIdList {
    ids: Vec<String>,
}

impl CitationIdList {
    /// Build from resolver output, dropping blank entries and keeping at most `limit`
    pub fn new(ids: Vec<String>, limit: usize) -> Self {
        let ids = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .take(limit)
            .collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers joined for a batched request
    pub fn joined(&self) -> String {
        self.ids.join(",")
    }
}

impl IntoIterator for CitationIdList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

/// Studies produced by a detail fetch, in identifier order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecordSet {
    records: Vec<Study>,
}

impl CitationRecordSet {
    pub fn new(records: Vec<Study>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Study] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_studies(self) -> Vec<Study> {
        self.records
    }
}
