//! Fake providers for exercising the orchestrator without a network.
//!
//! Each fake returns a canned outcome and counts how often it was called,
//! so tests can assert that a stage was (or was not) reached.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{CitationIdList, CitationRecordSet, SearchQuery, Study};
use crate::sources::{
    CitationDetailFetcher, CitationIdResolver, DetailStrategy, HtmlSearchProvider, SourceError,
    Stage,
};

/// Scraped-search fake returning predefined studies.
#[derive(Debug)]
pub struct MockHtmlProvider {
    response: Result<Vec<Study>, SourceError>,
    calls: AtomicUsize,
}

impl MockHtmlProvider {
    /// Return `studies` (the first one for single-result searches)
    pub fn returning(studies: Vec<Study>) -> Self {
        Self {
            response: Ok(studies),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every search with `error`
    pub fn failing(error: SourceError) -> Self {
        Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HtmlSearchProvider for MockHtmlProvider {
    async fn search_first(&self, _query: &SearchQuery) -> Result<Study, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::not_found(Stage::ScholarSearch))
    }

    async fn search_top_ten(&self, _query: &SearchQuery) -> Result<Vec<Study>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let studies = self.response.clone()?;
        if studies.is_empty() {
            return Err(SourceError::not_found(Stage::ScholarSearch));
        }
        Ok(studies.into_iter().take(10).collect())
    }
}

/// Resolver fake returning predefined identifiers.
#[derive(Debug)]
pub struct MockIdResolver {
    response: Result<Vec<String>, SourceError>,
    calls: AtomicUsize,
}

impl MockIdResolver {
    /// Return `ids` as-is (truncated to the requested limit), even when empty
    pub fn returning<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            response: Ok(ids.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: SourceError) -> Self {
        Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CitationIdResolver for MockIdResolver {
    async fn resolve(
        &self,
        _terms: &str,
        _min_year: &str,
        limit: usize,
    ) -> Result<CitationIdList, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .map(|ids| CitationIdList::new(ids, limit))
    }
}

/// Detail fetcher fake returning predefined studies.
#[derive(Debug)]
pub struct MockDetailFetcher {
    strategy: DetailStrategy,
    response: Result<Vec<Study>, SourceError>,
    calls: AtomicUsize,
    received: Mutex<Vec<CitationIdList>>,
}

impl MockDetailFetcher {
    pub fn returning(strategy: DetailStrategy, studies: Vec<Study>) -> Self {
        Self {
            strategy,
            response: Ok(studies),
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(strategy: DetailStrategy, error: SourceError) -> Self {
        Self {
            strategy,
            response: Err(error),
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identifier lists passed to `fetch_details`, in call order
    pub fn received(&self) -> Vec<CitationIdList> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CitationDetailFetcher for MockDetailFetcher {
    fn strategy(&self) -> DetailStrategy {
        self.strategy
    }

    async fn fetch_details(&self, ids: CitationIdList) -> Result<CitationRecordSet, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.received.lock() {
            guard.push(ids.clone());
        }
        if ids.is_empty() {
            return Err(SourceError::InvalidInput(
                "no identifiers to fetch".to_string(),
            ));
        }
        self.response.clone().map(CitationRecordSet::new)
    }
}

/// Helper function to create a study for tests.
pub fn make_study(id: &str, title: &str) -> Study {
    Study::new(title, format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id))
}
