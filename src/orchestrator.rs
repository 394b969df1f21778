//! Search orchestration across providers.
//!
//! [`SearchOrchestrator::run`] picks the pipeline for a source, drives its
//! stages in order and folds the outcome into an [`OrchestratorResult`]:
//!
//! - Google Scholar: one scraped search
//! - PubMed: identifier resolution, then (only on success) a detail fetch
//!
//! The first failing stage ends the run and its error is returned unchanged.
//! Nothing is retried and there is no fallback to another source.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::models::{SearchMode, SearchQuery, SourceKind, Study};
use crate::sources::{
    CitationDetailFetcher, CitationIdResolver, DetailStrategy, GoogleScholarSource,
    HtmlSearchProvider, PubMedIdResolver, PubMedLinkFetcher, PubMedRecordFetcher, SourceError,
    Stage,
};
use crate::utils::HttpClient;

/// Outcome of one orchestrated search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorResult {
    /// Single-result search succeeded
    Single(Study),
    /// Top-ten search succeeded; never empty
    Many(Vec<Study>),
    /// The first stage that failed
    Failed(SourceError),
}

impl OrchestratorResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, OrchestratorResult::Failed(_))
    }

    /// The error, if the run failed
    pub fn error(&self) -> Option<&SourceError> {
        match self {
            OrchestratorResult::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Studies in result order, or the failure
    pub fn into_result(self) -> Result<Vec<Study>, SourceError> {
        match self {
            OrchestratorResult::Single(study) => Ok(vec![study]),
            OrchestratorResult::Many(studies) => Ok(studies),
            OrchestratorResult::Failed(err) => Err(err),
        }
    }

    /// Machine-readable view used for JSON output
    pub fn to_report(&self) -> SearchReport<'_> {
        match self {
            OrchestratorResult::Single(study) => SearchReport::Single { study },
            OrchestratorResult::Many(studies) => SearchReport::Many {
                count: studies.len(),
                studies,
            },
            OrchestratorResult::Failed(err) => SearchReport::Failed {
                kind: err.kind(),
                stage: err.stage(),
                reason: err.to_string(),
                message: err.user_message(),
            },
        }
    }
}

/// Serializable form of an [`OrchestratorResult`]
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchReport<'a> {
    Single {
        study: &'a Study,
    },
    Many {
        count: usize,
        studies: &'a [Study],
    },
    Failed {
        kind: &'static str,
        stage: Option<Stage>,
        reason: String,
        message: String,
    },
}

/// Drives provider pipelines.
///
/// Holds only shared, immutable handles, so one orchestrator can serve many
/// concurrent runs.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    html: Arc<dyn HtmlSearchProvider>,
    resolver: Arc<dyn CitationIdResolver>,
    full_records: Arc<dyn CitationDetailFetcher>,
    cross_references: Arc<dyn CitationDetailFetcher>,
    top_ten_strategy: DetailStrategy,
}

impl SearchOrchestrator {
    /// Wire the real providers to one HTTP client built from `config`
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = HttpClient::from_settings(&config.http)?;

        Ok(Self::new(
            Arc::new(GoogleScholarSource::new(client.clone(), config)),
            Arc::new(PubMedIdResolver::new(client.clone(), config)),
            Arc::new(PubMedRecordFetcher::new(client.clone(), config)),
            Arc::new(PubMedLinkFetcher::new(client, config)),
        ))
    }

    /// Build from explicit components
    pub fn new(
        html: Arc<dyn HtmlSearchProvider>,
        resolver: Arc<dyn CitationIdResolver>,
        full_records: Arc<dyn CitationDetailFetcher>,
        cross_references: Arc<dyn CitationDetailFetcher>,
    ) -> Self {
        Self {
            html,
            resolver,
            full_records,
            cross_references,
            top_ten_strategy: DetailStrategy::default(),
        }
    }

    /// Choose how top-ten PubMed searches turn identifiers into studies.
    /// Single-result searches always fetch full records.
    pub fn with_top_ten_strategy(mut self, strategy: DetailStrategy) -> Self {
        self.top_ten_strategy = strategy;
        self
    }

    /// Run `query` against `source` in the query's mode
    pub async fn run(&self, source: SourceKind, query: &SearchQuery) -> OrchestratorResult {
        tracing::info!(
            source = source.id(),
            mode = %query.mode(),
            terms = query.terms(),
            min_year = query.min_year(),
            "Running search"
        );

        let outcome = match source {
            SourceKind::Html => self.run_html(query).await,
            SourceKind::Citation => self.run_citation(query).await,
        };

        match outcome {
            Ok(result) => {
                if let OrchestratorResult::Many(studies) = &result {
                    tracing::info!(source = source.id(), count = studies.len(), "Search done");
                } else {
                    tracing::info!(source = source.id(), count = 1, "Search done");
                }
                result
            }
            Err(err) => {
                tracing::warn!(source = source.id(), kind = err.kind(), "Search failed: {}", err);
                OrchestratorResult::Failed(err)
            }
        }
    }

    async fn run_html(&self, query: &SearchQuery) -> Result<OrchestratorResult, SourceError> {
        match query.mode() {
            SearchMode::First => {
                let study = self.html.search_first(query).await?;
                complete_single(Some(study), Stage::ScholarSearch)
            }
            SearchMode::TopTen => {
                let studies = self.html.search_top_ten(query).await?;
                complete_many(studies, SearchMode::TopTen.limit(), Stage::ScholarSearch)
            }
        }
    }

    async fn run_citation(&self, query: &SearchQuery) -> Result<OrchestratorResult, SourceError> {
        let mode = query.mode();
        let ids = self
            .resolver
            .resolve(query.terms(), query.min_year(), mode.limit())
            .await?;

        if ids.is_empty() {
            return Err(SourceError::not_found(Stage::CitationSearch));
        }
        tracing::debug!(count = ids.len(), ids = %ids.joined(), "Resolved identifiers");

        let fetcher = self.detail_fetcher(mode);
        let stage = fetch_stage(fetcher.strategy());
        let studies = fetcher.fetch_details(ids).await?.into_studies();

        match mode {
            SearchMode::First => complete_single(studies.into_iter().next(), stage),
            SearchMode::TopTen => complete_many(studies, mode.limit(), stage),
        }
    }

    fn detail_fetcher(&self, mode: SearchMode) -> &Arc<dyn CitationDetailFetcher> {
        match (mode, self.top_ten_strategy) {
            (SearchMode::TopTen, DetailStrategy::CrossReference) => &self.cross_references,
            _ => &self.full_records,
        }
    }
}

fn fetch_stage(strategy: DetailStrategy) -> Stage {
    match strategy {
        DetailStrategy::FullRecord => Stage::CitationFetch,
        DetailStrategy::CrossReference => Stage::CitationLinks,
    }
}

// A successful outcome never carries a study without title or url.
fn complete_single(study: Option<Study>, stage: Stage) -> Result<OrchestratorResult, SourceError> {
    study
        .filter(Study::is_complete)
        .map(OrchestratorResult::Single)
        .ok_or_else(|| SourceError::not_found(stage))
}

fn complete_many(
    studies: Vec<Study>,
    limit: usize,
    stage: Stage,
) -> Result<OrchestratorResult, SourceError> {
    let total = studies.len();
    let studies: Vec<Study> = studies
        .into_iter()
        .filter(Study::is_complete)
        .take(limit)
        .collect();

    if studies.len() < total.min(limit) {
        tracing::warn!(%stage, dropped = total.min(limit) - studies.len(), "Dropped incomplete studies");
    }
    if studies.is_empty() {
        return Err(SourceError::not_found(stage));
    }
    Ok(OrchestratorResult::Many(studies))
}
