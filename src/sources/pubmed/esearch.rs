//! ESearch stage: free-text query to relevance-ordered PMIDs.

use async_trait::async_trait;
use serde::Deserialize;

use super::{encode_params, eutils_url};
use crate::config::Config;
use crate::models::CitationIdList;
use crate::sources::{CitationIdResolver, SourceError, Stage};
use crate::utils::HttpClient;

const STAGE: Stage = Stage::CitationSearch;
const ESEARCH_ENDPOINT: &str = "esearch.fcgi";

/// Resolves queries to PubMed identifiers through ESearch
#[derive(Debug, Clone)]
pub struct PubMedIdResolver {
    client: HttpClient,
    base_url: String,
    max_year: String,
}

impl PubMedIdResolver {
    pub fn new(client: HttpClient, config: &Config) -> Self {
        Self::with_base_url(
            client,
            &config.endpoints.eutils_base_url,
            config.search.effective_max_year(),
        )
    }

    /// Create with a specific E-utilities base url and upper year bound
    pub fn with_base_url(
        client: HttpClient,
        base_url: &str,
        max_year: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            max_year: max_year.into(),
        }
    }

    /// Build the ESearch url
    fn build_search_url(&self, terms: &str, min_year: &str, limit: usize) -> String {
        let params = [
            ("db", "pubmed".to_string()),
            ("term", terms.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "relevance".to_string()),
            ("retmax", limit.to_string()),
            ("datetype", "pdat".to_string()),
            ("mindate", min_year.to_string()),
            ("maxdate", self.max_year.clone()),
        ];

        format!(
            "{}?{}",
            eutils_url(&self.base_url, ESEARCH_ENDPOINT),
            encode_params(&params)
        )
    }
}

#[async_trait]
impl CitationIdResolver for PubMedIdResolver {
    async fn resolve(
        &self,
        terms: &str,
        min_year: &str,
        limit: usize,
    ) -> Result<CitationIdList, SourceError> {
        let url = self.build_search_url(terms, min_year, limit);
        let body = self
            .client
            .get_text(&url, &[("Accept", "application/json")], STAGE)
            .await?;

        let ids = parse_search_response(&body, limit)?;
        tracing::info!(count = ids.len(), "PubMed identifiers resolved");
        Ok(ids)
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: Option<String>,

    #[serde(default)]
    idlist: Vec<String>,

    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// Extract the identifier list from an ESearch JSON body
pub(crate) fn parse_search_response(
    json: &str,
    limit: usize,
) -> Result<CitationIdList, SourceError> {
    let response: ESearchResponse = serde_json::from_str(json).map_err(|e| {
        SourceError::unavailable(STAGE, format!("failed to decode ESearch JSON: {}", e))
    })?;
    let result = response.esearchresult;

    if let Some(error) = result.error {
        return Err(SourceError::unavailable(
            STAGE,
            format!("ESearch reported an error: {}", error),
        ));
    }

    tracing::debug!(count = ?result.count, returned = result.idlist.len(), "ESearch decoded");

    let ids = CitationIdList::new(result.idlist, limit);
    if ids.is_empty() {
        return Err(SourceError::not_found(STAGE));
    }
    Ok(ids)
}
