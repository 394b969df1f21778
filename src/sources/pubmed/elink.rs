//! ELink stage: PMIDs to outbound full-text provider links.
//!
//! The `prlinks` command only returns links, so studies produced here carry
//! an identifier label instead of a real title.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::{encode_params, eutils_url, OneOrMany};
use crate::config::Config;
use crate::models::{CitationIdList, CitationRecordSet, Study};
use crate::sources::{CitationDetailFetcher, DetailStrategy, SourceError, Stage};
use crate::utils::HttpClient;

const STAGE: Stage = Stage::CitationLinks;
const ELINK_ENDPOINT: &str = "elink.fcgi";

/// Fetches provider links for PMIDs through ELink `prlinks`
#[derive(Debug, Clone)]
pub struct PubMedLinkFetcher {
    client: HttpClient,
    base_url: String,
}

impl PubMedLinkFetcher {
    pub fn new(client: HttpClient, config: &Config) -> Self {
        Self::with_base_url(client, &config.endpoints.eutils_base_url)
    }

    pub fn with_base_url(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    fn build_link_url(&self, ids: &CitationIdList) -> String {
        let params = [
            ("dbfrom", "pubmed".to_string()),
            ("cmd", "prlinks".to_string()),
            ("retmode", "json".to_string()),
            ("id", ids.joined()),
        ];
        format!(
            "{}?{}",
            eutils_url(&self.base_url, ELINK_ENDPOINT),
            encode_params(&params)
        )
    }
}

#[async_trait]
impl CitationDetailFetcher for PubMedLinkFetcher {
    fn strategy(&self) -> DetailStrategy {
        DetailStrategy::CrossReference
    }

    async fn fetch_details(&self, ids: CitationIdList) -> Result<CitationRecordSet, SourceError> {
        if ids.is_empty() {
            return Err(SourceError::InvalidInput(
                "no PubMed identifiers to link".to_string(),
            ));
        }

        let url = self.build_link_url(&ids);
        let body = self
            .client
            .get_text(&url, &[("Accept", "application/json")], STAGE)
            .await?;

        let links = parse_link_response(&body)?;
        let set = assemble(&links, &ids);

        if set.is_empty() {
            return Err(SourceError::not_found(STAGE));
        }
        tracing::warn!(
            count = set.len(),
            "cross-reference records carry no titles; labelled by PMID"
        );
        Ok(set)
    }
}

#[derive(Debug, Deserialize)]
struct ELinkResponse {
    #[serde(default)]
    linksets: Option<OneOrMany<LinkSet>>,
}

#[derive(Debug, Deserialize)]
struct LinkSet {
    #[serde(default)]
    idurllist: Option<OneOrMany<IdUrlSet>>,
}

#[derive(Debug, Deserialize)]
struct IdUrlSet {
    #[serde(default)]
    id: Option<serde_json::Value>,

    #[serde(default)]
    objurls: Option<OneOrMany<ObjUrl>>,
}

#[derive(Debug, Deserialize)]
struct ObjUrl {
    #[serde(default)]
    url: Option<UrlValue>,
}

#[derive(Debug, Deserialize)]
struct UrlValue {
    #[serde(default)]
    value: Option<String>,
}

/// Map each PMID to its first non-empty provider link
pub(crate) fn parse_link_response(json: &str) -> Result<HashMap<String, String>, SourceError> {
    let response: ELinkResponse = serde_json::from_str(json).map_err(|e| {
        SourceError::unavailable(STAGE, format!("failed to decode ELink JSON: {}", e))
    })?;

    let mut links = HashMap::new();

    let id_sets = response
        .linksets
        .unwrap_or_default()
        .into_vec()
        .into_iter()
        .flat_map(|set| set.idurllist.unwrap_or_default().into_vec());

    for id_set in id_sets {
        let id = match id_set.id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => continue,
        };

        let url = id_set
            .objurls
            .unwrap_or_default()
            .into_vec()
            .into_iter()
            .filter_map(|obj| obj.url.and_then(|u| u.value))
            .find(|value| !value.trim().is_empty());

        match url {
            Some(url) => {
                links.entry(id).or_insert(url);
            }
            None => tracing::debug!(pmid = %id, "no provider link for identifier"),
        }
    }

    Ok(links)
}

fn assemble(links: &HashMap<String, String>, ids: &CitationIdList) -> CitationRecordSet {
    let studies = ids
        .ids()
        .iter()
        .filter_map(|id| {
            links
                .get(id)
                .map(|url| Study::new(format!("PMID {}", id), url.clone()))
        })
        .collect();
    CitationRecordSet::new(studies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> CitationIdList {
        CitationIdList::new(values.iter().map(|v| v.to_string()).collect(), 10)
    }

    const ELINK_JSON: &str = r#"{
        "header": {"type": "elink", "version": "0.3"},
        "linksets": [{
            "dbfrom": "pubmed",
            "idurllist": [
                {
                    "id": "111",
                    "objurls": [{
                        "url": {"value": "https://publisher.example/111"},
                        "iconurl": {"value": "https://publisher.example/icon.png"},
                        "subjecttypes": [],
                        "categories": ["Full Text Sources"],
                        "attributes": ["Subscription/membership/fee required"],
                        "provider": {"name": "Publisher", "nameabbr": "PUB", "id": "1"}
                    }]
                },
                {"id": "222"},
                {"id": "333", "objurls": [{"provider": {"name": "No url"}}, {"url": {"value": "https://other.example/333"}}]}
            ]
        }]
    }"#;

    #[test]
    fn test_parse_link_response() {
        let links = parse_link_response(ELINK_JSON).unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links["111"], "https://publisher.example/111");
        assert_eq!(links["333"], "https://other.example/333");
        assert!(!links.contains_key("222"));
    }

    #[test]
    fn test_parse_link_response_single_object_shapes() {
        let json = r#"{
            "linksets": {"idurllist": {"id": 444, "objurls": {"url": {"value": "https://x.example/444"}}}}
        }"#;
        let links = parse_link_response(json).unwrap();
        assert_eq!(links["444"], "https://x.example/444");
    }

    #[test]
    fn test_parse_link_response_missing_fields() {
        let links = parse_link_response(r#"{"header": {}}"#).unwrap();
        assert!(links.is_empty());

        let links = parse_link_response(r#"{"linksets": [{"dbfrom": "pubmed"}]}"#).unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_parse_link_response_malformed() {
        let err = parse_link_response("{").unwrap_err();
        assert!(matches!(
            err,
            SourceError::ProviderUnavailable { stage: Stage::CitationLinks, .. }
        ));
    }

    #[test]
    fn test_assemble_orders_by_ids_and_labels() {
        let links = parse_link_response(ELINK_JSON).unwrap();
        let studies = assemble(&links, &ids(&["333", "222", "111"])).into_studies();

        assert_eq!(studies.len(), 2);
        assert_eq!(studies[0].title, "PMID 333");
        assert_eq!(studies[0].url, "https://other.example/333");
        assert_eq!(studies[1].title, "PMID 111");
        assert!(studies.iter().all(Study::is_complete));
    }

    #[test]
    fn test_build_link_url() {
        let fetcher = PubMedLinkFetcher::with_base_url(
            HttpClient::new().unwrap(),
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils",
        );
        let url = fetcher.build_link_url(&ids(&["1", "2"]));
        assert_eq!(
            url,
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/elink.fcgi?dbfrom=pubmed&cmd=prlinks&retmode=json&id=1%2C2"
        );
    }
}
