//! PubMed provider built on the NCBI E-utilities.
//!
//! A PubMed search is two chained stages: [`PubMedIdResolver`] (ESearch)
//! turns the query into PMIDs, then either [`PubMedRecordFetcher`] (EFetch,
//! full records) or [`PubMedLinkFetcher`] (ELink, provider links only) turns
//! the PMIDs into studies.

mod efetch;
mod elink;
mod esearch;

pub use efetch::PubMedRecordFetcher;
pub use elink::PubMedLinkFetcher;
pub use esearch::PubMedIdResolver;

use serde::Deserialize;

/// A value that upstream sends as a lone object for one item and as an array
/// for several. Array decoding is attempted first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Normalize both shapes into one ordered sequence
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// Join an E-utilities endpoint onto the configured base
fn eutils_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
}

/// Encode query parameters the way the E-utilities expect them
fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
