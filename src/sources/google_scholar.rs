//! Google Scholar provider.
//!
//! Google Scholar has no public API; results are scraped from the HTML
//! search page. Scholar rejects requests that do not look like a browser, so
//! every request carries the configured browser `User-Agent`.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::config::Config;
use crate::models::{SearchMode, SearchQuery, Study};
use crate::sources::{HtmlSearchProvider, SourceError, Stage};
use crate::utils::HttpClient;

const STAGE: Stage = Stage::ScholarSearch;

/// Scholar search page, relative to the base url
const SEARCH_PATH: &str = "/scholar";

/// One organic result block
const RESULT_SELECTOR: &str = ".gs_ri";
const TITLE_SELECTOR: &str = "h3.gs_rt";
const LINK_SELECTOR: &str = "a[href]";
const AUTHORS_SELECTOR: &str = "div.gs_a";
const SNIPPET_SELECTOR: &str = "div.gs_rs";
/// Markers of the "unusual traffic" interstitial
const CAPTCHA_SELECTOR: &str = "#gs_captcha_ccl, #captcha-form, form[action*='sorry']";

/// Google Scholar search provider
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    client: HttpClient,
    base_url: String,
    user_agent: String,
}

impl GoogleScholarSource {
    /// Create a provider using the configured endpoint and user agent
    pub fn new(client: HttpClient, config: &Config) -> Self {
        Self::with_base_url(
            client,
            &config.endpoints.scholar_base_url,
            &config.http.user_agent,
        )
    }

    /// Create a provider against a specific base url
    pub fn with_base_url(client: HttpClient, base_url: &str, user_agent: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Build the search page url for a query
    fn build_search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}{}?hl=en&q={}&as_ylo={}",
            self.base_url,
            SEARCH_PATH,
            urlencoding::encode(query.terms()),
            query.min_year()
        )
    }

    async fn fetch_results(
        &self,
        query: &SearchQuery,
        mode: SearchMode,
    ) -> Result<Vec<Study>, SourceError> {
        let url = self.build_search_url(query);
        let html = self
            .client
            .get_text(
                &url,
                &[
                    ("User-Agent", self.user_agent.as_str()),
                    ("Accept", "text/html"),
                ],
                STAGE,
            )
            .await?;

        let studies = parse_results(&html, &self.base_url, mode)?;
        tracing::info!(count = studies.len(), %mode, "Google Scholar results parsed");
        Ok(studies)
    }
}

#[async_trait]
impl HtmlSearchProvider for GoogleScholarSource {
    async fn search_first(&self, query: &SearchQuery) -> Result<Study, SourceError> {
        self.fetch_results(query, SearchMode::First)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::not_found(STAGE))
    }

    async fn search_top_ten(&self, query: &SearchQuery) -> Result<Vec<Study>, SourceError> {
        self.fetch_results(query, SearchMode::TopTen).await
    }
}

/// Parse a Scholar result page.
///
/// In [`SearchMode::First`] only the first usable block is returned, with
/// author line and snippet. A leading block without a title or link does not
/// end the search with no result; the next usable block is returned instead. In [`SearchMode::TopTen`] up to ten blocks are
/// returned with title and link only. Blocks without a title or link (e.g.
/// `[CITATION]` entries) are skipped. An empty result is `NotFound`.
pub(crate) fn parse_results(
    html: &str,
    base_url: &str,
    mode: SearchMode,
) -> Result<Vec<Study>, SourceError> {
    let document = Html::parse_document(html);
    let base = Url::parse(base_url)
        .map_err(|e| SourceError::unavailable(STAGE, format!("invalid base url: {}", e)))?;

    let result_sel = selector(RESULT_SELECTOR)?;
    let title_sel = selector(TITLE_SELECTOR)?;
    let link_sel = selector(LINK_SELECTOR)?;
    let authors_sel = selector(AUTHORS_SELECTOR)?;
    let snippet_sel = selector(SNIPPET_SELECTOR)?;

    let with_details = mode == SearchMode::First;
    let mut studies = Vec::new();
    let mut blocks = 0usize;

    for block in document.select(&result_sel) {
        blocks += 1;

        let Some(title_el) = block.select(&title_sel).next() else {
            continue;
        };
        let title = clean_title(&element_text(&title_el));
        let url = title_el
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .map(String::from)
            .unwrap_or_default();

        let mut study = Study::new(title, url);
        if !study.is_complete() {
            tracing::debug!(title = %study.title, "skipping result block without title or link");
            continue;
        }

        if with_details {
            study = study
                .authors(first_text(&block, &authors_sel))
                .abstract_text(first_text(&block, &snippet_sel));
        }
        studies.push(study);

        if studies.len() >= mode.limit() {
            break;
        }
    }

    if studies.is_empty() {
        if blocks == 0 && document.select(&selector(CAPTCHA_SELECTOR)?).next().is_some() {
            return Err(SourceError::unavailable(STAGE, "blocked: captcha page"));
        }
        return Err(SourceError::not_found(STAGE));
    }

    Ok(studies)
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css)
        .map_err(|e| SourceError::unavailable(STAGE, format!("invalid selector {}: {:?}", css, e)))
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(block: &ElementRef, sel: &Selector) -> String {
    block
        .select(sel)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default()
}

/// Strip leading type badges such as `[PDF]`, `[HTML]` or `[BOOK][B]`
fn clean_title(title: &str) -> String {
    static BADGES: OnceLock<Option<Regex>> = OnceLock::new();
    match BADGES.get_or_init(|| Regex::new(r"^(\[[A-Z]+\]\s*)+").ok()) {
        Some(re) => re.replace(title, "").trim().to_string(),
        None => title.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://scholar.google.com";

    const MOCK_SCHOLAR_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div id="gs_res_ccl_mid">
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ri">
      <h3 class="gs_rt">
        <a href="https://www.nature.com/articles/s41586-020-1">
          Gut   microbiome and
          depression
        </a>
      </h3>
      <div class="gs_a">J Doe, A Smith - Nature, 2020 - nature.com</div>
      <div class="gs_rs">We show that the gut microbiome is associated with depression.</div>
    </div>
  </div>
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ri">
      <h3 class="gs_rt"><span class="gs_ctc"><span class="gs_ct1">[BOOK]</span><span class="gs_ct2">[B]</span></span>
        <a href="/citations?view_op=view_citation&amp;id=42">The microbiome book</a>
      </h3>
      <div class="gs_a">B Author - 2019</div>
      <div class="gs_rs">A book.</div>
    </div>
  </div>
  <div class="gs_r gs_or gs_scl">
    <div class="gs_ri">
      <h3 class="gs_rt"><span class="gs_ctu"><span class="gs_ct1">[CITATION]</span></span> Unlinked citation</h3>
      <div class="gs_a">C Nobody - 2018</div>
    </div>
  </div>
</div>
</body>
</html>"#;

    fn source() -> GoogleScholarSource {
        GoogleScholarSource::with_base_url(HttpClient::new().unwrap(), BASE, "Mozilla/5.0")
    }

    #[test]
    fn test_build_search_url() {
        let query = SearchQuery::new("gut microbiome", SearchMode::First)
            .unwrap()
            .with_min_year("2018")
            .unwrap();
        let url = source().build_search_url(&query);

        assert_eq!(
            url,
            "https://scholar.google.com/scholar?hl=en&q=gut%20microbiome&as_ylo=2018"
        );
    }

    #[test]
    fn test_build_search_url_default_year() {
        let query = SearchQuery::new("crispr & cas9", SearchMode::TopTen).unwrap();
        let url = source().build_search_url(&query);

        assert!(url.contains("q=crispr%20%26%20cas9"));
        assert!(url.ends_with("as_ylo=2015"));
    }

    #[test]
    fn test_parse_first_has_details() {
        let studies = parse_results(MOCK_SCHOLAR_HTML, BASE, SearchMode::First).unwrap();

        assert_eq!(studies.len(), 1);
        let study = &studies[0];
        assert_eq!(study.title, "Gut microbiome and depression");
        assert_eq!(study.url, "https://www.nature.com/articles/s41586-020-1");
        assert_eq!(study.authors, "J Doe, A Smith - Nature, 2020 - nature.com");
        assert!(study.r#abstract.starts_with("We show"));
    }

    #[test]
    fn test_parse_top_ten_titles_and_links_only() {
        let studies = parse_results(MOCK_SCHOLAR_HTML, BASE, SearchMode::TopTen).unwrap();

        // the unlinked citation is not surfaced
        assert_eq!(studies.len(), 2);
        for study in &studies {
            assert!(study.is_complete());
            assert!(study.authors.is_empty());
            assert!(study.r#abstract.is_empty());
        }
        assert_eq!(studies[1].title, "The microbiome book");
        assert_eq!(
            studies[1].url,
            "https://scholar.google.com/citations?view_op=view_citation&id=42"
        );
    }

    #[test]
    fn test_parse_top_ten_caps_at_ten() {
        let block = r#"<div class="gs_ri"><h3 class="gs_rt"><a href="https://example.com/x">X</a></h3></div>"#;
        let html = format!("<html><body>{}</body></html>", block.repeat(15));

        let studies = parse_results(&html, BASE, SearchMode::TopTen).unwrap();
        assert_eq!(studies.len(), 10);
    }

    #[test]
    fn test_parse_no_results_is_not_found() {
        let html = "<html><body><div id=\"gs_res_ccl_mid\"></div></body></html>";

        for mode in [SearchMode::First, SearchMode::TopTen] {
            let err = parse_results(html, BASE, mode).unwrap_err();
            assert_eq!(err, SourceError::not_found(Stage::ScholarSearch));
        }
    }

    #[test]
    fn test_parse_first_skips_leading_unlinked_block() {
        let html = r#"<div class="gs_ri"><h3 class="gs_rt">[CITATION] No link here</h3></div>
<div class="gs_ri"><h3 class="gs_rt"><a href="https://example.org/2">Linked</a></h3>
<div class="gs_a">A Author - 2020</div></div>"#;

        let studies = parse_results(html, BASE, SearchMode::First).unwrap();
        assert_eq!(studies.len(), 1);
        assert_eq!(studies[0].title, "Linked");
        assert_eq!(studies[0].authors, "A Author - 2020");
    }

    #[test]
    fn test_parse_only_unlinked_blocks_is_not_found() {
        let html = r#"<html><body><div class="gs_ri"><h3 class="gs_rt">No link here</h3></div></body></html>"#;

        let err = parse_results(html, BASE, SearchMode::First).unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[test]
    fn test_parse_captcha_page_is_unavailable() {
        let html = r#"<html><body><div id="gs_captcha_ccl"><form id="gs_captcha_f"></form></div></body></html>"#;

        let err = parse_results(html, BASE, SearchMode::TopTen).unwrap_err();
        assert!(matches!(err, SourceError::ProviderUnavailable { .. }));
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("[PDF] Deep learning"), "Deep learning");
        assert_eq!(clean_title("[BOOK][B] A book"), "A book");
        assert_eq!(clean_title("Plain [not a badge]"), "Plain [not a badge]");
    }
}
