//! EFetch stage: PMIDs to full bibliographic records.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{encode_params, eutils_url};
use crate::config::{Config, Endpoints};
use crate::models::{CitationIdList, CitationRecordSet, Study};
use crate::sources::{CitationDetailFetcher, DetailStrategy, SourceError, Stage};
use crate::utils::HttpClient;

const STAGE: Stage = Stage::CitationFetch;
const EFETCH_ENDPOINT: &str = "efetch.fcgi";

/// Fetches full PubMed records in one batched EFetch request
#[derive(Debug, Clone)]
pub struct PubMedRecordFetcher {
    client: HttpClient,
    endpoints: Endpoints,
}

impl PubMedRecordFetcher {
    pub fn new(client: HttpClient, config: &Config) -> Self {
        Self::with_endpoints(client, config.endpoints.clone())
    }

    pub fn with_endpoints(client: HttpClient, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Build the EFetch url for a batch of PMIDs
    fn build_fetch_url(&self, ids: &CitationIdList) -> String {
        let params = [
            ("db", "pubmed".to_string()),
            ("id", ids.joined()),
            ("retmode", "xml".to_string()),
        ];
        format!(
            "{}?{}",
            eutils_url(&self.endpoints.eutils_base_url, EFETCH_ENDPOINT),
            encode_params(&params)
        )
    }
}

#[async_trait]
impl CitationDetailFetcher for PubMedRecordFetcher {
    fn strategy(&self) -> DetailStrategy {
        DetailStrategy::FullRecord
    }

    async fn fetch_details(&self, ids: CitationIdList) -> Result<CitationRecordSet, SourceError> {
        if ids.is_empty() {
            return Err(SourceError::InvalidInput(
                "no PubMed identifiers to fetch".to_string(),
            ));
        }

        let url = self.build_fetch_url(&ids);
        let xml = self
            .client
            .get_text(&url, &[("Accept", "application/xml")], STAGE)
            .await?;

        let records = parse_fetch_response(&xml)?;
        let set = assemble(records, &ids, &self.endpoints);
        tracing::info!(
            requested = ids.len(),
            returned = set.len(),
            "PubMed records fetched"
        );

        if set.is_empty() {
            return Err(SourceError::not_found(STAGE));
        }
        Ok(set)
    }
}

/// Fields extracted from one `PubmedArticle`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ArticleRecord {
    pub pmid: String,
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
}

/// Element whose text is copied into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Title,
    AbstractSection,
    LastName,
    ForeName,
    CollectiveName,
}

/// Text being collected for `field`, opened at `depth`
#[derive(Debug)]
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Debug, Default)]
struct AuthorDraft {
    last: String,
    fore: String,
    collective: String,
}

impl AuthorDraft {
    fn name(&self) -> Option<String> {
        if !self.collective.is_empty() {
            return Some(self.collective.clone());
        }
        let name = format!("{} {}", self.fore, self.last).trim().to_string();
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Default)]
struct ArticleDraft {
    pmid: String,
    title: String,
    sections: Vec<String>,
    authors: Vec<String>,
    author: Option<AuthorDraft>,
}

impl ArticleDraft {
    fn apply(&mut self, field: Field, text: String) {
        match field {
            Field::Pmid => self.pmid = text,
            Field::Title => self.title = text,
            Field::AbstractSection => {
                if !text.is_empty() {
                    self.sections.push(text);
                }
            }
            Field::LastName | Field::ForeName | Field::CollectiveName => {
                let Some(author) = self.author.as_mut() else {
                    return;
                };
                match field {
                    Field::LastName => author.last = text,
                    Field::ForeName => author.fore = text,
                    _ => author.collective = text,
                }
            }
        }
    }

    fn finish_author(&mut self) {
        if let Some(name) = self.author.take().and_then(|a| a.name()) {
            self.authors.push(name);
        }
    }

    fn finish(self) -> ArticleRecord {
        ArticleRecord {
            pmid: self.pmid,
            title: self.title,
            authors: self.authors.join(", "),
            abstract_text: self.sections.join(" "),
        }
    }
}

fn names(path: &[Vec<u8>]) -> Vec<&[u8]> {
    path.iter().map(Vec::as_slice).collect()
}

fn is_article(path: &[Vec<u8>]) -> bool {
    matches!(names(path).as_slice(), [b"PubmedArticleSet", b"PubmedArticle"])
}

fn is_author(path: &[Vec<u8>]) -> bool {
    matches!(
        names(path).as_slice(),
        [.., b"MedlineCitation", b"Article", b"AuthorList", b"Author"]
    )
}

fn field_at(path: &[Vec<u8>]) -> Option<Field> {
    match names(path).as_slice() {
        [b"PubmedArticleSet", b"PubmedArticle", b"MedlineCitation", b"PMID"] => Some(Field::Pmid),
        [.., b"MedlineCitation", b"Article", b"ArticleTitle"] => Some(Field::Title),
        [.., b"MedlineCitation", b"Article", b"Abstract", b"AbstractText"] => {
            Some(Field::AbstractSection)
        }
        [.., b"Article", b"AuthorList", b"Author", b"LastName"] => Some(Field::LastName),
        [.., b"Article", b"AuthorList", b"Author", b"ForeName"] => Some(Field::ForeName),
        [.., b"Article", b"AuthorList", b"Author", b"CollectiveName"] => {
            Some(Field::CollectiveName)
        }
        _ => None,
    }
}

fn decode_error(e: impl std::fmt::Display) -> SourceError {
    SourceError::unavailable(STAGE, format!("failed to decode EFetch XML: {}", e))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode an EFetch `PubmedArticleSet` document into per-article records.
///
/// A lone `PubmedArticle` and many of them read the same way. Siblings such
/// as `PubmedBookArticle` are skipped. Inline children of a text element
/// (`<i>`, `<sup>`, MathML) are flattened into its text.
pub(crate) fn parse_fetch_response(xml: &str) -> Result<Vec<ArticleRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut records = Vec::new();
    let mut article: Option<ArticleDraft> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event().map_err(decode_error)? {
            Event::Start(e) => {
                path.push(e.name().as_ref().to_vec());
                if capture.is_some() {
                    continue;
                }
                if is_article(&path) {
                    article = Some(ArticleDraft::default());
                } else if let Some(draft) = article.as_mut() {
                    if is_author(&path) {
                        draft.author = Some(AuthorDraft::default());
                    } else if let Some(field) = field_at(&path) {
                        capture = Some(Capture {
                            field,
                            depth: path.len(),
                            text: String::new(),
                        });
                    }
                }
            }
            Event::Text(e) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&e.unescape().map_err(decode_error)?);
                }
            }
            Event::CData(e) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if capture.as_ref().is_some_and(|c| c.depth == path.len()) {
                    if let (Some(done), Some(draft)) = (capture.take(), article.as_mut()) {
                        draft.apply(done.field, normalize(&done.text));
                    }
                } else if capture.is_none() && is_author(&path) {
                    if let Some(draft) = article.as_mut() {
                        draft.finish_author();
                    }
                } else if is_article(&path) {
                    if let Some(draft) = article.take() {
                        records.push(draft.finish());
                    }
                }
                path.pop();
            }
            Event::Eof => {
                if !path.is_empty() {
                    return Err(decode_error("unexpected end of document"));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(records)
}

/// Order records by the requested identifiers and build studies.
///
/// Identifiers without a record, and records without a title, are left out;
/// the url always comes from the article template, never from the XML.
pub(crate) fn assemble(
    records: Vec<ArticleRecord>,
    ids: &CitationIdList,
    endpoints: &Endpoints,
) -> CitationRecordSet {
    let mut studies = Vec::with_capacity(ids.len());

    for id in ids.ids() {
        let Some(record) = records.iter().find(|r| &r.pmid == id) else {
            tracing::debug!(pmid = %id, "no record returned for identifier");
            continue;
        };
        if record.title.is_empty() {
            tracing::warn!(pmid = %id, "dropping record without a title");
            continue;
        }

        studies.push(
            Study::new(record.title.clone(), endpoints.article_url(id))
                .authors(record.authors.clone())
                .abstract_text(record.abstract_text.clone()),
        );
    }

    CitationRecordSet::new(studies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_ARTICLE_XML: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">111</PMID>
      <Article PubModel="Print">
        <ArticleTitle>Gut microbiome and <i>Bacteroides</i> in depression.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND" NlmCategory="BACKGROUND">Depression is common.</AbstractText>
          <AbstractText Label="RESULTS" NlmCategory="RESULTS">CO<sub>2</sub> levels rose.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Doe</LastName><ForeName>Jane</ForeName><Initials>J</Initials></Author>
          <Author ValidYN="Y"><CollectiveName>Microbiome Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    const MULTI_ARTICLE_XML: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation><PMID Version="1">222</PMID><Article><ArticleTitle>B</ArticleTitle></Article></MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation><PMID Version="1">111</PMID><Article><ArticleTitle>A</ArticleTitle></Article></MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation><PMID Version="1">333</PMID><Article><ArticleTitle></ArticleTitle></Article></MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    fn ids(values: &[&str]) -> CitationIdList {
        CitationIdList::new(values.iter().map(|v| v.to_string()).collect(), 10)
    }

    #[test]
    fn test_parse_single_article() {
        let records = parse_fetch_response(SINGLE_ARTICLE_XML).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.pmid, "111");
        assert_eq!(record.title, "Gut microbiome and Bacteroides in depression.");
        assert_eq!(record.abstract_text, "Depression is common. CO2 levels rose.");
        assert_eq!(record.authors, "Jane Doe, Microbiome Consortium");
    }

    #[test]
    fn test_parse_multiple_articles() {
        let records = parse_fetch_response(MULTI_ARTICLE_XML).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[2].title.is_empty());
    }

    #[test]
    fn test_parse_skips_book_articles_between_articles() {
        let xml = r#"<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation><PMID Version="1">1</PMID><Article><ArticleTitle>First</ArticleTitle></Article></MedlineCitation>
  </PubmedArticle>
  <PubmedBookArticle>
    <BookDocument>
      <PMID Version="1">2</PMID>
      <ArticleTitle>A chapter</ArticleTitle>
      <AuthorList><Author><LastName>Editor</LastName></Author></AuthorList>
    </BookDocument>
  </PubmedBookArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">3</PMID>
      <Article><ArticleTitle>Third</ArticleTitle></Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="CommentIn"><PMID Version="1">999</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let records = parse_fetch_response(xml).unwrap();
        let parsed: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.pmid.as_str(), r.title.as_str()))
            .collect();
        assert_eq!(parsed, [("1", "First"), ("3", "Third")]);

        let set = assemble(records, &ids(&["1", "2", "3"]), &Endpoints::default());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_parse_flattens_mathml_in_title_and_abstract() {
        let xml = r#"<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">42</PMID>
      <Article>
        <ArticleTitle>Rates of <mml:math xmlns:mml="http://www.w3.org/1998/Math/MathML"><mml:mi>x</mml:mi></mml:math> growth</ArticleTitle>
        <Abstract>
          <AbstractText>We model <mml:math xmlns:mml="http://www.w3.org/1998/Math/MathML"><mml:msup><mml:mi>e</mml:mi><mml:mi>t</mml:mi></mml:msup></mml:math> decay &amp; <b>bias</b>.</AbstractText>
        </Abstract>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let records = parse_fetch_response(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Rates of x growth");
        assert_eq!(records[0].abstract_text, "We model et decay & bias.");
    }

    #[test]
    fn test_parse_empty_set() {
        let records = parse_fetch_response("<PubmedArticleSet></PubmedArticleSet>").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_malformed_is_unavailable() {
        let err = parse_fetch_response("<PubmedArticleSet><PubmedArticle>").unwrap_err();
        assert!(matches!(
            err,
            SourceError::ProviderUnavailable { stage: Stage::CitationFetch, .. }
        ));
    }

    #[test]
    fn test_assemble_single_and_multi_shapes() {
        let endpoints = Endpoints::default();

        let single = assemble(
            parse_fetch_response(SINGLE_ARTICLE_XML).unwrap(),
            &ids(&["111"]),
            &endpoints,
        );
        assert_eq!(single.len(), 1);

        let multi = assemble(
            parse_fetch_response(MULTI_ARTICLE_XML).unwrap(),
            &ids(&["111", "222"]),
            &endpoints,
        );
        assert_eq!(multi.len(), 2);
    }

    #[test]
    fn test_assemble_follows_identifier_order_and_template_url() {
        let records = parse_fetch_response(MULTI_ARTICLE_XML).unwrap();
        let set = assemble(records, &ids(&["111", "222", "333", "444"]), &Endpoints::default());

        // 333 has no title and 444 was not returned
        let studies = set.into_studies();
        assert_eq!(studies.len(), 2);
        assert_eq!(studies[0].title, "A");
        assert_eq!(studies[0].url, "https://pubmed.ncbi.nlm.nih.gov/111/");
        assert_eq!(studies[1].title, "B");
        assert_eq!(studies[1].url, "https://pubmed.ncbi.nlm.nih.gov/222/");
    }

    #[test]
    fn test_build_fetch_url() {
        let fetcher =
            PubMedRecordFetcher::with_endpoints(HttpClient::new().unwrap(), Endpoints::default());
        let url = fetcher.build_fetch_url(&ids(&["111", "222"]));

        assert_eq!(
            url,
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi?db=pubmed&id=111%2C222&retmode=xml"
        );
    }

    #[tokio::test]
    async fn test_fetch_details_rejects_empty_ids() {
        let fetcher =
            PubMedRecordFetcher::with_endpoints(HttpClient::new().unwrap(), Endpoints::default());
        let err = fetcher
            .fetch_details(CitationIdList::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidInput(_)));
    }
}
