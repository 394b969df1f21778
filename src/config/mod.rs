//! Configuration management.
//!
//! Every setting has a default, so an absent file is not an error. Values
//! can come from a TOML file and from environment variables prefixed with
//! `SCHOLAR_SEARCH_`, using `__` between section and key:
//!
//! ```toml
//! [endpoints]
//! scholar_base_url = "https://scholar.google.com"
//! eutils_base_url = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils"
//! article_url_template = "https://pubmed.ncbi.nlm.nih.gov/{id}/"
//!
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [search]
//! default_min_year = "2015"
//! max_year = "2024"
//! ```
//!
//! ```bash
//! export SCHOLAR_SEARCH_HTTP__TIMEOUT_SECS=10
//! ```

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::DEFAULT_MIN_YEAR;

/// Placeholder substituted with the PubMed identifier in `article_url_template`
pub const ARTICLE_ID_PLACEHOLDER: &str = "{id}";

const CONFIG_FILE_NAME: &str = "scholar-search.toml";
const ENV_PREFIX: &str = "SCHOLAR_SEARCH";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoints
    #[serde(default)]
    pub endpoints: Endpoints,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Search defaults
    #[serde(default)]
    pub search: SearchSettings,
}

/// Remote endpoints used by the providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_scholar_base_url")]
    pub scholar_base_url: String,

    /// Base of the E-utilities (`esearch.fcgi`, `efetch.fcgi`, `elink.fcgi`)
    #[serde(default = "default_eutils_base_url")]
    pub eutils_base_url: String,

    /// Outward link for a PubMed record, `{id}` is replaced by the PMID
    #[serde(default = "default_article_url_template")]
    pub article_url_template: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            scholar_base_url: default_scholar_base_url(),
            eutils_base_url: default_eutils_base_url(),
            article_url_template: default_article_url_template(),
        }
    }
}

impl Endpoints {
    /// Outward url for one PubMed identifier
    pub fn article_url(&self, id: &str) -> String {
        self.article_url_template.replace(ARTICLE_ID_PLACEHOLDER, id)
    }
}

fn default_scholar_base_url() -> String {
    "https://scholar.google.com".to_string()
}

fn default_eutils_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_article_url_template() -> String {
    "https://pubmed.ncbi.nlm.nih.gov/{id}/".to_string()
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Sent on every request; Scholar rejects non-browser agents
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Search defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Minimum publication year when the caller gives none
    #[serde(default = "default_min_year")]
    pub default_min_year: String,

    /// Upper bound for PubMed publication dates; the current year when unset
    #[serde(default)]
    pub max_year: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_min_year: default_min_year(),
            max_year: None,
        }
    }
}

impl SearchSettings {
    /// The configured upper year bound, or the current calendar year
    pub fn effective_max_year(&self) -> String {
        self.max_year
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().year().to_string())
    }
}

fn default_min_year() -> String {
    DEFAULT_MIN_YEAR.to_string()
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?;

    settings.try_deserialize()
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(environment())
        .build()?
        .try_deserialize()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// Look for `scholar-search.toml` in the working directory, then in the
/// platform config directory (`~/.config/scholar-search/` on Linux).
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("scholar-search").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.default_min_year, "2015");
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.http.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(
            config.endpoints.article_url("12345"),
            "https://pubmed.ncbi.nlm.nih.gov/12345/"
        );
    }

    #[test]
    fn test_effective_max_year() {
        let mut settings = SearchSettings::default();
        let current = chrono::Utc::now().year().to_string();
        assert_eq!(settings.effective_max_year(), current);

        settings.max_year = Some("2024".to_string());
        assert_eq!(settings.effective_max_year(), "2024");
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scholar-search.toml");

        let toml_content = r#"
[endpoints]
eutils_base_url = "http://127.0.0.1:9000/eutils"

[http]
timeout_secs = 5

[search]
default_min_year = "2019"
max_year = "2024"
"#;
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.endpoints.eutils_base_url, "http://127.0.0.1:9000/eutils");
        assert_eq!(config.endpoints.scholar_base_url, "https://scholar.google.com");
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(config.search.default_min_year, "2019");
        assert_eq!(config.search.max_year.as_deref(), Some("2024"));
    }

    #[test]
    fn test_load_config_nonexistent() {
        let result = load_config(Path::new("/nonexistent/scholar-search.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(load_config(&path).is_err());
    }
}
