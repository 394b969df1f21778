//! Study model: the normalized record every provider converges to.

use serde::{Deserialize, Serialize};

/// A single study as surfaced to the rendering layer.
///
/// Providers never hand out a `Study` with an empty title or url as part of a
/// successful outcome; [`Study::is_complete`] is the check they use before
/// surfacing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    /// Study title
    pub title: String,

    /// Absolute link to the source record
    pub url: String,

    /// Free-form author line, empty when unavailable
    pub authors: String,

    /// Abstract or snippet, empty when unavailable
    pub r#abstract: String,
}

impl Study {
    /// Create a study with the required fields
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            authors: String::new(),
            r#abstract: String::new(),
        }
    }

    /// Set the author line
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = authors.into();
        self
    }

    /// Set the abstract
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.r#abstract = text.into();
        self
    }

    /// Whether both title and url carry content
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }

    /// Markdown list entry: `- [title](<url>)`
    pub fn markdown_link(&self) -> String {
        format!("- [{}](<{}>)", self.title, self.url)
    }
}
