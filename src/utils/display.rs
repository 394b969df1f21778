//! Text rendering of search outcomes.
//!
//! A single study is shown as a card, several as a markdown link list. Errors
//! only ever show the generic notice from [`SourceError::user_message`].

use owo_colors::OwoColorize;

use crate::models::Study;
use crate::orchestrator::OrchestratorResult;
use crate::sources::SourceError;

/// Abstracts longer than this (in terminal columns) are cut with an ellipsis
pub const ABSTRACT_MAX_WIDTH: usize = 1000;

/// Truncate text to fit within the specified width using unicode-aware truncation.
///
/// Returns a string that fits within `max_width` columns, appending an
/// ellipsis if truncation occurred.
///
/// # Examples
///
/// ```
/// use scholar_search::utils::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
/// assert_eq!(truncate_with_ellipsis("Hi", 8), "Hi");
/// ```
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }

    let char_widths: Vec<(char, usize)> = text
        .chars()
        .map(|c| (c, unicode_width::UnicodeWidthChar::width(c).unwrap_or(1)))
        .collect();

    let total_width: usize = char_widths.iter().map(|(_, w)| *w).sum();
    if total_width <= max_width {
        return text.to_string();
    }

    // 3 columns are reserved for the ellipsis
    let mut current_width = 0;
    let mut end_idx = 0;
    for (i, (_c, w)) in char_widths.iter().enumerate() {
        if current_width + w > max_width.saturating_sub(3) {
            break;
        }
        current_width += w;
        end_idx = i + 1;
    }

    if end_idx == 0 {
        return "...".to_string();
    }

    let truncated: String = char_widths[..end_idx].iter().map(|(c, _)| *c).collect();
    format!("{}...", truncated.trim_end())
}

/// Card for a single study: bold title, link, author line and abstract.
/// Empty fields are left out.
pub fn format_study_card(study: &Study, color: bool) -> String {
    let mut lines = Vec::with_capacity(4);

    if color {
        lines.push(study.title.bold().to_string());
        lines.push(format!("<{}>", study.url.blue()));
    } else {
        lines.push(format!("**{}**", study.title));
        lines.push(format!("<{}>", study.url));
    }

    if !study.authors.is_empty() {
        let authors = if color {
            study.authors.dimmed().to_string()
        } else {
            format!("_{}_", study.authors)
        };
        lines.push(authors);
    }

    if !study.r#abstract.is_empty() {
        lines.push(String::new());
        lines.push(truncate_with_ellipsis(&study.r#abstract, ABSTRACT_MAX_WIDTH));
    }

    lines.join("\n")
}

/// One `- [title](<url>)` line per study, in order
pub fn format_study_list(studies: &[Study]) -> String {
    studies
        .iter()
        .map(Study::markdown_link)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generic failure notice for end users
pub fn format_error_notice(error: &SourceError, color: bool) -> String {
    let message = error.user_message();
    if color {
        format!("{} {}", "✗".red().bold(), message)
    } else {
        message
    }
}

/// Render an outcome for stdout (`Ok`) or stderr (`Err`)
pub fn render_result(result: &OrchestratorResult, color: bool) -> Result<String, String> {
    match result {
        OrchestratorResult::Single(study) => Ok(format_study_card(study, color)),
        OrchestratorResult::Many(studies) => Ok(format_study_list(studies)),
        OrchestratorResult::Failed(err) => Err(format_error_notice(err, color)),
    }
}
