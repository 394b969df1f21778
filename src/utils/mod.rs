//! Utility modules shared by the providers and the command-line front end.
//!
//! - [`HttpClient`]: shared HTTP client with per-stage error mapping
//! - [`format_study_card`], [`format_study_list`]: text rendering of results
//! - [`truncate_with_ellipsis`]: unicode-aware truncation

mod display;
mod http;

pub use display::{
    format_error_notice, format_study_card, format_study_list, render_result,
    truncate_with_ellipsis, ABSTRACT_MAX_WIDTH,
};
pub use http::HttpClient;
