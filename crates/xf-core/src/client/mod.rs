//! Free-plan API client.
//!
//! `PostsClient` is the seam between the CLI and the platform API. Two
//! backends implement it: [`HttpPostsClient`] talks to the real v2
//! endpoints with a bearer token, and [`SamplePostsClient`] generates
//! deterministic offline payloads with the same shape (selected with
//! `--offline`, and used by the e2e tests).

pub mod http;
pub mod sample;

pub use http::HttpPostsClient;
pub use sample::SamplePostsClient;

use clap::ValueEnum;
use xf_common::Result;

/// API window for `max_results` on recent search.
pub const MIN_RESULTS: u32 = 10;
pub const MAX_RESULTS: u32 = 100;

/// Clamp a requested result count to the API's accepted window.
pub fn clamp_max_results(n: u32) -> u32 {
    n.clamp(MIN_RESULTS, MAX_RESULTS)
}

/// Bucket granularity for the counts endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Granularity {
    #[default]
    Hour,
    Day,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A client for the counts and recent-search endpoint class.
pub trait PostsClient {
    /// Post counts over the recent window, bucketed by `granularity`.
    fn counts_recent(&self, query: &str, granularity: Granularity) -> Result<serde_json::Value>;

    /// Recent search returning up to `max_results` posts with author
    /// expansions.
    fn search_recent(&self, query: &str, max_results: u32) -> Result<serde_json::Value>;
}
