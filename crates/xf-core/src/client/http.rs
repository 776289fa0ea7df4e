//! HTTP backend for the free-plan API.

use super::{Granularity, PostsClient};
use std::time::Duration;
use xf_common::{Error, Result};

/// Environment variable holding the API bearer token.
pub const ENV_BEARER_TOKEN: &str = "XFETCH_BEARER_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.x.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields requested so the normalizer can build full output rows.
const TWEET_FIELDS: &str = "author_id,conversation_id,created_at,lang,public_metrics";
const USER_FIELDS: &str = "name,public_metrics,username";

/// Bearer-token client for the v2 counts and recent-search endpoints.
#[derive(Debug)]
pub struct HttpPostsClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpPostsClient {
    /// Build a client from `XFETCH_BEARER_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(ENV_BEARER_TOKEN).map_err(|_| Error::MissingToken)?;
        if token.trim().is_empty() {
            return Err(Error::MissingToken);
        }
        Ok(Self::new(token))
    }

    pub fn new(token: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build();
        Self {
            agent,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        }
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token));
        for (key, value) in params {
            request = request.query(key, value);
        }

        tracing::debug!(%url, "API request");

        match request.call() {
            Ok(response) => response
                .into_json::<serde_json::Value>()
                .map_err(|e| Error::Network(format!("failed to read response body: {}", e))),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                tracing::warn!(status, "API error response");
                match status {
                    401 | 403 => Err(Error::AuthRejected { status }),
                    400 | 422 => Err(Error::QueryRejected {
                        status,
                        message: truncate_body(&body),
                    }),
                    _ => Err(Error::UnexpectedStatus { status }),
                }
            }
            Err(ureq::Error::Transport(transport)) => Err(Error::Network(transport.to_string())),
        }
    }
}

impl PostsClient for HttpPostsClient {
    fn counts_recent(&self, query: &str, granularity: Granularity) -> Result<serde_json::Value> {
        self.get(
            "/2/tweets/counts/recent",
            &[("query", query), ("granularity", granularity.as_str())],
        )
    }

    fn search_recent(&self, query: &str, max_results: u32) -> Result<serde_json::Value> {
        let max_results = max_results.to_string();
        self.get(
            "/2/tweets/search/recent",
            &[
                ("query", query),
                ("max_results", &max_results),
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", "author_id"),
                ("user.fields", USER_FIELDS),
            ],
        )
    }
}

/// Keep API error bodies log-sized.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{}...(truncated)", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_reported() {
        // Guard against env leakage from the host
        std::env::remove_var(ENV_BEARER_TOKEN);
        let err = HttpPostsClient::from_env().unwrap_err();
        assert!(matches!(err, Error::MissingToken));
    }

    #[test]
    fn truncate_body_limits_length() {
        let long = "x".repeat(1000);
        let out = truncate_body(&long);
        assert!(out.ends_with("...(truncated)"));
        assert!(out.chars().count() < 1000);
        assert_eq!(truncate_body("  short  "), "short");
    }
}
