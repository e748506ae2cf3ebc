//! The mock network.

use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::NetworkConfig;

/// A canned HTTP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    #[serde(default)]
    pub body: String,
    /// Simulated latency the caller should sleep before replying.
    #[serde(default)]
    pub latency_ms: u64,
}

/// URL-keyed mock table.
///
/// Resolution order: exact keys first, then glob patterns in the order they
/// were declared in the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockNet {
    exact: Vec<(String, MockResponse)>,
    patterns: Vec<(String, MockResponse)>,
    fail_unmatched: bool,
}

impl MockNet {
    /// Build the table from config. Entries that fail to parse as response
    /// objects are dropped with a warning.
    #[must_use]
    pub fn from_config(config: &NetworkConfig) -> Self {
        let mut exact = Vec::new();
        let mut patterns = Vec::new();
        for (url, raw) in &config.mock_responses {
            let response: MockResponse = match serde_json::from_value(raw.clone()) {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = %url, error = %e, "Dropping unparseable mock response");
                    continue;
                },
            };
            if url.contains(['*', '?', '[']) {
                patterns.push((url.clone(), response));
            } else {
                exact.push((url.clone(), response));
            }
        }
        Self {
            exact,
            patterns,
            fail_unmatched: config.fail_unmatched,
        }
    }

    /// Resolve a URL to its mocked response, if any.
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<&MockResponse> {
        if let Some((_, response)) = self.exact.iter().find(|(key, _)| key == url) {
            return Some(response);
        }
        self.patterns.iter().find_map(|(pattern, response)| {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .ok()?;
            glob.compile_matcher().is_match(url).then_some(response)
        })
    }

    /// Whether unmatched URLs must fail instead of passing through to the
    /// real network.
    #[must_use]
    pub fn fail_unmatched(&self) -> bool {
        self.fail_unmatched
    }
}
