//! Optional lexicon HTTP client.
//!
//! Consulted by the MWE pipeline for best-effort evidence about candidate
//! surfaces. Disabled unless an endpoint is configured, and strictly
//! non-blocking for the pipeline: network failures, timeouts, and non-2xx
//! responses all collapse to "no evidence", since enrichment must never
//! stall core structural progress.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Default per-call timeout.
const DEFAULT_TIMEOUT_MS: u64 = 1500;

/// Default row limit per title query.
const DEFAULT_LIMIT: usize = 10;

/// Lexicon client configuration.
#[derive(Debug, Clone)]
pub struct LexiconConfig {
    /// Service endpoint, e.g. `http://localhost:8642/titles`.
    pub endpoint: String,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum rows per query.
    pub limit: usize,
}

impl LexiconConfig {
    /// Config for an endpoint with default timeout and limit.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One row returned by the title query.
#[derive(Debug, Clone, Deserialize)]
pub struct LexiconRow {
    /// The matched title.
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    #[serde(default)]
    rows: Vec<LexiconRow>,
}

/// HTTP client for the lexicon title service.
pub struct LexiconClient {
    agent: ureq::Agent,
    config: LexiconConfig,
}

impl std::fmt::Debug for LexiconClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexiconClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LexiconClient {
    /// Build a client for the configured endpoint.
    #[must_use]
    pub fn new(config: LexiconConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build();
        Self { agent, config }
    }

    /// Query titles matching `surface`, up to `limit` rows.
    ///
    /// This is the raw call; stage code uses [`LexiconClient::evidence`],
    /// which absorbs failures.
    pub fn query_title(&self, surface: &str, limit: usize) -> Result<Vec<LexiconRow>> {
        let response = self
            .agent
            .get(&self.config.endpoint)
            .query("title", surface)
            .query("limit", &limit.to_string())
            .call()
            .map_err(|e| Error::lexicon(format!("query failed: {e}")))?;
        let parsed: TitleResponse = response
            .into_json()
            .map_err(|e| Error::lexicon(format!("bad response body: {e}")))?;
        Ok(parsed.rows)
    }

    /// Best-effort evidence for a candidate surface.
    ///
    /// Returns `None` on any failure; callers attach the evidence when
    /// present and proceed identically when absent.
    #[must_use]
    pub fn evidence(&self, surface: &str) -> Option<Value> {
        match self.query_title(surface, self.config.limit) {
            Ok(rows) => Some(summarize(surface, &rows)),
            Err(err) => {
                log::debug!("lexicon lookup for {surface:?} failed: {err}");
                None
            }
        }
    }
}

/// Fold rows into the evidence shape stages record.
#[must_use]
pub fn summarize(surface: &str, rows: &[LexiconRow]) -> Value {
    let lower = surface.to_lowercase();
    let exact = rows.iter().any(|r| r.title.to_lowercase() == lower);
    let prefix_count = rows
        .iter()
        .filter(|r| r.title.to_lowercase().starts_with(&lower))
        .count();
    let parenthetical = format!("{lower} (");
    let parenthetical_count = rows
        .iter()
        .filter(|r| r.title.to_lowercase().starts_with(&parenthetical))
        .count();
    json!({
        "wiki_exact_match": exact,
        "wiki_prefix_count": prefix_count,
        "wiki_parenthetical_variant_count": parenthetical_count,
        "wiki_any_signal": exact || prefix_count > 0 || parenthetical_count > 0,
    })
}
