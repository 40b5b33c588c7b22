//! Client for Reddit's public JSON endpoints.
//!
//! No authentication is used: subreddit listings are read from
//! `/r/{name}/{listing}.json` and comment trees from `{permalink}.json`.
//! Requests are sent one at a time; failed requests are retried with
//! exponential backoff and jitter before the error is handed back to the
//! caller, who decides whether to skip the item.

use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{FetchConfig, RetryConfig};
use crate::error::{PipelineError, Result};

/// Placeholder recorded for missing or deleted authors.
pub const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, Deserialize)]
/// A Reddit listing envelope.
///
/// # Fields
///
/// * `kind` - Always `Listing` for well-formed responses.
/// * `data` - The children and the pagination cursor.
pub struct Listing {
    pub kind: String,
    pub data: ListingData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<ListingChild>,
    #[serde(default)]
    pub after: Option<String>,
}

/// One listing entry. `data` stays untyped so a malformed entry can be
/// skipped without losing the rest of the page.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingChild {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
/// The fields of a submission (`t3`) the pipeline uses.
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: u64,
    #[serde(default)]
    pub stickied: bool,
}

/// A comment as fetched, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub author: String,
    pub body: String,
}

/// Turn a raw listing response into a [`Listing`].
pub fn parse_listing(value: Value) -> Result<Listing> {
    serde_json::from_value(value).map_err(|e| PipelineError::parse("listing", e))
}

/// Collect comments from a comment-page response.
///
/// # Arguments
///
/// * `response` - The JSON array returned by `{permalink}.json`; the second
///   element holds the comment listing.
/// * `max_depth` - Deepest reply level to keep, 0 for top-level only.
/// * `limit` - Maximum number of comments returned.
///
/// # Returns
///
/// Comments in depth-first order. `more` stubs and malformed entries are
/// ignored.
pub fn walk_comments(response: &Value, max_depth: usize, limit: usize) -> Vec<RawComment> {
    let mut out = Vec::new();
    if let Some(children) = response
        .get(1)
        .and_then(|listing| listing.pointer("/data/children"))
        .and_then(Value::as_array)
    {
        walk_children(children, 0, max_depth, limit, &mut out);
    }
    out
}

fn walk_children(children: &[Value], depth: usize, max_depth: usize, limit: usize, out: &mut Vec<RawComment>) {
    for child in children {
        if out.len() >= limit {
            return;
        }
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = child.get("data") else { continue };
        let author = data
            .get("author")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .unwrap_or(DELETED_AUTHOR)
            .to_string();
        let body = data
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        out.push(RawComment { author, body });

        if depth < max_depth {
            // `replies` is an empty string when there are none.
            if let Some(replies) = data
                .pointer("/replies/data/children")
                .and_then(Value::as_array)
            {
                walk_children(replies, depth + 1, max_depth, limit, out);
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based), capped and jittered.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exp = retry
        .backoff_multiplier
        .powi(attempt.saturating_sub(1) as i32);
    let base = retry.base_delay.as_secs_f64() * exp;
    let capped = base.min(retry.max_delay.as_secs_f64());
    let jitter = capped * retry.jitter_factor.clamp(0.0, 1.0) * fastrand::f64();
    Duration::from_secs_f64(capped + jitter)
}

/// Sequential HTTP client for the public endpoints.
pub struct RedditClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    request_delay: Duration,
}

impl RedditClient {
    /// Create a new `RedditClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - Base URL, user agent, timeout, retry policy and delay.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::config(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
            request_delay: config.request_delay,
        })
    }

    /// Absolute URL for a permalink or a URL that is already absolute.
    pub fn full_permalink(&self, permalink: &str) -> String {
        let p = permalink.trim();
        if p.starts_with("http") {
            p.to_string()
        } else if p.starts_with('/') {
            format!("{}{}", self.base_url, p)
        } else {
            format!("{}/{}", self.base_url, p)
        }
    }

    /// Wait the configured pause between requests.
    pub async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// GET a JSON document, retrying transient failures.
    async fn get_json(&self, url: &str) -> Result<Value> {
        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match self.http.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| PipelineError::parse(url, e));
                }
                Ok(response) => {
                    let status = response.status();
                    last_error = format!("HTTP {status}");
                    // Client errors other than throttling will not improve on retry.
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        break;
                    }
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt < self.retry.max_attempts {
                let delay = backoff_delay(&self.retry, attempt);
                warn!("Request to {} failed ({}), retrying in {:?}", url, last_error, delay);
                tokio::time::sleep(delay).await;
            }
        }
        Err(PipelineError::network(url, last_error))
    }

    /// Fetch one page of a subreddit listing.
    ///
    /// # Returns
    ///
    /// The listing children and the cursor for the next page, if any.
    pub async fn subreddit_page(
        &self,
        subreddit: &str,
        listing: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<(Vec<ListingChild>, Option<String>)> {
        let mut url = format!(
            "{}/r/{}/{}.json?limit={}&raw_json=1",
            self.base_url, subreddit, listing, limit
        );
        if let Some(cursor) = after {
            url.push_str("&after=");
            url.push_str(cursor);
        }
        debug!("GET {}", url);
        let listing = parse_listing(self.get_json(&url).await?)?;
        Ok((listing.data.children, listing.data.after))
    }

    /// Fetch the comment tree of a post.
    pub async fn post_comments(&self, permalink: &str, limit: usize, max_depth: usize) -> Result<Vec<RawComment>> {
        let base = self.full_permalink(permalink);
        let base = base.trim_end_matches('/');
        let base = base.strip_suffix(".json").unwrap_or(base);
        let url = format!(
            "{}.json?limit={}&depth={}&raw_json=1",
            base,
            limit,
            max_depth + 1
        );
        debug!("GET {}", url);
        let response = self.get_json(&url).await?;
        if !response.is_array() {
            return Err(PipelineError::parse(url, "comment page is not an array"));
        }
        Ok(walk_comments(&response, max_depth, limit))
    }
}
