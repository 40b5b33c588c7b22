//! Subreddit post collection.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde_json::Value;

use crate::config::FetchConfig;
use crate::error::{PipelineError, Result};
use crate::pattern::Pattern;
use crate::reddit::{ListingChild, RedditClient, RedditPostData, DELETED_AUTHOR};
use crate::types::Post;

/// Render a Unix timestamp as RFC 3339 UTC. Out-of-range values render empty.
pub fn format_timestamp(created_utc: f64) -> String {
    DateTime::from_timestamp(created_utc.trunc() as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Build a [`Post`] from submission data, guessing song and artist from the title.
pub fn post_from_data(data: RedditPostData, subreddit: &str) -> Post {
    let detected_song = Pattern::extract_song(&data.title);
    let detected_artist = Pattern::extract_artist(&data.title);
    let subreddit = if data.subreddit.is_empty() {
        subreddit.to_string()
    } else {
        data.subreddit
    };
    Post {
        id: data.id,
        subreddit,
        author: data
            .author
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DELETED_AUTHOR.to_string()),
        title: data.title,
        raw_text: data.selftext,
        cleaned_text: None,
        score: data.score,
        num_comments: data.num_comments,
        created_at: format_timestamp(data.created_utc),
        url: data.url,
        permalink: data.permalink,
        detected_song,
        detected_artist,
        trend_keywords: None,
        engagement_score: None,
        engagement_label: None,
    }
}

/// Parse one listing entry into a post.
///
/// Stickied moderator posts are not music content and yield `None`.
pub fn post_from_child(child: ListingChild, subreddit: &str) -> Result<Option<Post>> {
    if child.kind != "t3" {
        return Err(PipelineError::parse(
            format!("listing entry in r/{subreddit}"),
            format!("unexpected kind {}", child.kind),
        ));
    }
    let id = child
        .data
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string();
    let data: RedditPostData = serde_json::from_value(child.data)
        .map_err(|e| PipelineError::parse(format!("post {id} in r/{subreddit}"), e))?;
    if data.stickied {
        debug!("Skipping stickied post {} in r/{}", data.id, subreddit);
        return Ok(None);
    }
    Ok(Some(post_from_data(data, subreddit)))
}

/// Reads posts from each configured subreddit.
pub struct Collector<'a> {
    client: &'a RedditClient,
    config: &'a FetchConfig,
}

impl<'a> Collector<'a> {
    pub fn new(client: &'a RedditClient, config: &'a FetchConfig) -> Self {
        Self { client, config }
    }

    /// Collect posts from every subreddit.
    ///
    /// Bad entries and failed pages are logged and skipped; the run goes on
    /// with whatever was collected. Posts already seen are not repeated.
    pub async fn collect(&self) -> Vec<Post> {
        let pb = ProgressBar::new(self.config.subreddits.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}/{len:3} {msg}")
        {
            pb.set_style(style);
        }

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        for subreddit in &self.config.subreddits {
            pb.set_message(format!("r/{subreddit}"));
            let fetched = self.collect_subreddit(subreddit).await;
            info!("Fetched {} posts from r/{}", fetched.len(), subreddit);
            for post in fetched {
                if seen.insert(post.id.clone()) {
                    posts.push(post);
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("listings fetched");
        posts
    }

    async fn collect_subreddit(&self, subreddit: &str) -> Vec<Post> {
        let limit = self.config.posts_per_subreddit;
        let mut posts = Vec::with_capacity(limit);
        let mut after: Option<String> = None;

        while posts.len() < limit {
            let page_size = self.config.page_size.min(limit - posts.len());
            let page = self
                .client
                .subreddit_page(subreddit, &self.config.listing, page_size, after.as_deref())
                .await;
            self.client.pause().await;

            let (children, next) = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!("Stopping r/{} after {} posts: {}", subreddit, posts.len(), e);
                    break;
                }
            };
            if children.is_empty() {
                break;
            }
            for child in children {
                if posts.len() >= limit {
                    break;
                }
                match post_from_child(child, subreddit) {
                    Ok(Some(post)) => posts.push(post),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping entry: {}", e),
                }
            }
            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        posts
    }
}
