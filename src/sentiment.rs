//! # Sentiment
//!
//! Comment polarity comes from the VADER scorer of the `vader_sentiment`
//! crate. Its compound score always lies in [-1, 1]; the labels and the
//! per-post averages are computed here.
//!
//! ## Examples
//!
//! ```
//! use music_trends::config::SentimentConfig;
//! use music_trends::sentiment::SentimentAnalyzer;
//! use music_trends::types::SentimentLabel;
//!
//! let analyzer = SentimentAnalyzer::new(SentimentConfig::default());
//! let scores = analyzer.polarity_scores("I love this album!");
//! assert_eq!(analyzer.label(scores.compound), SentimentLabel::Positive);
//! ```

use std::collections::HashMap;

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::config::{FetchConfig, SentimentConfig};
use crate::reddit::{RawComment, RedditClient};
use crate::types::{Comment, Post, PostSentiment, SentimentLabel};

/// Polarity of a text.
///
/// # Fields
///
/// * `neg`, `neu`, `pos` - Proportions of the text in each category, summing to 1.
/// * `compound` - Normalized overall polarity in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarityScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

impl PolarityScores {
    pub fn neutral() -> Self {
        Self { neg: 0.0, neu: 1.0, pos: 0.0, compound: 0.0 }
    }

    fn from_vader(scores: &HashMap<&str, f64>) -> Self {
        let get = |key: &str| scores.get(key).copied().filter(|v| v.is_finite()).unwrap_or(0.0);
        Self {
            neg: get("neg"),
            neu: get("neu"),
            pos: get("pos"),
            compound: get("compound").clamp(-1.0, 1.0),
        }
    }
}

/// Scores comments and aggregates them per post.
pub struct SentimentAnalyzer {
    config: SentimentConfig,
}

impl SentimentAnalyzer {
    pub fn new(config: SentimentConfig) -> Self {
        Self { config }
    }

    /// Compute the polarity of a piece of content.
    ///
    /// # Arguments
    ///
    /// * `text` - The content to analyze, preferably uncleaned so that case
    ///   and punctuation still carry emphasis.
    ///
    /// # Returns
    ///
    /// * `PolarityScores` - Neutral for empty or whitespace-only text.
    pub fn polarity_scores(&self, text: &str) -> PolarityScores {
        if text.trim().is_empty() {
            return PolarityScores::neutral();
        }
        let vader = SentimentIntensityAnalyzer::new();
        PolarityScores::from_vader(&vader.polarity_scores(text))
    }

    /// Label a compound score with the configured thresholds.
    pub fn label(&self, compound: f64) -> SentimentLabel {
        if compound >= self.config.positive_threshold {
            SentimentLabel::Positive
        } else if compound <= self.config.negative_threshold {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    /// Score one fetched comment of `post_id`.
    pub fn score_comment(&self, post_id: &str, raw: RawComment) -> Comment {
        let scores = self.polarity_scores(&raw.body);
        Comment {
            post_id: post_id.to_string(),
            author: raw.author,
            body: raw.body,
            sentiment_neg: scores.neg,
            sentiment_neu: scores.neu,
            sentiment_pos: scores.pos,
            sentiment_compound: scores.compound,
            sentiment_label: self.label(scores.compound),
        }
    }

    /// Average the sentiment of a post's comments.
    ///
    /// A post without comments gets zero averages and a neutral label.
    pub fn aggregate(&self, post: &Post, comments: &[Comment]) -> PostSentiment {
        let n = comments.len();
        let mean = |f: fn(&Comment) -> f64| {
            if n == 0 {
                0.0
            } else {
                comments.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let avg_compound = mean(|c| c.sentiment_compound);
        PostSentiment {
            post_id: post.id.clone(),
            permalink: post.permalink.clone(),
            title: post.title.clone(),
            song: post.detected_song.clone(),
            artist: post.detected_artist.clone(),
            comment_count: n,
            avg_neg: mean(|c| c.sentiment_neg),
            avg_neu: mean(|c| c.sentiment_neu),
            avg_pos: mean(|c| c.sentiment_pos),
            avg_compound,
            sentiment_label: if n == 0 {
                SentimentLabel::Neutral
            } else {
                self.label(avg_compound)
            },
        }
    }

    /// Score already-fetched comments grouped by post.
    ///
    /// # Arguments
    ///
    /// * `posts` - Posts to aggregate, in output order.
    /// * `fetched` - Raw comments per post id. Posts without an entry count
    ///   as having no comments.
    ///
    /// # Returns
    ///
    /// Every scored comment and one aggregate row per post.
    pub fn score_posts(
        &self,
        posts: &[Post],
        mut fetched: HashMap<String, Vec<RawComment>>,
    ) -> (Vec<Comment>, Vec<PostSentiment>) {
        let mut all_comments = Vec::new();
        let mut summaries = Vec::with_capacity(posts.len());
        for post in posts {
            let raw = fetched.remove(&post.id).unwrap_or_default();
            let scored: Vec<Comment> = raw
                .into_iter()
                .map(|c| self.score_comment(&post.id, c))
                .collect();
            summaries.push(self.aggregate(post, &scored));
            all_comments.extend(scored);
        }
        (all_comments, summaries)
    }
}

/// Fetch the comments of every post, one request at a time.
///
/// Failed fetches are logged and the post is treated as having no comments.
pub async fn fetch_comments(
    client: &RedditClient,
    config: &FetchConfig,
    posts: &[Post],
) -> HashMap<String, Vec<RawComment>> {
    let pb = ProgressBar::new(posts.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
    {
        pb.set_style(style);
    }

    let mut fetched = HashMap::with_capacity(posts.len());
    let mut failures = 0usize;
    for post in posts {
        pb.set_message(post.id.clone());
        match client
            .post_comments(&post.permalink, config.comments_per_post, config.comment_depth)
            .await
        {
            Ok(comments) => {
                fetched.insert(post.id.clone(), comments);
            }
            Err(e) => {
                failures += 1;
                warn!("Skipping comments of post {}: {}", post.id, e);
            }
        }
        pb.inc(1);
        client.pause().await;
    }
    pb.finish_with_message("comments fetched");
    info!(
        "Fetched comments for {} of {} posts ({} failed)",
        fetched.len(),
        posts.len(),
        failures
    );
    fetched
}
