//! Records passed between pipeline stages and persisted as flat tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discretized engagement of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngagementLabel {
    Trending,
    Emerging,
    Stable,
    Low,
}

impl EngagementLabel {
    /// All labels, from highest to lowest engagement.
    pub const ALL: [EngagementLabel; 4] = [
        EngagementLabel::Trending,
        EngagementLabel::Emerging,
        EngagementLabel::Stable,
        EngagementLabel::Low,
    ];

    pub fn index(self) -> usize {
        match self {
            EngagementLabel::Trending => 0,
            EngagementLabel::Emerging => 1,
            EngagementLabel::Stable => 2,
            EngagementLabel::Low => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLabel::Trending => "TRENDING",
            EngagementLabel::Emerging => "EMERGING",
            EngagementLabel::Stable => "STABLE",
            EngagementLabel::Low => "LOW",
        }
    }
}

impl fmt::Display for EngagementLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngagementLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRENDING" => Ok(EngagementLabel::Trending),
            "EMERGING" => Ok(EngagementLabel::Emerging),
            "STABLE" => Ok(EngagementLabel::Stable),
            "LOW" => Ok(EngagementLabel::Low),
            other => Err(format!("unknown engagement label: {other}")),
        }
    }
}

/// The polarity of a piece of content.
///
/// # Variants
///
/// * `Positive` - The content is positive.
/// * `Neutral` - The content is neutral.
/// * `Negative` - The content is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subreddit post as it moves through collection, cleaning and scoring.
///
/// The collector fills the raw fields; `cleaned_text` is set by the cleaner
/// and the engagement fields by the trend scorer. Nothing changes a post
/// after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub subreddit: String,
    pub author: String,
    pub title: String,
    pub raw_text: String,
    #[serde(default)]
    pub cleaned_text: Option<String>,
    pub score: i64,
    pub num_comments: u64,
    pub created_at: String,
    pub url: String,
    pub permalink: String,
    #[serde(default)]
    pub detected_song: Option<String>,
    #[serde(default)]
    pub detected_artist: Option<String>,
    /// Matched trend keywords joined with ", ".
    #[serde(default)]
    pub trend_keywords: Option<String>,
    #[serde(default)]
    pub engagement_score: Option<f64>,
    #[serde(default)]
    pub engagement_label: Option<EngagementLabel>,
}

impl Post {
    /// Number of distinct trend keywords matched by the trend scorer.
    pub fn keyword_count(&self) -> usize {
        self.trend_keywords
            .as_deref()
            .map(|k| k.split(", ").filter(|s| !s.is_empty()).count())
            .unwrap_or(0)
    }
}

/// A single comment fetched for a post, with its sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub sentiment_neg: f64,
    pub sentiment_neu: f64,
    pub sentiment_pos: f64,
    pub sentiment_compound: f64,
    pub sentiment_label: SentimentLabel,
}

/// Sentiment aggregated over all comments of one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSentiment {
    pub post_id: String,
    pub permalink: String,
    pub title: String,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    pub comment_count: usize,
    pub avg_neg: f64,
    pub avg_neu: f64,
    pub avg_pos: f64,
    pub avg_compound: f64,
    pub sentiment_label: SentimentLabel,
}
