//! Engagement scoring and labelling.

use log::info;

use crate::config::TrendConfig;
use crate::pattern::Pattern;
use crate::types::{EngagementLabel, Post};

/// Weighted engagement score of a post.
///
/// `score_weight * score + comments_weight * num_comments + keyword_bonus * keyword_hits`
pub fn engagement_score(config: &TrendConfig, score: i64, num_comments: u64, keyword_hits: usize) -> f64 {
    config.score_weight * score as f64
        + config.comments_weight * num_comments as f64
        + config.keyword_bonus * keyword_hits as f64
}

/// Map a score onto its label using the ascending thresholds.
///
/// Every value, including NaN, lands in exactly one label: anything that is
/// not at least the stable threshold is `Low`.
pub fn engagement_label(config: &TrendConfig, score: f64) -> EngagementLabel {
    if score >= config.trending_threshold {
        EngagementLabel::Trending
    } else if score >= config.emerging_threshold {
        EngagementLabel::Emerging
    } else if score >= config.stable_threshold {
        EngagementLabel::Stable
    } else {
        EngagementLabel::Low
    }
}

/// Scores posts against the configured keywords and thresholds.
pub struct TrendScorer<'a> {
    config: &'a TrendConfig,
}

impl<'a> TrendScorer<'a> {
    pub fn new(config: &'a TrendConfig) -> Self {
        Self { config }
    }

    /// Fill keyword, score and label fields of one post.
    pub fn score_post(&self, mut post: Post) -> Post {
        let text = post.cleaned_text.as_deref().unwrap_or(&post.title);
        let hits = Pattern::detect_keywords(text, &self.config.keywords);
        let score = engagement_score(self.config, post.score, post.num_comments, hits.len());
        post.trend_keywords = Some(hits.join(", "));
        post.engagement_score = Some(score);
        post.engagement_label = Some(engagement_label(self.config, score));
        post
    }

    /// Whether a scored post mentions a song or a trend keyword.
    pub fn is_relevant(post: &Post) -> bool {
        post.detected_song.is_some() || post.keyword_count() > 0
    }

    /// Score every post and apply the relevance filter when configured.
    pub fn analyze(&self, posts: Vec<Post>) -> Vec<Post> {
        let total = posts.len();
        let scored: Vec<Post> = posts
            .into_iter()
            .map(|p| self.score_post(p))
            .filter(|p| !self.config.relevant_only || Self::is_relevant(p))
            .collect();
        info!("Scored {} posts, {} kept for the trend dataset", total, scored.len());
        scored
    }
}
