//! Pipeline configuration.
//!
//! Every tunable lives in [`PipelineConfig`]; stages receive the parts they
//! need explicitly. Defaults are compiled in, and a handful of fields can be
//! overridden from `MUSIC_TRENDS_*` environment variables (a `.env` file is
//! honoured).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;

use crate::error::{PipelineError, Result};

/// Subreddits scanned when nothing else is configured.
pub const DEFAULT_SUBREDDITS: &[&str] = &["Music", "PopHeads", "HipHopHeads"];

/// Keywords that hint a post is about something trending. Matched as
/// case-insensitive substrings of the cleaned text.
pub const DEFAULT_TREND_KEYWORDS: &[&str] = &[
    "trend", "trending", "viral", "tiktok", "blowing up", "blow up", "charting", "billboard",
    "hit", "popular", "streaming boost", "going viral", "exploding", "hot", "number one",
    "rising", "breakout", "new hit", "buzz", "hype", "hyped", "fresh", "new", "leaked",
    "breaking", "out now",
];

/// Retry policy for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Maximum jitter as a fraction of the computed delay (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Settings for the Reddit collector and the comment fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    /// Listing to read, e.g. `hot` or `new`.
    pub listing: String,
    pub posts_per_subreddit: usize,
    /// Posts requested per listing page (Reddit caps this at 100).
    pub page_size: usize,
    pub comments_per_post: usize,
    /// How deep into reply chains the comment walker goes. 0 keeps only
    /// top-level comments.
    pub comment_depth: usize,
    /// Pause between consecutive requests.
    pub request_delay: Duration,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            user_agent: "music_trends_research:v0.1 (research pipeline)".to_string(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            listing: "hot".to_string(),
            posts_per_subreddit: 200,
            page_size: 100,
            comments_per_post: 50,
            comment_depth: 1,
            request_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
            retry: RetryConfig::default(),
        }
    }
}

/// Engagement score weights and label thresholds.
///
/// `engagement_score = score_weight * score + comments_weight * num_comments
///  + keyword_bonus * keyword_hits`
#[derive(Debug, Clone)]
pub struct TrendConfig {
    pub score_weight: f64,
    pub comments_weight: f64,
    pub keyword_bonus: f64,
    pub keywords: Vec<String>,
    pub trending_threshold: f64,
    pub emerging_threshold: f64,
    pub stable_threshold: f64,
    /// Keep only posts with a detected song or a trend keyword.
    pub relevant_only: bool,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            score_weight: 0.7,
            comments_weight: 0.3,
            keyword_bonus: 10.0,
            keywords: DEFAULT_TREND_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            trending_threshold: 400.0,
            emerging_threshold: 100.0,
            stable_threshold: 20.0,
            relevant_only: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentimentConfig {
    pub positive_threshold: f64,
    pub negative_threshold: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 0.05,
            negative_threshold: -0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub top_k: usize,
    pub damping: f64,
    /// PageRank iterations.
    pub max_iterations: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            damping: 0.85,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub min_rows: usize,
    pub n_trees: u16,
    pub max_depth: u16,
    pub min_samples_split: usize,
    /// L2 penalty of the logistic regression.
    pub lr_alpha: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            seed: 42,
            min_rows: 10,
            n_trees: 200,
            max_depth: 12,
            min_samples_split: 2,
            lr_alpha: 1e-3,
        }
    }
}

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub chart_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    pub fetch: FetchConfig,
    pub trend: TrendConfig,
    pub sentiment: SentimentConfig,
    pub graph: GraphConfig,
    pub model: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from("output");
        Self {
            chart_dir: output_dir.join("charts"),
            log_file: output_dir.join("pipeline.log"),
            output_dir,
            log_level: LevelFilter::Info,
            fetch: FetchConfig::default(),
            trend: TrendConfig::default(),
            sentiment: SentimentConfig::default(),
            graph: GraphConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Build the configuration from defaults, a `.env` file and the
    /// `MUSIC_TRENDS_*` environment variables, then validate it.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Some(dir) = env_string("MUSIC_TRENDS_OUTPUT_DIR") {
            config = config.with_output_dir(dir);
        }
        if let Some(level) = env_string("MUSIC_TRENDS_LOG_LEVEL") {
            config.log_level = LevelFilter::from_str(&level)
                .map_err(|_| PipelineError::config(format!("invalid log level {level:?}")))?;
        }
        if let Some(subs) = env_string("MUSIC_TRENDS_SUBREDDITS") {
            config.fetch.subreddits = subs
                .split(',')
                .map(|s| s.trim().trim_start_matches("r/").to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(agent) = env_string("MUSIC_TRENDS_USER_AGENT") {
            config.fetch.user_agent = agent;
        }
        if let Some(n) = env_parse("MUSIC_TRENDS_POST_LIMIT")? {
            config.fetch.posts_per_subreddit = n;
        }
        if let Some(n) = env_parse("MUSIC_TRENDS_COMMENT_LIMIT")? {
            config.fetch.comments_per_post = n;
        }
        if let Some(t) = env_parse("MUSIC_TRENDS_T_TRENDING")? {
            config.trend.trending_threshold = t;
        }
        if let Some(t) = env_parse("MUSIC_TRENDS_T_EMERGING")? {
            config.trend.emerging_threshold = t;
        }
        if let Some(t) = env_parse("MUSIC_TRENDS_T_STABLE")? {
            config.trend.stable_threshold = t;
        }
        if let Some(k) = env_parse("MUSIC_TRENDS_TOP_K")? {
            config.graph.top_k = k;
        }
        if let Some(seed) = env_parse("MUSIC_TRENDS_SEED")? {
            config.model.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }

    /// Point all outputs (tables, charts, log) below `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.chart_dir = dir.join("charts");
        self.log_file = dir.join("pipeline.log");
        self.output_dir = dir;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(PipelineError::config("output directory is empty"));
        }

        let fetch = &self.fetch;
        if fetch.subreddits.is_empty() {
            return Err(PipelineError::config("subreddit list is empty"));
        }
        if fetch.posts_per_subreddit == 0 || fetch.page_size == 0 {
            return Err(PipelineError::config("post limit and page size must be positive"));
        }
        if fetch.retry.max_attempts == 0 {
            return Err(PipelineError::config("retry policy needs at least one attempt"));
        }
        if fetch.user_agent.trim().is_empty() {
            return Err(PipelineError::config("user agent is empty"));
        }

        let trend = &self.trend;
        for (name, value) in [
            ("score weight", trend.score_weight),
            ("comments weight", trend.comments_weight),
            ("keyword bonus", trend.keyword_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::config(format!("{name} must be a non-negative number")));
            }
        }
        let thresholds = [
            trend.trending_threshold,
            trend.emerging_threshold,
            trend.stable_threshold,
        ];
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(PipelineError::config("engagement thresholds must be finite"));
        }
        if !(trend.trending_threshold > trend.emerging_threshold
            && trend.emerging_threshold > trend.stable_threshold)
        {
            return Err(PipelineError::config(format!(
                "engagement thresholds must satisfy trending > emerging > stable, got {} / {} / {}",
                trend.trending_threshold, trend.emerging_threshold, trend.stable_threshold
            )));
        }

        let sentiment = &self.sentiment;
        if !(sentiment.negative_threshold < sentiment.positive_threshold)
            || sentiment.positive_threshold > 1.0
            || sentiment.negative_threshold < -1.0
        {
            return Err(PipelineError::config("sentiment thresholds must satisfy -1 <= negative < positive <= 1"));
        }

        let graph = &self.graph;
        if !(graph.damping > 0.0 && graph.damping < 1.0) {
            return Err(PipelineError::config("PageRank damping must lie in (0, 1)"));
        }
        if graph.max_iterations == 0 {
            return Err(PipelineError::config("PageRank needs at least one iteration"));
        }

        let model = &self.model;
        if !(model.test_fraction > 0.0 && model.test_fraction < 1.0) {
            return Err(PipelineError::config("test fraction must lie in (0, 1)"));
        }
        if model.n_trees == 0 || model.max_depth == 0 {
            return Err(PipelineError::config("random forest needs at least one tree of depth >= 1"));
        }
        if !model.lr_alpha.is_finite() || model.lr_alpha < 0.0 {
            return Err(PipelineError::config("logistic regression penalty must be a non-negative number"));
        }
        if model.min_rows < 2 {
            return Err(PipelineError::config("minimum training rows must be at least 2"));
        }

        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PipelineError::config(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let mut config = PipelineConfig::default();
        config.trend.emerging_threshold = 500.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn rejects_empty_subreddits() {
        let mut config = PipelineConfig::default();
        config.fetch.subreddits.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_damping_and_split() {
        let mut config = PipelineConfig::default();
        config.graph.damping = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.model.test_fraction = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn output_dir_moves_charts_and_log() {
        let config = PipelineConfig::default().with_output_dir("/tmp/run");
        assert_eq!(config.chart_dir, PathBuf::from("/tmp/run/charts"));
        assert_eq!(config.log_file, PathBuf::from("/tmp/run/pipeline.log"));
    }
}
