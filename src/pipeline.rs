//! End-to-end pipeline.
//!
//! Stages run one after the other and each writes its table before the next
//! one starts:
//!
//! 1. collect posts (`raw_posts.csv`)
//! 2. clean text (`cleaned_posts.csv`)
//! 3. score engagement (`trend_dataset.csv`)
//! 4. fetch and score comments (`comments_raw.csv`, `reddit_comment_sentiment.csv`)
//! 5. interaction graph and superspreaders (`superspreaders.csv`)
//! 6. train classifiers (`model_metrics.csv`, `model.json`)
//! 7. charts
//!
//! Stages 1 and 4 talk to Reddit. Everything else is available offline
//! through [`Pipeline::process_posts`] and [`Pipeline::analyze`].

use std::collections::HashMap;
use std::path::PathBuf;

use log::{info, Level};

use crate::cleaner::Cleaner;
use crate::collector::Collector;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::logging::Logger;
use crate::model::ModelTrainer;
use crate::network::InteractionNetwork;
use crate::reddit::{RawComment, RedditClient};
use crate::sentiment::{self, SentimentAnalyzer};
use crate::storage;
use crate::trend::TrendScorer;
use crate::types::Post;
use crate::visualize::{ChartData, Visualizer};

/// Row counts of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub raw_posts: usize,
    pub trend_posts: usize,
    pub comments: usize,
    pub users: usize,
    pub superspreaders: usize,
    pub model_trained: bool,
    pub charts: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates the configuration before anything runs.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Path of an output table.
    pub fn table(&self, name: &str) -> PathBuf {
        self.config.output_dir.join(name)
    }

    /// Run every stage against Reddit.
    pub async fn run(&self) -> Result<RunSummary> {
        let client = RedditClient::new(&self.config.fetch)?;

        Logger::stage(1, "Collecting posts");
        let raw = Collector::new(&client, &self.config.fetch).collect().await;
        storage::write_table(&self.table(storage::RAW_POSTS), &raw)?;
        info!("Saved {} raw posts", raw.len());
        let raw_posts = raw.len();

        let trend_posts = self.process_posts(raw)?;

        Logger::stage(4, "Fetching comments");
        let fetched = sentiment::fetch_comments(&client, &self.config.fetch, &trend_posts).await;

        Ok(RunSummary {
            raw_posts,
            ..self.analyze(&trend_posts, fetched)?
        })
    }

    /// Clean and score collected posts, writing the cleaned table and the
    /// trend dataset.
    pub fn process_posts(&self, raw: Vec<Post>) -> Result<Vec<Post>> {
        Logger::stage(2, "Cleaning text");
        let cleaned = Cleaner::new().clean_posts(raw);
        storage::write_table(&self.table(storage::CLEANED_POSTS), &cleaned)?;
        info!("Saved {} cleaned posts", cleaned.len());

        Logger::stage(3, "Scoring engagement");
        let trend_posts = TrendScorer::new(&self.config.trend).analyze(cleaned);
        storage::write_table(&self.table(storage::TREND_DATASET), &trend_posts)?;
        Ok(trend_posts)
    }

    /// Run the stages that follow comment fetching.
    ///
    /// `fetched` maps post ids to their raw comments; posts without an entry
    /// are treated as having none. The returned summary has `raw_posts` set
    /// to 0 since collection is not part of this step.
    pub fn analyze(&self, trend_posts: &[Post], fetched: HashMap<String, Vec<RawComment>>) -> Result<RunSummary> {
        Logger::stage(4, "Scoring comment sentiment");
        let analyzer = SentimentAnalyzer::new(self.config.sentiment.clone());
        let (comments, post_sentiment) = analyzer.score_posts(trend_posts, fetched);
        storage::write_table(&self.table(storage::COMMENTS_RAW), &comments)?;
        storage::write_table(&self.table(storage::COMMENT_SENTIMENT), &post_sentiment)?;
        info!(
            "Saved {} comments and sentiment for {} posts",
            comments.len(),
            post_sentiment.len()
        );

        Logger::stage(5, "Building interaction graph");
        let network = InteractionNetwork::build(trend_posts, &comments);
        let superspreaders = network.superspreaders(&self.config.graph);
        storage::write_table(&self.table(storage::SUPERSPREADERS), &superspreaders)?;

        Logger::stage(6, "Training classifiers");
        let model_trained = match ModelTrainer::new(&self.config.model).train(trend_posts, &post_sentiment) {
            Ok(report) => {
                storage::write_table(&self.table(storage::MODEL_METRICS), &report.metrics)?;
                report.artifact.save(&self.table(storage::MODEL_ARTIFACT))?;
                info!("Saved model to {}", self.table(storage::MODEL_ARTIFACT).display());
                true
            }
            Err(e @ (PipelineError::InsufficientData { .. } | PipelineError::Model { .. })) => {
                Logger::log_event(Level::Warn, "Skipping model training", None, Some(&e));
                false
            }
            Err(e) => return Err(e),
        };

        Logger::stage(7, "Rendering charts");
        let data = ChartData {
            posts: trend_posts,
            comments: &comments,
            sentiment: &post_sentiment,
            network: Some(&network),
            superspreaders: &superspreaders,
        };
        let charts = Visualizer::new(&self.config.chart_dir).render_all(&data)?;

        Ok(RunSummary {
            raw_posts: 0,
            trend_posts: trend_posts.len(),
            comments: comments.len(),
            users: network.node_count(),
            superspreaders: superspreaders.len(),
            model_trained,
            charts: charts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = PipelineConfig::default();
        config.fetch.subreddits.clear();
        assert!(matches!(Pipeline::new(config), Err(PipelineError::Config(_))));
    }

    #[test]
    fn tables_live_in_output_dir() {
        let pipeline = Pipeline::new(PipelineConfig::default().with_output_dir("out")).unwrap();
        assert_eq!(pipeline.table(storage::RAW_POSTS), PathBuf::from("out").join("raw_posts.csv"));
    }
}
