use std::time::Instant;

use anyhow::Context;
use log::{error, info};

use music_trends::logging::{LogConfig, Logger};
use music_trends::{Pipeline, PipelineConfig};

/// Time a block and log how long it took.
macro_rules! time_it {
    ($label:expr, $block:expr) => {{
        let start = Instant::now();
        let result = $block;
        info!("{} took {:.2?}", $label, start.elapsed());
        result
    }};
}

/// Runs the whole pipeline once. Settings come from `.env` and the
/// `MUSIC_TRENDS_*` environment variables.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;
    let logger = Logger::init(LogConfig::new(&config.log_file, config.log_level))
        .context("could not set up logging")?;
    info!(
        "Starting run over {} subreddits, logging to {}",
        config.fetch.subreddits.len(),
        logger.log_file().display()
    );

    let pipeline = Pipeline::new(config)?;
    let summary = time_it!("Pipeline", pipeline.run().await);
    match summary {
        Ok(summary) => {
            info!(
                "Done: {} raw posts, {} in trend dataset, {} comments, {} users, {} superspreaders, model trained: {}, {} charts",
                summary.raw_posts,
                summary.trend_posts,
                summary.comments,
                summary.users,
                summary.superspreaders,
                summary.model_trained,
                summary.charts
            );
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
