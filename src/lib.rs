//! Reddit music trends research pipeline.
//!
//! Collects posts from music subreddits, cleans and scores them for
//! engagement, scores comment sentiment, finds influential users in the
//! comment graph, trains engagement classifiers and renders charts.

pub mod cleaner;
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod network;
pub mod pattern;
pub mod pipeline;
pub mod reddit;
pub mod sentiment;
pub mod storage;
pub mod trend;
pub mod types;
pub mod visualize;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary};
