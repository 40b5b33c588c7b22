//! Error taxonomy for the pipeline.
//!
//! * `Config` errors are fatal and stop the run before the affected stage.
//! * `Network` and `Parse` errors are raised per item; callers log them and
//!   move on to the next item.
//! * `InsufficientData` and `Model` make the training stage skip itself with
//!   a diagnostic.
//! * The remaining variants wrap I/O and serialization failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("could not parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("not enough data for {stage}: {found} usable rows, need at least {required}")]
    InsufficientData {
        stage: &'static str,
        found: usize,
        required: usize,
    },

    #[error("{model} could not be trained: {reason}")]
    Model { model: String, reason: String },

    #[error("chart {name} could not be rendered: {reason}")]
    Chart { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Config(msg.into())
    }

    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error only affects a single item and the run can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Network { .. }
                | PipelineError::Parse { .. }
                | PipelineError::InsufficientData { .. }
                | PipelineError::Model { .. }
                | PipelineError::Chart { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
