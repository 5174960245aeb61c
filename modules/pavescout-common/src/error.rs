use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source '{source_name}' unavailable: {message}")]
    SourceUnavailable { source_name: String, message: String },

    #[error("All configured sources failed: {0}")]
    AllSourcesFailed(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Job is not complete yet (current status: {status})")]
    NotReady { status: String },

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] anyhow::Error),
}
