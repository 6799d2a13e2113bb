use std::io;
use std::time::Duration;

/// Custom error type for git_webhook_deploy operations
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("Deployment timed out after {}s", .0.as_secs())]
    DeploymentTimedOut(Duration),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Helper type for Results that use DeployError
pub type Result<T> = std::result::Result<T, DeployError>;
