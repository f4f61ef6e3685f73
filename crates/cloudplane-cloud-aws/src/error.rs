//! AWS provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Unable to load AWS credentials: {0}")]
    CredentialsNotLoaded(String),

    #[error("AWS client error: {0}")]
    Client(String),

    #[error("AWS service error [{code}]: {message}")]
    Service { code: String, message: String },

    #[error("Unexpected AWS failure: {0}")]
    Other(String),

    #[error("Can not parse aws policy json: {0}")]
    MalformedPolicy(String),
}

impl AwsError {
    /// Failures raised by the AWS SDK itself, as opposed to unexpected ones
    pub fn is_client_failure(&self) -> bool {
        matches!(
            self,
            AwsError::CredentialsNotLoaded(_) | AwsError::Client(_) | AwsError::Service { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
