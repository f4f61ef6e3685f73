//! Cloud provider error types

use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Unsupported cloud platform: {0}")]
    UnsupportedPlatform(String),
}

pub type Result<T> = std::result::Result<T, CloudError>;
