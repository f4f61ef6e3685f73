use cloudplane_cloud::CloudPlatform;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("Platform {0} is not enabled on this control plane")]
    PlatformNotEnabled(CloudPlatform),

    #[error("Resource {id} is {status}, operation not allowed")]
    InvalidResourceState { id: String, status: String },

    #[error("Config error: {0}")]
    Config(#[from] cloudplane_config::ConfigError),

    #[error("AWS error: {0}")]
    Aws(#[from] cloudplane_cloud_aws::AwsError),

    #[error(transparent)]
    Flow(#[from] cloudplane_flow::FlowError),
}

impl From<cloudplane_flow::PollError> for ControlPlaneError {
    fn from(e: cloudplane_flow::PollError) -> Self {
        ControlPlaneError::Flow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;
