//! Provider calls needed for credential verification

use crate::error::Result;
use crate::view::AwsCredentialView;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Temporary credentials returned by STS
#[derive(Clone)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// One policy simulation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySimulationRequest {
    pub principal_arn: String,
    pub actions: Vec<String>,
    pub resource_arn: String,
}

/// Decision for one action on one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub action_name: String,
    pub resource_name: String,
    /// `allowed`, `explicitDeny` or `implicitDeny`
    pub decision: String,
}

impl EvaluationResult {
    pub fn is_denied(&self) -> bool {
        self.decision.to_lowercase().contains("deny")
    }

    /// `action:resource`
    pub fn denied_pair(&self) -> String {
        format!("{}:{}", self.action_name, self.resource_name)
    }
}

/// AWS identity services used by the connector
///
/// Every call authenticates with the credential described by the view. Role
/// credentials are exchanged through STS by the implementation.
#[async_trait]
pub trait AwsIdentityService: Send + Sync {
    /// Exchange the assumer credentials for a session of the view's role
    async fn assume_role(&self, credential: &AwsCredentialView) -> Result<SessionCredentials>;

    /// Side-effect free connectivity check
    async fn describe_regions(&self, credential: &AwsCredentialView) -> Result<Vec<String>>;

    /// ARN of the calling identity
    async fn caller_identity_arn(&self, credential: &AwsCredentialView) -> Result<String>;

    /// Evaluate the request's actions, following pagination to the end
    async fn simulate_principal_policy(
        &self,
        credential: &AwsCredentialView,
        request: &PolicySimulationRequest,
    ) -> Result<Vec<EvaluationResult>>;
}
