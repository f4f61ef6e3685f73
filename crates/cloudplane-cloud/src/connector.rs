//! Credential connector trait definition

use crate::credential::{CloudCredential, CloudPlatform, CredentialStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-platform credential lifecycle abstraction
///
/// Every supported cloud platform implements this trait. `verify` never fails
/// with an error: expected outcomes, including rejected keys and missing
/// permissions, come back as a [`CredentialStatus`].
#[async_trait]
pub trait CredentialConnector: Send + Sync {
    /// Platform served by this connector
    fn platform(&self) -> CloudPlatform;

    /// Check that the credential connects and carries the required permissions
    async fn verify(&self, credential: &CloudCredential) -> CredentialStatus;

    /// Register a new credential. No provider call is made.
    fn create(&self, credential: &CloudCredential) -> CredentialStatus {
        CredentialStatus::created(credential)
    }

    /// Forget a credential. No provider call is made.
    fn delete(&self, credential: &CloudCredential) -> CredentialStatus {
        CredentialStatus::deleted(credential)
    }

    /// What the user has to set up on the provider side before creating a credential
    fn prerequisites(&self, external_id: &str) -> CredentialPrerequisites;
}

/// Provider-side setup the user must perform for a credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialPrerequisites {
    pub platform: CloudPlatform,

    /// Account that will assume the user's role, if cross-account access is used
    pub account_id: Option<String>,

    /// External id the role trust policy has to require
    pub external_id: String,

    /// Base64 encoded policy document granting the required actions
    pub policy_json: Option<String>,
}
