//! Permission check by IAM policy simulation

use crate::client::{AwsIdentityService, PolicySimulationRequest};
use crate::error::Result;
use crate::policy::RequiredActionSet;
use crate::view::{AwsAuthMethod, AwsCredentialView};
use cloudplane_cloud::MissingPermissions;
use std::sync::Arc;

/// Outcome of the permission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Granted,
    Missing(MissingPermissions),
}

pub struct AwsCredentialVerifier {
    client: Arc<dyn AwsIdentityService>,
    required: RequiredActionSet,
}

impl AwsCredentialVerifier {
    pub fn new(client: Arc<dyn AwsIdentityService>, required: RequiredActionSet) -> Self {
        Self { client, required }
    }

    pub fn required_actions(&self) -> &RequiredActionSet {
        &self.required
    }

    /// Simulate every required action for the credential's principal
    pub async fn validate(
        &self,
        credential: &AwsCredentialView,
        auth: &AwsAuthMethod,
    ) -> Result<PermissionCheck> {
        let principal_arn = match auth {
            AwsAuthMethod::Role { role_arn } => role_arn.clone(),
            AwsAuthMethod::KeyPair { .. } => self.client.caller_identity_arn(credential).await?,
        };
        tracing::debug!("Simulating required actions for {}", principal_arn);

        let mut denied = Vec::new();
        for (resource, actions) in self.required.iter() {
            let request = PolicySimulationRequest {
                principal_arn: principal_arn.clone(),
                actions: actions.to_vec(),
                resource_arn: resource.to_string(),
            };
            let results = self
                .client
                .simulate_principal_policy(credential, &request)
                .await?;
            denied.extend(
                results
                    .iter()
                    .filter(|r| r.is_denied())
                    .map(|r| r.denied_pair()),
            );
        }

        Ok(match MissingPermissions::new(denied) {
            Some(missing) => {
                tracing::info!("Credential {} misses permissions {}", credential.name, missing);
                PermissionCheck::Missing(missing)
            }
            None => PermissionCheck::Granted,
        })
    }
}
