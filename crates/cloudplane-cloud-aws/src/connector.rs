//! AWS implementation of [`CredentialConnector`]

use crate::client::AwsIdentityService;
use crate::error::{AwsError, Result};
use crate::policy::RequiredActionSet;
use crate::verifier::{AwsCredentialVerifier, PermissionCheck};
use crate::view::{AwsAuthMethod, AwsCredentialView};
use async_trait::async_trait;
use cloudplane_cloud::{
    CloudCredential, CloudPlatform, CredentialConnector, CredentialPrerequisites,
    CredentialStatus,
};
use std::sync::Arc;

/// Connector settings
#[derive(Debug, Clone)]
pub struct AwsConnectorSettings {
    /// Account assuming user roles, shown in prerequisites
    pub account_id: Option<String>,
    /// Default for credentials that do not set `govCloud`
    pub government_cloud: bool,
    /// Base64 encoded required-actions policy
    pub policy_base64: String,
}

impl Default for AwsConnectorSettings {
    fn default() -> Self {
        Self {
            account_id: None,
            government_cloud: false,
            policy_base64: crate::policy::default_policy_base64(),
        }
    }
}

pub struct AwsCredentialConnector {
    client: Arc<dyn AwsIdentityService>,
    verifier: AwsCredentialVerifier,
    settings: AwsConnectorSettings,
}

impl AwsCredentialConnector {
    /// Fails when the configured policy document cannot be parsed
    pub fn new(client: Arc<dyn AwsIdentityService>, settings: AwsConnectorSettings) -> Result<Self> {
        let required = RequiredActionSet::from_base64(&settings.policy_base64)?;
        tracing::debug!("Loaded {} required resource entries", required.len());
        Ok(Self {
            verifier: AwsCredentialVerifier::new(client.clone(), required),
            client,
            settings,
        })
    }

    /// Returns the view to use for the permission check, carrying the role
    /// session when one was obtained
    async fn verify_connectivity(
        &self,
        credential: &CloudCredential,
        view: AwsCredentialView,
        auth: &AwsAuthMethod,
    ) -> std::result::Result<AwsCredentialView, CredentialStatus> {
        match auth {
            AwsAuthMethod::Role { role_arn } => match self.client.assume_role(&view).await {
                Ok(session) => Ok(view.with_session(session)),
                Err(AwsError::CredentialsNotLoaded(e)) => {
                    let (access_var, secret_var) = view.assumer_env_vars();
                    let reason = format!(
                        "Unable to load AWS credentials: please make sure that you configured your assumer {} and {} to deployer.",
                        access_var, secret_var
                    );
                    tracing::warn!("{}: {}", reason, e);
                    Err(CredentialStatus::failed(credential, reason, Some(e)))
                }
                Err(e) => {
                    let reason = format!(
                        "Could not assume role '{}': check if the role exists and if it's created with the correct external ID",
                        role_arn
                    );
                    tracing::warn!("{}: {}", reason, e);
                    Err(CredentialStatus::failed(credential, reason, Some(e.to_string())))
                }
            },
            AwsAuthMethod::KeyPair { access_key } => match self.client.describe_regions(&view).await
            {
                Ok(_) => Ok(view),
                Err(e) if e.is_client_failure() => {
                    let reason = format!(
                        "Unable to verify AWS credentials: please make sure the access key and secret key is correct. {}",
                        e
                    );
                    tracing::warn!("{}", reason);
                    Err(CredentialStatus::failed(credential, reason, Some(e.to_string())))
                }
                Err(e) => {
                    let reason = format!("Could not verify keys '{}': {}", access_key, e);
                    tracing::warn!("{}", reason);
                    Err(CredentialStatus::failed(credential, reason, Some(e.to_string())))
                }
            },
        }
    }
}

#[async_trait]
impl CredentialConnector for AwsCredentialConnector {
    fn platform(&self) -> CloudPlatform {
        CloudPlatform::Aws
    }

    async fn verify(&self, credential: &CloudCredential) -> CredentialStatus {
        tracing::info!("Verifying AWS credential {}", credential.name);
        let view = AwsCredentialView::new(credential, self.settings.government_cloud);

        let auth = match view.auth_method() {
            Ok(auth) => auth,
            Err(reason) => return CredentialStatus::failed(credential, reason, None),
        };

        let view = match self.verify_connectivity(credential, view, &auth).await {
            Ok(view) => view,
            Err(failed) => return failed,
        };

        match self.verifier.validate(&view, &auth).await {
            Ok(PermissionCheck::Granted) => {
                tracing::info!("AWS credential {} verified", credential.name);
                CredentialStatus::verified(credential)
            }
            Ok(PermissionCheck::Missing(missing)) => {
                CredentialStatus::permissions_missing(credential, missing)
            }
            Err(e) => {
                let reason = format!("Could not check the permissions of the credential: {}", e);
                tracing::warn!("{}", reason);
                CredentialStatus::failed(credential, reason, Some(e.to_string()))
            }
        }
    }

    fn prerequisites(&self, external_id: &str) -> CredentialPrerequisites {
        CredentialPrerequisites {
            platform: CloudPlatform::Aws,
            account_id: self.settings.account_id.clone(),
            external_id: external_id.to_string(),
            policy_json: Some(self.settings.policy_base64.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EvaluationResult, PolicySimulationRequest, SessionCredentials};
    use crate::view::{ACCESS_KEY, GOV_CLOUD, ROLE_ARN, SECRET_KEY};
    use base64::Engine;
    use cloudplane_cloud::CredentialState;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    const BUCKET_POLICY: &str = r#"{"Statement":[{"Resource":["arn:partition:s3:::bucket"],"Action":["s3:GetObject","s3:PutObject"]}]}"#;

    #[derive(Default)]
    struct FakeAws {
        assume_error: Mutex<Option<AwsError>>,
        regions_error: Mutex<Option<AwsError>>,
        identity_error: Mutex<Option<AwsError>>,
        simulation_error: Mutex<Option<AwsError>>,
        denied_actions: Vec<String>,
        simulations: Mutex<Vec<PolicySimulationRequest>>,
        assume_calls: AtomicU32,
        /// Whether each simulation ran with a role session attached
        simulated_with_session: Mutex<Vec<bool>>,
    }

    impl FakeAws {
        fn denying(actions: &[&str]) -> Self {
            Self {
                denied_actions: actions.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }

        fn failing_assume(error: AwsError) -> Self {
            let fake = Self::default();
            *fake.assume_error.lock().unwrap() = Some(error);
            fake
        }

        fn failing_regions(error: AwsError) -> Self {
            let fake = Self::default();
            *fake.regions_error.lock().unwrap() = Some(error);
            fake
        }

        fn failing_identity(error: AwsError) -> Self {
            let fake = Self::default();
            *fake.identity_error.lock().unwrap() = Some(error);
            fake
        }

        fn failing_simulation(error: AwsError) -> Self {
            let fake = Self::default();
            *fake.simulation_error.lock().unwrap() = Some(error);
            fake
        }
    }

    #[async_trait]
    impl AwsIdentityService for FakeAws {
        async fn assume_role(&self, _credential: &AwsCredentialView) -> Result<SessionCredentials> {
            self.assume_calls.fetch_add(1, Ordering::SeqCst);
            match self.assume_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(SessionCredentials {
                    access_key_id: "ASIA".to_string(),
                    secret_access_key: "secret".to_string(),
                    session_token: "token".to_string(),
                    expiration: None,
                }),
            }
        }

        async fn describe_regions(&self, _credential: &AwsCredentialView) -> Result<Vec<String>> {
            match self.regions_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(vec!["us-west-1".to_string()]),
            }
        }

        async fn caller_identity_arn(&self, _credential: &AwsCredentialView) -> Result<String> {
            match self.identity_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok("arn:aws:iam::123456789012:user/deployer".to_string()),
            }
        }

        async fn simulate_principal_policy(
            &self,
            credential: &AwsCredentialView,
            request: &PolicySimulationRequest,
        ) -> Result<Vec<EvaluationResult>> {
            if let Some(e) = self.simulation_error.lock().unwrap().take() {
                return Err(e);
            }
            self.simulations.lock().unwrap().push(request.clone());
            self.simulated_with_session
                .lock()
                .unwrap()
                .push(credential.session.is_some());
            Ok(request
                .actions
                .iter()
                .map(|action| EvaluationResult {
                    action_name: action.clone(),
                    resource_name: request.resource_arn.clone(),
                    decision: if self.denied_actions.contains(action) {
                        "implicitDeny".to_string()
                    } else {
                        "allowed".to_string()
                    },
                })
                .collect())
        }
    }

    fn connector(fake: Arc<FakeAws>) -> AwsCredentialConnector {
        let settings = AwsConnectorSettings {
            account_id: Some("123456789012".to_string()),
            government_cloud: false,
            policy_base64: base64::engine::general_purpose::STANDARD.encode(BUCKET_POLICY),
        };
        AwsCredentialConnector::new(fake, settings).unwrap()
    }

    fn credential(params: &[(&str, &str)]) -> CloudCredential {
        params.iter().fold(
            CloudCredential::new("crn:cred:1", "dev-aws", CloudPlatform::Aws),
            |cred, (k, v)| cred.with_parameter(*k, json!(v)),
        )
    }

    fn key_pair() -> CloudCredential {
        credential(&[(ACCESS_KEY, "AKIAEXAMPLE"), (SECRET_KEY, "secret")])
    }

    fn role() -> CloudCredential {
        credential(&[(ROLE_ARN, "arn:aws:iam::123456789012:role/cp")])
    }

    #[tokio::test]
    async fn test_role_and_keys_conflict() {
        let status = connector(Arc::new(FakeAws::default()))
            .verify(&credential(&[
                (ROLE_ARN, "arn:aws:iam::1:role/x"),
                (ACCESS_KEY, "AKIA"),
                (SECRET_KEY, "s"),
            ]))
            .await;

        assert_eq!(status.state, CredentialState::Failed);
        assert!(
            status
                .reason
                .unwrap()
                .contains("only the role arn or the access and secret key")
        );
    }

    #[tokio::test]
    async fn test_secret_without_access_key() {
        let status = connector(Arc::new(FakeAws::default()))
            .verify(&credential(&[(ROLE_ARN, ""), (ACCESS_KEY, ""), (SECRET_KEY, "x")]))
            .await;

        assert_eq!(status.state, CredentialState::Failed);
        assert!(
            status
                .reason
                .unwrap()
                .contains("provide both the access and secret key")
        );
    }

    #[tokio::test]
    async fn test_denied_action_is_reported() {
        let fake = Arc::new(FakeAws::denying(&["s3:GetObject"]));
        let status = connector(fake.clone()).verify(&key_pair()).await;

        assert_eq!(status.state, CredentialState::PermissionsMissing);
        assert_eq!(
            status.missing_permissions,
            vec!["s3:GetObject:arn:partition:s3:::bucket".to_string()]
        );
        assert!(
            status
                .reason
                .unwrap()
                .contains("s3:GetObject:arn:partition:s3:::bucket")
        );

        let simulations = fake.simulations.lock().unwrap();
        assert_eq!(simulations.len(), 1);
        assert_eq!(
            simulations[0].principal_arn,
            "arn:aws:iam::123456789012:user/deployer"
        );
    }

    #[tokio::test]
    async fn test_no_denials_verifies() {
        let status = connector(Arc::new(FakeAws::default())).verify(&key_pair()).await;
        assert_eq!(status.state, CredentialState::Verified);
        assert!(status.reason.is_none());
    }

    #[tokio::test]
    async fn test_role_principal_is_the_role() {
        let fake = Arc::new(FakeAws::default());
        let status = connector(fake.clone()).verify(&role()).await;

        assert!(status.is_verified());
        assert_eq!(
            fake.simulations.lock().unwrap()[0].principal_arn,
            "arn:aws:iam::123456789012:role/cp"
        );
    }

    #[tokio::test]
    async fn test_assumer_credentials_not_loaded() {
        let fake = Arc::new(FakeAws::failing_assume(AwsError::CredentialsNotLoaded(
            "no providers in chain".to_string(),
        )));
        let status = connector(fake).verify(&role()).await;

        assert_eq!(status.state, CredentialState::Failed);
        let reason = status.reason.unwrap();
        assert!(reason.contains("AWS_ACCESS_KEY_ID"));
        assert!(reason.contains("AWS_SECRET_ACCESS_KEY"));
    }

    #[tokio::test]
    async fn test_gov_cloud_names_gov_variables() {
        let fake = Arc::new(FakeAws::failing_assume(AwsError::CredentialsNotLoaded(
            "missing".to_string(),
        )));
        let cred = role().with_parameter(GOV_CLOUD, json!(true));
        let status = connector(fake).verify(&cred).await;

        assert!(status.reason.unwrap().contains("AWS_GOV_ACCESS_KEY_ID"));
    }

    #[tokio::test]
    async fn test_assume_role_failure_names_role() {
        let fake = Arc::new(FakeAws::failing_assume(AwsError::Service {
            code: "AccessDenied".to_string(),
            message: "not authorized".to_string(),
        }));
        let status = connector(fake.clone()).verify(&role()).await;

        assert_eq!(status.state, CredentialState::Failed);
        assert!(
            status
                .reason
                .unwrap()
                .contains("'arn:aws:iam::123456789012:role/cp'")
        );
        assert!(status.cause.unwrap().contains("AccessDenied"));
        assert!(fake.simulations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_keys() {
        let fake = Arc::new(FakeAws::failing_regions(AwsError::Service {
            code: "AuthFailure".to_string(),
            message: "AWS was not able to validate the provided access credentials".to_string(),
        }));
        let status = connector(fake).verify(&key_pair()).await;

        assert_eq!(status.state, CredentialState::Failed);
        assert!(
            status
                .reason
                .unwrap()
                .contains("make sure the access key and secret key is correct")
        );
    }

    #[tokio::test]
    async fn test_unexpected_key_failure_names_access_key() {
        let fake = Arc::new(FakeAws::failing_regions(AwsError::Other(
            "empty response".to_string(),
        )));
        let status = connector(fake).verify(&key_pair()).await;

        assert_eq!(status.state, CredentialState::Failed);
        assert!(status.reason.unwrap().contains("'AKIAEXAMPLE'"));
    }

    #[tokio::test]
    async fn test_role_is_assumed_once_per_verification() {
        let fake = Arc::new(FakeAws::default());
        let status = connector(fake.clone()).verify(&role()).await;

        assert!(status.is_verified());
        assert_eq!(fake.assume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*fake.simulated_with_session.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_caller_identity_failure_fails_permission_check() {
        let fake = Arc::new(FakeAws::failing_identity(AwsError::Service {
            code: "ExpiredToken".to_string(),
            message: "token expired".to_string(),
        }));
        let status = connector(fake.clone()).verify(&key_pair()).await;

        assert_eq!(status.state, CredentialState::Failed);
        assert!(
            status
                .reason
                .unwrap()
                .starts_with("Could not check the permissions of the credential")
        );
        assert!(status.cause.unwrap().contains("ExpiredToken"));
        assert!(fake.simulations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simulation_failure_fails_permission_check() {
        let fake = Arc::new(FakeAws::failing_simulation(AwsError::Client(
            "connection reset".to_string(),
        )));
        let status = connector(fake).verify(&role()).await;

        assert_eq!(status.state, CredentialState::Failed);
        let reason = status.reason.unwrap();
        assert!(reason.starts_with("Could not check the permissions of the credential"));
        assert!(reason.contains("connection reset"));
        assert!(status.cause.unwrap().contains("connection reset"));
        assert!(status.missing_permissions.is_empty());
    }

    #[test]
    fn test_malformed_policy_rejected_at_construction() {
        let settings = AwsConnectorSettings {
            policy_base64: base64::engine::general_purpose::STANDARD.encode("{\"Statement\": 1}"),
            ..AwsConnectorSettings::default()
        };
        let result = AwsCredentialConnector::new(Arc::new(FakeAws::default()), settings);
        assert!(matches!(result, Err(AwsError::MalformedPolicy(_))));
    }

    #[test]
    fn test_prerequisites_carry_policy() {
        let prerequisites = connector(Arc::new(FakeAws::default())).prerequisites("ext-42");
        assert_eq!(prerequisites.external_id, "ext-42");
        assert_eq!(prerequisites.account_id.as_deref(), Some("123456789012"));
        assert!(prerequisites.policy_json.is_some());
    }
}
