//! [`AwsIdentityService`] backed by the AWS SDK

use crate::client::{
    AwsIdentityService, EvaluationResult, PolicySimulationRequest, SessionCredentials,
};
use crate::error::{AwsError, Result};
use crate::view::AwsCredentialView;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::config::Credentials;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

const SESSION_NAME: &str = "cloudplane-credential-check";

pub struct SdkAwsClient {
    default_region: String,
}

impl SdkAwsClient {
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
        }
    }

    fn region(&self, credential: &AwsCredentialView) -> Region {
        Region::new(
            credential
                .region
                .clone()
                .unwrap_or_else(|| self.default_region.clone()),
        )
    }

    /// Configuration of the account that assumes user roles
    async fn assumer_config(&self, credential: &AwsCredentialView) -> Result<SdkConfig> {
        let loader = aws_config::defaults(BehaviorVersion::latest()).region(self.region(credential));
        if !credential.government_cloud {
            return Ok(loader.load().await);
        }

        let (access_var, secret_var) = credential.assumer_env_vars();
        let access = std::env::var(access_var)
            .map_err(|_| AwsError::CredentialsNotLoaded(format!("{} is not set", access_var)))?;
        let secret = std::env::var(secret_var)
            .map_err(|_| AwsError::CredentialsNotLoaded(format!("{} is not set", secret_var)))?;
        let provider = Credentials::new(access, secret, None, None, "cloudplane-gov-assumer");
        Ok(loader.credentials_provider(provider).load().await)
    }

    /// Credentials of the view, reusing a role session already obtained
    async fn credentials_for(&self, credential: &AwsCredentialView) -> Result<Credentials> {
        match (&credential.role_arn, &credential.access_key, &credential.secret_key) {
            (Some(_), _, _) => {
                let session = match &credential.session {
                    Some(session) => session.clone(),
                    None => self.assume_role(credential).await?,
                };
                Ok(Credentials::new(
                    session.access_key_id,
                    session.secret_access_key,
                    Some(session.session_token),
                    None,
                    "cloudplane-role-session",
                ))
            }
            (None, Some(access), Some(secret)) => Ok(Credentials::new(
                access,
                secret,
                None,
                None,
                "cloudplane-key-pair",
            )),
            _ => Err(AwsError::CredentialsNotLoaded(format!(
                "credential {} has no usable authentication",
                credential.name
            ))),
        }
    }

    /// Configuration authenticating as the credential itself
    async fn credential_config(&self, credential: &AwsCredentialView) -> Result<SdkConfig> {
        let provider = self.credentials_for(credential).await?;
        Ok(aws_config::defaults(BehaviorVersion::latest())
            .region(self.region(credential))
            .credentials_provider(provider)
            .load()
            .await)
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let text = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => AwsError::Service {
            code: service.err().code().unwrap_or("Unknown").to_string(),
            message: service.err().message().unwrap_or(&text).to_string(),
        },
        _ if text.contains("no providers in chain") || text.contains("failed to load credentials") => {
            AwsError::CredentialsNotLoaded(text)
        }
        _ => AwsError::Client(text),
    }
}

#[async_trait]
impl AwsIdentityService for SdkAwsClient {
    async fn assume_role(&self, credential: &AwsCredentialView) -> Result<SessionCredentials> {
        let role_arn = credential
            .role_arn
            .as_deref()
            .ok_or_else(|| AwsError::Other("credential has no role arn".to_string()))?;
        let sts = aws_sdk_sts::Client::new(&self.assumer_config(credential).await?);

        let output = sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(SESSION_NAME)
            .set_external_id(credential.external_id.clone())
            .send()
            .await
            .map_err(map_sdk_error)?;

        let creds = output
            .credentials()
            .ok_or_else(|| AwsError::Other("AssumeRole returned no credentials".to_string()))?;
        Ok(SessionCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration: chrono::DateTime::from_timestamp(creds.expiration().secs(), 0),
        })
    }

    async fn describe_regions(&self, credential: &AwsCredentialView) -> Result<Vec<String>> {
        let ec2 = aws_sdk_ec2::Client::new(&self.credential_config(credential).await?);
        let output = ec2
            .describe_regions()
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(output
            .regions()
            .iter()
            .filter_map(|r| r.region_name().map(str::to_string))
            .collect())
    }

    async fn caller_identity_arn(&self, credential: &AwsCredentialView) -> Result<String> {
        let sts = aws_sdk_sts::Client::new(&self.credential_config(credential).await?);
        let output = sts
            .get_caller_identity()
            .send()
            .await
            .map_err(map_sdk_error)?;

        output
            .arn()
            .map(str::to_string)
            .ok_or_else(|| AwsError::Other("GetCallerIdentity returned no arn".to_string()))
    }

    async fn simulate_principal_policy(
        &self,
        credential: &AwsCredentialView,
        request: &PolicySimulationRequest,
    ) -> Result<Vec<EvaluationResult>> {
        let iam = aws_sdk_iam::Client::new(&self.credential_config(credential).await?);
        let mut results = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = iam
                .simulate_principal_policy()
                .policy_source_arn(&request.principal_arn)
                .set_action_names(Some(request.actions.clone()))
                .resource_arns(&request.resource_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(map_sdk_error)?;

            results.extend(output.evaluation_results().iter().map(|r| EvaluationResult {
                action_name: r.eval_action_name().to_string(),
                resource_name: r.eval_resource_name().unwrap_or("*").to_string(),
                decision: r.eval_decision().as_str().to_string(),
            }));

            match output.marker() {
                Some(next) if output.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        tracing::debug!(
            "Simulated {} actions on {}: {} results",
            request.actions.len(),
            request.resource_arn,
            results.len()
        );
        Ok(results)
    }
}
