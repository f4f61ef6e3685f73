//! Typed view over the parameters of an AWS credential

use crate::client::SessionCredentials;
use cloudplane_cloud::CloudCredential;

pub const ROLE_ARN: &str = "roleArn";
pub const ACCESS_KEY: &str = "accessKey";
pub const SECRET_KEY: &str = "secretKey";
pub const EXTERNAL_ID: &str = "externalId";
pub const GOV_CLOUD: &str = "govCloud";
pub const REGION: &str = "region";

pub(crate) const BOTH_AUTH_METHODS: &str =
    "Please provide only the role arn or the access and secret key, not both";
pub(crate) const INCOMPLETE_KEY_PAIR: &str =
    "Please provide both the access and secret key, or a role arn";

/// How the credential authenticates against AWS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwsAuthMethod {
    Role { role_arn: String },
    KeyPair { access_key: String },
}

#[derive(Clone)]
pub struct AwsCredentialView {
    pub name: String,
    pub role_arn: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub external_id: Option<String>,
    pub region: Option<String>,
    pub government_cloud: bool,
    /// Role session obtained during this verification
    pub session: Option<SessionCredentials>,
}

impl AwsCredentialView {
    /// `government_cloud` applies when the credential does not say otherwise
    pub fn new(credential: &CloudCredential, government_cloud: bool) -> Self {
        Self {
            name: credential.name.clone(),
            role_arn: credential.non_empty_parameter(ROLE_ARN),
            access_key: credential.non_empty_parameter(ACCESS_KEY),
            secret_key: credential.non_empty_parameter(SECRET_KEY),
            external_id: credential.non_empty_parameter(EXTERNAL_ID),
            region: credential.non_empty_parameter(REGION),
            government_cloud: credential
                .get_parameter::<bool>(GOV_CLOUD)
                .unwrap_or(government_cloud),
            session: None,
        }
    }

    pub fn with_session(mut self, session: SessionCredentials) -> Self {
        self.session = Some(session);
        self
    }

    /// Exactly one authentication method must be configured
    pub fn auth_method(&self) -> Result<AwsAuthMethod, &'static str> {
        match (&self.role_arn, &self.access_key, &self.secret_key) {
            (Some(role_arn), None, None) => Ok(AwsAuthMethod::Role {
                role_arn: role_arn.clone(),
            }),
            (Some(_), _, _) => Err(BOTH_AUTH_METHODS),
            (None, Some(access_key), Some(_)) => Ok(AwsAuthMethod::KeyPair {
                access_key: access_key.clone(),
            }),
            (None, _, _) => Err(INCOMPLETE_KEY_PAIR),
        }
    }

    /// Environment variables holding the assumer credentials
    pub fn assumer_env_vars(&self) -> (&'static str, &'static str) {
        if self.government_cloud {
            ("AWS_GOV_ACCESS_KEY_ID", "AWS_GOV_SECRET_ACCESS_KEY")
        } else {
            ("AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY")
        }
    }
}

impl std::fmt::Debug for AwsCredentialView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentialView")
            .field("name", &self.name)
            .field("role_arn", &self.role_arn)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("external_id", &self.external_id)
            .field("region", &self.region)
            .field("government_cloud", &self.government_cloud)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudplane_cloud::CloudPlatform;
    use serde_json::json;

    fn view(params: &[(&str, &str)]) -> AwsCredentialView {
        let credential = params.iter().fold(
            CloudCredential::new("crn:cred:1", "dev", CloudPlatform::Aws),
            |cred, (k, v)| cred.with_parameter(*k, json!(v)),
        );
        AwsCredentialView::new(&credential, false)
    }

    #[test]
    fn test_role_only() {
        let v = view(&[(ROLE_ARN, "arn:aws:iam::1:role/x"), (ACCESS_KEY, " ")]);
        assert_eq!(
            v.auth_method(),
            Ok(AwsAuthMethod::Role {
                role_arn: "arn:aws:iam::1:role/x".to_string()
            })
        );
    }

    #[test]
    fn test_role_with_partial_key_conflicts() {
        let v = view(&[(ROLE_ARN, "arn:aws:iam::1:role/x"), (SECRET_KEY, "s")]);
        assert_eq!(v.auth_method(), Err(BOTH_AUTH_METHODS));
    }

    #[test]
    fn test_incomplete_key_pair() {
        assert_eq!(view(&[]).auth_method(), Err(INCOMPLETE_KEY_PAIR));
        assert_eq!(view(&[(ACCESS_KEY, "AKIA")]).auth_method(), Err(INCOMPLETE_KEY_PAIR));
    }

    #[test]
    fn test_gov_cloud_flag_overrides_default() {
        let credential = CloudCredential::new("crn:cred:1", "gov", CloudPlatform::Aws)
            .with_parameter(GOV_CLOUD, json!(true));
        let v = AwsCredentialView::new(&credential, false);
        assert_eq!(v.assumer_env_vars().0, "AWS_GOV_ACCESS_KEY_ID");
    }

    #[test]
    fn test_debug_hides_secret() {
        let v = view(&[(ACCESS_KEY, "AKIA"), (SECRET_KEY, "very-secret")]);
        assert!(!format!("{:?}", v).contains("very-secret"));
    }
}
