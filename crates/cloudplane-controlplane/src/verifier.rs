//! プラットフォームごとの認証情報コネクタ
//!
//! 対応プラットフォームは [`CloudPlatform`] の列挙で閉じている。コネクタは
//! コンテキスト構築時に一度だけ作られ、以後は `match` で選択される。

use crate::error::{ControlPlaneError, Result};
use async_trait::async_trait;
use cloudplane_cloud::{
    CloudCredential, CloudPlatform, CredentialConnector, CredentialPrerequisites,
    CredentialState, CredentialStatus, MissingPermissions,
};
use cloudplane_cloud_aws::AwsCredentialConnector;

/// Mock 認証情報が検証結果として返す状態のパラメータ名
pub const MOCK_STATE: &str = "mockState";
/// `PERMISSIONS_MISSING` 時に返す `action:resource` のリスト
pub const MOCK_MISSING: &str = "mockMissing";

/// テスト環境向けのプロバイダ呼び出しを行わないコネクタ
///
/// 検証結果は認証情報のパラメータで決まる。未指定なら `VERIFIED`。
#[derive(Debug, Clone, Default)]
pub struct MockCredentialConnector;

#[async_trait]
impl CredentialConnector for MockCredentialConnector {
    fn platform(&self) -> CloudPlatform {
        CloudPlatform::Mock
    }

    async fn verify(&self, credential: &CloudCredential) -> CredentialStatus {
        let state = credential
            .get_parameter::<CredentialState>(MOCK_STATE)
            .unwrap_or(CredentialState::Verified);

        match state {
            CredentialState::Failed => {
                CredentialStatus::failed(credential, "Mock credential rejected", None)
            }
            CredentialState::PermissionsMissing => {
                let denied = credential
                    .get_parameter::<Vec<String>>(MOCK_MISSING)
                    .unwrap_or_default();
                match MissingPermissions::new(denied) {
                    Some(missing) => CredentialStatus::permissions_missing(credential, missing),
                    None => CredentialStatus::verified(credential),
                }
            }
            _ => CredentialStatus::verified(credential),
        }
    }

    fn prerequisites(&self, external_id: &str) -> CredentialPrerequisites {
        CredentialPrerequisites {
            platform: CloudPlatform::Mock,
            account_id: None,
            external_id: external_id.to_string(),
            policy_json: None,
        }
    }
}

/// 有効なプラットフォームのコネクタ一式
pub struct CredentialVerifiers {
    aws: Option<AwsCredentialConnector>,
    mock: MockCredentialConnector,
}

impl CredentialVerifiers {
    pub fn new(aws: Option<AwsCredentialConnector>) -> Self {
        Self {
            aws,
            mock: MockCredentialConnector,
        }
    }

    /// プラットフォームに対応するコネクタ
    pub fn connector(&self, platform: CloudPlatform) -> Result<&dyn CredentialConnector> {
        match platform {
            CloudPlatform::Aws => self
                .aws
                .as_ref()
                .map(|c| c as &dyn CredentialConnector)
                .ok_or(ControlPlaneError::PlatformNotEnabled(platform)),
            CloudPlatform::Mock => Ok(&self.mock),
        }
    }

    pub fn enabled_platforms(&self) -> Vec<CloudPlatform> {
        let mut platforms = Vec::new();
        if self.aws.is_some() {
            platforms.push(CloudPlatform::Aws);
        }
        platforms.push(CloudPlatform::Mock);
        platforms
    }
}
