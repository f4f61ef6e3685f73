//! 認証情報のライフサイクル操作

use crate::error::Result;
use crate::verifier::CredentialVerifiers;
use cloudplane_cloud::{CloudCredential, CloudPlatform, CredentialPrerequisites, CredentialStatus};
use std::sync::Arc;

/// 認証情報の登録・検証・削除
///
/// 利用者が修正できる結果 (設定不備、鍵の拒否、権限不足) は
/// [`CredentialStatus`] として返す。エラーになるのは無効なプラットフォームのみ。
#[derive(Clone)]
pub struct CredentialService {
    verifiers: Arc<CredentialVerifiers>,
}

impl CredentialService {
    pub fn new(verifiers: Arc<CredentialVerifiers>) -> Self {
        Self { verifiers }
    }

    pub fn create(&self, credential: &CloudCredential) -> Result<CredentialStatus> {
        let status = self.verifiers.connector(credential.platform)?.create(credential);
        tracing::info!("Credential {} created", credential.crn);
        Ok(status)
    }

    pub async fn verify(&self, credential: &CloudCredential) -> Result<CredentialStatus> {
        let connector = self.verifiers.connector(credential.platform)?;
        let status = connector.verify(credential).await;
        tracing::info!(
            "Credential {} verification finished: {}",
            credential.crn,
            status.state
        );
        Ok(status)
    }

    pub fn delete(&self, credential: &CloudCredential) -> Result<CredentialStatus> {
        let status = self.verifiers.connector(credential.platform)?.delete(credential);
        tracing::info!("Credential {} deleted", credential.crn);
        Ok(status)
    }

    /// 認証情報を作成する前に利用者がプロバイダ側で行う設定
    pub fn prerequisites(
        &self,
        platform: CloudPlatform,
        external_id: &str,
    ) -> Result<CredentialPrerequisites> {
        Ok(self.verifiers.connector(platform)?.prerequisites(external_id))
    }
}
