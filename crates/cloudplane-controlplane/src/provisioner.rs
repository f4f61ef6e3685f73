//! プロビジョナ (スタックを実際に作成・修復・削除する下位サービス)

use async_trait::async_trait;
use cloudplane_cloud::ManagedResource;
use cloudplane_flow::{AttemptOutcome, PollError, PollingConfig, poll_until};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// プロビジョナが報告するスタック/クラスタの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    CreateInProgress,
    CreateFailed,
    Available,
    UpdateInProgress,
    UpdateFailed,
    DeleteInProgress,
    DeleteFailed,
}

/// プロビジョナ側のスタックのスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackView {
    pub stack_status: StackStatus,
    pub stack_reason: Option<String>,
    pub cluster_status: StackStatus,
    pub cluster_reason: Option<String>,
}

impl StackView {
    /// スタックかクラスタが `failed` 状態なら、その理由
    pub fn failure(&self, failed: StackStatus) -> Option<String> {
        if self.stack_status == failed {
            Some(self.stack_reason.clone().unwrap_or_default())
        } else if self.cluster_status == failed {
            Some(self.cluster_reason.clone().unwrap_or_default())
        } else {
            None
        }
    }

    pub fn is_available(&self) -> bool {
        self.stack_status == StackStatus::Available && self.cluster_status == StackStatus::Available
    }
}

/// プロビジョナ呼び出しのエラー
#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("Stack not found for {0}")]
    StackNotFound(String),

    /// プロビジョナが要求を拒否した
    #[error("{0}")]
    Client(String),
}

#[async_trait]
pub trait StackProvisioner: Send + Sync {
    /// スタックが存在しなければ `None`
    async fn stack_status(&self, resource: &ManagedResource) -> anyhow::Result<Option<StackView>>;

    async fn create_stack(&self, resource: &ManagedResource) -> Result<(), ProvisionerError>;

    async fn repair_stack(
        &self,
        resource: &ManagedResource,
        host_groups: &[String],
    ) -> Result<(), ProvisionerError>;

    async fn delete_stack(&self, resource: &ManagedResource) -> Result<(), ProvisionerError>;
}

/// スタック状態を `outcome` で判定しながら収束を待つ
pub(crate) async fn wait_for_stack(
    provisioner: &Arc<dyn StackProvisioner>,
    resource: &ManagedResource,
    polling: &PollingConfig,
    outcome: fn(&ManagedResource, Option<StackView>) -> AttemptOutcome<()>,
) -> Result<(), PollError> {
    poll_until(
        || {
            let provisioner = provisioner.clone();
            let resource = resource.clone();
            async move {
                let stack = provisioner.stack_status(&resource).await?;
                Ok::<_, anyhow::Error>(outcome(&resource, stack))
            }
        },
        polling,
    )
    .await
}
