//! クラスタの作成と削除

use crate::error::{ControlPlaneError, Result};
use crate::provisioner::{
    ProvisionerError, StackProvisioner, StackStatus, StackView, wait_for_stack,
};
use async_trait::async_trait;
use cloudplane_cloud::{ManagedResource, ResourceStatus};
use cloudplane_flow::{
    AttemptOutcome, FlowContext, FlowDispatcher, FlowError, FlowHandler, FlowSelector,
    PollingConfig,
};
use std::sync::Arc;

/// 作成中のスタックの判定
pub fn creation_outcome(resource: &ManagedResource, stack: Option<StackView>) -> AttemptOutcome<()> {
    let Some(stack) = stack else {
        return AttemptOutcome::Break(format!("Stack not found downstream for {}", resource.name));
    };

    if stack.is_available() {
        AttemptOutcome::Finished(())
    } else if let Some(reason) = stack.failure(StackStatus::CreateFailed) {
        AttemptOutcome::Break(format!("Creation failed '{}', {}", resource.name, reason))
    } else {
        AttemptOutcome::Continue
    }
}

/// 削除中のスタックの判定。スタックが消えたら完了
pub fn deletion_outcome(resource: &ManagedResource, stack: Option<StackView>) -> AttemptOutcome<()> {
    match stack {
        None => AttemptOutcome::Finished(()),
        Some(stack) => match stack.failure(StackStatus::DeleteFailed) {
            Some(reason) => {
                AttemptOutcome::Break(format!("Deletion failed '{}', {}", resource.name, reason))
            }
            None => AttemptOutcome::Continue,
        },
    }
}

/// 作成・削除フローの起動
#[derive(Clone)]
pub struct ClusterService {
    dispatcher: FlowDispatcher,
}

impl ClusterService {
    pub fn new(dispatcher: FlowDispatcher) -> Self {
        Self { dispatcher }
    }

    /// 作成フローを起動し、作成中になったリソースを返す
    pub async fn trigger_creation(
        &self,
        resource: &ManagedResource,
        user_id: &str,
    ) -> Result<ManagedResource> {
        if resource.status != ResourceStatus::Created {
            return Err(ControlPlaneError::InvalidResourceState {
                id: resource.id.clone(),
                status: resource.status.to_string(),
            });
        }

        self.dispatcher
            .trigger(FlowSelector::Create, resource, user_id)
            .await?;
        Ok(resource.with_status(ResourceStatus::CreateInProgress))
    }

    /// 削除フローを起動し、削除中になったリソースを返す
    pub async fn trigger_deletion(
        &self,
        resource: &ManagedResource,
        user_id: &str,
    ) -> Result<ManagedResource> {
        if matches!(
            resource.status,
            ResourceStatus::Deleted | ResourceStatus::DeleteInProgress
        ) {
            return Err(ControlPlaneError::InvalidResourceState {
                id: resource.id.clone(),
                status: resource.status.to_string(),
            });
        }

        self.dispatcher
            .trigger(FlowSelector::Delete, resource, user_id)
            .await?;
        Ok(resource.with_status(ResourceStatus::DeleteInProgress))
    }
}

/// スタックを作成し、利用可能になるまで待つフロー
pub struct CreateFlow {
    provisioner: Arc<dyn StackProvisioner>,
    polling: PollingConfig,
}

impl CreateFlow {
    pub fn new(provisioner: Arc<dyn StackProvisioner>, polling: PollingConfig) -> Self {
        Self {
            provisioner,
            polling,
        }
    }
}

#[async_trait]
impl FlowHandler for CreateFlow {
    async fn run(&self, ctx: FlowContext) -> cloudplane_flow::Result<()> {
        tracing::info!("Creating stack for {}", ctx.resource.name);
        self.provisioner
            .create_stack(&ctx.resource)
            .await
            .map_err(|e| {
                FlowError::StepFailed(format!(
                    "Can not create stack for {}: {}",
                    ctx.resource.name, e
                ))
            })?;

        wait_for_stack(&self.provisioner, &ctx.resource, &self.polling, creation_outcome)
            .await
            .map_err(FlowError::from)
    }
}

/// スタックを削除し、消えるまで待つフロー
pub struct DeleteFlow {
    provisioner: Arc<dyn StackProvisioner>,
    polling: PollingConfig,
}

impl DeleteFlow {
    pub fn new(provisioner: Arc<dyn StackProvisioner>, polling: PollingConfig) -> Self {
        Self {
            provisioner,
            polling,
        }
    }
}

#[async_trait]
impl FlowHandler for DeleteFlow {
    async fn run(&self, ctx: FlowContext) -> cloudplane_flow::Result<()> {
        tracing::info!("Deleting stack of {}", ctx.resource.name);
        match self.provisioner.delete_stack(&ctx.resource).await {
            Ok(()) => {}
            Err(ProvisionerError::StackNotFound(_)) => {
                tracing::info!("Stack of {} already gone", ctx.resource.name);
                return Ok(());
            }
            Err(ProvisionerError::Client(message)) => {
                return Err(FlowError::StepFailed(format!(
                    "Can not delete stack, client error happened on the provisioner side: {}",
                    message
                )));
            }
        }

        wait_for_stack(&self.provisioner, &ctx.resource, &self.polling, deletion_outcome)
            .await
            .map_err(FlowError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> ManagedResource {
        ManagedResource::new("51", "dh-etl", ResourceStatus::Created)
    }

    fn view(stack: StackStatus, cluster: StackStatus) -> StackView {
        StackView {
            stack_status: stack,
            stack_reason: Some("quota exceeded".to_string()),
            cluster_status: cluster,
            cluster_reason: None,
        }
    }

    #[test]
    fn test_creation_outcome() {
        let resource = cluster();
        assert_eq!(
            creation_outcome(
                &resource,
                Some(view(StackStatus::CreateInProgress, StackStatus::CreateInProgress))
            ),
            AttemptOutcome::Continue
        );
        assert_eq!(
            creation_outcome(&resource, Some(view(StackStatus::Available, StackStatus::Available))),
            AttemptOutcome::Finished(())
        );
        assert_eq!(
            creation_outcome(
                &resource,
                Some(view(StackStatus::CreateFailed, StackStatus::CreateInProgress))
            ),
            AttemptOutcome::Break("Creation failed 'dh-etl', quota exceeded".to_string())
        );
        assert!(matches!(creation_outcome(&resource, None), AttemptOutcome::Break(_)));
    }

    #[test]
    fn test_deletion_outcome() {
        let resource = cluster();
        assert_eq!(deletion_outcome(&resource, None), AttemptOutcome::Finished(()));
        assert_eq!(
            deletion_outcome(
                &resource,
                Some(view(StackStatus::DeleteInProgress, StackStatus::DeleteInProgress))
            ),
            AttemptOutcome::Continue
        );
        assert_eq!(
            deletion_outcome(
                &resource,
                Some(view(StackStatus::DeleteFailed, StackStatus::Available))
            ),
            AttemptOutcome::Break("Deletion failed 'dh-etl', quota exceeded".to_string())
        );
    }
}
