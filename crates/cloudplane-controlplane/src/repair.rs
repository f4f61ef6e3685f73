//! クラスタ修復
//!
//! 修復フローがプロビジョナに修復を依頼し、スタック状態が収束するまで
//! ポーリングで待つ。

use crate::error::{ControlPlaneError, Result};
use crate::provisioner::{
    ProvisionerError, StackProvisioner, StackStatus, StackView, wait_for_stack,
};
use async_trait::async_trait;
use cloudplane_cloud::{ManagedResource, ResourceStatus};
use cloudplane_flow::{
    AttemptOutcome, FlowContext, FlowDispatcher, FlowError, FlowHandler, FlowPayload,
    FlowSelector, PollingConfig, RepairRequest,
};
use std::sync::Arc;

/// 一回分のポーリング結果を判定する
pub fn repair_outcome(resource: &ManagedResource, stack: Option<StackView>) -> AttemptOutcome<()> {
    let Some(stack) = stack else {
        return AttemptOutcome::Break(format!("Stack not found downstream for {}", resource.name));
    };

    if stack.is_available() {
        return AttemptOutcome::Finished(());
    }
    if let Some(reason) = stack.failure(StackStatus::UpdateFailed) {
        return AttemptOutcome::Break(format!("Repair failed '{}', {}", resource.name, reason));
    }

    tracing::debug!(
        "Repair of {} in progress: stack {:?}, cluster {:?}",
        resource.name,
        stack.stack_status,
        stack.cluster_status
    );
    AttemptOutcome::Continue
}

/// プロビジョナに修復を依頼する
///
/// スタックが見つからない場合は続行し、後続のポーリングで失敗として扱う。
pub async fn request_repair(
    provisioner: &dyn StackProvisioner,
    resource: &ManagedResource,
    host_groups: &[String],
) -> cloudplane_flow::Result<()> {
    tracing::info!(
        "Requesting repair of {} for host groups {:?}",
        resource.name,
        host_groups
    );
    match provisioner.repair_stack(resource, host_groups).await {
        Ok(()) => Ok(()),
        Err(ProvisionerError::StackNotFound(_)) => {
            tracing::info!("Can not find stack downstream for {}", resource.name);
            Ok(())
        }
        Err(ProvisionerError::Client(message)) => {
            tracing::warn!("Repair request for {} rejected: {}", resource.name, message);
            Err(FlowError::StepFailed(format!(
                "Can not repair cluster, client error happened on the provisioner side: {}",
                message
            )))
        }
    }
}

/// 修復の起動と完了待ち
#[derive(Clone)]
pub struct ClusterRepairService {
    dispatcher: FlowDispatcher,
    provisioner: Arc<dyn StackProvisioner>,
    polling: PollingConfig,
}

impl ClusterRepairService {
    pub fn new(
        dispatcher: FlowDispatcher,
        provisioner: Arc<dyn StackProvisioner>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            dispatcher,
            provisioner,
            polling,
        }
    }

    /// 修復フローを起動し、修復中になったリソースを返す
    pub async fn trigger_repair(
        &self,
        resource: &ManagedResource,
        user_id: &str,
        request: RepairRequest,
    ) -> Result<ManagedResource> {
        if !matches!(resource.status, ResourceStatus::Running | ResourceStatus::Failed) {
            return Err(ControlPlaneError::InvalidResourceState {
                id: resource.id.clone(),
                status: resource.status.to_string(),
            });
        }

        tracing::info!(
            "Triggering repair of {} for host groups {:?}",
            resource.name,
            request.host_groups
        );
        self.dispatcher
            .trigger_with_payload(
                FlowSelector::Repair,
                resource,
                user_id,
                FlowPayload::Repair(request),
            )
            .await?;

        Ok(resource.with_status(ResourceStatus::RepairInProgress))
    }

    /// 修復の完了を待ち、稼働中になったリソースを返す
    pub async fn wait_for_repair(&self, resource: &ManagedResource) -> Result<ManagedResource> {
        wait_for_stack(&self.provisioner, resource, &self.polling, repair_outcome).await?;
        tracing::info!("Repair of {} finished", resource.name);
        Ok(resource.with_status(ResourceStatus::Running))
    }

    /// 修復中のリソースに対するフローを止める
    pub async fn cancel_repair(&self, resource: &ManagedResource, user_id: &str) {
        self.dispatcher.cancel(resource, user_id).await;
    }
}

/// ランタイム上で修復を依頼し、収束を待つフロー
pub struct RepairFlow {
    provisioner: Arc<dyn StackProvisioner>,
    polling: PollingConfig,
}

impl RepairFlow {
    pub fn new(provisioner: Arc<dyn StackProvisioner>, polling: PollingConfig) -> Self {
        Self {
            provisioner,
            polling,
        }
    }
}

#[async_trait]
impl FlowHandler for RepairFlow {
    async fn run(&self, ctx: FlowContext) -> cloudplane_flow::Result<()> {
        let host_groups = match &ctx.payload {
            FlowPayload::Repair(request) => request.host_groups.clone(),
            FlowPayload::None => Vec::new(),
        };

        request_repair(self.provisioner.as_ref(), &ctx.resource, &host_groups).await?;
        wait_for_stack(&self.provisioner, &ctx.resource, &self.polling, repair_outcome)
            .await
            .map_err(FlowError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn cluster() -> ManagedResource {
        ManagedResource::new("31", "dl-main", ResourceStatus::Running)
    }

    fn view(stack: StackStatus, cluster: StackStatus) -> StackView {
        StackView {
            stack_status: stack,
            stack_reason: Some("instance i-1 failed".to_string()),
            cluster_status: cluster,
            cluster_reason: Some("gateway unreachable".to_string()),
        }
    }

    #[test]
    fn test_outcome_mapping() {
        let resource = cluster();

        assert_eq!(
            repair_outcome(&resource, Some(view(StackStatus::Available, StackStatus::Available))),
            AttemptOutcome::Finished(())
        );
        assert_eq!(
            repair_outcome(
                &resource,
                Some(view(StackStatus::Available, StackStatus::UpdateInProgress))
            ),
            AttemptOutcome::Continue
        );
        assert_eq!(
            repair_outcome(&resource, Some(view(StackStatus::UpdateFailed, StackStatus::Available))),
            AttemptOutcome::Break("Repair failed 'dl-main', instance i-1 failed".to_string())
        );
        assert_eq!(
            repair_outcome(&resource, Some(view(StackStatus::Available, StackStatus::UpdateFailed))),
            AttemptOutcome::Break("Repair failed 'dl-main', gateway unreachable".to_string())
        );
        assert_eq!(
            repair_outcome(&resource, None),
            AttemptOutcome::Break("Stack not found downstream for dl-main".to_string())
        );
    }

    /// 状態を台本通りに返し、修復依頼を記録するプロビジョナ
    #[derive(Default)]
    struct ScriptedProvisioner {
        script: Mutex<VecDeque<Option<StackView>>>,
        repair_error: Mutex<Option<ProvisionerError>>,
        repairs: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl StackProvisioner for ScriptedProvisioner {
        async fn stack_status(&self, _resource: &ManagedResource) -> anyhow::Result<Option<StackView>> {
            let mut script = self.script.lock().unwrap();
            Ok(script
                .pop_front()
                .unwrap_or(Some(view(StackStatus::UpdateInProgress, StackStatus::UpdateInProgress))))
        }

        async fn create_stack(
            &self,
            _resource: &ManagedResource,
        ) -> std::result::Result<(), ProvisionerError> {
            Ok(())
        }

        async fn repair_stack(
            &self,
            _resource: &ManagedResource,
            host_groups: &[String],
        ) -> std::result::Result<(), ProvisionerError> {
            self.repairs.lock().unwrap().push(host_groups.to_vec());
            match self.repair_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn delete_stack(
            &self,
            _resource: &ManagedResource,
        ) -> std::result::Result<(), ProvisionerError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_convergence() {
        let provisioner = Arc::new(ScriptedProvisioner::default());
        provisioner.script.lock().unwrap().extend([
            Some(view(StackStatus::UpdateInProgress, StackStatus::UpdateInProgress)),
            Some(view(StackStatus::Available, StackStatus::Available)),
        ]);
        let polling = PollingConfig::new(
            std::time::Duration::from_secs(10),
            std::time::Duration::from_secs(60),
        );

        let result = wait_for_stack(
            &(provisioner.clone() as Arc<dyn StackProvisioner>),
            &cluster(),
            &polling,
            repair_outcome,
        )
        .await;

        assert!(result.is_ok());
        assert!(provisioner.script.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_repair_passes_host_groups() {
        let provisioner = ScriptedProvisioner::default();
        let host_groups = vec!["master".to_string(), "idbroker".to_string()];

        request_repair(&provisioner, &cluster(), &host_groups)
            .await
            .unwrap();

        assert_eq!(*provisioner.repairs.lock().unwrap(), vec![host_groups]);
    }

    #[tokio::test]
    async fn test_request_repair_tolerates_missing_stack() {
        let provisioner = ScriptedProvisioner::default();
        *provisioner.repair_error.lock().unwrap() =
            Some(ProvisionerError::StackNotFound("dl-main".to_string()));

        assert!(request_repair(&provisioner, &cluster(), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_request_repair_fails_on_client_error() {
        let provisioner = ScriptedProvisioner::default();
        *provisioner.repair_error.lock().unwrap() =
            Some(ProvisionerError::Client("host group unknown".to_string()));

        let err = request_repair(&provisioner, &cluster(), &["worker".to_string()])
            .await
            .unwrap_err();

        match err {
            FlowError::StepFailed(message) => assert!(message.ends_with("host group unknown")),
            other => panic!("expected step failure, got {:?}", other),
        }
    }
}
