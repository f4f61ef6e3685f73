//! コントロールプレーンのコンテキスト
//!
//! プロセス起動時に一度だけ構築し、各サービスへ明示的に渡す。

use crate::cluster::{ClusterService, CreateFlow, DeleteFlow};
use crate::credential::CredentialService;
use crate::error::Result;
use crate::provisioner::StackProvisioner;
use crate::repair::{ClusterRepairService, RepairFlow};
use crate::verifier::CredentialVerifiers;
use anyhow::Context;
use cloudplane_cloud_aws::{
    AwsConnectorSettings, AwsCredentialConnector, AwsIdentityService, default_policy_base64,
};
use cloudplane_config::ControlPlaneConfig;
use cloudplane_flow::{FlowDispatcher, FlowSelector, InMemoryFlowRuntime};
use std::sync::Arc;

pub struct ControlPlaneContext {
    config: ControlPlaneConfig,
    runtime: Arc<InMemoryFlowRuntime>,
    dispatcher: FlowDispatcher,
    credentials: CredentialService,
    clusters: ClusterService,
    repair: ClusterRepairService,
}

/// [`ControlPlaneContext`] のビルダー
pub struct ContextBuilder {
    config: ControlPlaneConfig,
    provisioner: Arc<dyn StackProvisioner>,
    aws_client: Option<Arc<dyn AwsIdentityService>>,
}

impl ContextBuilder {
    pub fn new(config: ControlPlaneConfig, provisioner: Arc<dyn StackProvisioner>) -> Self {
        Self {
            config,
            provisioner,
            aws_client: None,
        }
    }

    /// AWS 呼び出しに使うクライアントを指定する
    pub fn with_aws_client(mut self, client: Arc<dyn AwsIdentityService>) -> Self {
        self.aws_client = Some(client);
        self
    }

    #[cfg(feature = "aws-sdk")]
    fn default_aws_client(config: &ControlPlaneConfig) -> Option<Arc<dyn AwsIdentityService>> {
        Some(Arc::new(cloudplane_cloud_aws::SdkAwsClient::new(
            config.aws.default_region.clone(),
        )))
    }

    #[cfg(not(feature = "aws-sdk"))]
    fn default_aws_client(_config: &ControlPlaneConfig) -> Option<Arc<dyn AwsIdentityService>> {
        None
    }

    pub fn build(self) -> Result<ControlPlaneContext> {
        let aws_client = self
            .aws_client
            .or_else(|| Self::default_aws_client(&self.config));

        let aws = match aws_client {
            Some(client) => {
                let settings = AwsConnectorSettings {
                    account_id: self.config.aws.account_id.clone(),
                    government_cloud: self.config.aws.government_cloud,
                    policy_base64: self
                        .config
                        .aws
                        .credential_policies_json
                        .clone()
                        .unwrap_or_else(default_policy_base64),
                };
                Some(AwsCredentialConnector::new(client, settings)?)
            }
            None => {
                tracing::warn!("No AWS client configured, AWS credentials can not be verified");
                None
            }
        };
        let verifiers = Arc::new(CredentialVerifiers::new(aws));

        let polling = self.config.polling_config();
        let runtime = Arc::new(
            InMemoryFlowRuntime::new()
                .with_handler(
                    FlowSelector::Create,
                    CreateFlow::new(self.provisioner.clone(), polling),
                )
                .with_handler(
                    FlowSelector::Repair,
                    RepairFlow::new(self.provisioner.clone(), polling),
                )
                .with_handler(
                    FlowSelector::Delete,
                    DeleteFlow::new(self.provisioner.clone(), polling),
                ),
        );
        let dispatcher = FlowDispatcher::new(runtime.clone(), self.config.dispatcher_config());

        tracing::info!(
            "Control plane ready, platforms: {:?}",
            verifiers.enabled_platforms()
        );

        Ok(ControlPlaneContext {
            credentials: CredentialService::new(verifiers),
            clusters: ClusterService::new(dispatcher.clone()),
            repair: ClusterRepairService::new(dispatcher.clone(), self.provisioner, polling),
            dispatcher,
            runtime,
            config: self.config,
        })
    }
}

impl ControlPlaneContext {
    pub fn builder(config: ControlPlaneConfig, provisioner: Arc<dyn StackProvisioner>) -> ContextBuilder {
        ContextBuilder::new(config, provisioner)
    }

    /// 設定ファイルを探索して読み込み、コンテキストを構築する
    pub fn from_default_config(provisioner: Arc<dyn StackProvisioner>) -> anyhow::Result<Self> {
        let config = ControlPlaneConfig::load().context("Failed to load control plane config")?;
        ContextBuilder::new(config, provisioner)
            .build()
            .context("Failed to build control plane context")
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<InMemoryFlowRuntime> {
        &self.runtime
    }

    pub fn dispatcher(&self) -> &FlowDispatcher {
        &self.dispatcher
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    pub fn clusters(&self) -> &ClusterService {
        &self.clusters
    }

    pub fn repair(&self) -> &ClusterRepairService {
        &self.repair
    }
}
