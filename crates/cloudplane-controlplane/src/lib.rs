//! Cloudplane Control Plane
//!
//! 認証情報の検証とクラスタ操作 (作成・修復・削除) を提供するサービス層。
//! 依存するコンポーネントはすべて [`ControlPlaneContext`] が保持する。

pub mod cluster;
pub mod context;
pub mod credential;
pub mod error;
pub mod provisioner;
pub mod repair;
pub mod telemetry;
pub mod verifier;

pub use context::{ContextBuilder, ControlPlaneContext};
pub use credential::CredentialService;
pub use error::{ControlPlaneError, Result};
pub use cluster::{ClusterService, CreateFlow, DeleteFlow, creation_outcome, deletion_outcome};
pub use provisioner::{ProvisionerError, StackProvisioner, StackStatus, StackView};
pub use repair::{ClusterRepairService, RepairFlow, repair_outcome, request_repair};
pub use telemetry::init_tracing;
pub use verifier::{CredentialVerifiers, MockCredentialConnector};
