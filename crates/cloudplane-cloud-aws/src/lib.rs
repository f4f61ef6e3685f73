//! Cloudplane AWS Provider
//!
//! Verifies that an AWS credential is usable before any operation runs on it:
//! the configuration names exactly one authentication method, the credential
//! connects, and IAM policy simulation grants every required action.
//!
//! Provider calls go through [`AwsIdentityService`]. The SDK backed
//! implementation is available with the `sdk` feature.

pub mod client;
pub mod connector;
pub mod error;
pub mod policy;
#[cfg(feature = "sdk")]
pub mod sdk;
pub mod verifier;
pub mod view;

pub use client::{AwsIdentityService, EvaluationResult, PolicySimulationRequest, SessionCredentials};
pub use connector::{AwsConnectorSettings, AwsCredentialConnector};
pub use error::{AwsError, Result};
pub use policy::{DEFAULT_CREDENTIAL_POLICY_JSON, RequiredActionSet, default_policy_base64};
#[cfg(feature = "sdk")]
pub use sdk::SdkAwsClient;
pub use verifier::{AwsCredentialVerifier, PermissionCheck};
pub use view::{AwsAuthMethod, AwsCredentialView};
