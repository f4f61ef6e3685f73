//! Cloudplane Cloud Abstraction
//!
//! This crate holds the provider-agnostic vocabulary shared by the
//! orchestration core: cloud credentials and their verification status,
//! managed resource snapshots, and the [`CredentialConnector`] trait every
//! cloud platform implements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             cloudplane-controlplane              │
//! │      (context, credential & repair services)     │
//! └───────┬─────────────────────────┬───────────────┘
//!         │                         │
//! ┌───────▼───────────────┐ ┌───────▼───────────────┐
//! │   cloudplane-cloud    │ │    cloudplane-flow    │
//! │ trait CredentialConn… │ │ dispatcher & poller   │
//! └───────┬───────────────┘ └───────────────────────┘
//!         │
//! ┌───────▼───────────────┐
//! │ cloudplane-cloud-aws  │
//! │  credential verifier  │
//! └───────────────────────┘
//! ```

pub mod connector;
pub mod credential;
pub mod error;
pub mod resource;

// Re-exports
pub use connector::{CredentialConnector, CredentialPrerequisites};
pub use credential::{
    CloudCredential, CloudPlatform, CredentialState, CredentialStatus, MissingPermissions,
};
pub use error::{CloudError, Result};
pub use resource::{ManagedResource, ResourceStatus};
