//! Cloud credential and credential status types

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Supported cloud platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudPlatform {
    /// Amazon Web Services
    Aws,
    /// In-process mock platform for test environments
    Mock,
}

impl std::fmt::Display for CloudPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudPlatform::Aws => write!(f, "AWS"),
            CloudPlatform::Mock => write!(f, "MOCK"),
        }
    }
}

impl FromStr for CloudPlatform {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AWS" => Ok(CloudPlatform::Aws),
            "MOCK" => Ok(CloudPlatform::Mock),
            other => Err(CloudError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// A cloud credential as handed over by the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudCredential {
    /// Account-scoped credential identifier
    pub crn: String,

    /// Human readable name
    pub name: String,

    /// Platform the credential belongs to
    pub platform: CloudPlatform,

    /// Platform specific parameters (role arn, keys, ...)
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl CloudCredential {
    pub fn new(crn: impl Into<String>, name: impl Into<String>, platform: CloudPlatform) -> Self {
        Self {
            crn: crn.into(),
            name: name.into(),
            platform,
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Get a parameter value as a specific type
    pub fn get_parameter<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.parameters
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a string parameter, treating blank values as absent
    pub fn non_empty_parameter(&self, key: &str) -> Option<String> {
        self.get_parameter::<String>(key)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Lifecycle state of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialState {
    Created,
    Verified,
    Failed,
    PermissionsMissing,
    Deleted,
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialState::Created => write!(f, "CREATED"),
            CredentialState::Verified => write!(f, "VERIFIED"),
            CredentialState::Failed => write!(f, "FAILED"),
            CredentialState::PermissionsMissing => write!(f, "PERMISSIONS_MISSING"),
            CredentialState::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Non-empty list of denied `action:resource` pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingPermissions(Vec<String>);

impl MissingPermissions {
    /// Returns `None` when nothing was denied.
    pub fn new(denied: Vec<String>) -> Option<Self> {
        if denied.is_empty() {
            None
        } else {
            Some(Self(denied))
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for MissingPermissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Result of a credential lifecycle operation
///
/// Expected, user-correctable outcomes (bad configuration, rejected keys,
/// missing permissions) are carried here rather than as errors so callers can
/// render them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialStatus {
    /// CRN of the credential this status refers to
    pub credential_crn: String,

    pub state: CredentialState,

    /// Human readable explanation for non-successful states
    pub reason: Option<String>,

    /// Text of the underlying provider failure, if any
    pub cause: Option<String>,

    /// Denied `action:resource` pairs, populated only for `PermissionsMissing`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_permissions: Vec<String>,
}

impl CredentialStatus {
    fn with_state(credential: &CloudCredential, state: CredentialState) -> Self {
        Self {
            credential_crn: credential.crn.clone(),
            state,
            reason: None,
            cause: None,
            missing_permissions: Vec::new(),
        }
    }

    pub fn created(credential: &CloudCredential) -> Self {
        Self::with_state(credential, CredentialState::Created)
    }

    pub fn deleted(credential: &CloudCredential) -> Self {
        Self::with_state(credential, CredentialState::Deleted)
    }

    pub fn verified(credential: &CloudCredential) -> Self {
        Self::with_state(credential, CredentialState::Verified)
    }

    pub fn failed(
        credential: &CloudCredential,
        reason: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self {
            reason: Some(reason.into()),
            cause,
            ..Self::with_state(credential, CredentialState::Failed)
        }
    }

    pub fn permissions_missing(credential: &CloudCredential, missing: MissingPermissions) -> Self {
        Self {
            reason: Some(format!(
                "You don't have permission for these actions which are required: {}",
                missing
            )),
            missing_permissions: missing.0,
            ..Self::with_state(credential, CredentialState::PermissionsMissing)
        }
    }

    pub fn is_verified(&self) -> bool {
        self.state == CredentialState::Verified
    }
}
