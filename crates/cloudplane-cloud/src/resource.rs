//! Managed resource snapshot
//!
//! The resource store owns managed resources; the orchestration core only
//! ever sees the immutable snapshot defined here.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Created,
    CreateInProgress,
    Running,
    RepairInProgress,
    DeleteInProgress,
    Failed,
    Deleted,
}

impl ResourceStatus {
    /// Whether a long-running operation is expected to be active
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ResourceStatus::CreateInProgress
                | ResourceStatus::RepairInProgress
                | ResourceStatus::DeleteInProgress
        )
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Created => write!(f, "CREATED"),
            ResourceStatus::CreateInProgress => write!(f, "CREATE_IN_PROGRESS"),
            ResourceStatus::Running => write!(f, "RUNNING"),
            ResourceStatus::RepairInProgress => write!(f, "REPAIR_IN_PROGRESS"),
            ResourceStatus::DeleteInProgress => write!(f, "DELETE_IN_PROGRESS"),
            ResourceStatus::Failed => write!(f, "FAILED"),
            ResourceStatus::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Immutable id/name snapshot of a managed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedResource {
    /// Opaque resource identifier
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Status at the time the snapshot was taken
    pub status: ResourceStatus,
}

impl ManagedResource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
        }
    }

    /// Snapshot with a new status; the original is left untouched.
    pub fn with_status(&self, status: ResourceStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_status_keeps_identity() {
        let cluster = ManagedResource::new("42", "dl-prod", ResourceStatus::Running);
        let repairing = cluster.with_status(ResourceStatus::RepairInProgress);

        assert_eq!(repairing.id, "42");
        assert_eq!(repairing.name, "dl-prod");
        assert!(repairing.status.is_in_progress());
        assert_eq!(cluster.status, ResourceStatus::Running);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ResourceStatus::RepairInProgress.to_string(), "REPAIR_IN_PROGRESS");
        assert_eq!(ResourceStatus::Deleted.to_string(), "DELETED");
    }
}
