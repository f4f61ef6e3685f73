//! Flow events exchanged between the dispatcher and the flow runtime

use cloudplane_cloud::ManagedResource;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Kind of long-running operation to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSelector {
    /// Wait for the environment, then create the cluster
    Create,
    /// Repair failed host groups of a running cluster
    Repair,
    /// Tear the cluster down
    Delete,
}

impl FlowSelector {
    /// Event name used on the bus
    pub fn event(&self) -> &'static str {
        match self {
            FlowSelector::Create => "ENV_WAIT_EVENT",
            FlowSelector::Repair => "CLUSTER_REPAIR_EVENT",
            FlowSelector::Delete => "CLUSTER_DELETE_EVENT",
        }
    }
}

impl std::fmt::Display for FlowSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event())
    }
}

/// Event name of the cancellation message
pub const FLOW_CANCEL: &str = "FLOW_CANCEL";

/// Operation specific input carried by a flow event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowPayload {
    #[default]
    None,
    Repair(RepairRequest),
}

/// Host groups to repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRequest {
    pub host_groups: Vec<String>,
}

impl RepairRequest {
    pub fn for_host_group(name: impl Into<String>) -> Self {
        Self {
            host_groups: vec![name.into()],
        }
    }
}

/// Admission answer of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The flow was registered and is running
    Accepted,
    /// Another flow is already active for the resource
    Rejected,
    /// The runtime does not take part in admission control for this flow
    Unwired,
}

/// What the requester does when the runtime answers [`Acceptance::Unwired`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwiredAcceptance {
    /// Treat the flow as started. Concurrent flows are not prevented.
    Accept,
    /// Refuse the request as if another flow were running
    #[default]
    Reject,
}

/// Single-resolution acceptance signal handed to the runtime
///
/// Consuming methods guarantee the signal is resolved at most once. Dropping
/// it unresolved is observed by the dispatcher as an interrupted wait.
#[derive(Debug)]
pub struct AcceptanceSignal {
    tx: oneshot::Sender<Acceptance>,
    unwired: UnwiredAcceptance,
}

impl AcceptanceSignal {
    /// Create a signal and the receiver the dispatcher waits on
    pub fn channel(unwired: UnwiredAcceptance) -> (Self, oneshot::Receiver<Acceptance>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx, unwired }, rx)
    }

    /// Returns `false` when the requester stopped waiting; the flow must
    /// then not be started.
    pub fn accept(self) -> bool {
        self.resolve(Acceptance::Accepted)
    }

    pub fn reject(self) {
        self.resolve(Acceptance::Rejected);
    }

    /// Answer that the flow bypasses admission control
    ///
    /// Returns whether the requester is still waiting and accepts such
    /// flows; the runtime must not start the flow otherwise.
    pub fn unwired(self) -> bool {
        let accepted = self.unwired == UnwiredAcceptance::Accept;
        self.resolve(Acceptance::Unwired) && accepted
    }

    /// Whether the requester received the answer
    fn resolve(self, acceptance: Acceptance) -> bool {
        let delivered = self.tx.send(acceptance).is_ok();
        if !delivered {
            tracing::info!("Acceptance {:?} resolved after the waiter left", acceptance);
        }
        delivered
    }
}

/// Request to start a flow for one resource
#[derive(Debug)]
pub struct FlowEvent {
    pub selector: FlowSelector,
    pub resource: ManagedResource,
    pub user_id: String,
    pub payload: FlowPayload,
    pub acceptance: AcceptanceSignal,
}

impl FlowEvent {
    pub fn resource_id(&self) -> &str {
        &self.resource.id
    }
}

/// Message published on the event bus
#[derive(Debug)]
pub enum FlowMessage {
    Start(FlowEvent),
    Cancel { resource_id: String, user_id: String },
}

impl FlowMessage {
    /// Event name used for routing
    pub fn selector(&self) -> &'static str {
        match self {
            FlowMessage::Start(event) => event.selector.event(),
            FlowMessage::Cancel { .. } => FLOW_CANCEL,
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            FlowMessage::Start(event) => event.resource_id(),
            FlowMessage::Cancel { resource_id, .. } => resource_id,
        }
    }
}
