//! Cloudplane flow orchestration primitives
//!
//! - [`FlowDispatcher`]: publishes long-running operations and waits, with a
//!   bound, for the runtime to admit them. At most one flow is admitted per
//!   managed resource.
//! - [`poll_until`]: fixed-interval reconciliation loop used by flow steps to
//!   wait for eventually consistent provider state.
//! - [`InMemoryFlowRuntime`]: in-process runtime owning the admission registry.
//!
//! # Example
//!
//! ```ignore
//! use cloudplane_flow::{DispatcherConfig, FlowDispatcher, FlowSelector, InMemoryFlowRuntime};
//! use std::sync::Arc;
//!
//! let runtime = Arc::new(InMemoryFlowRuntime::new().with_handler(FlowSelector::Repair, RepairFlow));
//! let dispatcher = FlowDispatcher::new(runtime, DispatcherConfig::default());
//!
//! dispatcher.trigger(FlowSelector::Repair, &cluster, user_crn).await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod poller;
pub mod runtime;

pub use dispatcher::{DispatcherConfig, EventBus, FlowDispatcher, WAIT_FOR_ACCEPT};
pub use error::{FlowError, PollError, Result};
pub use event::{
    Acceptance, AcceptanceSignal, FLOW_CANCEL, FlowEvent, FlowMessage, FlowPayload, FlowSelector,
    RepairRequest, UnwiredAcceptance,
};
pub use poller::{AttemptOutcome, PollingConfig, poll_until};
pub use runtime::{Admission, FlowContext, FlowHandler, InMemoryFlowRuntime, RunningFlow};
