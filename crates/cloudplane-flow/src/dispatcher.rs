//! Admission-controlled flow dispatch
//!
//! The dispatcher publishes a flow event and waits, for a bounded time, for
//! the runtime to admit or reject it. Whether a resource already has an active
//! flow is decided by the runtime; the dispatcher only turns the answer (or
//! the lack of one) into a caller-visible result.

use crate::error::{FlowError, Result};
use crate::event::{
    Acceptance, AcceptanceSignal, FlowEvent, FlowMessage, FlowPayload, FlowSelector,
    UnwiredAcceptance,
};
use async_trait::async_trait;
use cloudplane_cloud::ManagedResource;
use std::sync::Arc;
use std::time::Duration;

/// Default time a caller waits for the runtime to accept a flow
pub const WAIT_FOR_ACCEPT: Duration = Duration::from_secs(10);

/// Event publication primitive of the flow runtime
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver a message to the handler registered for its selector
    async fn publish(&self, message: FlowMessage) -> Result<()>;
}

/// Dispatcher settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub acceptance_timeout: Duration,
    pub unwired_acceptance: UnwiredAcceptance,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            acceptance_timeout: WAIT_FOR_ACCEPT,
            unwired_acceptance: UnwiredAcceptance::default(),
        }
    }
}

/// Publishes flows and waits for their admission
#[derive(Clone)]
pub struct FlowDispatcher {
    bus: Arc<dyn EventBus>,
    config: DispatcherConfig,
}

impl FlowDispatcher {
    pub fn new(bus: Arc<dyn EventBus>, config: DispatcherConfig) -> Self {
        Self { bus, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Start a flow for `resource` and wait until the runtime admits it
    ///
    /// # Returns
    /// * `Ok(())` - the flow was admitted and runs asynchronously
    /// * `Err(FlowError::AdmissionRejected)` - another flow is active for the resource
    /// * `Err(FlowError::AcceptanceTimeout)` - no answer within the acceptance timeout
    /// * `Err(FlowError::DispatchFailed)` - publishing failed or the wait was interrupted
    pub async fn trigger(
        &self,
        selector: FlowSelector,
        resource: &ManagedResource,
        user_id: &str,
    ) -> Result<()> {
        self.trigger_with_payload(selector, resource, user_id, FlowPayload::None)
            .await
    }

    /// Same as [`FlowDispatcher::trigger`] with an operation specific payload
    pub async fn trigger_with_payload(
        &self,
        selector: FlowSelector,
        resource: &ManagedResource,
        user_id: &str,
        payload: FlowPayload,
    ) -> Result<()> {
        let (acceptance, accepted) = AcceptanceSignal::channel(self.config.unwired_acceptance);
        let event = FlowEvent {
            selector,
            resource: resource.clone(),
            user_id: user_id.to_string(),
            payload,
            acceptance,
        };

        tracing::debug!("Publishing {} for resource {}", selector, resource.id);
        // The deadline covers publication too; a stalled bus must not block the caller.
        let admission = async {
            self.bus.publish(FlowMessage::Start(event)).await?;
            accepted.await.map_err(|_| {
                FlowError::DispatchFailed(format!(
                    "acceptance wait for resource {} was interrupted",
                    resource.id
                ))
            })
        };

        let answer = match tokio::time::timeout(self.config.acceptance_timeout, admission).await {
            Ok(answer) => answer?,
            Err(_) => {
                tracing::warn!(
                    "{} for resource {} not accepted within {:?}",
                    selector,
                    resource.id,
                    self.config.acceptance_timeout
                );
                return Err(FlowError::AcceptanceTimeout {
                    resource_id: resource.id.clone(),
                    timeout: self.config.acceptance_timeout,
                });
            }
        };

        match (answer, self.config.unwired_acceptance) {
            (Acceptance::Accepted, _) => {
                tracing::info!("{} accepted for resource {}", selector, resource.name);
                Ok(())
            }
            (Acceptance::Unwired, UnwiredAcceptance::Accept) => {
                tracing::warn!(
                    "{} for resource {} bypasses admission control, accepting without exclusivity",
                    selector,
                    resource.id
                );
                Ok(())
            }
            (Acceptance::Rejected, _) | (Acceptance::Unwired, UnwiredAcceptance::Reject) => {
                tracing::info!(
                    "{} rejected for resource {}: flows under operation",
                    selector,
                    resource.id
                );
                Err(FlowError::AdmissionRejected {
                    resource_id: resource.id.clone(),
                })
            }
        }
    }

    /// Ask the runtime to cancel whatever flow runs for `resource`
    ///
    /// Fire-and-forget: does not wait for the flow to stop and is a no-op
    /// when nothing runs.
    pub async fn cancel(&self, resource: &ManagedResource, user_id: &str) {
        let message = FlowMessage::Cancel {
            resource_id: resource.id.clone(),
            user_id: user_id.to_string(),
        };
        if let Err(e) = self.bus.publish(message).await {
            tracing::warn!("Failed to publish cancel for resource {}: {}", resource.id, e);
        }
    }
}
