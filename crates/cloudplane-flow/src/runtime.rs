//! In-memory flow runtime
//!
//! Reference [`EventBus`] implementation that runs flows as tokio tasks and
//! keeps the per-resource admission registry. Admission is a check-and-set
//! under a single lock, so concurrent starts for the same resource produce
//! exactly one accepted flow.

use crate::dispatcher::EventBus;
use crate::error::{FlowError, Result};
use crate::event::{FlowEvent, FlowMessage, FlowPayload, FlowSelector};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_cloud::ManagedResource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

/// Whether a flow kind takes part in per-resource admission control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// At most one flow per resource, checked against the registry
    Exclusive,
    /// Started without consulting the registry, only if the requester
    /// accepts unwired flows
    Unchecked,
}

/// Executes the steps of one flow kind
#[async_trait]
pub trait FlowHandler: Send + Sync {
    fn admission(&self) -> Admission {
        Admission::Exclusive
    }

    /// Run the flow to completion. The future is dropped when the flow is cancelled.
    async fn run(&self, ctx: FlowContext) -> Result<()>;
}

/// Input of a running flow
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub flow_id: Uuid,
    pub selector: FlowSelector,
    pub resource: ManagedResource,
    pub user_id: String,
    pub payload: FlowPayload,
    cancelled: watch::Receiver<bool>,
}

impl FlowContext {
    /// Whether cancellation was requested for this flow
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

/// Registry view of an active flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningFlow {
    pub flow_id: Uuid,
    pub resource_id: String,
    pub selector: FlowSelector,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
}

struct RegistryEntry {
    flow: RunningFlow,
    cancel: watch::Sender<bool>,
}

type Registry = Arc<Mutex<HashMap<String, RegistryEntry>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, RegistryEntry>> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Flow runtime keeping its admission registry in process memory
#[derive(Default)]
pub struct InMemoryFlowRuntime {
    handlers: HashMap<FlowSelector, Arc<dyn FlowHandler>>,
    registry: Registry,
}

impl InMemoryFlowRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler executing flows of `selector`
    pub fn with_handler(mut self, selector: FlowSelector, handler: impl FlowHandler + 'static) -> Self {
        self.handlers.insert(selector, Arc::new(handler));
        self
    }

    /// Whether a flow is registered for the resource
    pub fn is_running(&self, resource_id: &str) -> bool {
        lock(&self.registry).contains_key(resource_id)
    }

    /// Snapshot of all registered flows
    pub fn running_flows(&self) -> Vec<RunningFlow> {
        let mut flows: Vec<RunningFlow> = lock(&self.registry)
            .values()
            .map(|entry| entry.flow.clone())
            .collect();
        flows.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        flows
    }

    fn start(&self, event: FlowEvent) -> Result<()> {
        let Some(handler) = self.handlers.get(&event.selector).cloned() else {
            event.acceptance.reject();
            return Err(FlowError::HandlerNotFound(event.selector.to_string()));
        };

        let flow_id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        match handler.admission() {
            Admission::Exclusive => {
                let mut registry = lock(&self.registry);
                if let Some(active) = registry.get(event.resource_id()) {
                    tracing::info!(
                        "Resource {} already runs {} ({}), rejecting {}",
                        event.resource_id(),
                        active.flow.selector,
                        active.flow.flow_id,
                        event.selector
                    );
                    drop(registry);
                    event.acceptance.reject();
                    return Ok(());
                }
                registry.insert(
                    event.resource.id.clone(),
                    RegistryEntry {
                        flow: RunningFlow {
                            flow_id,
                            resource_id: event.resource.id.clone(),
                            selector: event.selector,
                            user_id: event.user_id.clone(),
                            started_at: Utc::now(),
                        },
                        cancel: cancel_tx,
                    },
                );
                drop(registry);

                let FlowEvent {
                    selector,
                    resource,
                    user_id,
                    payload,
                    acceptance,
                } = event;
                if !acceptance.accept() {
                    tracing::info!(
                        "Requester of {} for resource {} left before admission, not started",
                        selector,
                        resource.id
                    );
                    let mut registry = lock(&self.registry);
                    if registry
                        .get(&resource.id)
                        .is_some_and(|entry| entry.flow.flow_id == flow_id)
                    {
                        registry.remove(&resource.id);
                    }
                    return Ok(());
                }

                let ctx = FlowContext {
                    flow_id,
                    selector,
                    resource,
                    user_id,
                    payload,
                    cancelled: cancel_rx,
                };
                self.spawn(handler, ctx, None);
            }
            Admission::Unchecked => {
                let FlowEvent {
                    selector,
                    resource,
                    user_id,
                    payload,
                    acceptance,
                } = event;
                if !acceptance.unwired() {
                    tracing::info!(
                        "{} for resource {} bypasses admission control and the requester refuses it, not started",
                        selector,
                        resource.id
                    );
                    return Ok(());
                }

                let ctx = FlowContext {
                    flow_id,
                    selector,
                    resource,
                    user_id,
                    payload,
                    cancelled: cancel_rx,
                };
                // Unregistered flows keep their own sender so they are never cancelled.
                self.spawn(handler, ctx, Some(cancel_tx));
            }
        }
        Ok(())
    }

    fn spawn(
        &self,
        handler: Arc<dyn FlowHandler>,
        ctx: FlowContext,
        keep_alive: Option<watch::Sender<bool>>,
    ) {
        let registry = self.registry.clone();
        let flow_id = ctx.flow_id;
        let resource_id = ctx.resource.id.clone();
        let mut cancelled = ctx.cancelled.clone();
        let span = tracing::info_span!(
            "flow",
            %flow_id,
            selector = %ctx.selector,
            resource = %resource_id
        );

        tokio::spawn(
            async move {
                let _keep_alive = keep_alive;
                let outcome = tokio::select! {
                    result = handler.run(ctx) => result,
                    _ = async {
                        if cancelled.wait_for(|c| *c).await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    } => Err(FlowError::Cancelled(resource_id.clone())),
                };

                match &outcome {
                    Ok(()) => tracing::info!("Flow finished"),
                    Err(FlowError::Cancelled(_)) => tracing::info!("Flow cancelled"),
                    Err(e) => tracing::warn!("Flow failed: {}", e),
                }

                let mut registry = lock(&registry);
                if registry
                    .get(&resource_id)
                    .is_some_and(|entry| entry.flow.flow_id == flow_id)
                {
                    registry.remove(&resource_id);
                }
            }
            .instrument(span),
        );
    }

    fn cancel(&self, resource_id: &str, user_id: &str) {
        match lock(&self.registry).get(resource_id) {
            Some(entry) => {
                tracing::info!(
                    "Cancelling {} ({}) for resource {} on behalf of {}",
                    entry.flow.selector,
                    entry.flow.flow_id,
                    resource_id,
                    user_id
                );
                entry.cancel.send_replace(true);
            }
            None => {
                tracing::debug!("No running flow for resource {}, nothing to cancel", resource_id);
            }
        }
    }
}

#[async_trait]
impl EventBus for InMemoryFlowRuntime {
    async fn publish(&self, message: FlowMessage) -> Result<()> {
        tracing::debug!(
            "Received {} for resource {}",
            message.selector(),
            message.resource_id()
        );
        match message {
            FlowMessage::Start(event) => self.start(event),
            FlowMessage::Cancel {
                resource_id,
                user_id,
            } => {
                self.cancel(&resource_id, &user_id);
                Ok(())
            }
        }
    }
}
