//! Generic publish/subscribe event dispatcher for the Pulse pipeline.
//!
//! Stages register as handlers for one [`EventKind`] and publish downstream
//! envelopes themselves, so independently-built stages communicate without
//! direct coupling. Dispatch is sequential and fully awaited: handlers for
//! one `publish` call run in subscription order, each finishing before the
//! next starts. Downstream stages rely on this ordering.
//!
//! A handler failure is isolated: the bus logs it with full context and
//! continues with the remaining handlers. It never reaches the publisher.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use pulse_types::{EventEnvelope, EventKind};
use thiserror::Error;

/// Error returned by a handler to signal that it could not process an event.
///
/// Carries a rendered message and an optional source for chain logging.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    /// Builds a handler error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a handler error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// A subscriber on the bus.
///
/// Implementations must be cheap to share (`Arc`) and safe to invoke from
/// any task. The `id` identifies the stage in dispatch logs.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable stage identifier used in logs and `processing_failed` events.
    fn id(&self) -> &str;

    /// Processes one published envelope.
    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError>;
}

/// Publish/subscribe dispatcher keyed by [`EventKind`].
///
/// The subscription table is guarded by a `std::sync::Mutex` intentionally:
/// all lock acquisitions are brief Vec operations that never span `.await`
/// points. `publish` snapshots the handler list under the lock and releases
/// it before dispatching, so a handler may subscribe or unsubscribe (itself
/// included) mid-dispatch without corrupting the in-flight publish.
pub struct EventBus {
    subscriptions: Mutex<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `handler` for `kind`.
    ///
    /// Handlers are appended in call order and invoked in that order. The
    /// list is not deduplicated: subscribing the same handler twice means it
    /// is invoked twice per publish.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut table = self.subscriptions.lock().expect("subscription table poisoned");
        tracing::debug!(event = %kind, stage = handler.id(), "subscribing handler");
        table.entry(kind).or_default().push(handler);
    }

    /// Removes the first registration of `handler` for `kind`.
    ///
    /// Identity is `Arc::ptr_eq` on the handler. Logs a warning when the
    /// handler was not subscribed. Once the last handler for a kind is
    /// removed, the kind's entry is dropped entirely.
    pub fn unsubscribe(&self, kind: EventKind, handler: &Arc<dyn EventHandler>) {
        let mut table = self.subscriptions.lock().expect("subscription table poisoned");
        let Some(handlers) = table.get_mut(&kind) else {
            tracing::warn!(
                event = %kind,
                stage = handler.id(),
                "unsubscribe: no handlers registered for this event"
            );
            return;
        };
        match handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(index) => {
                handlers.remove(index);
                tracing::debug!(event = %kind, stage = handler.id(), "unsubscribed handler");
                if handlers.is_empty() {
                    table.remove(&kind);
                }
            }
            None => {
                tracing::warn!(
                    event = %kind,
                    stage = handler.id(),
                    "unsubscribe: handler not found for this event"
                );
            }
        }
    }

    /// Returns the number of handlers currently registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let table = self.subscriptions.lock().expect("subscription table poisoned");
        table.get(&kind).map_or(0, Vec::len)
    }

    /// Delivers `event` to every handler subscribed to its kind.
    ///
    /// Handlers run sequentially in subscription order, each fully awaited
    /// before the next starts. A handler error is logged with the stage id,
    /// event kind, correlation id, and error chain, then dispatch proceeds
    /// with the next handler; errors never propagate to the publisher.
    /// Publishing with zero subscribers is a no-op logged at debug level.
    pub async fn publish(&self, event: EventEnvelope) {
        let snapshot: Vec<Arc<dyn EventHandler>> = {
            let table = self.subscriptions.lock().expect("subscription table poisoned");
            match table.get(&event.kind) {
                Some(handlers) => handlers.clone(),
                None => Vec::new(),
            }
        };

        if snapshot.is_empty() {
            tracing::debug!(
                event = %event.kind,
                correlation_id = %event.correlation_id,
                "publish with no subscribers"
            );
            return;
        }

        for handler in snapshot {
            if let Err(error) = handler.handle(&event).await {
                tracing::error!(
                    stage = handler.id(),
                    event = %event.kind,
                    correlation_id = %event.correlation_id,
                    error = %render_chain(&error),
                    "handler failed; continuing dispatch"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders an error with its full source chain, outermost first.
fn render_chain(error: &(dyn std::error::Error)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
