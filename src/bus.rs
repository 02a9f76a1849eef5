use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::error::Result;
use crate::transport::InboundMessage;

/// Lifecycle and traffic events surfaced by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Qr,
    Authenticated,
    AuthFailure,
    Ready,
    Message,
    Disconnected,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    None,
    Qr(String),
    Reason(String),
    Message(InboundMessage),
}

type Handler = Arc<dyn Fn(EventPayload) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Single-slot callback registry: one handler per event, last registration
/// wins. Multicast is not supported; the agent is the only consumer.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<Event, Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the handler for `event`, replacing any previous one.
    pub fn register<F>(&self, event: Event, handler: F)
    where
        F: Fn(EventPayload) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.handlers.lock().unwrap().insert(event, Arc::new(handler));
    }

    /// Invoke the registered handler if present, otherwise a no-op.
    /// Handler errors propagate to the caller; the bus never suppresses them.
    pub async fn emit(&self, event: Event, payload: EventPayload) -> Result<()> {
        let handler = self.handlers.lock().unwrap().get(&event).cloned();
        match handler {
            Some(handler) => handler(payload).await,
            None => Ok(()),
        }
    }
}
