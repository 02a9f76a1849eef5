use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::{Event, EventBus, EventPayload};
use crate::dispatch::PollSpec;
use crate::error::{Error, Result};
use crate::transport::{SendAck, SessionIdentity, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Authenticating,
    Authenticated,
    Ready,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Ready => "ready",
            SessionState::Disconnected => "disconnected",
        };
        write!(f, "{}", name)
    }
}

struct Session {
    state: SessionState,
    identity: Option<SessionIdentity>,
}

/// Owns the connection state machine. State is written here and nowhere
/// else; other components observe it through `state()` / `is_ready()`.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    bus: Arc<EventBus>,
    session: Arc<Mutex<Session>>,
    pump: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, bus: Arc<EventBus>) -> Self {
        Self {
            transport,
            bus,
            session: Arc::new(Mutex::new(Session {
                state: SessionState::Uninitialized,
                identity: None,
            })),
            pump: StdMutex::new(None),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == SessionState::Ready
    }

    pub async fn identity(&self) -> Option<SessionIdentity> {
        self.session.lock().await.identity.clone()
    }

    /// Start the transport and begin authenticating. Legal only from
    /// `Uninitialized` or `Disconnected` (the caller-driven re-entry path);
    /// anywhere else this fails with `InvalidState`.
    pub async fn initialize(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        match session.state {
            SessionState::Uninitialized | SessionState::Disconnected => {}
            other => {
                return Err(Error::InvalidState {
                    operation: "initialize",
                    state: other.to_string(),
                })
            }
        }

        // The state only advances once the transport is actually up; a
        // failed start leaves the previous state intact and retryable.
        let mut events = self.transport.start().await?;
        session.state = SessionState::Authenticating;
        session.identity = None;
        drop(session);
        info!("transport started, authenticating");

        let session = Arc::clone(&self.session);
        let bus = Arc::clone(&self.bus);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = apply_event(&session, &bus, event).await {
                    warn!("lifecycle handler failed: {}", e);
                }
            }
        });

        if let Some(previous) = self.pump.lock().unwrap().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Send a structured poll. Legal only in `Ready`; never queued elsewhere.
    pub async fn send_poll(&self, target: &str, poll: &PollSpec) -> Result<SendAck> {
        self.ensure_ready().await?;
        self.transport.send_poll(target, poll).await
    }

    /// Send a plain text message (command replies). Same `Ready` gate as
    /// poll sends.
    pub async fn send_text(&self, chat_id: &str, body: &str) -> Result<()> {
        self.ensure_ready().await?;
        self.transport.send_text(chat_id, body).await
    }

    /// Release the transport and reset to `Uninitialized`. Legal from any
    /// state; always succeeds. Does not interrupt an in-flight send.
    pub async fn teardown(&self) {
        if let Some(pump) = self.pump.lock().unwrap().take() {
            pump.abort();
        }
        self.transport.stop().await;
        let mut session = self.session.lock().await;
        session.state = SessionState::Uninitialized;
        session.identity = None;
        info!("session torn down");
    }

    async fn ensure_ready(&self) -> Result<()> {
        if self.session.lock().await.state != SessionState::Ready {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }
}

/// Apply one transport event: transition first, then surface it on the bus.
/// Events are handled strictly in arrival order.
async fn apply_event(
    session: &Mutex<Session>,
    bus: &EventBus,
    event: TransportEvent,
) -> Result<()> {
    match event {
        TransportEvent::Qr(data) => bus.emit(Event::Qr, EventPayload::Qr(data)).await,
        TransportEvent::AuthSucceeded(identity) => {
            {
                let mut session = session.lock().await;
                session.state = SessionState::Authenticated;
                session.identity = Some(identity);
            }
            info!("session authenticated");
            bus.emit(Event::Authenticated, EventPayload::None).await
        }
        TransportEvent::AuthFailed(reason) => {
            // Terminal for this attempt; re-authentication is up to the caller.
            {
                let mut session = session.lock().await;
                session.state = SessionState::Uninitialized;
                session.identity = None;
            }
            warn!("authentication failed: {}", reason);
            bus.emit(Event::AuthFailure, EventPayload::Reason(reason))
                .await
        }
        TransportEvent::Ready => {
            {
                let mut session = session.lock().await;
                // Ready is only reachable through credential success.
                if session.state != SessionState::Authenticated {
                    warn!("ready event ignored while {}", session.state);
                    return Ok(());
                }
                session.state = SessionState::Ready;
            }
            info!("session ready");
            bus.emit(Event::Ready, EventPayload::None).await
        }
        TransportEvent::Message(message) => {
            bus.emit(Event::Message, EventPayload::Message(message)).await
        }
        TransportEvent::Disconnected(reason) => {
            // No auto-reconnect: sends now fail until initialize() is called again.
            session.lock().await.state = SessionState::Disconnected;
            warn!("transport disconnected: {}", reason);
            bus.emit(Event::Disconnected, EventPayload::Reason(reason))
                .await
        }
    }
}
