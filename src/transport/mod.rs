pub mod console;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::dispatch::PollSpec;
use crate::error::Result;

/// A message received from the chat network
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender_id: String,
    pub chat_id: String,
    pub body: String,
}

/// Opaque acknowledgment returned by the transport for a successful send
#[derive(Debug, Clone)]
pub struct SendAck {
    pub id: String,
}

/// Identity reported by the transport on credential success
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub display_name: String,
    pub id: u64,
}

/// Events produced by the transport. Delivery order matches the order the
/// network produced them; nothing downstream reorders.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Qr(String),
    AuthSucceeded(SessionIdentity),
    AuthFailed(String),
    Ready,
    Message(InboundMessage),
    Disconnected(String),
}

/// The chat network seam. Connection establishment, credential rendering and
/// target id formats (`<number>@c.us`, `<groupid>@g.us`) are owned by the
/// implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the connection. Lifecycle and message events arrive on the
    /// returned channel until the transport stops.
    async fn start(&self) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Send a structured poll to a target.
    async fn send_poll(&self, target: &str, poll: &PollSpec) -> Result<SendAck>;

    /// Send a plain text message to a chat.
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<()>;

    /// Release the connection. Always succeeds.
    async fn stop(&self);
}
