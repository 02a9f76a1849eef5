use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::dispatch::PollSpec;
use crate::error::{Error, Result};
use crate::transport::{InboundMessage, SendAck, SessionIdentity, Transport, TransportEvent};

/// Local stand-in for the real chat network: reports authentication and
/// readiness immediately, turns stdin lines into inbound messages addressed
/// to the configured chat, and logs outbound traffic instead of sending it.
pub struct ConsoleTransport {
    chat_id: String,
    ack_seq: AtomicU64,
}

impl ConsoleTransport {
    pub fn new(chat_id: String) -> Self {
        Self {
            chat_id,
            ack_seq: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn start(&self) -> Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(32);
        let chat_id = self.chat_id.clone();

        tokio::spawn(async move {
            let _ = tx
                .send(TransportEvent::AuthSucceeded(SessionIdentity {
                    display_name: "console".to_string(),
                    id: 0,
                }))
                .await;
            let _ = tx.send(TransportEvent::Ready).await;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let message = InboundMessage {
                    sender_id: "console@c.us".to_string(),
                    chat_id: chat_id.clone(),
                    body: line,
                };
                if tx.send(TransportEvent::Message(message)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(TransportEvent::Disconnected("stdin closed".to_string()))
                .await;
        });

        Ok(rx)
    }

    async fn send_poll(&self, target: &str, poll: &PollSpec) -> Result<SendAck> {
        let payload = serde_json::to_string(poll).map_err(|e| Error::Send(e.to_string()))?;
        info!("[console] poll -> {}: {}", target, payload);
        let seq = self.ack_seq.fetch_add(1, Ordering::Relaxed);
        Ok(SendAck {
            id: format!("console-{}", seq),
        })
    }

    async fn send_text(&self, chat_id: &str, body: &str) -> Result<()> {
        info!("[console] text -> {}: {}", chat_id, body);
        Ok(())
    }

    async fn stop(&self) {}
}
