use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::session::SessionManager;
use crate::transport::SendAck;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 12;

/// One structured poll, built per dispatch and discarded after the send.
/// Option order is preserved; uniqueness is not required. Wire shape:
/// `{ "question", "options", "allowMultipleAnswers" }`.
#[derive(Debug, Clone, Serialize)]
pub struct PollSpec {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "allowMultipleAnswers")]
    pub allow_multiple: bool,
}

/// Validates and sends the recurring poll. Does not log; it returns typed
/// failures and the invoking side (scheduler or command router) reports them.
pub struct PollDispatcher {
    session: Arc<SessionManager>,
    target: String,
    question: String,
    options: Vec<String>,
    allow_multiple: bool,
}

impl PollDispatcher {
    pub fn new(
        session: Arc<SessionManager>,
        target: String,
        question: String,
        options: Vec<String>,
        allow_multiple: bool,
    ) -> Self {
        Self {
            session,
            target,
            question,
            options,
            allow_multiple,
        }
    }

    /// Validate and send one poll. Validation order: option count, then
    /// target, then session readiness, so a bad option count never reaches
    /// the transport.
    pub async fn dispatch(&self) -> Result<SendAck> {
        if self.options.len() < MIN_OPTIONS || self.options.len() > MAX_OPTIONS {
            return Err(Error::Validation("poll option count out of range".into()));
        }
        if self.target.trim().is_empty() {
            return Err(Error::Validation("missing target".into()));
        }

        let poll = PollSpec {
            question: self.question.clone(),
            options: self.options.clone(),
            allow_multiple: self.allow_multiple,
        };
        self.session.send_poll(&self.target, &poll).await
    }
}
