use std::sync::Arc;

use tracing::{error, info, warn};

use crate::scheduler::{Scheduler, TriggerOutcome};
use crate::session::SessionManager;
use crate::transport::InboundMessage;

/// Literal aliases per command, matched case-insensitively after trimming.
const TRIGGER_ALIASES: [&str; 2] = ["!prayer", "!صلاة"];
const HELP_ALIASES: [&str; 2] = ["!help", "!مساعدة"];

/// Status broadcasts never get a reply, whatever their body says.
const BROADCAST_SENDER: &str = "status@broadcast";

pub const TRIGGER_ACK: &str = "On it - sending the prayer poll now.";
pub const SKIPPED_NOTICE: &str =
    "A poll dispatch is already in progress; this request was skipped.";
pub const FAILED_NOTICE: &str = "Could not send the poll right now.";
pub const HELP_TEXT: &str = "Commands:\n\
    !prayer / !صلاة - send the prayer poll now\n\
    !help / !مساعدة - show this message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    TriggerPoll,
    Help,
}

fn classify(body: &str) -> Option<Command> {
    let body = body.trim();
    if TRIGGER_ALIASES.iter().any(|a| body.eq_ignore_ascii_case(a)) {
        return Some(Command::TriggerPoll);
    }
    if HELP_ALIASES.iter().any(|a| body.eq_ignore_ascii_case(a)) {
        return Some(Command::Help);
    }
    None
}

/// Matches inbound messages against the command table and invokes the manual
/// trigger or the help responder. Unmatched text is not an error; it is
/// simply not for us.
pub struct CommandRouter {
    scheduler: Arc<Scheduler>,
    session: Arc<SessionManager>,
}

impl CommandRouter {
    pub fn new(scheduler: Arc<Scheduler>, session: Arc<SessionManager>) -> Self {
        Self { scheduler, session }
    }

    /// Handle one inbound message. Never fails: dispatch errors are logged
    /// and reported back to the chat as a failed cycle.
    pub async fn handle(&self, message: &InboundMessage) {
        if message.sender_id == BROADCAST_SENDER {
            return;
        }
        let Some(command) = classify(&message.body) else {
            return;
        };

        match command {
            Command::Help => self.reply(&message.chat_id, HELP_TEXT).await,
            Command::TriggerPoll => {
                info!("manual poll trigger from {}", message.sender_id);
                match self.scheduler.trigger_now().await {
                    Ok(TriggerOutcome::Dispatched) => {
                        self.reply(&message.chat_id, TRIGGER_ACK).await;
                    }
                    Ok(TriggerOutcome::Skipped) => {
                        warn!("manual trigger skipped - dispatch already in progress");
                        self.reply(&message.chat_id, SKIPPED_NOTICE).await;
                    }
                    Err(e) => {
                        error!("manual dispatch failed: {}", e);
                        self.reply(&message.chat_id, FAILED_NOTICE).await;
                    }
                }
            }
        }
    }

    async fn reply(&self, chat_id: &str, body: &str) {
        if let Err(e) = self.session.send_text(chat_id, body).await {
            warn!("could not reply in {}: {}", chat_id, e);
        }
    }
}
