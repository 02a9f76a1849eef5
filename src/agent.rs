use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::bus::{Event, EventBus, EventPayload};
use crate::commands::CommandRouter;
use crate::config::Config;
use crate::dispatch::PollDispatcher;
use crate::scheduler::firetimes::CronFireTimes;
use crate::scheduler::{Scheduler, TriggerOutcome};
use crate::session::SessionManager;
use crate::transport::Transport;

/// Composition root. Wires the bus, session, dispatcher, scheduler and
/// command router together and owns the process lifecycle: the scheduler is
/// armed when the session first reaches ready, and shutdown is disarm then
/// teardown, in that order.
pub struct Agent {
    session: Arc<SessionManager>,
    scheduler: Arc<Scheduler>,
}

impl Agent {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(SessionManager::new(transport, bus.clone()));
        let scheduler = Arc::new(Scheduler::new(Arc::new(CronFireTimes)));

        let dispatcher = Arc::new(PollDispatcher::new(
            session.clone(),
            config.target.clone(),
            config.poll.question.clone(),
            config.poll.options.clone(),
            config.poll.allow_multiple,
        ));
        let router = Arc::new(CommandRouter::new(scheduler.clone(), session.clone()));

        register_handlers(&bus, &config, session.clone(), scheduler.clone(), dispatcher, router);

        Self { session, scheduler }
    }

    /// Start the session. The scheduler arms itself on the ready event.
    pub async fn start(&self) -> crate::error::Result<()> {
        self.session.initialize().await
    }

    /// Run until a termination signal, then shut down gracefully.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.start().await?;
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("termination signal received, shutting down");
        self.shutdown().await;
        Ok(())
    }

    /// Disarm first so no new fire can start, then tear the session down.
    /// Neither step interrupts an in-flight send.
    pub async fn shutdown(&self) {
        self.scheduler.disarm();
        self.session.teardown().await;
    }

    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }
}

fn register_handlers(
    bus: &EventBus,
    config: &Config,
    session: Arc<SessionManager>,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<PollDispatcher>,
    router: Arc<CommandRouter>,
) {
    // QR rendering is someone else's job; just make it visible.
    bus.register(Event::Qr, |payload| {
        Box::pin(async move {
            if let EventPayload::Qr(data) = payload {
                info!("QR credential received ({} bytes), scan to authenticate", data.len());
            }
            Ok(())
        })
    });

    bus.register(Event::Authenticated, move |_| {
        let session = session.clone();
        Box::pin(async move {
            if let Some(identity) = session.identity().await {
                info!("authenticated as {} ({})", identity.display_name, identity.id);
            }
            Ok(())
        })
    });

    bus.register(Event::AuthFailure, |payload| {
        Box::pin(async move {
            if let EventPayload::Reason(reason) = payload {
                error!("authentication failed: {} (re-authentication required)", reason);
            }
            Ok(())
        })
    });

    bus.register(Event::Disconnected, |payload| {
        Box::pin(async move {
            if let EventPayload::Reason(reason) = payload {
                warn!("disconnected: {} (sends disabled until re-initialization)", reason);
            }
            Ok(())
        })
    });

    let spec = config.schedule_spec();
    let dispatch_on_ready = config.dispatch_on_ready;
    bus.register(Event::Ready, move |_| {
        let scheduler = scheduler.clone();
        let dispatcher = dispatcher.clone();
        let spec = spec.clone();
        Box::pin(async move {
            // A reconnect re-enters ready with the scheduler still armed.
            if !scheduler.is_armed() {
                let dispatcher = dispatcher.clone();
                scheduler.arm(spec, move || {
                    let dispatcher = dispatcher.clone();
                    Box::pin(async move {
                        let ack = dispatcher.dispatch().await?;
                        info!("poll dispatched (ack {})", ack.id);
                        Ok(())
                    })
                })?;
            }
            if dispatch_on_ready {
                match scheduler.trigger_now().await {
                    Ok(TriggerOutcome::Dispatched) => info!("dispatch-on-ready poll sent"),
                    Ok(TriggerOutcome::Skipped) => {
                        warn!("dispatch-on-ready skipped - dispatch already in progress")
                    }
                    Err(e) => error!("dispatch-on-ready failed: {}", e),
                }
            }
            Ok(())
        })
    });

    bus.register(Event::Message, move |payload| {
        let router = router.clone();
        Box::pin(async move {
            if let EventPayload::Message(message) = payload {
                router.handle(&message).await;
            }
            Ok(())
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::TRIGGER_ACK;
    use crate::session::SessionState;
    use crate::transport::mock::{wait_for_state, MockTransport};
    use crate::transport::{InboundMessage, SessionIdentity, TransportEvent};
    use std::time::Duration;

    fn test_config(dispatch_on_ready: bool) -> Config {
        Config {
            target: "group@g.us".to_string(),
            schedule: Default::default(),
            poll: Default::default(),
            dispatch_on_ready,
        }
    }

    async fn up(agent: &Agent, mock: &Arc<MockTransport>) {
        agent.start().await.unwrap();
        mock.push(TransportEvent::AuthSucceeded(SessionIdentity {
            display_name: "bot".into(),
            id: 42,
        }))
        .await;
        mock.push(TransportEvent::Ready).await;
        wait_for_state(agent.session(), SessionState::Ready).await;
    }

    #[tokio::test]
    async fn ready_arms_the_scheduler() {
        let mock = MockTransport::new();
        let agent = Agent::new(test_config(false), mock.clone());

        assert!(!agent.scheduler().is_armed());
        up(&agent, &mock).await;

        // Arming happens inside the ready handler on the pump task.
        for _ in 0..50 {
            if agent.scheduler().is_armed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(agent.scheduler().is_armed());
        assert_eq!(mock.poll_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_on_ready_sends_one_poll() {
        let mock = MockTransport::new();
        let agent = Agent::new(test_config(true), mock.clone());

        up(&agent, &mock).await;
        for _ in 0..50 {
            if mock.poll_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mock.poll_count(), 1);
    }

    #[tokio::test]
    async fn inbound_trigger_flows_through_to_a_send_and_ack() {
        let mock = MockTransport::new();
        let agent = Agent::new(test_config(false), mock.clone());

        up(&agent, &mock).await;
        for _ in 0..50 {
            if agent.scheduler().is_armed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        mock.push(TransportEvent::Message(InboundMessage {
            sender_id: "20100@c.us".into(),
            chat_id: "group@g.us".into(),
            body: "!prayer".into(),
        }))
        .await;

        for _ in 0..50 {
            if mock.poll_count() == 1 && mock.text_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mock.poll_count(), 1);
        let texts = mock.texts.lock().unwrap().clone();
        assert_eq!(texts[0].1, TRIGGER_ACK);
    }

    #[tokio::test]
    async fn shutdown_disarms_then_tears_down() {
        let mock = MockTransport::new();
        let agent = Agent::new(test_config(false), mock.clone());

        up(&agent, &mock).await;
        agent.shutdown().await;

        assert!(!agent.scheduler().is_armed());
        assert_eq!(agent.session().state().await, SessionState::Uninitialized);
    }
}
