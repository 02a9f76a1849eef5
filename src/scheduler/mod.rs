pub mod firetimes;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::scheduler::firetimes::{FireTimes, ScheduleSpec};

/// The recurring action. Its result is reported by whichever side invoked
/// it: the timer loop logs, the command router replies to the chat.
pub type Action = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// What happened to one trigger attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The action ran to completion (successfully).
    Dispatched,
    /// Another dispatch already held the lock; this attempt was dropped,
    /// not queued.
    Skipped,
}

/// Fires the recurring action at cron-determined times and exposes a manual
/// trigger. Both paths funnel through one dispatch lock so at most one
/// invocation of the action is ever in flight.
pub struct Scheduler {
    firetimes: Arc<dyn FireTimes>,
    dispatch_lock: Arc<Mutex<()>>,
    timer: StdMutex<Option<JoinHandle<()>>>,
    action: StdMutex<Option<Action>>,
}

impl Scheduler {
    pub fn new(firetimes: Arc<dyn FireTimes>) -> Self {
        Self {
            firetimes,
            dispatch_lock: Arc::new(Mutex::new(())),
            timer: StdMutex::new(None),
            action: StdMutex::new(None),
        }
    }

    pub fn is_armed(&self) -> bool {
        // A timer task that died on a schedule evaluation error no longer
        // counts as armed.
        self.timer
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Begin firing `action` at the times `spec` describes. Only one schedule
    /// may be armed at a time; re-arming while armed fails with
    /// `InvalidState`. The pattern and timezone are validated here, up front.
    pub fn arm<F>(&self, spec: ScheduleSpec, action: F) -> Result<()>
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let mut timer = self.timer.lock().unwrap();
        if timer.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(Error::InvalidState {
                operation: "arm",
                state: "already armed".to_string(),
            });
        }

        // Surface a bad pattern or timezone now rather than inside the loop.
        self.firetimes.next_fire_after(&spec, Utc::now())?;

        let action: Action = Arc::new(action);
        *self.action.lock().unwrap() = Some(Arc::clone(&action));

        info!(
            "scheduler armed: '{}' in {}",
            spec.pattern, spec.timezone
        );

        let firetimes = Arc::clone(&self.firetimes);
        let lock = Arc::clone(&self.dispatch_lock);
        let handle = tokio::spawn(async move {
            loop {
                // Always computed from "now": occurrences missed while the
                // process was not running are skipped, never backfilled.
                let next = match firetimes.next_fire_after(&spec, Utc::now()) {
                    Ok(next) => next,
                    Err(e) => {
                        error!("schedule evaluation failed, timer stopped: {}", e);
                        return;
                    }
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                info!("next scheduled dispatch at {}", next);
                tokio::time::sleep(wait).await;

                match run_guarded(&lock, &action).await {
                    Ok(TriggerOutcome::Dispatched) => info!("scheduled dispatch completed"),
                    Ok(TriggerOutcome::Skipped) => {
                        warn!("scheduled dispatch skipped - dispatch already in progress")
                    }
                    Err(e) => error!("scheduled dispatch failed: {}", e),
                }
            }
        });
        *timer = Some(handle);
        Ok(())
    }

    /// Stop future timer fires. Idempotent; safe whether armed or not. Does
    /// not interrupt an in-flight dispatch, and the last armed action stays
    /// available to `trigger_now`.
    pub fn disarm(&self) {
        if let Some(timer) = self.timer.lock().unwrap().take() {
            timer.abort();
            info!("scheduler disarmed");
        }
    }

    /// Run the armed action immediately, under the same lock a timer fire
    /// takes. A second caller while a dispatch is in flight gets `Skipped`.
    pub async fn trigger_now(&self) -> Result<TriggerOutcome> {
        let action = self.action.lock().unwrap().clone();
        let Some(action) = action else {
            return Err(Error::InvalidState {
                operation: "trigger_now",
                state: "never armed".to_string(),
            });
        };
        run_guarded(&self.dispatch_lock, &action).await
    }
}

/// At-most-one in-flight dispatch: take the lock or report `Skipped`. The
/// guard drops after the action settles, so release happens on every exit
/// path, success or failure.
async fn run_guarded(lock: &Mutex<()>, action: &Action) -> Result<TriggerOutcome> {
    let Ok(_guard) = lock.try_lock() else {
        return Ok(TriggerOutcome::Skipped);
    };
    action().await?;
    Ok(TriggerOutcome::Dispatched)
}
