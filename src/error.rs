use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the agent core. Callers branch on the variant, never
/// on the message text: `InvalidState` and `Validation` mean the caller must
/// fix its call order or input, `Send` is a transport failure for this cycle.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted from a state that forbids it.
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Send attempted while the session is not ready. Never queued.
    #[error("session is not ready")]
    NotInitialized,

    /// Malformed poll input.
    #[error("{0}")]
    Validation(String),

    /// Transport failed to start. Initialization may be retried.
    #[error("transport start failed: {0}")]
    Connect(String),

    /// Transport-level failure during a send. Not retried automatically.
    #[error("send failed: {0}")]
    Send(String),

    /// Malformed cron pattern or unknown timezone.
    #[error("invalid schedule: {0}")]
    Schedule(String),
}
