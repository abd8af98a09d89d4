use std::io;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Exit has been requested")]
    ExitRequested,

    #[error("Session worker has stopped")]
    WorkerStopped,

    #[error("Session worker was already started")]
    AlreadyStarted,

    #[error("Failed to spawn session worker: {0}")]
    Spawn(#[from] io::Error),

    #[error("Session worker panicked")]
    WorkerPanicked,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Command ended without completion")]
    Discarded,

    /// The device refused the request. `retryable` marks timeouts and transport errors.
    #[error("Command failed: {reason}")]
    Failed { reason: String, retryable: bool },

    #[error("Unexpected completion type")]
    UnexpectedCompletion,

    #[error("Failed to join enqueue task: {0}")]
    Join(#[from] tokio::task::JoinError),
}
