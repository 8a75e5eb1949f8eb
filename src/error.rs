use thiserror::Error;

/// Result states of client operations that never reach the network.
///
/// Request failures are not part of this type: they are reported through the
/// [`Notifier`](crate::chat::Notifier) when their completion event is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("no conversation is selected")]
    NoActiveConversation,
    #[error("peer {0} is not the selected conversation")]
    NotSelected(String),
    #[error("realtime channel is not available")]
    NoTransport,
    #[error("sync worker queue is full")]
    WorkerBusy,
    #[error("sync worker has stopped")]
    WorkerStopped,
}
