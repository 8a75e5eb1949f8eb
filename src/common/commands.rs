use super::types::OutgoingMessage;

/// Request from the client to the sync worker.
///
/// Every conversation-scoped command carries the selection epoch it was issued
/// under; the worker echoes it back so stale results can be recognised.
#[derive(Debug, Clone)]
pub enum SyncCommand {
    FetchPeers,
    FetchHistory {
        peer_id: String,
        epoch: u64,
    },
    SendMessage {
        peer_id: String,
        epoch: u64,
        draft: OutgoingMessage,
    },
}
