use serde_json::Value;

use super::types::Message;

/// Why a request did not produce a usable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Request rejected, timed out or answered with a non-2xx status.
    Network { server_message: Option<String> },
    /// 2xx answer whose body did not have the expected shape.
    Malformed,
}

impl Failure {
    /// User-visible text: the server-supplied message if any, else `fallback`.
    pub fn describe(&self, fallback: &str) -> String {
        match self {
            Failure::Network {
                server_message: Some(message),
            } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Result or inbound message delivered to the client.
///
/// Payloads of list endpoints stay raw JSON; shape normalisation happens when
/// the event is applied to the state.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    PeersLoaded(Value),
    PeersFailed(Failure),
    HistoryLoaded { epoch: u64, payload: Value },
    HistoryFailed { epoch: u64, failure: Failure },
    MessageSent { epoch: u64, payload: Value },
    SendFailed { epoch: u64, failure: Failure },
    /// Filtered against the current selection when applied.
    MessageReceived(Message),
}
