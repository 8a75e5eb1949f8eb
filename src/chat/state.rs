//! Conversation state and its transitions.
//!
//! Every mutation goes through [`ChatState::apply`]. Results of requests carry
//! the selection epoch they were issued under and are discarded once the
//! selection has moved on, so a slow response for a previous conversation can
//! never leak into the current one. Inbound messages are checked against the
//! selected peer at the moment they are applied.

use crate::common::payload::{message_from_payload, messages_from_payload, peers_from_payload};
use crate::common::{Message, Peer, SyncEvent};

use super::directory::Directory;

pub const LOAD_USERS_FALLBACK: &str = "Failed to load users";
pub const LOAD_MESSAGES_FALLBACK: &str = "Failed to load messages";
pub const SEND_MESSAGE_FALLBACK: &str = "Failed to send message";

/// Lifecycle of one selection epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Cleared,
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub enum Action {
    SelectPeer(Option<Peer>),
    PeersRequested,
    HistoryRequested,
    Sync(SyncEvent),
}

/// What applying an action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Selected { epoch: u64 },
    Requested { epoch: u64 },
    PeersReplaced(usize),
    HistoryReplaced(usize),
    Appended,
    /// The request failed; the text is meant for the user.
    Failed(String),
    /// Result of a request issued under an older selection.
    Stale,
    Duplicate,
    /// Inbound message from someone other than the selected peer.
    Filtered,
    NoConversation,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    directory: Directory,
    selected: Option<Peer>,
    messages: Vec<Message>,
    epoch: u64,
    phase: Phase,
    history_in_flight: usize,
    // Appended while a history fetch was in flight; survives the replace.
    arrived_during_load: Vec<Message>,
}

/// `(state, action) -> state` form of [`ChatState::apply`].
pub fn transition(mut state: ChatState, action: Action) -> (ChatState, Applied) {
    let applied = state.apply(action);
    (state, applied)
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn selected(&self) -> Option<&Peer> {
        self.selected.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn peers(&self) -> &[Peer] {
        self.directory.peers()
    }

    pub fn users_loading(&self) -> bool {
        self.directory.is_loading()
    }

    pub fn messages_loading(&self) -> bool {
        self.history_in_flight > 0
    }

    pub fn apply(&mut self, action: Action) -> Applied {
        match action {
            Action::SelectPeer(peer) => self.select(peer),
            Action::PeersRequested => {
                self.directory.begin_refresh();
                Applied::Requested { epoch: self.epoch }
            }
            Action::HistoryRequested => {
                self.history_in_flight += 1;
                self.phase = Phase::Loading;
                Applied::Requested { epoch: self.epoch }
            }
            Action::Sync(event) => self.apply_sync(event),
        }
    }

    fn select(&mut self, peer: Option<Peer>) -> Applied {
        self.epoch += 1;
        self.phase = if peer.is_some() {
            Phase::Cleared
        } else {
            Phase::Idle
        };
        self.selected = peer;
        self.messages.clear();
        self.arrived_during_load.clear();
        // In-flight fetches of the old epoch will be discarded on arrival.
        self.history_in_flight = 0;
        Applied::Selected { epoch: self.epoch }
    }

    fn apply_sync(&mut self, event: SyncEvent) -> Applied {
        match event {
            SyncEvent::PeersLoaded(payload) => {
                let peers = peers_from_payload(payload);
                let count = peers.len();
                self.directory.replace(peers);
                Applied::PeersReplaced(count)
            }
            SyncEvent::PeersFailed(failure) => {
                self.directory.fail();
                Applied::Failed(failure.describe(LOAD_USERS_FALLBACK))
            }
            SyncEvent::HistoryLoaded { epoch, payload } => {
                if !self.is_current(epoch, "history") {
                    return Applied::Stale;
                }
                self.settle_history();
                self.replace_history(messages_from_payload(payload));
                Applied::HistoryReplaced(self.messages.len())
            }
            SyncEvent::HistoryFailed { epoch, failure } => {
                if !self.is_current(epoch, "history failure") {
                    return Applied::Stale;
                }
                self.settle_history();
                self.messages.clear();
                if self.history_in_flight == 0 {
                    self.arrived_during_load.clear();
                }
                Applied::Failed(failure.describe(LOAD_MESSAGES_FALLBACK))
            }
            SyncEvent::MessageSent { epoch, payload } => {
                if !self.is_current(epoch, "sent message") {
                    return Applied::Stale;
                }
                match message_from_payload(payload) {
                    Some(message) => self.append(message),
                    None => Applied::Failed(SEND_MESSAGE_FALLBACK.to_string()),
                }
            }
            // Reported whatever the epoch: the user still needs to know the send failed.
            SyncEvent::SendFailed { failure, .. } => {
                Applied::Failed(failure.describe(SEND_MESSAGE_FALLBACK))
            }
            SyncEvent::MessageReceived(message) => {
                let Some(selected) = self.selected.as_ref() else {
                    return Applied::NoConversation;
                };
                if message.sender_id != selected.id {
                    log::debug!(
                        "Dropping inbound message {} from {} (selected {})",
                        message.id,
                        message.sender_id,
                        selected.id
                    );
                    return Applied::Filtered;
                }
                self.append(message)
            }
        }
    }

    fn is_current(&self, epoch: u64, what: &str) -> bool {
        if epoch == self.epoch {
            return true;
        }
        log::debug!(
            "Discarding {what} from epoch {epoch} (current epoch {})",
            self.epoch
        );
        false
    }

    fn settle_history(&mut self) {
        self.history_in_flight = self.history_in_flight.saturating_sub(1);
        if self.history_in_flight == 0 {
            self.phase = Phase::Ready;
        }
    }

    fn replace_history(&mut self, fetched: Vec<Message>) {
        self.messages.clear();
        for message in fetched {
            if !self.contains(&message.id) {
                self.messages.push(message);
            }
        }

        let carried = if self.history_in_flight == 0 {
            std::mem::take(&mut self.arrived_during_load)
        } else {
            self.arrived_during_load.clone()
        };
        for message in carried {
            if !self.contains(&message.id) {
                self.messages.push(message);
            }
        }
    }

    fn append(&mut self, message: Message) -> Applied {
        if self.contains(&message.id) {
            log::debug!("Ignoring duplicate message {}", message.id);
            return Applied::Duplicate;
        }
        if self.history_in_flight > 0 {
            self.arrived_during_load.push(message.clone());
        }
        self.messages.push(message);
        Applied::Appended
    }

    fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|message| message.id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Failure;
    use serde_json::{Value, json};

    fn message(id: &str, sender: &str) -> Message {
        Message {
            id: id.to_string(),
            sender_id: sender.to_string(),
            recipient_id: "me".to_string(),
            content: format!("message {id}"),
            image: None,
            created_at: None,
        }
    }

    fn message_json(id: &str, sender: &str) -> Value {
        serde_json::to_value(message(id, sender)).unwrap()
    }

    fn ids(state: &ChatState) -> Vec<&str> {
        state.messages().iter().map(|m| m.id.as_str()).collect()
    }

    fn selected(peer_id: &str) -> ChatState {
        let mut state = ChatState::new();
        state.apply(Action::SelectPeer(Some(Peer::new(peer_id, peer_id))));
        state
    }

    fn inbound(id: &str, sender: &str) -> Action {
        Action::Sync(SyncEvent::MessageReceived(message(id, sender)))
    }

    #[test]
    fn select_clears_messages_and_bumps_epoch() {
        let mut state = selected("a");
        state.apply(inbound("1", "a"));
        assert_eq!(ids(&state), ["1"]);
        let before = state.epoch();

        let applied = state.apply(Action::SelectPeer(Some(Peer::new("b", "Bob"))));
        assert_eq!(applied, Applied::Selected { epoch: before + 1 });
        assert!(state.messages().is_empty());
        assert_eq!(state.phase(), Phase::Cleared);

        state.apply(Action::SelectPeer(None));
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.selected().is_none());
    }

    #[test]
    fn history_replaces_messages_and_walks_phases() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        assert!(state.messages_loading());
        assert_eq!(state.phase(), Phase::Loading);

        let applied = state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: state.epoch(),
            payload: json!([message_json("1", "a"), message_json("2", "me")]),
        }));
        assert_eq!(applied, Applied::HistoryReplaced(2));
        assert_eq!(ids(&state), ["1", "2"]);
        assert!(!state.messages_loading());
        assert_eq!(state.phase(), Phase::Ready);
    }

    #[test]
    fn non_array_history_is_empty() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: state.epoch(),
            payload: json!({ "error": "weird" }),
        }));
        assert!(state.messages().is_empty());
        assert_eq!(state.phase(), Phase::Ready);
    }

    #[test]
    fn history_failure_resets_and_reports() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        let applied = state.apply(Action::Sync(SyncEvent::HistoryFailed {
            epoch: state.epoch(),
            failure: Failure::Network {
                server_message: None,
            },
        }));
        assert_eq!(applied, Applied::Failed(LOAD_MESSAGES_FALLBACK.to_string()));
        assert!(state.messages().is_empty());
        assert!(!state.messages_loading());
    }

    #[test]
    fn stale_history_is_discarded() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        let old_epoch = state.epoch();

        state.apply(Action::SelectPeer(Some(Peer::new("b", "Bob"))));
        assert!(!state.messages_loading());

        let applied = state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: old_epoch,
            payload: json!([message_json("1", "a")]),
        }));
        assert_eq!(applied, Applied::Stale);
        assert!(state.messages().is_empty());

        let applied = state.apply(Action::Sync(SyncEvent::HistoryFailed {
            epoch: old_epoch,
            failure: Failure::Malformed,
        }));
        assert_eq!(applied, Applied::Stale);
    }

    #[test]
    fn inbound_from_other_sender_is_filtered() {
        let mut state = selected("a");
        assert_eq!(state.apply(inbound("1", "z")), Applied::Filtered);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn inbound_from_selected_peer_appends_at_tail() {
        let mut state = selected("a");
        state.apply(inbound("1", "a"));
        assert_eq!(state.apply(inbound("2", "a")), Applied::Appended);
        assert_eq!(ids(&state), ["1", "2"]);
    }

    #[test]
    fn inbound_without_selection_is_ignored() {
        let mut state = ChatState::new();
        assert_eq!(state.apply(inbound("1", "a")), Applied::NoConversation);
    }

    #[test]
    fn sent_message_appends_once_even_if_echoed() {
        let mut state = selected("a");
        state.apply(inbound("1", "a"));

        let applied = state.apply(Action::Sync(SyncEvent::MessageSent {
            epoch: state.epoch(),
            payload: message_json("2", "me"),
        }));
        assert_eq!(applied, Applied::Appended);

        let echoed = state.apply(Action::Sync(SyncEvent::MessageSent {
            epoch: state.epoch(),
            payload: message_json("2", "me"),
        }));
        assert_eq!(echoed, Applied::Duplicate);
        assert_eq!(ids(&state), ["1", "2"]);
    }

    #[test]
    fn malformed_send_response_leaves_messages() {
        let mut state = selected("a");
        let applied = state.apply(Action::Sync(SyncEvent::MessageSent {
            epoch: state.epoch(),
            payload: json!("created"),
        }));
        assert_eq!(applied, Applied::Failed(SEND_MESSAGE_FALLBACK.to_string()));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn send_failure_is_reported_even_after_switching() {
        let mut state = selected("a");
        let old_epoch = state.epoch();
        state.apply(Action::SelectPeer(Some(Peer::new("b", "Bob"))));

        let applied = state.apply(Action::Sync(SyncEvent::SendFailed {
            epoch: old_epoch,
            failure: Failure::Network {
                server_message: Some("Receiver not found".into()),
            },
        }));
        assert_eq!(applied, Applied::Failed("Receiver not found".into()));
    }

    #[test]
    fn live_messages_survive_history_replace() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        state.apply(inbound("3", "a"));
        state.apply(inbound("1", "a"));

        state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: state.epoch(),
            payload: json!([message_json("1", "a"), message_json("2", "me")]),
        }));
        assert_eq!(ids(&state), ["1", "2", "3"]);

        state.apply(Action::HistoryRequested);
        state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: state.epoch(),
            payload: json!([message_json("1", "a")]),
        }));
        assert_eq!(ids(&state), ["1"]);
    }

    #[test]
    fn history_failure_drops_carried_messages() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        state.apply(inbound("3", "a"));
        state.apply(Action::Sync(SyncEvent::HistoryFailed {
            epoch: state.epoch(),
            failure: Failure::Malformed,
        }));
        assert!(state.messages().is_empty());

        state.apply(inbound("4", "a"));
        state.apply(Action::HistoryRequested);
        state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: state.epoch(),
            payload: json!([]),
        }));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn overlapping_failure_keeps_carried_messages_for_pending_load() {
        let mut state = selected("a");
        state.apply(Action::HistoryRequested);
        state.apply(Action::HistoryRequested);
        state.apply(inbound("3", "a"));
        state.apply(Action::Sync(SyncEvent::HistoryFailed {
            epoch: state.epoch(),
            failure: Failure::Malformed,
        }));
        assert!(state.messages_loading());

        state.apply(Action::Sync(SyncEvent::HistoryLoaded {
            epoch: state.epoch(),
            payload: json!([message_json("1", "a")]),
        }));
        assert_eq!(ids(&state), ["1", "3"]);
    }

    #[test]
    fn reselecting_same_peer_keeps_inbound_flowing() {
        let mut state = selected("a");
        state.apply(Action::SelectPeer(Some(Peer::new("a", "a"))));
        assert_eq!(state.apply(inbound("1", "a")), Applied::Appended);
        assert_eq!(ids(&state), ["1"]);
    }

    #[test]
    fn inbound_from_previous_peer_is_filtered_after_switch() {
        let mut state = selected("a");
        state.apply(Action::SelectPeer(Some(Peer::new("b", "Bob"))));
        assert_eq!(state.apply(inbound("1", "a")), Applied::Filtered);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn sent_message_for_previous_selection_is_discarded() {
        let mut state = selected("a");
        let old_epoch = state.epoch();
        state.apply(Action::SelectPeer(Some(Peer::new("b", "Bob"))));

        let applied = state.apply(Action::Sync(SyncEvent::MessageSent {
            epoch: old_epoch,
            payload: message_json("1", "me"),
        }));
        assert_eq!(applied, Applied::Stale);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn peers_loading_flag_and_failure() {
        let mut state = ChatState::new();
        state.apply(Action::PeersRequested);
        assert!(state.users_loading());

        let applied = state.apply(Action::Sync(SyncEvent::PeersLoaded(json!({
            "users": [{ "_id": "a", "fullName": "Alice" }]
        }))));
        assert_eq!(applied, Applied::PeersReplaced(1));
        assert!(!state.users_loading());

        state.apply(Action::PeersRequested);
        let applied = state.apply(Action::Sync(SyncEvent::PeersFailed(Failure::Network {
            server_message: None,
        })));
        assert_eq!(applied, Applied::Failed(LOAD_USERS_FALLBACK.to_string()));
        assert!(state.peers().is_empty());
        assert!(!state.users_loading());
    }

    #[test]
    fn selection_does_not_touch_directory() {
        let mut state = ChatState::new();
        state.apply(Action::PeersRequested);
        state.apply(Action::Sync(SyncEvent::PeersLoaded(json!([
            { "_id": "a", "fullName": "Alice" },
            { "_id": "b", "fullName": "Bob" }
        ]))));

        let (state, _) = transition(state, Action::SelectPeer(Some(Peer::new("a", "Alice"))));
        assert_eq!(state.peers().len(), 2);
    }
}
