use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::common::{Failure, OutgoingMessage, Peer, SyncCommand, SyncEvent};
use crate::error::ChatError;
use crate::network::{ChannelSource, HistoryFetcher, SyncWorker};

use super::notify::{NoticeKind, Notifier};
use super::state::{Action, Applied, ChatState};
use super::subscription::SubscriptionManager;

const COMMAND_BUFFER: usize = 100;

pub const LIVE_UPDATES_OFF: &str = "Live updates are unavailable; new messages appear on reload";

/// Owner of the conversation state.
///
/// Requests are handed to the [`SyncWorker`]; their results, together with
/// inbound channel messages, come back as [`SyncEvent`]s and are applied here
/// one at a time via [`handle_events`](Self::handle_events) or
/// [`next_event`](Self::next_event).
pub struct ChatClient {
    state: ChatState,
    subscriptions: SubscriptionManager,
    notifier: Arc<dyn Notifier>,
    command_sender: mpsc::Sender<SyncCommand>,
    event_receiver: mpsc::UnboundedReceiver<SyncEvent>,
}

impl ChatClient {
    /// Build a client and the worker that must be run alongside it.
    pub fn new(
        fetcher: Arc<dyn HistoryFetcher>,
        channels: Arc<dyn ChannelSource>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, SyncWorker) {
        // Client -> worker
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER);
        // Worker & realtime listener -> client
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        let worker = SyncWorker::new(fetcher, event_sender.clone(), command_receiver);
        let client = Self {
            state: ChatState::new(),
            subscriptions: SubscriptionManager::new(channels, event_sender),
            notifier,
            command_sender,
            event_receiver,
        };
        (client, worker)
    }

    /// Like [`new`](Self::new) but spawns the worker on the current runtime.
    pub fn spawn(
        fetcher: Arc<dyn HistoryFetcher>,
        channels: Arc<dyn ChannelSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (client, worker) = Self::new(fetcher, channels, notifier);
        tokio::spawn(worker.run());
        client
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.is_active()
    }

    pub fn load_peers(&mut self) -> Result<(), ChatError> {
        self.state.apply(Action::PeersRequested);
        self.dispatch(SyncCommand::FetchPeers)
    }

    /// Directory refresh: a full reload of the peer list.
    pub fn refresh_directory(&mut self) -> Result<(), ChatError> {
        self.load_peers()
    }

    /// Fetch history for `peer_id` into the current selection epoch.
    ///
    /// `peer_id` must be the selected peer; anything else would land another
    /// conversation's history in this one.
    pub fn load_history(&mut self, peer_id: &str) -> Result<(), ChatError> {
        if self.state.selected().map(|peer| peer.id.as_str()) != Some(peer_id) {
            log::warn!("Not loading history for {peer_id}: not the selected conversation");
            return Err(ChatError::NotSelected(peer_id.to_string()));
        }
        self.state.apply(Action::HistoryRequested);
        self.dispatch(SyncCommand::FetchHistory {
            peer_id: peer_id.to_string(),
            epoch: self.state.epoch(),
        })
    }

    pub fn send(&mut self, content: &str) -> Result<(), ChatError> {
        self.send_message(OutgoingMessage::text(content))
    }

    pub fn send_message(&mut self, draft: OutgoingMessage) -> Result<(), ChatError> {
        let Some(peer) = self.state.selected() else {
            return Err(ChatError::NoActiveConversation);
        };
        let command = SyncCommand::SendMessage {
            peer_id: peer.id.clone(),
            epoch: self.state.epoch(),
            draft,
        };
        self.dispatch(command)
    }

    /// Change the selection and clear the message sequence. Nothing is fetched
    /// and the subscription is left as is.
    pub fn select_peer(&mut self, peer: Option<Peer>) -> u64 {
        self.state.apply(Action::SelectPeer(peer));
        self.state.epoch()
    }

    pub fn subscribe(&mut self) -> Result<(), ChatError> {
        self.subscriptions.subscribe(self.state.selected())
    }

    pub fn unsubscribe(&mut self) -> bool {
        self.subscriptions.unsubscribe()
    }

    /// Switch to `peer`: detach the old listener, clear, fetch history, listen.
    ///
    /// `Err(NoTransport)` means history is loading but live delivery is off;
    /// the user gets an info notice about it.
    pub fn open_conversation(&mut self, peer: Peer) -> Result<(), ChatError> {
        self.unsubscribe();
        let peer_id = peer.id.clone();
        self.select_peer(Some(peer));
        self.load_history(&peer_id)?;
        let subscribed = self.subscribe();
        if subscribed == Err(ChatError::NoTransport) {
            self.notifier.notify(NoticeKind::Info, LIVE_UPDATES_OFF);
        }
        subscribed
    }

    pub fn close_conversation(&mut self) {
        self.unsubscribe();
        self.select_peer(None);
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn handle_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_receiver.try_recv() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next event and apply it.
    pub async fn next_event(&mut self) -> Option<Applied> {
        let event = self.event_receiver.recv().await?;
        Some(self.apply_event(event))
    }

    fn apply_event(&mut self, event: SyncEvent) -> Applied {
        let applied = self.state.apply(Action::Sync(event));
        if let Applied::Failed(text) = &applied {
            self.notifier.notify(NoticeKind::Error, text);
        }
        applied
    }

    fn dispatch(&mut self, command: SyncCommand) -> Result<(), ChatError> {
        let (command, error) = match self.command_sender.try_send(command) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(command)) => (command, ChatError::WorkerBusy),
            Err(TrySendError::Closed(command)) => (command, ChatError::WorkerStopped),
        };
        log::warn!("Failed to send command to sync worker: {error}");

        // Settle the loading flag the request already raised.
        let failure = Failure::Network {
            server_message: None,
        };
        let event = match command {
            SyncCommand::FetchPeers => SyncEvent::PeersFailed(failure),
            SyncCommand::FetchHistory { epoch, .. } => SyncEvent::HistoryFailed { epoch, failure },
            SyncCommand::SendMessage { epoch, .. } => SyncEvent::SendFailed { epoch, failure },
        };
        self.apply_event(event);
        Err(error)
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        if self.subscriptions.is_active() {
            self.subscriptions.unsubscribe();
        }
    }
}
