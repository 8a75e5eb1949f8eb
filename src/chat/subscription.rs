use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::common::{Message, Peer, SyncEvent};
use crate::error::ChatError;
use crate::network::{Channel, ChannelSource, EventHandler, NEW_MESSAGE_EVENT};

struct ActiveSubscription {
    peer_id: String,
    channel: Arc<dyn Channel>,
}

/// Binds the inbound `newMessage` listener to the selected conversation.
///
/// At most one listener is registered at a time: subscribing again detaches
/// the previous one first. Rebinding on selection change is left to the
/// caller (see `ChatClient::open_conversation`).
pub struct SubscriptionManager {
    channels: Arc<dyn ChannelSource>,
    event_sender: mpsc::UnboundedSender<SyncEvent>,
    active: Option<ActiveSubscription>,
}

impl SubscriptionManager {
    pub fn new(
        channels: Arc<dyn ChannelSource>,
        event_sender: mpsc::UnboundedSender<SyncEvent>,
    ) -> Self {
        Self {
            channels,
            event_sender,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn subscribed_peer(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.peer_id.as_str())
    }

    pub fn subscribe(&mut self, selected: Option<&Peer>) -> Result<(), ChatError> {
        let peer = selected.ok_or(ChatError::NoActiveConversation)?;
        let channel = self
            .channels
            .current_channel()
            .ok_or(ChatError::NoTransport)?;

        if self.active.is_some() {
            log::debug!("Replacing existing {NEW_MESSAGE_EVENT} listener");
            self.unsubscribe();
        }

        channel.on(
            NEW_MESSAGE_EVENT,
            inbound_handler(peer.id.clone(), self.event_sender.clone()),
        );
        log::info!("Listening for messages from {}", peer.id);

        self.active = Some(ActiveSubscription {
            peer_id: peer.id.clone(),
            channel,
        });
        Ok(())
    }

    /// Returns whether a listener was detached.
    pub fn unsubscribe(&mut self) -> bool {
        let channel = match self.active.take() {
            Some(active) => Some(active.channel),
            None => self.channels.current_channel(),
        };
        match channel {
            Some(channel) => {
                channel.off(NEW_MESSAGE_EVENT);
                true
            }
            None => false,
        }
    }
}

fn inbound_handler(
    peer_id: String,
    event_sender: mpsc::UnboundedSender<SyncEvent>,
) -> EventHandler {
    Arc::new(move |payload: Value| {
        let message: Message = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Dropping malformed {NEW_MESSAGE_EVENT} payload: {err}");
                return;
            }
        };
        if message.sender_id != peer_id {
            return;
        }
        if event_sender
            .send(SyncEvent::MessageReceived(message))
            .is_err()
        {
            log::debug!("Client gone; inbound message dropped");
        }
    })
}
