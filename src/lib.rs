//! Conversation sync for a two-party chat client.
//!
//! History comes from REST endpoints, new messages from a push channel. The
//! [`ChatClient`] reconciles both into one ordered, deduplicated sequence for
//! the selected conversation.

pub mod chat;
pub mod common;
pub mod config;
pub mod error;
pub mod network;

pub use chat::{ChatClient, ChatState, LogNotifier, NoticeKind, Notifier};
pub use common::{Message, OutgoingMessage, Peer};
pub use error::ChatError;
pub use network::{Channel, ChannelSource, HistoryFetcher, HttpFetcher};
