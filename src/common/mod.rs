pub mod commands;
pub mod events;
pub mod payload;
pub mod types;

pub use commands::SyncCommand;
pub use events::{Failure, SyncEvent};
pub use types::{Message, OutgoingMessage, Peer};
