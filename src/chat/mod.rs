pub mod client;
pub mod directory;
pub mod notify;
pub mod state;
pub mod subscription;

pub use client::ChatClient;
pub use directory::Directory;
pub use notify::{LogNotifier, NoticeKind, Notifier};
pub use state::{Action, Applied, ChatState, Phase, transition};
pub use subscription::SubscriptionManager;
