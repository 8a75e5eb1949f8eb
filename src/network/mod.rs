pub mod client;
pub mod fetcher;
pub mod transport;

pub use client::SyncWorker;
pub use fetcher::{FetchError, HistoryFetcher, HttpFetcher};
pub use transport::{
    Channel, ChannelSource, EventHandler, LocalChannel, NEW_MESSAGE_EVENT, NoChannel,
    SharedChannelSource,
};
