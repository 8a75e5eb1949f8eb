use std::sync::Arc;

use tokio::sync::mpsc;

use crate::common::{Failure, SyncCommand, SyncEvent};

use super::fetcher::HistoryFetcher;

/// Background half of the client: turns commands into requests and reports
/// their outcome as events.
///
/// Each request runs in its own task, so completions arrive in response order,
/// not issue order.
pub struct SyncWorker {
    fetcher: Arc<dyn HistoryFetcher>,
    event_sender: mpsc::UnboundedSender<SyncEvent>,
    command_receiver: mpsc::Receiver<SyncCommand>,
}

impl SyncWorker {
    pub fn new(
        fetcher: Arc<dyn HistoryFetcher>,
        event_sender: mpsc::UnboundedSender<SyncEvent>,
        command_receiver: mpsc::Receiver<SyncCommand>,
    ) -> Self {
        Self {
            fetcher,
            event_sender,
            command_receiver,
        }
    }

    /// Runs until every command sender is dropped.
    pub async fn run(mut self) {
        log::info!("Sync worker started");

        while let Some(command) = self.command_receiver.recv().await {
            self.handle_command(command);
        }

        log::info!("Sync worker stopped: command channel closed");
    }

    fn handle_command(&self, command: SyncCommand) {
        let fetcher = Arc::clone(&self.fetcher);
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            let event = match command {
                SyncCommand::FetchPeers => match fetcher.fetch_peers().await {
                    Ok(payload) => SyncEvent::PeersLoaded(payload),
                    Err(err) => {
                        log::warn!("Failed to load users: {err}");
                        SyncEvent::PeersFailed(Failure::from(&err))
                    }
                },
                SyncCommand::FetchHistory { peer_id, epoch } => {
                    match fetcher.fetch_history(&peer_id).await {
                        Ok(payload) => SyncEvent::HistoryLoaded { epoch, payload },
                        Err(err) => {
                            log::warn!("Failed to load messages with {peer_id}: {err}");
                            SyncEvent::HistoryFailed {
                                epoch,
                                failure: Failure::from(&err),
                            }
                        }
                    }
                }
                SyncCommand::SendMessage {
                    peer_id,
                    epoch,
                    draft,
                } => match fetcher.create_message(&peer_id, &draft).await {
                    Ok(payload) => SyncEvent::MessageSent { epoch, payload },
                    Err(err) => {
                        log::warn!("Failed to send message to {peer_id}: {err}");
                        SyncEvent::SendFailed {
                            epoch,
                            failure: Failure::from(&err),
                        }
                    }
                },
            };

            if let Err(err) = event_sender.send(event) {
                log::debug!("Client dropped before request completed: {err}");
            }
        });
    }
}
