//! Public facade over the coordinator worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::command::CollectorCommand;
use crate::error::{CollectError, CollectResult};
use crate::stats::CollectorStats;
use crate::worker;
use magpie_core::{
    Candidate, CollectedCallback, CollectorSettings, DescriptorCodec, FileTransfer, InfoHash,
    MagnetResolver, MetadataStore, OverlayDirectory, TorrentDescriptor,
};
use magpie_events::EventBus;

const COMMAND_BUFFER: usize = 128;

/// External collaborators the coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Peer-to-peer file-transfer engine.
    pub transfer: Arc<dyn FileTransfer>,
    /// DHT magnet resolver.
    pub magnet: Arc<dyn MagnetResolver>,
    /// Overlay community directory for descriptor broadcasts.
    pub overlay: Arc<dyn OverlayDirectory>,
    /// Descriptor parser.
    pub codec: Arc<dyn DescriptorCodec>,
    /// Torrent metadata database.
    pub store: Arc<dyn MetadataStore>,
}

/// Handle on a running acquisition coordinator.
///
/// Every method marshals its work onto the coordinator's single worker task;
/// clones of the handle share that worker.
#[derive(Clone)]
pub struct Collector {
    commands: mpsc::Sender<CollectorCommand>,
}

impl Collector {
    /// Validate `settings` and start the coordinator worker.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Settings`] when the settings are unusable.
    pub fn spawn(
        settings: CollectorSettings,
        deps: Collaborators,
        events: EventBus,
    ) -> CollectResult<Self> {
        settings.validate()?;
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        worker::spawn(settings, deps, events, commands.clone(), receiver);
        Ok(Self { commands })
    }

    /// Acquire the descriptor for `infohash`.
    ///
    /// With a candidate the file-transfer path is used, falling through the
    /// key's candidate list on failure; without one a magnet attempt is
    /// scheduled after the per-priority pre-delay. `callback` fires at most
    /// once, on the first success.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn download_torrent(
        &self,
        candidate: Option<Candidate>,
        infohash: InfoHash,
        callback: Option<CollectedCallback>,
        priority: u8,
        timeout: Option<Duration>,
    ) -> CollectResult<()> {
        self.send(CollectorCommand::DownloadTorrent {
            candidate,
            infohash,
            callback,
            priority,
            timeout,
        })
        .await
    }

    /// Acquire the descriptor for `infohash` by broadcasting over the overlay
    /// communities. The eventual descriptor arrives through a side channel;
    /// report it with [`Self::notify_descriptor_observed`].
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn download_torrent_message(
        &self,
        candidate: Candidate,
        infohash: InfoHash,
        callback: Option<CollectedCallback>,
        priority: u8,
    ) -> CollectResult<()> {
        self.send(CollectorCommand::DownloadTorrentMessage {
            candidate,
            infohash,
            callback,
            priority,
        })
        .await
    }

    /// Acquire a thumbnail asset stored under `thumbnail_subpath`. Does
    /// nothing — and fires no callback — when the asset is already on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn download_metadata(
        &self,
        candidate: Candidate,
        infohash: InfoHash,
        thumbnail_subpath: impl Into<String>,
        callback: Option<CollectedCallback>,
        timeout: Option<Duration>,
    ) -> CollectResult<()> {
        self.send(CollectorCommand::DownloadMetadata {
            candidate,
            infohash,
            subpath: thumbnail_subpath.into(),
            callback,
            timeout,
        })
        .await
    }

    /// Persist an already parsed descriptor and fan out to registered
    /// callbacks. A descriptor already on disk is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn save_torrent(
        &self,
        descriptor: TorrentDescriptor,
        callback: Option<CollectedCallback>,
    ) -> CollectResult<()> {
        self.send(CollectorCommand::SaveTorrent {
            descriptor: Box::new(descriptor),
            callback,
        })
        .await
    }

    /// Report that a descriptor for `infohash` arrived through an overlay
    /// side channel, firing registered callbacks without a file path.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn notify_descriptor_observed(&self, infohash: InfoHash) -> CollectResult<()> {
        self.send(CollectorCommand::DescriptorObserved { infohash })
            .await
    }

    /// Delete a collected thumbnail. Missing files and directories are
    /// refused and logged.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn delete_metadata(
        &self,
        thumbnail_subpath: impl Into<String>,
    ) -> CollectResult<()> {
        self.send(CollectorCommand::DeleteMetadata {
            subpath: thumbnail_subpath.into(),
        })
        .await
    }

    /// Adjust the collected-descriptor quota at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn set_max_num_torrents(&self, max: u64) -> CollectResult<()> {
        self.send(CollectorCommand::SetMaxTorrents { max }).await
    }

    /// Run the collection-quota check now instead of waiting for the next
    /// scheduled pass.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn check_overflow(&self) -> CollectResult<()> {
        self.send(CollectorCommand::CheckOverflow).await
    }

    /// Whether the descriptor for `infohash` is already in the collection
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn has_torrent(&self, infohash: InfoHash) -> CollectResult<bool> {
        let (respond_to, response) = oneshot::channel();
        self.send(CollectorCommand::HasDescriptor {
            infohash,
            respond_to,
        })
        .await?;
        response.await.map_err(|_| CollectError::Closed)
    }

    /// Whether a thumbnail is already collected under `thumbnail_subpath`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn has_metadata(
        &self,
        thumbnail_subpath: impl Into<String>,
    ) -> CollectResult<bool> {
        let (respond_to, response) = oneshot::channel();
        self.send(CollectorCommand::HasThumbnail {
            subpath: thumbnail_subpath.into(),
            respond_to,
        })
        .await?;
        response.await.map_err(|_| CollectError::Closed)
    }

    /// Snapshot the request queues and their counters.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Closed`] if the coordinator has shut down.
    pub async fn stats(&self) -> CollectResult<CollectorStats> {
        let (respond_to, response) = oneshot::channel();
        self.send(CollectorCommand::QueryStats { respond_to })
            .await?;
        response.await.map_err(|_| CollectError::Closed)
    }

    /// Cancel all scheduled work and stop the worker. In-flight transport
    /// operations finish on their own; their completions are discarded.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(CollectorCommand::Shutdown).await;
    }

    async fn send(&self, command: CollectorCommand) -> CollectResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CollectError::Closed)
    }
}
