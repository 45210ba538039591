//! Command definitions for the coordinator worker.
//!
//! Every externally visible operation and every internally scheduled tick is
//! a command; the worker task is the only place they execute, which keeps all
//! requester state single-threaded.

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::stats::CollectorStats;
use magpie_core::{
    Candidate, CollectedCallback, InfoHash, MagnetError, RequestKey, TorrentDescriptor,
    TransferError,
};

/// Identity of one requester instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum QueueId {
    /// File-transfer descriptor requester at a priority.
    Transfer(u8),
    /// Overlay-message requester at a priority.
    Message(u8),
    /// Magnet requester at a priority.
    Magnet(u8),
    /// The single thumbnail requester.
    Thumbnail,
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer(priority) => write!(f, "transfer:{priority}"),
            Self::Message(priority) => write!(f, "message:{priority}"),
            Self::Magnet(priority) => write!(f, "magnet:{priority}"),
            Self::Thumbnail => write!(f, "thumbnail"),
        }
    }
}

/// Work items processed by the coordinator worker.
pub(crate) enum CollectorCommand {
    /// Acquire a descriptor, over file transfer when a candidate is known and
    /// the DHT otherwise.
    DownloadTorrent {
        /// Peer offering the descriptor, if any.
        candidate: Option<Candidate>,
        /// Infohash to acquire.
        infohash: InfoHash,
        /// Callback fired on first success.
        callback: Option<CollectedCallback>,
        /// Requested priority, clamped to `{0, 1}`.
        priority: u8,
        /// Optional per-request deadline.
        timeout: Option<Duration>,
    },
    /// Acquire a descriptor by broadcasting over overlay communities.
    DownloadTorrentMessage {
        /// Peer to direct the broadcast at.
        candidate: Candidate,
        /// Infohash to acquire.
        infohash: InfoHash,
        /// Callback fired on first success.
        callback: Option<CollectedCallback>,
        /// Requested priority, clamped to `{0, 1}`.
        priority: u8,
    },
    /// Acquire a thumbnail asset over file transfer.
    DownloadMetadata {
        /// Peer offering the asset.
        candidate: Candidate,
        /// Infohash the asset belongs to.
        infohash: InfoHash,
        /// Relative path of the asset below the collection directory.
        subpath: String,
        /// Callback fired on first success.
        callback: Option<CollectedCallback>,
        /// Optional per-request deadline.
        timeout: Option<Duration>,
    },
    /// Persist an already parsed descriptor.
    SaveTorrent {
        /// Descriptor to persist.
        descriptor: Box<TorrentDescriptor>,
        /// Callback fired once the descriptor is on disk.
        callback: Option<CollectedCallback>,
    },
    /// A descriptor for a tracked infohash arrived through an overlay side
    /// channel.
    DescriptorObserved {
        /// Infohash that was observed.
        infohash: InfoHash,
    },
    /// Delete a collected thumbnail.
    DeleteMetadata {
        /// Relative path of the asset below the collection directory.
        subpath: String,
    },
    /// Adjust the collected-descriptor quota at runtime.
    SetMaxTorrents {
        /// New quota target.
        max: u64,
    },
    /// Paced wake for a requester.
    RequesterWake {
        /// Requester to wake.
        queue: QueueId,
    },
    /// Enqueue a magnet attempt after its priority pre-delay elapsed.
    EnqueueMagnet {
        /// Infohash to resolve.
        infohash: InfoHash,
        /// Priority of the magnet requester to use.
        priority: u8,
    },
    /// A spawned file transfer completed.
    TransferFinished {
        /// Requester the transfer belonged to.
        queue: QueueId,
        /// Key the transfer was fetching.
        key: RequestKey,
        /// Peer the transfer targeted.
        candidate: Candidate,
        /// Transfer outcome.
        result: Result<Vec<u8>, TransferError>,
    },
    /// A spawned magnet resolution completed.
    MagnetResolved {
        /// Priority of the magnet requester that issued the lookup.
        priority: u8,
        /// Resolution outcome.
        result: Result<Box<TorrentDescriptor>, MagnetError>,
    },
    /// Periodic collection-quota check.
    CheckOverflow,
    /// One chunked step of an eviction sweep.
    FreeSpaceStep {
        /// Descriptors still to remove.
        remaining: u64,
        /// Chunk size per step.
        per_step: u64,
        /// Descriptors removed by earlier steps.
        removed: u64,
    },
    /// Check whether a descriptor is already collected.
    HasDescriptor {
        /// Infohash to look up.
        infohash: InfoHash,
        /// Channel the answer is returned on.
        respond_to: oneshot::Sender<bool>,
    },
    /// Check whether a thumbnail is already collected.
    HasThumbnail {
        /// Relative path of the asset below the collection directory.
        subpath: String,
        /// Channel the answer is returned on.
        respond_to: oneshot::Sender<bool>,
    },
    /// Snapshot requester statistics.
    QueryStats {
        /// Channel the snapshot is returned on.
        respond_to: oneshot::Sender<CollectorStats>,
    },
    /// Cancel all scheduled work and stop the worker.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_ids_render_stable_names() {
        assert_eq!(QueueId::Transfer(0).to_string(), "transfer:0");
        assert_eq!(QueueId::Message(1).to_string(), "message:1");
        assert_eq!(QueueId::Magnet(1).to_string(), "magnet:1");
        assert_eq!(QueueId::Thumbnail.to_string(), "thumbnail");
    }
}
