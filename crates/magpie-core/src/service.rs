//! Contracts for the collaborators the acquisition pipeline drives.
//!
//! The overlay membership layer, the file-transfer engine, the DHT resolver,
//! the descriptor parser, and the metadata database all live behind these
//! seams; the coordinator never sees their internals.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CodecError, MagnetError, StoreResult, TransferError};
use crate::model::{Candidate, DescriptorStatus, InfoHash, TorrentDescriptor};

/// In-memory file download over the peer-to-peer file-transfer engine.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Fetch `file_name` from the peer at `addr`, delivering the bytes in
    /// memory. Timeouts are the transport's responsibility and surface as
    /// [`TransferError::Timeout`].
    async fn download_file(
        &self,
        file_name: &str,
        addr: SocketAddr,
    ) -> Result<Vec<u8>, TransferError>;
}

/// DHT-backed magnet resolution.
#[async_trait]
pub trait MagnetResolver: Send + Sync {
    /// Resolve a magnet URI into a parsed descriptor, giving up after
    /// `timeout`.
    async fn retrieve(
        &self,
        magnet_uri: &str,
        timeout: Duration,
    ) -> Result<TorrentDescriptor, MagnetError>;
}

/// Capability implemented by overlay communities that can relay descriptor
/// requests to a peer.
///
/// Dispatch is fire-and-forget: any eventual descriptor arrives through an
/// unrelated overlay input path.
pub trait DescriptorBroadcast: Send + Sync {
    /// Ask `candidate` for the descriptor of `infohash`.
    fn request_descriptor(&self, infohash: InfoHash, candidate: &Candidate);
}

/// Live view of the overlay communities able to broadcast descriptor
/// requests.
pub trait OverlayDirectory: Send + Sync {
    /// Enumerate the communities currently offering the broadcast capability.
    fn search_communities(&self) -> Vec<Arc<dyn DescriptorBroadcast>>;
}

/// Decoder for fetched descriptor bytes.
pub trait DescriptorCodec: Send + Sync {
    /// Parse raw bytes into a descriptor, rejecting malformed input.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the bytes are not a valid descriptor.
    fn decode(&self, bytes: &[u8]) -> Result<TorrentDescriptor, CodecError>;
}

/// Narrow contract over the torrent metadata database.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Whether a row exists for `infohash`.
    async fn has(&self, infohash: InfoHash) -> StoreResult<bool>;

    /// Point an existing row at a freshly stored descriptor file.
    async fn update(&self, infohash: InfoHash, torrent_file: &Path) -> StoreResult<()>;

    /// Insert a row for an externally acquired descriptor.
    async fn add_external(
        &self,
        descriptor: &TorrentDescriptor,
        torrent_file: &Path,
        status: DescriptorStatus,
    ) -> StoreResult<()>;

    /// Tracker URLs known for `infohash`, including bookkeeping sentinels.
    async fn trackers(&self, infohash: InfoHash) -> StoreResult<Vec<String>>;

    /// Number of descriptors currently collected.
    async fn count_collected(&self) -> StoreResult<u64>;

    /// Evict up to `count` descriptors to reclaim space, returning how many
    /// were removed.
    async fn free_space(&self, count: u64) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::io;

    struct EmptyOverlay;

    impl OverlayDirectory for EmptyOverlay {
        fn search_communities(&self) -> Vec<Arc<dyn DescriptorBroadcast>> {
            Vec::new()
        }
    }

    #[test]
    fn overlay_directory_objects_are_usable() {
        let overlay: Arc<dyn OverlayDirectory> = Arc::new(EmptyOverlay);
        assert!(overlay.search_communities().is_empty());
    }

    struct FailingStore;

    #[async_trait]
    impl MetadataStore for FailingStore {
        async fn has(&self, _infohash: InfoHash) -> StoreResult<bool> {
            Err(StoreError::new("has", io::Error::other("down")))
        }

        async fn update(&self, _infohash: InfoHash, _torrent_file: &Path) -> StoreResult<()> {
            Err(StoreError::new("update", io::Error::other("down")))
        }

        async fn add_external(
            &self,
            _descriptor: &TorrentDescriptor,
            _torrent_file: &Path,
            _status: DescriptorStatus,
        ) -> StoreResult<()> {
            Err(StoreError::new("add_external", io::Error::other("down")))
        }

        async fn trackers(&self, _infohash: InfoHash) -> StoreResult<Vec<String>> {
            Err(StoreError::new("trackers", io::Error::other("down")))
        }

        async fn count_collected(&self) -> StoreResult<u64> {
            Err(StoreError::new("count_collected", io::Error::other("down")))
        }

        async fn free_space(&self, _count: u64) -> StoreResult<u64> {
            Err(StoreError::new("free_space", io::Error::other("down")))
        }
    }

    #[tokio::test]
    async fn store_errors_carry_the_operation() {
        let store = FailingStore;
        let err = store
            .count_collected()
            .await
            .expect_err("store should fail");
        assert_eq!(err.operation, "count_collected");
    }
}
