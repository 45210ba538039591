#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory test doubles for the acquisition pipeline's collaborators.
//!
//! Every stub records the calls it receives and replays scripted outcomes,
//! so coordinator tests can drive failure and fallback paths
//! deterministically without any real overlay, transport, or database.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use magpie_core::{
    Candidate, CodecError, DescriptorBroadcast, DescriptorCodec, DescriptorStatus, FileTransfer,
    InfoHash, MagnetError, MagnetResolver, MetadataStore, OverlayDirectory, StoreResult,
    TorrentDescriptor, TransferError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Deterministic infohash for tests: every byte set to `seed`.
#[must_use]
pub fn infohash(seed: u8) -> InfoHash {
    InfoHash::from([seed; 20])
}

/// Loopback candidate listening on `port`.
///
/// # Panics
///
/// Panics if the literal loopback address fails to parse, which it cannot.
#[must_use]
pub fn candidate(port: u16) -> Candidate {
    let addr: SocketAddr = format!("127.0.0.1:{port}")
        .parse()
        .expect("loopback address");
    Candidate::new(addr)
}

/// Encode a descriptor into the JSON wire form [`JsonDescriptorCodec`]
/// understands.
///
/// # Panics
///
/// Panics if JSON serialization fails, which it cannot for this shape.
#[must_use]
pub fn descriptor_bytes(infohash: InfoHash, name: &str, trackers: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "infohash": infohash.to_hex(),
        "name": name,
        "trackers": trackers,
    }))
    .expect("descriptor json")
}

/// Build a descriptor whose `raw` bytes round-trip through
/// [`JsonDescriptorCodec`].
#[must_use]
pub fn descriptor(infohash: InfoHash, name: &str, trackers: &[&str]) -> TorrentDescriptor {
    let raw = descriptor_bytes(infohash, name, trackers);
    TorrentDescriptor {
        infohash,
        name: Some(name.to_string()),
        trackers: trackers.iter().map(ToString::to_string).collect(),
        raw,
    }
}

/// Codec treating descriptor bytes as the JSON document produced by
/// [`descriptor_bytes`].
#[derive(Debug, Default)]
pub struct JsonDescriptorCodec;

impl DescriptorCodec for JsonDescriptorCodec {
    fn decode(&self, bytes: &[u8]) -> Result<TorrentDescriptor, CodecError> {
        let mut parsed: TorrentDescriptor =
            serde_json::from_slice(bytes).map_err(|err| CodecError::new(err.to_string()))?;
        parsed.raw = bytes.to_vec();
        Ok(parsed)
    }
}

/// File-transfer stub replaying scripted outcomes per `(file_name, addr)`.
#[derive(Default)]
pub struct ScriptedFileTransfer {
    outcomes: Mutex<HashMap<(String, SocketAddr), VecDeque<Result<Vec<u8>, TransferError>>>>,
    requests: Mutex<Vec<(String, SocketAddr)>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedFileTransfer {
    /// Queue an outcome for the next download of `file_name` from `addr`.
    pub fn script(
        &self,
        file_name: impl Into<String>,
        addr: SocketAddr,
        outcome: Result<Vec<u8>, TransferError>,
    ) {
        lock(&self.outcomes)
            .entry((file_name.into(), addr))
            .or_default()
            .push_back(outcome);
    }

    /// Delay every download by `delay`, keeping transfers observably
    /// in flight.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Downloads requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, SocketAddr)> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl FileTransfer for ScriptedFileTransfer {
    async fn download_file(
        &self,
        file_name: &str,
        addr: SocketAddr,
    ) -> Result<Vec<u8>, TransferError> {
        lock(&self.requests).push((file_name.to_string(), addr));
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = lock(&self.outcomes)
            .get_mut(&(file_name.to_string(), addr))
            .and_then(VecDeque::pop_front);
        outcome.unwrap_or_else(|| {
            Err(TransferError::Failed {
                reason: format!("no scripted outcome for {file_name} from {addr}"),
            })
        })
    }
}

/// Magnet resolver stub replaying scripted outcomes per infohash.
#[derive(Default)]
pub struct StubMagnetResolver {
    outcomes: Mutex<HashMap<InfoHash, VecDeque<Result<TorrentDescriptor, MagnetError>>>>,
    requests: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    in_flight: Mutex<usize>,
    max_in_flight: Mutex<usize>,
}

impl StubMagnetResolver {
    /// Queue an outcome for the next resolution of `infohash`.
    pub fn script(&self, infohash: InfoHash, outcome: Result<TorrentDescriptor, MagnetError>) {
        lock(&self.outcomes)
            .entry(infohash)
            .or_default()
            .push_back(outcome);
    }

    /// Delay every resolution by `delay`, keeping lookups observably
    /// in flight.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Magnet URIs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    /// Highest number of resolutions observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        *lock(&self.max_in_flight)
    }
}

/// Extract the infohash from a `magnet:?xt=urn:btih:<hex>` URI.
#[must_use]
pub fn infohash_from_magnet(uri: &str) -> Option<InfoHash> {
    let hex = uri.split("urn:btih:").nth(1)?;
    let hex = hex.split('&').next()?;
    hex.parse().ok()
}

#[async_trait]
impl MagnetResolver for StubMagnetResolver {
    async fn retrieve(
        &self,
        magnet_uri: &str,
        _timeout: Duration,
    ) -> Result<TorrentDescriptor, MagnetError> {
        lock(&self.requests).push(magnet_uri.to_string());
        {
            let mut in_flight = lock(&self.in_flight);
            *in_flight += 1;
            let mut max = lock(&self.max_in_flight);
            *max = (*max).max(*in_flight);
        }
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        *lock(&self.in_flight) -= 1;
        let Some(infohash) = infohash_from_magnet(magnet_uri) else {
            return Err(MagnetError::Failed {
                infohash: InfoHash::from([0_u8; 20]),
                reason: format!("unparseable magnet uri {magnet_uri}"),
            });
        };
        let outcome = lock(&self.outcomes)
            .get_mut(&infohash)
            .and_then(VecDeque::pop_front);
        outcome.unwrap_or(Err(MagnetError::Timeout { infohash }))
    }
}

/// Overlay community recording every descriptor request it relays.
#[derive(Default)]
pub struct RecordingCommunity {
    requests: Mutex<Vec<(InfoHash, Candidate)>>,
}

impl RecordingCommunity {
    /// Requests relayed so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(InfoHash, Candidate)> {
        lock(&self.requests).clone()
    }
}

impl DescriptorBroadcast for RecordingCommunity {
    fn request_descriptor(&self, infohash: InfoHash, candidate: &Candidate) {
        lock(&self.requests).push((infohash, *candidate));
    }
}

/// Overlay directory exposing a fixed set of communities.
#[derive(Default)]
pub struct StaticOverlay {
    communities: Vec<Arc<dyn DescriptorBroadcast>>,
}

impl StaticOverlay {
    /// Directory containing the given communities.
    #[must_use]
    pub fn new(communities: Vec<Arc<dyn DescriptorBroadcast>>) -> Self {
        Self { communities }
    }
}

impl OverlayDirectory for StaticOverlay {
    fn search_communities(&self) -> Vec<Arc<dyn DescriptorBroadcast>> {
        self.communities.clone()
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    torrent_file: PathBuf,
    status: DescriptorStatus,
}

/// In-memory metadata store recording mutations for assertions.
#[derive(Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<HashMap<InfoHash, StoredRow>>,
    trackers: Mutex<HashMap<InfoHash, Vec<String>>>,
    collected_count: Mutex<Option<u64>>,
    free_space_calls: Mutex<Vec<u64>>,
}

impl MemoryMetadataStore {
    /// Pre-seed the tracker list for `infohash`.
    pub fn set_trackers(&self, infohash: InfoHash, trackers: Vec<String>) {
        lock(&self.trackers).insert(infohash, trackers);
    }

    /// Override the collected-descriptor count reported to the quota check.
    pub fn set_collected_count(&self, count: u64) {
        *lock(&self.collected_count) = Some(count);
    }

    /// Arguments of every `free_space` call so far, in order.
    #[must_use]
    pub fn free_space_calls(&self) -> Vec<u64> {
        lock(&self.free_space_calls).clone()
    }

    /// Stored descriptor file for `infohash`, if any row exists.
    #[must_use]
    pub fn torrent_file(&self, infohash: InfoHash) -> Option<PathBuf> {
        lock(&self.rows)
            .get(&infohash)
            .map(|row| row.torrent_file.clone())
    }

    /// Status recorded for `infohash`, if any row exists.
    #[must_use]
    pub fn status(&self, infohash: InfoHash) -> Option<DescriptorStatus> {
        lock(&self.rows).get(&infohash).map(|row| row.status)
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn has(&self, infohash: InfoHash) -> StoreResult<bool> {
        Ok(lock(&self.rows).contains_key(&infohash))
    }

    async fn update(&self, infohash: InfoHash, torrent_file: &Path) -> StoreResult<()> {
        if let Some(row) = lock(&self.rows).get_mut(&infohash) {
            row.torrent_file = torrent_file.to_path_buf();
        }
        Ok(())
    }

    async fn add_external(
        &self,
        descriptor: &TorrentDescriptor,
        torrent_file: &Path,
        status: DescriptorStatus,
    ) -> StoreResult<()> {
        lock(&self.rows).insert(
            descriptor.infohash,
            StoredRow {
                torrent_file: torrent_file.to_path_buf(),
                status,
            },
        );
        Ok(())
    }

    async fn trackers(&self, infohash: InfoHash) -> StoreResult<Vec<String>> {
        Ok(lock(&self.trackers)
            .get(&infohash)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_collected(&self) -> StoreResult<u64> {
        let explicit = *lock(&self.collected_count);
        Ok(explicit.unwrap_or_else(|| lock(&self.rows).len() as u64))
    }

    async fn free_space(&self, count: u64) -> StoreResult<u64> {
        lock(&self.free_space_calls).push(count);
        if let Some(remaining) = lock(&self.collected_count).as_mut() {
            *remaining = remaining.saturating_sub(count);
        }
        Ok(count)
    }
}
