//! Identifiers and payloads that flow through the acquisition pipeline.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;

/// Byte length of a swarm content identifier.
pub const INFOHASH_LENGTH: usize = 20;

/// Fixed-width 20-byte content identifier naming a swarm.
///
/// Equality and hashing are byte-wise; the display form is lowercase hex,
/// which is also how the identifier appears in file names and magnet URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; INFOHASH_LENGTH]);

impl InfoHash {
    /// Borrow the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; INFOHASH_LENGTH] {
        &self.0
    }

    /// Render the identifier as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(INFOHASH_LENGTH * 2);
        for byte in self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl From<[u8; INFOHASH_LENGTH]> for InfoHash {
    fn from(bytes: [u8; INFOHASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for InfoHash {
    type Error = ModelError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let fixed: [u8; INFOHASH_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| ModelError::InvalidInfoHash {
                    actual: bytes.len(),
                })?;
        Ok(Self(fixed))
    }
}

impl FromStr for InfoHash {
    type Err = ModelError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.len() != INFOHASH_LENGTH * 2 || !input.is_ascii() {
            return Err(ModelError::InvalidHex {
                input: input.to_string(),
            });
        }
        let mut bytes = [0_u8; INFOHASH_LENGTH];
        for (i, chunk) in input.as_bytes().chunks_exact(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| ModelError::InvalidHex {
                input: input.to_string(),
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| ModelError::InvalidHex {
                input: input.to_string(),
            })?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// Reachable remote peer offering an asset.
///
/// Opaque to the pipeline beyond its socket address; the overlay layer may
/// round-trip richer peer handles through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Socket address the peer is reachable at.
    pub addr: SocketAddr,
}

impl Candidate {
    /// Construct a candidate from a socket address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Identity of one acquirable asset: a bare descriptor or a thumbnail
/// addressed by its relative subpath.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKey {
    /// The `.torrent` descriptor for an infohash.
    Descriptor {
        /// Infohash naming the swarm.
        infohash: InfoHash,
    },
    /// A thumbnail asset associated with an infohash.
    Thumbnail {
        /// Infohash the thumbnail belongs to.
        infohash: InfoHash,
        /// Relative path of the asset below the collection directory.
        subpath: String,
    },
}

impl RequestKey {
    /// Build a descriptor key.
    #[must_use]
    pub const fn descriptor(infohash: InfoHash) -> Self {
        Self::Descriptor { infohash }
    }

    /// Build a thumbnail key.
    pub fn thumbnail(infohash: InfoHash, subpath: impl Into<String>) -> Self {
        Self::Thumbnail {
            infohash,
            subpath: subpath.into(),
        }
    }

    /// Infohash the key refers to.
    #[must_use]
    pub const fn infohash(&self) -> InfoHash {
        match self {
            Self::Descriptor { infohash } | Self::Thumbnail { infohash, .. } => *infohash,
        }
    }

    /// Name under which the asset travels on the file-transfer transport:
    /// the thumbnail subpath, or `<hex>.torrent` for descriptors.
    #[must_use]
    pub fn transfer_name(&self) -> String {
        match self {
            Self::Descriptor { infohash } => format!("{infohash}.torrent"),
            Self::Thumbnail { subpath, .. } => subpath.clone(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor { infohash } => write!(f, "{infohash}"),
            Self::Thumbnail { infohash, subpath } => write!(f, "{infohash}/{subpath}"),
        }
    }
}

/// Parsed torrent descriptor together with its verbatim encoding.
///
/// Parsing happens behind the [`crate::service::DescriptorCodec`] seam; the
/// pipeline persists `raw` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentDescriptor {
    /// Infohash the descriptor describes.
    pub infohash: InfoHash,
    /// Display name from the descriptor, when present.
    pub name: Option<String>,
    /// Tracker URLs announced by the descriptor.
    pub trackers: Vec<String>,
    /// Verbatim descriptor bytes as fetched.
    #[serde(default)]
    pub raw: Vec<u8>,
}

impl TorrentDescriptor {
    /// Size of the encoded descriptor in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.raw.len() as u64
    }
}

/// Health recorded for a descriptor row in the metadata database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorStatus {
    /// Descriptor verified and usable.
    #[default]
    Good,
    /// Descriptor known to be stale or unreachable.
    Dead,
    /// Health not yet established.
    Unknown,
}

/// Payload delivered to a registered acquisition callback.
///
/// `path` is the stored file for descriptors and thumbnails, and `None` when
/// the descriptor arrived through an overlay side channel and was never
/// written by this pipeline.
#[derive(Debug, Clone)]
pub struct Collected {
    /// Infohash the acquisition was registered under.
    pub infohash: InfoHash,
    /// Stored file path, when the pipeline produced one.
    pub path: Option<PathBuf>,
}

/// One-shot callback fired the first time an acquisition succeeds.
pub type CollectedCallback = Box<dyn FnOnce(Collected) + Send + 'static>;
