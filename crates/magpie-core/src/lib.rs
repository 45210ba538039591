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

//! Domain model and collaborator contracts for remote torrent collection.
//!
//! This crate defines the identifiers and payloads that flow through the
//! acquisition pipeline, the traits behind which the overlay, file-transfer,
//! DHT, parser, and database collaborators live, and the validated runtime
//! settings shared by the coordinator.

pub mod config;
pub mod error;
pub mod model;
pub mod service;

pub use config::CollectorSettings;
pub use error::{
    CodecError, MagnetError, ModelError, SettingsError, StoreError, StoreResult, TransferError,
};
pub use model::{
    Candidate, Collected, CollectedCallback, DescriptorStatus, INFOHASH_LENGTH, InfoHash,
    RequestKey, TorrentDescriptor,
};
pub use service::{
    DescriptorBroadcast, DescriptorCodec, FileTransfer, MagnetResolver, MetadataStore,
    OverlayDirectory,
};
