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
#![allow(clippy::cast_possible_truncation)]

//! Remote torrent and metadata acquisition coordinator.
//!
//! Given an infohash and zero or more peer candidates, the [`Collector`]
//! acquires the corresponding `.torrent` descriptor — over the overlay
//! message transport, the file-transfer transport, or a DHT magnet lookup —
//! stores it in the collection directory, indexes it in the metadata
//! database, enforces a disk quota, and notifies subscribers. Thumbnail
//! assets ride the same file-transfer machinery.
//!
//! Acquisition runs through per-priority requesters, each a paced FIFO queue
//! bound to one transport: demand for the same key is coalesced, candidates
//! fail over in arrival order, and every requester survives arbitrary
//! per-request failures without stalling its queue.

mod collector;
mod command;
mod error;
mod magnet;
mod requester;
mod stats;
mod storage;
mod tasks;
mod worker;

pub use collector::{Collaborators, Collector};
pub use error::{CollectError, CollectResult};
pub use stats::{CollectorStats, QueueFamily, QueueStats, QueueSummary, RequesterCounters};
