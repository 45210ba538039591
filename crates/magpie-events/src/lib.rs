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

//! Domain event bus for the magpie collection pipeline.
//!
//! Components publish typed events (descriptor collected, thumbnail stored,
//! quota sweeps) and any number of subscribers observe them. The bus wraps a
//! `tokio::broadcast` channel; a slow subscriber that lags simply skips ahead
//! to the oldest retained event instead of stalling publishers.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::sync::broadcast::{Receiver, Sender};
use tracing::debug;

/// Sequential identifier assigned to each published event.
pub type EventId = u64;

const DEFAULT_CAPACITY: usize = 256;

/// Typed events surfaced by the collection pipeline.
///
/// Infohashes are carried as lowercase hex so events serialize cleanly for
/// downstream consumers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A torrent descriptor was persisted to the collection directory.
    DescriptorCollected {
        /// Lowercase hex infohash of the descriptor.
        infohash: String,
        /// Path of the stored `.torrent` file.
        path: String,
    },
    /// A descriptor for a tracked infohash arrived through an overlay side
    /// channel rather than through a managed download.
    DescriptorObserved {
        /// Lowercase hex infohash that was observed.
        infohash: String,
    },
    /// A thumbnail asset was persisted under the collection directory.
    ThumbnailCollected {
        /// Lowercase hex infohash the thumbnail belongs to.
        infohash: String,
        /// Path of the stored thumbnail file.
        path: String,
    },
    /// The quota check found the collection over its limit and started a
    /// step-wise eviction sweep.
    QuotaSweepStarted {
        /// Number of descriptors currently collected.
        collected: u64,
        /// Configured descriptor limit.
        limit: u64,
        /// Number of descriptors the sweep will remove.
        removing: u64,
    },
    /// A previously started eviction sweep issued its final deletion step.
    QuotaSweepFinished {
        /// Total number of descriptors removed by the sweep.
        removed: u64,
    },
}

impl Event {
    /// Machine-friendly discriminator for log lines and wire consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DescriptorCollected { .. } => "descriptor_collected",
            Self::DescriptorObserved { .. } => "descriptor_observed",
            Self::ThumbnailCollected { .. } => "thumbnail_collected",
            Self::QuotaSweepStarted { .. } => "quota_sweep_started",
            Self::QuotaSweepFinished { .. } => "quota_sweep_finished",
        }
    }
}

/// Envelope pairing an event with its identifier and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned by the bus.
    pub id: EventId,
    /// Timestamp recorded when the event was published.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Shared broadcast bus for collection events.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a bus retaining up to `capacity` undelivered events per
    /// subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default retention capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Publish an event, assigning it the next sequential identifier.
    ///
    /// Events published while no subscriber is attached are dropped.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        if self.sender.send(envelope).is_err() {
            debug!(event_id = id, "event published without subscribers");
        }
        id
    }

    /// Subscribe to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of events observed by a single subscriber.
pub struct EventStream {
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, or `None` once every publisher is gone.
    ///
    /// A subscriber that lagged past the retention window resumes at the
    /// oldest retained event.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event subscriber lagged; resuming");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collected(id: u64) -> Event {
        Event::DescriptorCollected {
            infohash: format!("{id:040x}"),
            path: format!("/collected/{id:040x}.torrent"),
        }
    }

    #[test]
    fn event_kinds_cover_all_variants() {
        let events = [
            collected(1),
            Event::DescriptorObserved {
                infohash: "00".repeat(20),
            },
            Event::ThumbnailCollected {
                infohash: "00".repeat(20),
                path: "/collected/thumbs/cover.png".to_string(),
            },
            Event::QuotaSweepStarted {
                collected: 1_200,
                limit: 1_000,
                removing: 250,
            },
            Event::QuotaSweepFinished { removed: 250 },
        ];
        let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "descriptor_collected",
                "descriptor_observed",
                "thumbnail_collected",
                "quota_sweep_started",
                "quota_sweep_finished",
            ]
        );
    }

    #[tokio::test]
    async fn identifiers_are_sequential() {
        let bus = EventBus::with_capacity(8);
        let mut stream = bus.subscribe();

        for id in 0..3 {
            let _ = bus.publish(collected(id));
        }

        for expected in 1..=3 {
            let envelope = stream.next().await.expect("stream closed early");
            assert_eq!(envelope.id, expected);
        }
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_to_retained_events() {
        let bus = EventBus::with_capacity(2);
        let mut stream = bus.subscribe();

        for id in 0..5 {
            let _ = bus.publish(collected(id));
        }

        // The two newest events survive; everything older was dropped.
        let first = stream.next().await.expect("stream closed early");
        assert_eq!(first.id, 4);
        let second = stream.next().await.expect("stream closed early");
        assert_eq!(second.id, 5);
    }

    #[tokio::test]
    async fn stream_ends_when_bus_is_dropped() {
        let mut stream = {
            let bus = EventBus::with_capacity(1);
            bus.subscribe()
        };
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(collected(0)), 1);
    }
}
