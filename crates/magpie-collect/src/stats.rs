//! Aggregate status reporting for the coordinator's request queues.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Which acquisition transport a queue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFamily {
    /// File-transfer descriptor queues.
    Torrent,
    /// Overlay-message broadcast queues.
    Message,
    /// DHT magnet queues.
    Magnet,
    /// The thumbnail file-transfer queue.
    Thumbnail,
}

impl QueueFamily {
    /// Short name used in log lines and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Torrent => "torrents",
            Self::Message => "messages",
            Self::Magnet => "magnets",
            Self::Thumbnail => "thumbnails",
        }
    }
}

impl fmt::Display for QueueFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counters kept by every requester.
#[derive(Debug, Clone, Serialize)]
pub struct RequesterCounters {
    /// Requests dispatched to a transport.
    pub made: u64,
    /// Successful acquisitions, or `None` when the transport offers no
    /// completion signal of its own.
    pub success: Option<u64>,
    /// Failed attempts.
    pub failed: u64,
    /// Requests satisfied from the collection directory without touching a
    /// transport.
    pub on_disk: u64,
    /// Bytes received over the transport.
    pub bytes: u64,
}

impl RequesterCounters {
    /// Counters for a transport with a completion signal.
    #[must_use]
    pub(crate) const fn tracked() -> Self {
        Self {
            made: 0,
            success: Some(0),
            failed: 0,
            on_disk: 0,
            bytes: 0,
        }
    }

    /// Counters for a transport whose successes cannot be observed.
    #[must_use]
    pub(crate) const fn untracked() -> Self {
        Self {
            made: 0,
            success: None,
            failed: 0,
            on_disk: 0,
            bytes: 0,
        }
    }

    pub(crate) fn add_success(&mut self) {
        if let Some(success) = self.success.as_mut() {
            *success += 1;
        }
    }
}

/// Snapshot of one requester.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Transport family the queue belongs to.
    pub family: QueueFamily,
    /// Priority level of the queue.
    pub priority: u8,
    /// Keys currently waiting in the queue.
    pub backlog: usize,
    /// Lifetime counters.
    pub counters: RequesterCounters,
}

/// Aggregated success figures for one queue family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    /// Transport family the summary covers.
    pub family: QueueFamily,
    /// Successful acquisitions.
    pub success: u64,
    /// Requests dispatched but not yet resolved.
    pub pending: u64,
    /// Requests satisfied from disk.
    pub on_disk: u64,
    /// Failed attempts.
    pub failed: u64,
}

/// Point-in-time view over every queue the coordinator runs.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStats {
    /// One entry per live requester.
    pub queues: Vec<QueueStats>,
    /// Collected descriptors as of the last quota check.
    pub collected: u64,
}

impl CollectorStats {
    /// Backlog sizes per family and priority, omitting idle queues.
    #[must_use]
    pub fn backlogs(&self) -> BTreeMap<QueueFamily, BTreeMap<u8, usize>> {
        let mut out: BTreeMap<QueueFamily, BTreeMap<u8, usize>> = BTreeMap::new();
        for queue in &self.queues {
            if queue.backlog > 0 {
                out.entry(queue.family)
                    .or_default()
                    .insert(queue.priority, queue.backlog);
            }
        }
        out
    }

    /// Success/pending/failed/on-disk aggregates per family, skipping
    /// families whose transport reports no completions.
    #[must_use]
    pub fn success_summary(&self) -> Vec<QueueSummary> {
        let mut out: BTreeMap<QueueFamily, QueueSummary> = BTreeMap::new();
        for queue in &self.queues {
            let Some(success) = queue.counters.success else {
                continue;
            };
            let entry = out.entry(queue.family).or_insert(QueueSummary {
                family: queue.family,
                success: 0,
                pending: 0,
                on_disk: 0,
                failed: 0,
            });
            let requests = queue.counters.made.saturating_sub(queue.counters.on_disk);
            entry.success += success;
            entry.pending += requests
                .saturating_sub(success)
                .saturating_sub(queue.counters.failed);
            entry.on_disk += queue.counters.on_disk;
            entry.failed += queue.counters.failed;
        }
        out.into_values().collect()
    }

    /// Bytes transferred per family, omitting families that moved nothing.
    #[must_use]
    pub fn bandwidth(&self) -> BTreeMap<QueueFamily, u64> {
        let mut out: BTreeMap<QueueFamily, u64> = BTreeMap::new();
        for queue in &self.queues {
            if queue.counters.bytes > 0 {
                *out.entry(queue.family).or_default() += queue.counters.bytes;
            }
        }
        out
    }
}
