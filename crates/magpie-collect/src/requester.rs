//! Per-priority requester state machines.
//!
//! Each requester is plain data driven by the worker task: wakes, transfer
//! completions, and fan-out notifications all arrive as commands, so every
//! method here runs to completion before any other coordinator state moves.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::stats::RequesterCounters;
use magpie_core::{Candidate, InfoHash, RequestKey};

#[derive(Debug, Clone, Copy)]
struct QueuedKey {
    infohash: InfoHash,
    deadline: Option<Instant>,
}

impl QueuedKey {
    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

/// FIFO queue with per-key candidate deduplication and paced wakes, shared by
/// the overlay-message and magnet requesters.
#[derive(Debug)]
pub(crate) struct PacedQueue {
    priority: u8,
    interval: Duration,
    queue: VecDeque<QueuedKey>,
    sources: HashMap<InfoHash, Vec<Candidate>>,
    pub(crate) counters: RequesterCounters,
}

impl PacedQueue {
    fn new(priority: u8, interval: Duration, counters: RequesterCounters) -> Self {
        Self {
            priority,
            interval,
            queue: VecDeque::new(),
            sources: HashMap::new(),
            counters,
        }
    }

    /// Delay between consecutive wakes of this queue.
    pub(crate) fn pace(&self) -> Duration {
        self.interval * u32::from(self.priority)
    }

    /// Enqueue a request, recording each new candidate exactly once. Returns
    /// whether the queue was empty and a wake must be scheduled.
    pub(crate) fn add_request(
        &mut self,
        infohash: InfoHash,
        candidate: Option<Candidate>,
        timeout: Option<Duration>,
    ) -> bool {
        let was_empty = self.queue.is_empty();
        let entry = self.sources.entry(infohash).or_default();
        if let Some(candidate) = candidate
            && !entry.contains(&candidate)
        {
            entry.push(candidate);
        }
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        self.queue.push_back(QueuedKey { infohash, deadline });
        was_empty
    }

    /// Whether the key is currently tracked.
    pub(crate) fn has_requested(&self, infohash: InfoHash) -> bool {
        self.sources.contains_key(&infohash)
    }

    /// Drop a tracked key; stale queue entries are skipped at dequeue time.
    pub(crate) fn remove_request(&mut self, infohash: InfoHash) -> bool {
        self.sources.remove(&infohash).is_some()
    }

    /// Pop the next live key and its candidate snapshot, dropping keys whose
    /// deadline passed or that were cancelled.
    pub(crate) fn next_ready(&mut self) -> Option<(InfoHash, Vec<Candidate>)> {
        let now = Instant::now();
        while let Some(entry) = self.queue.pop_front() {
            if entry.expired(now) {
                debug!(infohash = %entry.infohash, "dropping expired request");
                self.sources.remove(&entry.infohash);
                continue;
            }
            if let Some(candidates) = self.sources.remove(&entry.infohash) {
                return Some((entry.infohash, candidates));
            }
        }
        None
    }

    /// Number of keys currently tracked.
    pub(crate) fn backlog(&self) -> usize {
        self.sources.len()
    }

    /// Whether nothing remains queued.
    pub(crate) fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) const fn priority(&self) -> u8 {
        self.priority
    }
}

/// Requester broadcasting descriptor requests over overlay communities.
///
/// The transport has no completion signal, so successes stay untracked.
#[derive(Debug)]
pub(crate) struct MessageRequester {
    pub(crate) queue: PacedQueue,
}

impl MessageRequester {
    pub(crate) fn new(priority: u8, interval: Duration) -> Self {
        Self {
            queue: PacedQueue::new(priority, interval, RequesterCounters::untracked()),
        }
    }
}

/// Requester resolving descriptors through the DHT, with a cap on in-flight
/// lookups.
#[derive(Debug)]
pub(crate) struct MagnetRequester {
    pub(crate) queue: PacedQueue,
    in_flight: HashSet<InfoHash>,
    max_concurrent: usize,
}

impl MagnetRequester {
    pub(crate) fn new(priority: u8, interval: Duration, max_concurrent: usize) -> Self {
        Self {
            queue: PacedQueue::new(priority, interval, RequesterCounters::tracked()),
            in_flight: HashSet::new(),
            max_concurrent,
        }
    }

    /// Whether another lookup may start right now.
    pub(crate) fn can_request(&self) -> bool {
        self.in_flight.len() < self.max_concurrent
    }

    /// Mark a lookup in flight; false when one is already running for the
    /// key.
    pub(crate) fn mark_in_flight(&mut self, infohash: InfoHash) -> bool {
        self.in_flight.insert(infohash)
    }

    /// Clear the in-flight mark after a lookup resolves either way.
    pub(crate) fn clear_in_flight(&mut self, infohash: InfoHash) {
        self.in_flight.remove(&infohash);
    }
}

/// Asset kind a file-transfer requester is dedicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferKind {
    /// `.torrent` descriptors.
    Descriptor,
    /// Thumbnail assets.
    Thumbnail,
}

/// Requester downloading descriptors or thumbnails over the file-transfer
/// transport, one key in flight at a time, failing over through each key's
/// untried candidates.
#[derive(Debug)]
pub(crate) struct TransferRequester {
    kind: TransferKind,
    priority: u8,
    interval: Duration,
    pending: VecDeque<RequestKey>,
    untried: HashMap<RequestKey, VecDeque<Candidate>>,
    tried: HashMap<RequestKey, VecDeque<Candidate>>,
    deadlines: HashMap<RequestKey, Option<Instant>>,
    in_flight: Option<RequestKey>,
    pub(crate) counters: RequesterCounters,
}

impl TransferRequester {
    pub(crate) fn new(kind: TransferKind, priority: u8, interval: Duration) -> Self {
        Self {
            kind,
            priority,
            interval,
            pending: VecDeque::new(),
            untried: HashMap::new(),
            tried: HashMap::new(),
            deadlines: HashMap::new(),
            in_flight: None,
            counters: RequesterCounters::tracked(),
        }
    }

    pub(crate) const fn kind(&self) -> TransferKind {
        self.kind
    }

    pub(crate) const fn priority(&self) -> u8 {
        self.priority
    }

    /// Delay between consecutive wakes of this requester.
    pub(crate) fn pace(&self) -> Duration {
        self.interval * u32::from(self.priority)
    }

    /// Whether the key is currently tracked.
    pub(crate) fn has_requested(&self, key: &RequestKey) -> bool {
        self.untried.contains_key(key)
    }

    /// Keys currently waiting, the in-flight head included.
    pub(crate) fn backlog(&self) -> usize {
        self.pending.len()
    }

    /// Key whose transfer is currently in flight, if any.
    pub(crate) fn current(&self) -> Option<&RequestKey> {
        self.in_flight.as_ref()
    }

    /// Enqueue a request. For a key already pending, the candidate is
    /// appended only if it was never tried or queued for that key. Returns
    /// whether the queue was empty and a wake must be scheduled.
    pub(crate) fn add_request(
        &mut self,
        key: RequestKey,
        candidate: Candidate,
        timeout: Option<Duration>,
    ) -> bool {
        let was_empty = self.pending.is_empty();
        if let Some(untried) = self.untried.get_mut(&key) {
            let tried = self.tried.entry(key).or_default();
            if !untried.contains(&candidate) && !tried.contains(&candidate) {
                untried.push_back(candidate);
            }
        } else {
            self.untried.insert(key.clone(), VecDeque::from([candidate]));
            self.tried.insert(key.clone(), VecDeque::new());
            self.deadlines
                .insert(key.clone(), timeout.map(|timeout| Instant::now() + timeout));
            self.pending.push_back(key);
        }
        was_empty
    }

    /// Start the next transfer: skip expired head keys, then move the head
    /// key's first untried candidate to `tried` and mark it in flight.
    pub(crate) fn begin_next(&mut self) -> Option<(RequestKey, Candidate)> {
        if self.in_flight.is_some() {
            return None;
        }
        let now = Instant::now();
        loop {
            let key = self.pending.front()?.clone();
            let expired = self
                .deadlines
                .get(&key)
                .copied()
                .flatten()
                .is_some_and(|deadline| now > deadline);
            if expired {
                debug!(key = %key, "dropping expired request");
                self.drop_head(&key);
                continue;
            }
            let Some(candidate) = self
                .untried
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
            else {
                self.drop_head(&key);
                continue;
            };
            if let Some(tried) = self.tried.get_mut(&key) {
                tried.push_back(candidate);
            }
            self.in_flight = Some(key.clone());
            return Some((key, candidate));
        }
    }

    /// After a failure, move the head key's next untried candidate to
    /// `tried` for an immediate retry; the key stays in flight.
    pub(crate) fn next_candidate_after_failure(&mut self, key: &RequestKey) -> Option<Candidate> {
        let candidate = self.untried.get_mut(key).and_then(VecDeque::pop_front)?;
        if let Some(tried) = self.tried.get_mut(key) {
            tried.push_back(candidate);
        }
        Some(candidate)
    }

    /// Forget the in-flight key entirely, after success or candidate
    /// exhaustion.
    pub(crate) fn clear_current(&mut self) {
        if let Some(key) = self.in_flight.take() {
            if self.pending.front() == Some(&key) {
                self.pending.pop_front();
            } else {
                self.pending.retain(|pending| pending != &key);
            }
            self.untried.remove(&key);
            self.tried.remove(&key);
            self.deadlines.remove(&key);
        }
    }

    fn drop_head(&mut self, key: &RequestKey) {
        self.pending.pop_front();
        self.untried.remove(key);
        self.tried.remove(key);
        self.deadlines.remove(key);
    }
}
