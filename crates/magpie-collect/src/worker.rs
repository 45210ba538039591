//! Coordinator worker task.
//!
//! All requester state, callback registries, and quota bookkeeping live in
//! this single task. Commands arrive over one channel — facade calls,
//! scheduled wakes, and completions of spawned transport work alike — so
//! each handler runs to completion against a quiescent coordinator.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::collector::Collaborators;
use crate::command::{CollectorCommand, QueueId};
use crate::magnet::magnet_uri;
use crate::requester::{MagnetRequester, MessageRequester, TransferKind, TransferRequester};
use crate::stats::{CollectorStats, QueueFamily, QueueStats};
use crate::storage::CollectionStore;
use crate::tasks::TaskRegistry;
use magpie_core::{
    Candidate, Collected, CollectedCallback, CollectorSettings, DescriptorStatus, InfoHash,
    MagnetError, RequestKey, TorrentDescriptor, TransferError,
};
use magpie_events::{Event, EventBus};

const OVERFLOW_CHECK_TASK: &str = "overflow_check";
const FREE_SPACE_TASK: &str = "clean_until_done";
const FREE_SPACE_STEP_DELAY: Duration = Duration::from_secs(5);
const MIN_DELETIONS_PER_STEP: u64 = 25;

pub(crate) fn spawn(
    settings: CollectorSettings,
    deps: Collaborators,
    events: EventBus,
    commands: mpsc::Sender<CollectorCommand>,
    receiver: mpsc::Receiver<CollectorCommand>,
) {
    tokio::spawn(async move {
        Worker::new(settings, deps, events, commands)
            .run(receiver)
            .await;
    });
}

fn fire(callback: CollectedCallback, collected: Collected) {
    tokio::spawn(async move {
        callback(collected);
    });
}

struct Worker {
    settings: CollectorSettings,
    deps: Collaborators,
    events: EventBus,
    storage: CollectionStore,
    commands: mpsc::Sender<CollectorCommand>,
    tasks: TaskRegistry,
    torrent_requesters: BTreeMap<u8, TransferRequester>,
    message_requesters: BTreeMap<u8, MessageRequester>,
    magnet_requesters: BTreeMap<u8, MagnetRequester>,
    thumbnail_requester: TransferRequester,
    descriptor_callbacks: HashMap<InfoHash, Vec<CollectedCallback>>,
    thumbnail_callbacks: HashMap<InfoHash, Vec<CollectedCallback>>,
    num_torrents: u64,
}

impl Worker {
    fn new(
        settings: CollectorSettings,
        deps: Collaborators,
        events: EventBus,
        commands: mpsc::Sender<CollectorCommand>,
    ) -> Self {
        let storage = CollectionStore::new(&settings.collection_dir);
        let tasks = TaskRegistry::new(commands.clone());

        let mut magnet_requesters = BTreeMap::new();
        if settings.dht_collecting {
            for priority in 0..=1 {
                magnet_requesters.insert(
                    priority,
                    MagnetRequester::new(
                        priority,
                        settings.magnet_interval(),
                        settings.magnet_max_concurrent(),
                    ),
                );
            }
        }
        let thumbnail_requester =
            TransferRequester::new(TransferKind::Thumbnail, 0, settings.thumbnail_interval());

        Self {
            settings,
            deps,
            events,
            storage,
            commands,
            tasks,
            torrent_requesters: BTreeMap::new(),
            message_requesters: BTreeMap::new(),
            magnet_requesters,
            thumbnail_requester,
            descriptor_callbacks: HashMap::new(),
            thumbnail_callbacks: HashMap::new(),
            num_torrents: 0,
        }
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<CollectorCommand>) {
        if let Err(err) = self.storage.ensure_initialized().await {
            warn!(error = %err, "failed to prepare collection directory");
        }
        self.tasks.call_in_loop(
            OVERFLOW_CHECK_TASK,
            self.settings.overflow_check_interval,
            || CollectorCommand::CheckOverflow,
        );

        while let Some(command) = receiver.recv().await {
            if matches!(command, CollectorCommand::Shutdown) {
                self.tasks.cancel_all();
                info!("collector worker stopped");
                break;
            }
            self.handle(command).await;
        }
    }

    async fn handle(&mut self, command: CollectorCommand) {
        match command {
            CollectorCommand::DownloadTorrent {
                candidate,
                infohash,
                callback,
                priority,
                timeout,
            } => {
                self.handle_download_torrent(candidate, infohash, callback, priority, timeout);
            }
            CollectorCommand::DownloadTorrentMessage {
                candidate,
                infohash,
                callback,
                priority,
            } => {
                self.handle_download_torrent_message(candidate, infohash, callback, priority);
            }
            CollectorCommand::DownloadMetadata {
                candidate,
                infohash,
                subpath,
                callback,
                timeout,
            } => {
                self.handle_download_metadata(candidate, infohash, subpath, callback, timeout);
            }
            CollectorCommand::SaveTorrent {
                descriptor,
                callback,
            } => {
                self.save_torrent(*descriptor, callback).await;
            }
            CollectorCommand::DescriptorObserved { infohash } => {
                self.handle_descriptor_observed(infohash);
            }
            CollectorCommand::DeleteMetadata { subpath } => {
                self.handle_delete_metadata(&subpath).await;
            }
            CollectorCommand::SetMaxTorrents { max } => {
                self.handle_set_max_torrents(max);
            }
            CollectorCommand::RequesterWake { queue } => {
                self.handle_wake(queue).await;
            }
            CollectorCommand::EnqueueMagnet { infohash, priority } => {
                self.handle_enqueue_magnet(infohash, priority);
            }
            CollectorCommand::TransferFinished {
                queue,
                key,
                candidate,
                result,
            } => {
                self.handle_transfer_finished(queue, key, candidate, result)
                    .await;
            }
            CollectorCommand::MagnetResolved { priority, result } => {
                self.handle_magnet_resolved(priority, result).await;
            }
            CollectorCommand::CheckOverflow => {
                self.handle_check_overflow().await;
            }
            CollectorCommand::FreeSpaceStep {
                remaining,
                per_step,
                removed,
            } => {
                self.free_space_step(remaining, per_step, removed).await;
            }
            CollectorCommand::HasDescriptor {
                infohash,
                respond_to,
            } => {
                let _ = respond_to.send(self.storage.has_descriptor(infohash));
            }
            CollectorCommand::HasThumbnail { subpath, respond_to } => {
                let _ = respond_to.send(self.storage.has_thumbnail(&subpath));
            }
            CollectorCommand::QueryStats { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            CollectorCommand::Shutdown => {}
        }
    }

    fn handle_download_torrent(
        &mut self,
        candidate: Option<Candidate>,
        infohash: InfoHash,
        callback: Option<CollectedCallback>,
        priority: u8,
        timeout: Option<Duration>,
    ) {
        let priority = priority.min(1);
        if let Some(callback) = callback {
            self.descriptor_callbacks
                .entry(infohash)
                .or_default()
                .push(callback);
        }

        if self.storage.has_descriptor(infohash) {
            let path = self.storage.descriptor_path(infohash);
            debug!(infohash = %infohash, "descriptor already collected; notifying without transport");
            self.notify_descriptor(infohash, Some(path));
            return;
        }

        match candidate {
            None => {
                if self.magnet_requesters.is_empty() {
                    warn!(infohash = %infohash, "dropping candidate-less request: dht collecting disabled");
                    return;
                }
                let delay = self.settings.magnet_pre_delay * u32::from(priority);
                self.tasks.call_later(
                    format!("magnet_request {infohash}"),
                    delay,
                    CollectorCommand::EnqueueMagnet { infohash, priority },
                );
                debug!(infohash = %infohash, priority, "scheduled magnet attempt");
            }
            Some(candidate) => {
                let key = RequestKey::descriptor(infohash);
                // Reuse the cheapest requester already tracking this key.
                let chosen = (0..=priority)
                    .find(|level| {
                        self.torrent_requesters
                            .get(level)
                            .is_some_and(|requester| requester.has_requested(&key))
                    })
                    .unwrap_or(priority);
                let interval = self.settings.transfer_interval();
                let requester = self
                    .torrent_requesters
                    .entry(chosen)
                    .or_insert_with(|| {
                        TransferRequester::new(TransferKind::Descriptor, chosen, interval)
                    });
                let pace = requester.pace();
                if requester.add_request(key, candidate, timeout) {
                    self.schedule_wake(QueueId::Transfer(chosen), pace);
                }
                info!(
                    infohash = %infohash,
                    candidate = %candidate,
                    priority = chosen,
                    "queued descriptor transfer request"
                );
            }
        }
    }

    fn handle_download_torrent_message(
        &mut self,
        candidate: Candidate,
        infohash: InfoHash,
        callback: Option<CollectedCallback>,
        priority: u8,
    ) {
        let priority = priority.min(1);
        if let Some(callback) = callback {
            self.descriptor_callbacks
                .entry(infohash)
                .or_default()
                .push(callback);
        }
        let interval = self.settings.message_interval();
        let requester = self
            .message_requesters
            .entry(priority)
            .or_insert_with(|| MessageRequester::new(priority, interval));
        let pace = requester.queue.pace();
        if requester.queue.add_request(infohash, Some(candidate), None) {
            self.schedule_wake(QueueId::Message(priority), pace);
        }
        debug!(
            infohash = %infohash,
            candidate = %candidate,
            priority,
            "queued descriptor broadcast request"
        );
    }

    fn handle_download_metadata(
        &mut self,
        candidate: Candidate,
        infohash: InfoHash,
        subpath: String,
        callback: Option<CollectedCallback>,
        timeout: Option<Duration>,
    ) {
        let path = match self.storage.thumbnail_path(&subpath) {
            Ok(path) => path,
            Err(err) => {
                warn!(infohash = %infohash, error = %err, "rejecting thumbnail request");
                return;
            }
        };
        if path.is_file() {
            debug!(infohash = %infohash, subpath, "thumbnail already collected");
            return;
        }
        if let Some(callback) = callback {
            self.thumbnail_callbacks
                .entry(infohash)
                .or_default()
                .push(callback);
        }
        let key = RequestKey::thumbnail(infohash, subpath.clone());
        let pace = self.thumbnail_requester.pace();
        if self.thumbnail_requester.add_request(key, candidate, timeout) {
            self.schedule_wake(QueueId::Thumbnail, pace);
        }
        debug!(
            infohash = %infohash,
            subpath,
            candidate = %candidate,
            "queued thumbnail transfer request"
        );
    }

    async fn handle_wake(&mut self, queue: QueueId) {
        match queue {
            QueueId::Transfer(_) | QueueId::Thumbnail => self.wake_transfer(queue),
            QueueId::Message(priority) => self.wake_message(priority),
            QueueId::Magnet(priority) => self.wake_magnet(priority).await,
        }
    }

    fn wake_transfer(&mut self, queue: QueueId) {
        let Some(requester) = self.transfer_requester_mut(queue) else {
            return;
        };
        let Some((key, candidate)) = requester.begin_next() else {
            return;
        };
        requester.counters.made += 1;
        self.spawn_transfer(queue, key, candidate);
    }

    fn wake_message(&mut self, priority: u8) {
        let communities = self.deps.overlay.search_communities();
        let Some(requester) = self.message_requesters.get_mut(&priority) else {
            return;
        };
        let mut dispatched = false;
        if let Some((infohash, candidates)) = requester.queue.next_ready() {
            debug!(
                infohash = %infohash,
                candidates = candidates.len(),
                communities = communities.len(),
                "broadcasting descriptor request"
            );
            for candidate in &candidates {
                for community in &communities {
                    community.request_descriptor(infohash, candidate);
                    dispatched = true;
                }
            }
            if dispatched {
                requester.queue.counters.made += 1;
            }
        }
        let pace = requester.queue.pace();
        let drained = requester.queue.is_drained();
        if dispatched {
            self.schedule_wake(QueueId::Message(priority), pace);
        } else if !drained {
            self.schedule_wake(QueueId::Message(priority), Duration::ZERO);
        }
    }

    async fn wake_magnet(&mut self, priority: u8) {
        let next = {
            let Some(requester) = self.magnet_requesters.get_mut(&priority) else {
                return;
            };
            if requester.can_request() {
                requester.queue.next_ready().map(|(infohash, _)| infohash)
            } else {
                None
            }
        };

        let mut dispatched = false;
        if let Some(infohash) = next {
            dispatched = self.magnet_fetch(priority, infohash).await;
            if dispatched
                && let Some(requester) = self.magnet_requesters.get_mut(&priority)
            {
                requester.queue.counters.made += 1;
            }
        }

        let Some(requester) = self.magnet_requesters.get_mut(&priority) else {
            return;
        };
        let pace = requester.queue.pace();
        let saturated = !requester.can_request();
        let drained = requester.queue.is_drained();
        if dispatched || saturated {
            self.schedule_wake(QueueId::Magnet(priority), pace);
        } else if !drained {
            self.schedule_wake(QueueId::Magnet(priority), Duration::ZERO);
        }
    }

    async fn magnet_fetch(&mut self, priority: u8, infohash: InfoHash) -> bool {
        {
            let Some(requester) = self.magnet_requesters.get_mut(&priority) else {
                return false;
            };
            if !requester.mark_in_flight(infohash) {
                return false;
            }
        }

        if self.storage.has_descriptor(infohash) {
            let path = self.storage.descriptor_path(infohash);
            if let Some(requester) = self.magnet_requesters.get_mut(&priority) {
                requester.clear_in_flight(infohash);
                requester.queue.counters.on_disk += 1;
            }
            debug!(infohash = %infohash, "descriptor already on disk; skipping dht");
            self.notify_descriptor(infohash, Some(path));
            return true;
        }

        let trackers = match self.deps.store.trackers(infohash).await {
            Ok(trackers) => trackers,
            Err(err) => {
                warn!(infohash = %infohash, error = %err, "tracker lookup failed; using bare magnet");
                Vec::new()
            }
        };
        let uri = magnet_uri(infohash, &trackers);
        debug!(infohash = %infohash, priority, uri = %uri, "requesting magnet");

        let resolver = Arc::clone(&self.deps.magnet);
        let commands = self.commands.clone();
        let timeout = self.settings.magnet_retrieve_timeout;
        tokio::spawn(async move {
            let result = resolver.retrieve(&uri, timeout).await.map(Box::new);
            let _ = commands
                .send(CollectorCommand::MagnetResolved { priority, result })
                .await;
        });
        true
    }

    fn spawn_transfer(&self, queue: QueueId, key: RequestKey, candidate: Candidate) {
        debug!(key = %key, candidate = %candidate, queue = %queue, "starting file transfer");
        let transfer = Arc::clone(&self.deps.transfer);
        let commands = self.commands.clone();
        let file_name = key.transfer_name();
        tokio::spawn(async move {
            let result = transfer.download_file(&file_name, candidate.addr).await;
            let _ = commands
                .send(CollectorCommand::TransferFinished {
                    queue,
                    key,
                    candidate,
                    result,
                })
                .await;
        });
    }

    async fn handle_transfer_finished(
        &mut self,
        queue: QueueId,
        key: RequestKey,
        candidate: Candidate,
        result: Result<Vec<u8>, TransferError>,
    ) {
        let Some(requester) = self.transfer_requester_mut(queue) else {
            return;
        };
        if requester.current() != Some(&key) {
            debug!(key = %key, queue = %queue, "ignoring completion for a key no longer in flight");
            return;
        }
        let kind = requester.kind();

        match result {
            Ok(data) => {
                requester.counters.add_success();
                requester.counters.bytes += data.len() as u64;
                requester.clear_current();
                let pace = requester.pace();
                debug!(
                    key = %key,
                    candidate = %candidate,
                    bytes = data.len(),
                    "file transfer succeeded"
                );
                self.schedule_wake(queue, pace);

                match kind {
                    TransferKind::Descriptor => match self.deps.codec.decode(&data) {
                        Ok(descriptor) => self.save_torrent(descriptor, None).await,
                        Err(err) => {
                            warn!(key = %key, error = %err, "discarding undecodable descriptor");
                        }
                    },
                    TransferKind::Thumbnail => {
                        if let RequestKey::Thumbnail { infohash, subpath } = key {
                            self.save_metadata(infohash, &subpath, &data).await;
                        }
                    }
                }
            }
            Err(err) => {
                requester.counters.failed += 1;
                debug!(key = %key, candidate = %candidate, error = %err, "file transfer failed");
                let pace = requester.pace();
                let next = requester.next_candidate_after_failure(&key);
                if next.is_some() {
                    requester.counters.made += 1;
                } else {
                    requester.clear_current();
                }
                match next {
                    Some(next_candidate) => {
                        debug!(key = %key, candidate = %next_candidate, "trying next candidate");
                        self.spawn_transfer(queue, key, next_candidate);
                    }
                    None => self.schedule_wake(queue, pace),
                }
            }
        }
    }

    async fn handle_magnet_resolved(
        &mut self,
        priority: u8,
        result: Result<Box<TorrentDescriptor>, MagnetError>,
    ) {
        match result {
            Ok(descriptor) => {
                let infohash = descriptor.infohash;
                if let Some(requester) = self.magnet_requesters.get_mut(&priority) {
                    requester.clear_in_flight(infohash);
                    requester.queue.counters.add_success();
                    requester.queue.counters.bytes += descriptor.size_bytes();
                }
                debug!(infohash = %infohash, "received descriptor via magnet");
                self.save_torrent(*descriptor, None).await;
            }
            Err(err) => {
                let infohash = err.infohash();
                if let Some(requester) = self.magnet_requesters.get_mut(&priority) {
                    requester.clear_in_flight(infohash);
                    requester.queue.counters.failed += 1;
                }
                debug!(infohash = %infohash, error = %err, "magnet retrieval failed");
            }
        }
    }

    async fn save_torrent(
        &mut self,
        descriptor: TorrentDescriptor,
        callback: Option<CollectedCallback>,
    ) {
        let infohash = descriptor.infohash;
        let path = self.storage.descriptor_path(infohash);

        if self.storage.has_descriptor(infohash) {
            debug!(infohash = %infohash, "descriptor already collected; skipping persist");
            if let Some(callback) = callback {
                fire(
                    callback,
                    Collected {
                        infohash,
                        path: Some(path),
                    },
                );
            }
            return;
        }

        if let Err(err) = self.storage.persist_descriptor(&descriptor).await {
            warn!(infohash = %infohash, error = %err, "failed to persist descriptor");
            return;
        }

        let upserted = match self.deps.store.has(infohash).await {
            Ok(true) => self.deps.store.update(infohash, &path).await,
            Ok(false) => {
                self.deps
                    .store
                    .add_external(&descriptor, &path, DescriptorStatus::Good)
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = upserted {
            warn!(infohash = %infohash, error = %err, "metadata store upsert failed");
            return;
        }

        info!(infohash = %infohash, path = %path.display(), "descriptor collected");
        self.events.publish(Event::DescriptorCollected {
            infohash: infohash.to_hex(),
            path: path.display().to_string(),
        });
        self.notify_descriptor(infohash, Some(path.clone()));
        if let Some(callback) = callback {
            fire(
                callback,
                Collected {
                    infohash,
                    path: Some(path),
                },
            );
        }
    }

    async fn save_metadata(&mut self, infohash: InfoHash, subpath: &str, data: &[u8]) {
        let path = match self.storage.persist_thumbnail(subpath, data).await {
            Ok(path) => path,
            Err(err) => {
                warn!(infohash = %infohash, subpath, error = %err, "failed to persist thumbnail");
                return;
            }
        };
        debug!(infohash = %infohash, path = %path.display(), "thumbnail collected");
        self.events.publish(Event::ThumbnailCollected {
            infohash: infohash.to_hex(),
            path: path.display().to_string(),
        });
        if let Some(callbacks) = self.thumbnail_callbacks.remove(&infohash) {
            for callback in callbacks {
                fire(
                    callback,
                    Collected {
                        infohash,
                        path: Some(path.clone()),
                    },
                );
            }
        }
    }

    fn handle_descriptor_observed(&mut self, infohash: InfoHash) {
        debug!(infohash = %infohash, "descriptor observed via overlay side channel");
        self.events.publish(Event::DescriptorObserved {
            infohash: infohash.to_hex(),
        });
        self.notify_descriptor(infohash, None);
    }

    /// Drain the descriptor callback registry for `infohash` and tell the
    /// queues that can stop looking to forget the key: magnet queues when a
    /// file was produced, message queues when the descriptor arrived through
    /// a side channel.
    fn notify_descriptor(&mut self, infohash: InfoHash, path: Option<PathBuf>) {
        if let Some(callbacks) = self.descriptor_callbacks.remove(&infohash) {
            debug!(
                infohash = %infohash,
                callbacks = callbacks.len(),
                "firing descriptor callbacks"
            );
            for callback in callbacks {
                fire(
                    callback,
                    Collected {
                        infohash,
                        path: path.clone(),
                    },
                );
            }
        }
        if path.is_some() {
            for requester in self.magnet_requesters.values_mut() {
                if requester.queue.has_requested(infohash) {
                    requester.queue.remove_request(infohash);
                }
            }
        } else {
            for requester in self.message_requesters.values_mut() {
                if requester.queue.has_requested(infohash) {
                    requester.queue.remove_request(infohash);
                }
            }
        }
    }

    async fn handle_delete_metadata(&mut self, subpath: &str) {
        match self.storage.delete_thumbnail(subpath).await {
            Ok(path) => debug!(path = %path.display(), "thumbnail deleted"),
            Err(err) => warn!(subpath, error = %err, "thumbnail deletion refused"),
        }
    }

    fn handle_set_max_torrents(&mut self, max: u64) {
        if max == 0 {
            warn!("ignoring zero descriptor quota");
            return;
        }
        info!(max, "descriptor quota updated");
        self.settings.max_num_torrents = max;
    }

    fn handle_enqueue_magnet(&mut self, infohash: InfoHash, priority: u8) {
        let Some(requester) = self.magnet_requesters.get_mut(&priority) else {
            warn!(infohash = %infohash, "dropping magnet attempt: dht collecting disabled");
            return;
        };
        let pace = requester.queue.pace();
        if requester.queue.add_request(infohash, None, None) {
            self.schedule_wake(QueueId::Magnet(priority), pace);
        }
    }

    async fn handle_check_overflow(&mut self) {
        let collected = match self.deps.store.count_collected().await {
            Ok(collected) => collected,
            Err(err) => {
                warn!(error = %err, "overflow check failed");
                return;
            }
        };
        self.num_torrents = collected;
        let limit = self.settings.max_num_torrents;
        debug!(collected, limit, "overflow check");
        if collected <= limit {
            return;
        }

        let keep = u64::try_from(u128::from(limit) * 95 / 100).unwrap_or(limit);
        let num_delete = collected - keep;
        let per_step = (num_delete / 180).max(MIN_DELETIONS_PER_STEP);
        info!(
            collected,
            limit, num_delete, per_step, "collection over quota; starting eviction sweep"
        );
        self.events.publish(Event::QuotaSweepStarted {
            collected,
            limit,
            removing: num_delete,
        });
        self.free_space_step(num_delete, per_step, 0).await;
    }

    async fn free_space_step(&mut self, remaining: u64, per_step: u64, removed: u64) {
        let take = remaining.min(per_step);
        if let Err(err) = self.deps.store.free_space(take).await {
            warn!(error = %err, "eviction step failed; abandoning sweep");
            return;
        }
        let removed = removed + take;
        let remaining = remaining - take;
        if remaining > 0 {
            self.tasks.call_later(
                FREE_SPACE_TASK,
                FREE_SPACE_STEP_DELAY,
                CollectorCommand::FreeSpaceStep {
                    remaining,
                    per_step,
                    removed,
                },
            );
        } else {
            debug!(removed, "eviction sweep finished");
            self.events.publish(Event::QuotaSweepFinished { removed });
        }
    }

    fn schedule_wake(&mut self, queue: QueueId, delay: Duration) {
        self.tasks.call_later(
            format!("wake {queue}"),
            delay,
            CollectorCommand::RequesterWake { queue },
        );
    }

    fn transfer_requester_mut(&mut self, queue: QueueId) -> Option<&mut TransferRequester> {
        match queue {
            QueueId::Transfer(priority) => self.torrent_requesters.get_mut(&priority),
            QueueId::Thumbnail => Some(&mut self.thumbnail_requester),
            QueueId::Message(_) | QueueId::Magnet(_) => None,
        }
    }

    fn snapshot(&self) -> CollectorStats {
        let mut queues = Vec::new();
        for (priority, requester) in &self.torrent_requesters {
            queues.push(QueueStats {
                family: QueueFamily::Torrent,
                priority: *priority,
                backlog: requester.backlog(),
                counters: requester.counters.clone(),
            });
        }
        for requester in self.message_requesters.values() {
            queues.push(QueueStats {
                family: QueueFamily::Message,
                priority: requester.queue.priority(),
                backlog: requester.queue.backlog(),
                counters: requester.queue.counters.clone(),
            });
        }
        for requester in self.magnet_requesters.values() {
            queues.push(QueueStats {
                family: QueueFamily::Magnet,
                priority: requester.queue.priority(),
                backlog: requester.queue.backlog(),
                counters: requester.queue.counters.clone(),
            });
        }
        queues.push(QueueStats {
            family: QueueFamily::Thumbnail,
            priority: self.thumbnail_requester.priority(),
            backlog: self.thumbnail_requester.backlog(),
            counters: self.thumbnail_requester.counters.clone(),
        });
        CollectorStats {
            queues,
            collected: self.num_torrents,
        }
    }
}
