//! End-to-end coordinator tests against stub collaborators.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use magpie_collect::{Collaborators, Collector, QueueFamily};
use magpie_core::{Collected, CollectedCallback, CollectorSettings, InfoHash, TransferError};
use magpie_events::{Event, EventBus, EventStream};
use magpie_test_support::{
    JsonDescriptorCodec, MemoryMetadataStore, RecordingCommunity, ScriptedFileTransfer,
    StaticOverlay, StubMagnetResolver, candidate, descriptor, descriptor_bytes, infohash,
};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    collector: Collector,
    events: EventStream,
    transfer: Arc<ScriptedFileTransfer>,
    magnet: Arc<StubMagnetResolver>,
    community: Arc<RecordingCommunity>,
    store: Arc<MemoryMetadataStore>,
    collection_dir: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn descriptor_path(&self, infohash: InfoHash) -> PathBuf {
        self.collection_dir.join(format!("{infohash}.torrent"))
    }

    async fn next_event(&mut self) -> Option<Event> {
        timeout(WAIT, self.events.next())
            .await
            .ok()
            .flatten()
            .map(|envelope| envelope.event)
    }
}

fn harness(mutate: impl FnOnce(&mut CollectorSettings)) -> Result<Harness> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("magpie_collect=debug")
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir()?;
    let collection_dir = dir.path().join("collected");
    let mut settings = CollectorSettings::new(&collection_dir);
    mutate(&mut settings);

    let transfer = Arc::new(ScriptedFileTransfer::default());
    let magnet = Arc::new(StubMagnetResolver::default());
    let community = Arc::new(RecordingCommunity::default());
    let store = Arc::new(MemoryMetadataStore::default());
    let overlay = Arc::new(StaticOverlay::new(vec![community.clone()]));

    let bus = EventBus::new();
    let events = bus.subscribe();
    let collector = Collector::spawn(
        settings,
        Collaborators {
            transfer: transfer.clone(),
            magnet: magnet.clone(),
            overlay,
            codec: Arc::new(JsonDescriptorCodec),
            store: store.clone(),
        },
        bus,
    )?;

    Ok(Harness {
        collector,
        events,
        transfer,
        magnet,
        community,
        store,
        collection_dir,
        _dir: dir,
    })
}

fn callback() -> (CollectedCallback, oneshot::Receiver<Collected>) {
    let (tx, rx) = oneshot::channel();
    let callback: CollectedCallback = Box::new(move |collected| {
        let _ = tx.send(collected);
    });
    (callback, rx)
}

async fn collected(rx: oneshot::Receiver<Collected>) -> Result<Collected> {
    Ok(timeout(WAIT, rx).await??)
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn cache_hit_fires_callback_without_transport() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(1);
    std::fs::create_dir_all(&harness.collection_dir)?;
    std::fs::write(harness.descriptor_path(target), b"already-collected")?;

    let (cb, rx) = callback();
    harness
        .collector
        .download_torrent(Some(candidate(6_881)), target, Some(cb), 0, None)
        .await?;

    let outcome = collected(rx).await?;
    assert_eq!(outcome.infohash, target);
    assert_eq!(outcome.path, Some(harness.descriptor_path(target)));
    assert!(harness.transfer.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn transfer_fails_over_to_second_candidate() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(2);
    let file_name = format!("{target}.torrent");
    let first = candidate(7_001);
    let second = candidate(7_002);
    harness.transfer.script(
        file_name.clone(),
        first.addr,
        Err(TransferError::Refused {
            reason: "not serving".to_string(),
        }),
    );
    harness.transfer.script(
        file_name.clone(),
        second.addr,
        Ok(descriptor_bytes(target, "pioneer", &[])),
    );

    let (cb, rx) = callback();
    harness
        .collector
        .download_torrent(Some(first), target, Some(cb), 0, None)
        .await?;
    harness
        .collector
        .download_torrent(Some(second), target, None, 0, None)
        .await?;

    let outcome = collected(rx).await?;
    let path = outcome.path.expect("descriptor path");
    assert_eq!(path, harness.descriptor_path(target));
    assert_eq!(
        std::fs::read(&path)?,
        descriptor_bytes(target, "pioneer", &[])
    );

    let attempts: Vec<_> = harness
        .transfer
        .requests()
        .into_iter()
        .map(|(_, addr)| addr)
        .collect();
    assert_eq!(attempts, vec![first.addr, second.addr]);

    assert!(wait_until(|| harness.store.torrent_file(target).is_some()).await);

    let stats = harness.collector.stats().await?;
    let summary = stats.success_summary();
    let torrents = summary
        .iter()
        .find(|entry| entry.family == QueueFamily::Torrent)
        .expect("torrent queue summary");
    assert_eq!(torrents.success, 1);
    assert_eq!(torrents.failed, 1);
    Ok(())
}

#[tokio::test]
async fn magnet_fallback_resolves_without_candidates() -> Result<()> {
    let harness = harness(|settings| {
        settings.magnet_pre_delay = Duration::from_millis(10);
    })?;
    let target = infohash(3);
    // Sentinel-only tracker lists must not add &tr= terms.
    harness
        .store
        .set_trackers(target, vec!["DHT".to_string()]);
    harness
        .magnet
        .script(target, Ok(descriptor(target, "dht-find", &[])));

    let (cb, rx) = callback();
    harness
        .collector
        .download_torrent(None, target, Some(cb), 1, None)
        .await?;

    let outcome = collected(rx).await?;
    assert_eq!(outcome.path, Some(harness.descriptor_path(target)));

    let requests = harness.magnet.requests();
    assert_eq!(
        requests,
        vec![format!("magnet:?xt=urn:btih:{}", target.to_hex())]
    );
    assert!(harness.descriptor_path(target).is_file());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn quota_sweep_evicts_in_paced_chunks() -> Result<()> {
    let mut harness = harness(|settings| {
        settings.max_num_torrents = 1_000;
    })?;
    harness.store.set_collected_count(1_200);

    // 1200 collected vs limit 1000: remove down to 950 in chunks of 25,
    // issued 5 virtual seconds apart.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(120);
    while tokio::time::Instant::now() < deadline
        && harness.store.free_space_calls().len() < 10
    {
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(harness.store.free_space_calls(), vec![25; 10]);

    let mut started = None;
    let mut finished = None;
    while started.is_none() || finished.is_none() {
        match harness.next_event().await {
            Some(Event::QuotaSweepStarted {
                collected,
                limit,
                removing,
            }) => started = Some((collected, limit, removing)),
            Some(Event::QuotaSweepFinished { removed }) => finished = Some(removed),
            Some(_) => {}
            None => break,
        }
    }
    assert_eq!(started, Some((1_200, 1_000, 250)));
    assert_eq!(finished, Some(250));
    Ok(())
}

#[tokio::test]
async fn expired_request_is_dropped_without_transport() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(4);

    let (cb, mut rx) = callback();
    harness
        .collector
        .download_torrent(
            Some(candidate(7_010)),
            target,
            Some(cb),
            0,
            Some(Duration::ZERO),
        )
        .await?;

    sleep(Duration::from_millis(150)).await;
    assert!(harness.transfer.requests().is_empty());
    assert!(rx.try_recv().is_err(), "callback must never fire");

    let stats = harness.collector.stats().await?;
    assert!(stats.backlogs().is_empty());
    Ok(())
}

#[tokio::test]
async fn overlay_broadcast_and_side_channel_arrival() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(5);
    let peer = candidate(7_020);

    let (cb, rx) = callback();
    harness
        .collector
        .download_torrent_message(peer, target, Some(cb), 0)
        .await?;

    assert!(
        wait_until(|| harness
            .community
            .requests()
            .contains(&(target, peer)))
        .await,
        "broadcast should reach the search community"
    );

    harness.collector.notify_descriptor_observed(target).await?;
    let outcome = collected(rx).await?;
    assert_eq!(outcome.infohash, target);
    assert_eq!(outcome.path, None);

    // Overlay-message successes cannot be observed, so the summary skips
    // that family.
    let stats = harness.collector.stats().await?;
    assert!(
        stats
            .success_summary()
            .iter()
            .all(|entry| entry.family != QueueFamily::Message)
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_save_torrent_leaves_disk_untouched() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(6);
    let original = descriptor(target, "first", &[]);

    let (cb, rx) = callback();
    harness
        .collector
        .save_torrent(original.clone(), Some(cb))
        .await?;
    collected(rx).await?;

    let mut replacement = descriptor(target, "second", &[]);
    replacement.raw = b"replacement-bytes".to_vec();
    let (cb, rx) = callback();
    harness.collector.save_torrent(replacement, Some(cb)).await?;
    collected(rx).await?;

    assert_eq!(
        std::fs::read(harness.descriptor_path(target))?,
        original.raw
    );
    assert!(harness.collector.has_torrent(target).await?);
    Ok(())
}

#[tokio::test]
async fn descriptor_callbacks_fire_exactly_once() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(7);
    let file_name = format!("{target}.torrent");
    let peer = candidate(7_030);
    harness.transfer.script(
        file_name,
        peer.addr,
        Ok(descriptor_bytes(target, "once", &[])),
    );

    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let fired = fired.clone();
        let cb: CollectedCallback = Box::new(move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        harness
            .collector
            .download_torrent(Some(peer), target, Some(cb), 0, None)
            .await?;
    }

    assert!(wait_until(|| fired.load(Ordering::SeqCst) == 2).await);

    // The registry is drained: a later save for the same key re-notifies
    // nobody.
    harness
        .collector
        .save_torrent(descriptor(target, "once", &[]), None)
        .await?;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn magnet_lookups_respect_the_concurrency_cap() -> Result<()> {
    let harness = harness(|settings| {
        settings.magnet_pre_delay = Duration::ZERO;
    })?;
    harness.magnet.set_delay(Duration::from_millis(100));

    for seed in 10..15 {
        harness
            .collector
            .download_torrent(None, infohash(seed), None, 0, None)
            .await?;
    }

    assert!(wait_until(|| harness.magnet.requests().len() == 5).await);
    assert!(
        harness.magnet.max_in_flight() <= 3,
        "observed {} concurrent lookups",
        harness.magnet.max_in_flight()
    );

    // Unscripted lookups time out and count as failures.
    let deadline = tokio::time::Instant::now() + WAIT;
    let mut failed = 0;
    while tokio::time::Instant::now() < deadline {
        let stats = harness.collector.stats().await?;
        failed = stats
            .queues
            .iter()
            .filter(|queue| queue.family == QueueFamily::Magnet)
            .map(|queue| queue.counters.failed)
            .sum();
        if failed == 5 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(failed, 5);
    Ok(())
}

#[tokio::test]
async fn thumbnail_round_trip_and_on_disk_short_circuit() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(8);
    let peer = candidate(7_040);
    harness
        .transfer
        .script("thumbs/cover.png", peer.addr, Ok(b"image-bytes".to_vec()));

    let (cb, rx) = callback();
    harness
        .collector
        .download_metadata(peer, target, "thumbs/cover.png", Some(cb), None)
        .await?;

    let outcome = collected(rx).await?;
    let path = outcome.path.expect("thumbnail path");
    assert_eq!(path, harness.collection_dir.join("thumbs/cover.png"));
    assert_eq!(std::fs::read(&path)?, b"image-bytes");

    assert!(harness.collector.has_metadata("thumbs/cover.png").await?);

    // Already on disk: no transport call, no callback.
    let (cb, mut rx) = callback();
    harness
        .collector
        .download_metadata(peer, target, "thumbs/cover.png", Some(cb), None)
        .await?;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.transfer.requests().len(), 1);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn undecodable_descriptor_is_discarded() -> Result<()> {
    let harness = harness(|_| {})?;
    let target = infohash(9);
    let file_name = format!("{target}.torrent");
    let peer = candidate(7_050);
    harness
        .transfer
        .script(file_name, peer.addr, Ok(b"not a descriptor".to_vec()));

    let (cb, mut rx) = callback();
    harness
        .collector
        .download_torrent(Some(peer), target, Some(cb), 0, None)
        .await?;

    assert!(wait_until(|| harness.transfer.requests().len() == 1).await);
    sleep(Duration::from_millis(100)).await;
    assert!(!harness.descriptor_path(target).exists());
    assert!(rx.try_recv().is_err(), "callback must not fire");
    assert!(harness.store.torrent_file(target).is_none());
    Ok(())
}
