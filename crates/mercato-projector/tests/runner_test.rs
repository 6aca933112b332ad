use alloy_primitives::{Address, U256};
use mercato_core::{
    encode_event, EventEnvelope, EventLog, FeedConfig, ListingCanceled, ListingCreated,
    ListingFilter, ListingId, ListingPurchased, ListingStore, ListingUpdated, MemoryEventLog,
    MemoryListingStore, ProjectorConfig, SoldPolicy, StoreConfig,
};
use mercato_file_log::FileEventLog;
use mercato_projector::{FeedRunner, ListingProjector, ListingQuery};
use mercato_sqlite::SqliteListingStore;
use std::sync::Arc;
use std::time::Duration;

fn nft() -> Address {
    Address::repeat_byte(0x11)
}

fn created(token: u64, seller: u8, price: u64) -> ListingCreated {
    ListingCreated {
        nft_address: nft(),
        token_id: U256::from(token),
        seller: Address::repeat_byte(seller),
        price: U256::from(price),
    }
}

fn updated(token: u64, seller: u8, price: u64) -> ListingUpdated {
    ListingUpdated {
        nft_address: nft(),
        token_id: U256::from(token),
        seller: Address::repeat_byte(seller),
        new_price: U256::from(price),
    }
}

fn purchased(token: u64, seller: u8, buyer: u8) -> ListingPurchased {
    ListingPurchased {
        nft_address: nft(),
        token_id: U256::from(token),
        seller: Address::repeat_byte(seller),
        buyer: Address::repeat_byte(buyer),
    }
}

fn canceled(token: u64, seller: u8) -> ListingCanceled {
    ListingCanceled {
        nft_address: nft(),
        token_id: U256::from(token),
        seller: Address::repeat_byte(seller),
    }
}

fn append(log: &impl EventLog, envelope: EventEnvelope) {
    log.append(&encode_event(&envelope).unwrap()).unwrap();
}

/// A feed touching every handler, with re-deliveries and gaps
fn mixed_feed() -> Vec<EventEnvelope> {
    vec![
        EventEnvelope::at(1, 0, created(1, 0xaa, 100)),
        EventEnvelope::at(1, 1, created(2, 0xaa, 200)),
        EventEnvelope::at(1, 2, created(1, 0xbb, 50)),
        EventEnvelope::at(2, 0, updated(1, 0xaa, 150)),
        EventEnvelope::at(2, 0, updated(1, 0xaa, 150)),
        EventEnvelope::at(2, 1, updated(9, 0xaa, 1)),
        EventEnvelope::at(3, 0, purchased(1, 0xaa, 0xcc)),
        EventEnvelope::at(3, 1, updated(1, 0xaa, 999)),
        EventEnvelope::at(4, 0, canceled(2, 0xaa)),
        EventEnvelope::at(1, 1, created(2, 0xaa, 200)),
        EventEnvelope::new(created(3, 0xdd, 300)),
    ]
}

#[test]
fn test_run_once_projects_and_moves_cursor() {
    let log = Arc::new(MemoryEventLog::new());
    let store = Arc::new(MemoryListingStore::new());
    for envelope in mixed_feed() {
        append(log.as_ref(), envelope);
    }

    let runner = FeedRunner::new(log.clone(), store.clone(), ListingProjector::default());
    assert_eq!(runner.lag().unwrap(), 11);

    let stats = runner.run_once().unwrap();
    assert_eq!(stats.events_read, 11);
    assert_eq!(stats.events_applied, 8);
    assert_eq!(stats.stale, 2);
    assert_eq!(stats.missing, 1);
    assert_eq!(stats.terminal, 0);
    assert_eq!(stats.skipped(), 3);
    assert_eq!(stats.new_cursor, Some(10));
    assert_eq!(runner.lag().unwrap(), 0);

    let idle = runner.run_once().unwrap();
    assert!(idle.is_idle());
    assert_eq!(idle.new_cursor, Some(10));

    let query = ListingQuery::new(store.clone());
    let active: Vec<_> = query
        .active_listings()
        .unwrap()
        .into_iter()
        .map(|r| (r.token_id, r.price))
        .collect();
    assert_eq!(
        active,
        vec![(U256::from(1u64), U256::from(50u64)), (U256::from(3u64), U256::from(300u64))]
    );

    let sold = store
        .get(&ListingId::new(nft(), U256::from(1u64), Address::repeat_byte(0xaa)))
        .unwrap()
        .unwrap();
    assert_eq!(sold.price, U256::from(999u64));
    assert_eq!(sold.buyer, Some(Address::repeat_byte(0xcc)));
}

#[test]
fn test_terminal_policy_ignores_post_sale_update() {
    let log = Arc::new(MemoryEventLog::new());
    let store = Arc::new(MemoryListingStore::new());
    for envelope in mixed_feed() {
        append(log.as_ref(), envelope);
    }

    let projector =
        ListingProjector::new(ProjectorConfig::default().with_sold_policy(SoldPolicy::Terminal));
    let stats = FeedRunner::new(log, store.clone(), projector).run_once().unwrap();
    assert_eq!(stats.events_applied, 7);
    assert_eq!(stats.terminal, 1);
    assert_eq!(stats.skipped(), 4);

    let sold = store
        .get(&ListingId::new(nft(), U256::from(1u64), Address::repeat_byte(0xaa)))
        .unwrap()
        .unwrap();
    assert_eq!(sold.price, U256::from(150u64));
}

#[test]
fn test_malformed_entries_are_rejected_and_skipped() {
    let log = Arc::new(MemoryEventLog::new());
    let store = Arc::new(MemoryListingStore::new());

    append(log.as_ref(), EventEnvelope::new(created(1, 0xaa, 100)));
    log.append(b"not json").unwrap();
    log.append(br#"{"type":"ListingExploded","nftAddress":"0x01"}"#).unwrap();
    log.append(
        br#"{"type":"ListingUpdated","nftAddress":"0x0000000000000000000000000000000000000000","tokenId":"1","seller":"0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","newPrice":"5"}"#,
    )
    .unwrap();
    append(log.as_ref(), EventEnvelope::new(updated(1, 0xaa, 120)));

    let runner = FeedRunner::new(log, store.clone(), ListingProjector::default());
    let stats = runner.run_once().unwrap();

    assert_eq!(stats.rejected, 3);
    assert_eq!(stats.events_applied, 2);
    assert_eq!(store.get_cursor().unwrap(), Some(4));

    let rejected = store.rejected(10).unwrap();
    let ids: Vec<_> = rejected.iter().map(|r| r.event_id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert_eq!(rejected[2].event_bytes, b"not json".to_vec());

    let listings = store.list(&ListingFilter::active()).unwrap();
    assert_eq!(listings[0].price, U256::from(120u64));
}

#[test]
fn test_batches_are_bounded() {
    let log = Arc::new(MemoryEventLog::new());
    let store = Arc::new(MemoryListingStore::new());
    for token in 0..10 {
        append(log.as_ref(), EventEnvelope::new(created(token, 0xaa, 1)));
    }

    let projector = ListingProjector::new(ProjectorConfig::default().with_batch_events_max(4));
    let runner = FeedRunner::new(log, store.clone(), projector);

    assert_eq!(runner.run_once().unwrap().new_cursor, Some(3));
    assert_eq!(runner.lag().unwrap(), 6);
    assert_eq!(runner.run_once().unwrap().events_read, 4);
    assert_eq!(runner.run_once().unwrap().events_read, 2);
    assert!(runner.run_once().unwrap().is_idle());
    assert_eq!(store.len(), 10);
}

#[test]
fn test_byte_limit_ends_batch_early() {
    let log = Arc::new(MemoryEventLog::new());
    let store = Arc::new(MemoryListingStore::new());
    for token in 0..3 {
        append(log.as_ref(), EventEnvelope::new(created(token, 0xaa, 1)));
    }

    let projector = ListingProjector::new(ProjectorConfig::default().with_batch_bytes_max(1));
    let runner = FeedRunner::new(log, store, projector);

    let stats = runner.run_once().unwrap();
    assert_eq!(stats.events_read, 1);
    assert_eq!(stats.new_cursor, Some(0));
}

#[test]
fn test_sqlite_and_memory_agree() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log = Arc::new(MemoryEventLog::new());
    for envelope in mixed_feed() {
        append(log.as_ref(), envelope);
    }
    log.append(b"{}").unwrap();

    let memory = Arc::new(MemoryListingStore::new());
    let sqlite = Arc::new(
        SqliteListingStore::open(StoreConfig::new(temp_dir.path().join("listings.db"))).unwrap(),
    );

    let projector = ListingProjector::new(ProjectorConfig::default().with_batch_events_max(3));
    let memory_runner = FeedRunner::new(log.clone(), memory.clone(), projector.clone());
    let sqlite_runner = FeedRunner::new(log.clone(), sqlite.clone(), projector);
    while !memory_runner.run_once().unwrap().is_idle() {}
    while !sqlite_runner.run_once().unwrap().is_idle() {}

    let all = ListingFilter::new();
    assert_eq!(memory.list(&all).unwrap(), sqlite.list(&all).unwrap());
    assert_eq!(memory.get_cursor().unwrap(), sqlite.get_cursor().unwrap());

    let memory_status = memory.status().unwrap();
    let sqlite_status = sqlite.status().unwrap();
    assert_eq!(memory_status.active_listings, sqlite_status.active_listings);
    assert_eq!(memory_status.sold_listings, sqlite_status.sold_listings);
    assert_eq!(memory_status.tracked_keys, sqlite_status.tracked_keys);
    assert_eq!(sqlite_status.rejected_events, 1);
}

#[test]
fn test_resumes_from_persisted_cursor() {
    let temp_dir = tempfile::tempdir().unwrap();
    let feed_config = FeedConfig::new(temp_dir.path().join("feed"));
    let store_config = StoreConfig::new(temp_dir.path().join("listings.db"));

    {
        let log = Arc::new(FileEventLog::open(feed_config.clone()).unwrap());
        let store = Arc::new(SqliteListingStore::open(store_config.clone()).unwrap());
        append(log.as_ref(), EventEnvelope::at(1, 0, created(1, 0xaa, 100)));
        FeedRunner::new(log, store, ListingProjector::default())
            .run_once()
            .unwrap();
    }

    let log = Arc::new(FileEventLog::open(feed_config).unwrap());
    let store = Arc::new(SqliteListingStore::open(store_config).unwrap());
    append(log.as_ref(), EventEnvelope::at(2, 0, updated(1, 0xaa, 175)));

    let runner = FeedRunner::new(log, store.clone(), ListingProjector::default());
    assert_eq!(runner.lag().unwrap(), 1);
    let stats = runner.run_once().unwrap();
    assert_eq!(stats.events_read, 1);
    assert_eq!(stats.events_applied, 1);

    let listings = store.list(&ListingFilter::active()).unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].price, U256::from(175u64));
}

#[test]
fn test_reader_handle_follows_separate_writer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let feed_config = FeedConfig::new(temp_dir.path().join("feed")).with_max_file_size(128);
    let writer = FileEventLog::open(feed_config.clone()).unwrap();
    append(&writer, EventEnvelope::at(1, 0, created(1, 0xaa, 100)));

    let reader = Arc::new(FileEventLog::open_read_only(feed_config).unwrap());
    let store = Arc::new(MemoryListingStore::new());
    let runner = FeedRunner::new(reader, store.clone(), ListingProjector::default());
    assert_eq!(runner.run_once().unwrap().events_read, 1);

    // Enough entries to roll the writer onto new segments
    let batch: Vec<Vec<u8>> = (0..4u64)
        .map(|i| encode_event(&EventEnvelope::at(2 + i, 0, updated(1, 0xaa, 200 + i))).unwrap())
        .collect();
    writer.append_batch(&batch).unwrap();

    assert_eq!(runner.lag().unwrap(), 4);
    let stats = runner.run_once().unwrap();
    assert_eq!(stats.events_read, 4);
    assert_eq!(stats.new_cursor, Some(4));
    assert_eq!(runner.lag().unwrap(), 0);
    assert_eq!(
        store.list(&ListingFilter::active()).unwrap()[0].price,
        U256::from(203u64)
    );
}

/// Poll far slower than the test timeouts so only a notification can wake the runner
fn slow_poll_runner(
    log: Arc<FileEventLog>,
    store: Arc<MemoryListingStore>,
) -> Arc<FeedRunner<FileEventLog, MemoryListingStore>> {
    let projector = ListingProjector::new(ProjectorConfig::default().with_poll_interval_ms(60_000));
    Arc::new(FeedRunner::new(log.clone(), store, projector).with_event_notify(log.notifier()))
}

#[tokio::test]
async fn test_continuous_runner_wakes_on_every_append() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log = Arc::new(FileEventLog::open(FeedConfig::new(temp_dir.path().join("feed"))).unwrap());
    let store = Arc::new(MemoryListingStore::new());

    let runner = slow_poll_runner(log.clone(), store.clone());
    let shutdown = runner.shutdown_handle();
    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_continuous().await })
    };

    // Appends land at arbitrary points of the runner's loop, run_once() included
    for token in 0..20u64 {
        append(log.as_ref(), EventEnvelope::new(created(token, 0xaa, 1)));
        let mut seen = false;
        for _ in 0..200 {
            if store.get_cursor().unwrap() == Some(token) {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(seen, "entry {} was not projected", token);
    }

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(store.len(), 20);
}

#[tokio::test]
async fn test_shutdown_interrupts_idle_wait() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log = Arc::new(FileEventLog::open(FeedConfig::new(temp_dir.path().join("feed"))).unwrap());
    let runner = slow_poll_runner(log, Arc::new(MemoryListingStore::new()));

    let shutdown = runner.shutdown_handle();
    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_continuous().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_continuous_runner_tails_file_feed() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log = Arc::new(FileEventLog::open(FeedConfig::new(temp_dir.path().join("feed"))).unwrap());
    let store = Arc::new(
        SqliteListingStore::open(StoreConfig::new(temp_dir.path().join("listings.db"))).unwrap(),
    );

    let runner = Arc::new(
        FeedRunner::new(log.clone(), store.clone(), ListingProjector::default())
            .with_event_notify(log.notifier()),
    );
    let shutdown = runner.shutdown_handle();
    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_continuous().await })
    };

    append(log.as_ref(), EventEnvelope::at(1, 0, created(1, 0xaa, 100)));
    append(log.as_ref(), EventEnvelope::at(2, 0, purchased(1, 0xaa, 0xbb)));

    let mut caught_up = false;
    for _ in 0..200 {
        if store.get_cursor().unwrap() == Some(1) {
            caught_up = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(caught_up);

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let status = store.status().unwrap();
    assert_eq!(status.sold_listings, 1);
    assert_eq!(status.active_listings, 0);
}
