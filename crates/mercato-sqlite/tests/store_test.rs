use alloy_primitives::{Address, U256};
use mercato_core::{
    ListingFilter, ListingId, ListingRecord, ListingStatus, ListingStore, ListingTxn, LogPosition,
    StoreConfig,
};
use mercato_sqlite::{schema::SCHEMA_VERSION, SqliteListingStore};
use tempfile::TempDir;

fn setup() -> (SqliteListingStore, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = SqliteListingStore::open(StoreConfig::new(temp_dir.path().join("listings.db"))).unwrap();
    (store, temp_dir)
}

fn id(token: u64, seller: u8) -> ListingId {
    ListingId::new(Address::repeat_byte(0x01), U256::from(token), Address::repeat_byte(seller))
}

#[test]
fn test_fresh_store_has_no_cursor() {
    let (store, _temp) = setup();

    assert_eq!(store.get_cursor().unwrap(), None);
    let status = store.status().unwrap();
    assert_eq!(status.total_listings(), 0);
    assert_eq!(status.schema_version, SCHEMA_VERSION);
    assert!(status.updated_at.is_none());
}

#[test]
fn test_insert_update_remove() {
    let (store, _temp) = setup();
    let key = id(7, 0xaa);

    let mut txn = store.begin_txn().unwrap();
    txn.insert(&ListingRecord::new(key, U256::from(1_000u64))).unwrap();
    txn.commit(Some(0)).unwrap();

    let mut record = store.get(&key).unwrap().unwrap();
    assert_eq!(record.id, key.key());
    assert!(record.is_active());

    record.price = U256::MAX;
    record.buyer = Some(Address::repeat_byte(0xbb));
    let mut txn = store.begin_txn().unwrap();
    txn.update(&record).unwrap();
    txn.commit(Some(1)).unwrap();

    let stored = store.get(&key).unwrap().unwrap();
    assert_eq!(stored.price, U256::MAX);
    assert_eq!(stored.status(), ListingStatus::Sold);

    let mut txn = store.begin_txn().unwrap();
    assert!(txn.remove(&key).unwrap());
    assert!(!txn.remove(&key).unwrap());
    txn.commit(Some(2)).unwrap();

    assert!(store.get(&key).unwrap().is_none());
    assert_eq!(store.get_cursor().unwrap(), Some(2));
}

#[test]
fn test_update_of_missing_row_fails() {
    let (store, _temp) = setup();
    let mut txn = store.begin_txn().unwrap();
    assert!(txn.update(&ListingRecord::new(id(1, 0xaa), U256::from(1u64))).is_err());
}

#[test]
fn test_dropped_txn_rolls_back() {
    let (store, _temp) = setup();
    {
        let mut txn = store.begin_txn().unwrap();
        txn.insert(&ListingRecord::new(id(1, 0xaa), U256::from(1u64))).unwrap();
        txn.set_key_position(&id(1, 0xaa), LogPosition::new(1, 0)).unwrap();
        txn.record_rejected(0, b"junk", "not json").unwrap();
    }

    let status = store.status().unwrap();
    assert_eq!(status.total_listings(), 0);
    assert_eq!(status.tracked_keys, 0);
    assert_eq!(status.rejected_events, 0);
    assert_eq!(store.get_cursor().unwrap(), None);
}

#[test]
fn test_positions_survive_removal() {
    let (store, _temp) = setup();
    let key = id(3, 0xaa);

    let mut txn = store.begin_txn().unwrap();
    txn.insert(&ListingRecord::new(key, U256::from(5u64))).unwrap();
    txn.set_key_position(&key, LogPosition::new(10, 2)).unwrap();
    txn.set_key_position(&key, LogPosition::new(11, 0)).unwrap();
    txn.remove(&key).unwrap();
    txn.commit(None).unwrap();

    let txn = store.begin_txn().unwrap();
    assert_eq!(txn.key_position(&key).unwrap(), Some(LogPosition::new(11, 0)));
    assert_eq!(txn.key_position(&id(4, 0xaa)).unwrap(), None);
    drop(txn);

    assert_eq!(store.status().unwrap().tracked_keys, 1);
}

#[test]
fn test_list_filters_and_orders_by_key() {
    let (store, _temp) = setup();

    let mut txn = store.begin_txn().unwrap();
    for (token, seller) in [(3, 0xaa), (1, 0xbb), (2, 0xaa)] {
        txn.insert(&ListingRecord::new(id(token, seller), U256::from(token))).unwrap();
    }
    let mut sold = ListingRecord::new(id(4, 0xaa), U256::from(4u64));
    sold.buyer = Some(Address::repeat_byte(0xcc));
    txn.insert(&sold).unwrap();
    txn.commit(None).unwrap();

    let all = store.list(&ListingFilter::new()).unwrap();
    let keys: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(all.len(), 4);

    let active_by_seller = store
        .list(&ListingFilter::active().seller(Address::repeat_byte(0xaa)))
        .unwrap();
    assert_eq!(active_by_seller.len(), 2);

    let by_token = store
        .list(&ListingFilter::new().token(Address::repeat_byte(0x01), U256::from(1u64)))
        .unwrap();
    assert_eq!(by_token.len(), 1);
    assert_eq!(by_token[0].seller, Address::repeat_byte(0xbb));

    let by_buyer = store
        .list(&ListingFilter::new().buyer(Address::repeat_byte(0xcc)))
        .unwrap();
    assert_eq!(by_buyer, vec![sold]);

    assert_eq!(store.list(&ListingFilter::new().limit(3)).unwrap().len(), 3);
    assert!(store
        .list(&ListingFilter::new().nft_address(Address::repeat_byte(0x02)))
        .unwrap()
        .is_empty());
}

#[test]
fn test_rejected_events_newest_first() {
    let (store, _temp) = setup();

    let mut txn = store.begin_txn().unwrap();
    txn.record_rejected(4, b"{", "EOF while parsing").unwrap();
    txn.record_rejected(9, b"[]", "unknown event").unwrap();
    txn.commit(Some(9)).unwrap();

    let rejected = store.rejected(10).unwrap();
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0].event_id, 9);
    assert_eq!(rejected[0].event_bytes, b"[]".to_vec());
    assert_eq!(rejected[1].reason, "EOF while parsing");
    assert_eq!(store.rejected(1).unwrap().len(), 1);
}

#[test]
fn test_reopen_keeps_state() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(temp_dir.path().join("nested").join("listings.db"));
    {
        let store = SqliteListingStore::open(config.clone()).unwrap();
        let mut txn = store.begin_txn().unwrap();
        txn.insert(&ListingRecord::new(id(1, 0xaa), U256::from(1u64))).unwrap();
        txn.commit(Some(41)).unwrap();
    }

    let store = SqliteListingStore::open(config).unwrap();
    assert_eq!(store.get_cursor().unwrap(), Some(41));
    assert!(store.get(&id(1, 0xaa)).unwrap().is_some());
    assert!(store.status().unwrap().updated_at.is_some());
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_refuses_newer_schema() {
    let (store, _temp) = setup();
    store
        .conn()
        .lock()
        .execute("UPDATE projection_meta SET schema_version = 99 WHERE id = 0", [])
        .unwrap();

    let conn = store.conn().lock();
    assert!(mercato_sqlite::schema::migrate(&conn, SCHEMA_VERSION).is_err());
}
