//! Segment Lifecycle Tests
//!
//! Tests for lifecycle invariants:
//! - Stores attach on load and detach before clear, unload and dispose
//! - Persisted bytes survive unload/load and are rebuilt into the view
//! - Clear empties both representations and re-attaches
//! - Configuration places the persisted list

use std::io::Write;
use std::sync::{Arc, Mutex};

use aerodb_metaindex::config::{ConfigError, IndexConfig};
use aerodb_metaindex::container::{Container, MemoryContainer};
use aerodb_metaindex::index::{
    ContainerListener, Crc32, InMemoryProjection, MetadataStore, PersistedStore, UniqueIndex,
};
use aerodb_metaindex::observability::Severity;
use aerodb_metaindex::storage::{SegmentState, StoreEvent, StoreEventReceiver};

// =============================================================================
// Helper Functions
// =============================================================================

type ChecksumIndex = UniqueIndex<PersistedStore<Crc32>>;
type Listener = Arc<Mutex<ContainerListener<Vec<u8>, ChecksumIndex>>>;

fn checksum_index(container: &mut MemoryContainer<Vec<u8>>, config: &IndexConfig) -> Listener {
    let store = PersistedStore::from_config(container.handle(), config);
    let index: ChecksumIndex = InMemoryProjection::new(config.name.clone(), store);
    let listener = Arc::new(Mutex::new(ContainerListener::new(index, |item: &Vec<u8>| {
        Crc32::of(item)
    })));
    container.subscribe(Arc::clone(&listener)).unwrap();
    listener
}

fn drain(rx: &mut StoreEventReceiver) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn state(listener: &Listener) -> SegmentState {
    listener.lock().unwrap().store().inner().state()
}

// =============================================================================
// Attach / Detach Tests
// =============================================================================

/// Subscribing before load attaches on load.
#[test]
fn test_attach_on_load() {
    let mut container = MemoryContainer::new(1);
    let listener = checksum_index(&mut container, &IndexConfig::default());
    let mut rx = listener.lock().unwrap().store_mut().subscribe();

    assert_eq!(state(&listener), SegmentState::Detached);
    assert!(listener.lock().unwrap().store().requires_load());

    container.load().unwrap();

    assert_eq!(state(&listener), SegmentState::Attached);
    assert!(!listener.lock().unwrap().store().requires_load());
    assert_eq!(drain(&mut rx), vec![StoreEvent::Loading, StoreEvent::Loaded]);
}

/// Reserved slot outside the container is rejected on load.
#[test]
fn test_slot_out_of_range() {
    let mut container = MemoryContainer::new(1);
    let _listener = checksum_index(&mut container, &IndexConfig::new("bad", 3));

    let err = container.load().unwrap_err();
    assert!(err.observer_error().is_some());
}

/// Two indexes in different slots are independent.
#[test]
fn test_two_indexes_two_slots() {
    let mut container = MemoryContainer::new(2);
    let first = checksum_index(&mut container, &IndexConfig::new("first", 0));
    let second = checksum_index(&mut container, &IndexConfig::new("second", 1));
    container.load().unwrap();

    container.add(b"one".to_vec()).unwrap();

    for listener in [&first, &second] {
        let guard = listener.lock().unwrap();
        assert_eq!(guard.store().position_of(&Crc32::of(b"one")).unwrap(), Some(0));
    }
}

/// The same slot cannot back two indexes at once.
#[test]
fn test_shared_slot_rejected() {
    let mut container = MemoryContainer::new(1);
    let _first = checksum_index(&mut container, &IndexConfig::new("first", 0));
    let _second = checksum_index(&mut container, &IndexConfig::new("second", 0));

    assert!(container.load().is_err());
}

// =============================================================================
// Reload Tests
// =============================================================================

/// Unload keeps persisted bytes; load rebuilds the same view.
#[test]
fn test_unload_load_rebuilds() {
    let mut container = MemoryContainer::new(1);
    let listener = checksum_index(&mut container, &IndexConfig::default());
    container.load().unwrap();
    container.add(b"a".to_vec()).unwrap();
    container.add(b"b".to_vec()).unwrap();
    container.add(b"c".to_vec()).unwrap();
    container.reap(1).unwrap();
    let before = listener.lock().unwrap().store().entries().unwrap();

    container.unload().unwrap();
    assert_eq!(state(&listener), SegmentState::Detached);
    assert!(listener.lock().unwrap().store().requires_load());

    container.load().unwrap();
    let guard = listener.lock().unwrap();
    assert_eq!(guard.store().entries().unwrap(), before);
    assert_eq!(guard.store().count().unwrap(), 3);
    assert_eq!(guard.store().position_of(&Crc32::of(b"b")).unwrap(), None);
}

/// A new index loads a list persisted by an earlier store.
#[test]
fn test_load_existing_list() {
    let config = IndexConfig::default();
    let mut container = MemoryContainer::new(1);
    container.load().unwrap();
    container.add(b"x".to_vec()).unwrap();
    container.add(b"y".to_vec()).unwrap();
    {
        let mut writer = PersistedStore::<Crc32>::from_config(container.handle(), &config);
        writer.load().unwrap();
        writer.add(0, Crc32::of(b"x")).unwrap();
        writer.add(1, Crc32::of(b"y")).unwrap();
    }

    let store = PersistedStore::<Crc32>::from_config(container.handle(), &config);
    let mut index: ChecksumIndex = InMemoryProjection::new("reopened", store);
    assert!(index.requires_load());
    index.load().unwrap();

    assert_eq!(index.position_of(&Crc32::of(b"y")).unwrap(), Some(1));
    assert_eq!(
        index.inner().read_bytes(0).unwrap(),
        Crc32::of(b"x").0.to_le_bytes().to_vec()
    );
}

// =============================================================================
// Clear / Dispose Tests
// =============================================================================

/// Clear detaches, wipes and re-attaches to an empty slot.
#[test]
fn test_clear_cycle() {
    let mut container = MemoryContainer::new(1);
    let listener = checksum_index(&mut container, &IndexConfig::default());
    container.load().unwrap();
    container.add(b"a".to_vec()).unwrap();
    container.add(b"b".to_vec()).unwrap();
    let mut rx = listener.lock().unwrap().store_mut().subscribe();

    container.clear().unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![StoreEvent::Detached, StoreEvent::Loading, StoreEvent::Loaded]
    );
    {
        let guard = listener.lock().unwrap();
        assert_eq!(guard.store().count().unwrap(), 0);
        assert_eq!(guard.store().key_count().unwrap(), 0);
    }

    container.add(b"b".to_vec()).unwrap();
    let guard = listener.lock().unwrap();
    assert_eq!(guard.store().position_of(&Crc32::of(b"b")).unwrap(), Some(0));
}

/// Dispose detaches and releases the slot.
#[test]
fn test_dispose_detaches() {
    let mut container = MemoryContainer::new(1);
    let listener = checksum_index(&mut container, &IndexConfig::default());
    container.load().unwrap();
    let handle = container.handle();

    container.dispose().unwrap();

    assert_eq!(state(&listener), SegmentState::Detached);
    assert!(handle.open_reserved_stream(0, 0).is_ok());
}

// =============================================================================
// Configuration Tests
// =============================================================================

/// Config file places the list after a header.
#[test]
fn test_config_file_offset() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"name": "by_checksum", "reserved_slot": 1, "byte_offset": 8, "log_level": "warn"}}"#
    )
    .unwrap();
    let config = IndexConfig::load(file.path()).unwrap();
    assert_eq!(config.log_level, Severity::Warn);

    let mut container = MemoryContainer::new(2);
    let listener = checksum_index(&mut container, &config);
    container.load().unwrap();
    container.add(b"payload".to_vec()).unwrap();

    let handle = container.handle();
    let guard = listener.lock().unwrap();
    assert_eq!(guard.store().name(), "by_checksum");
    assert_eq!(guard.store().inner().state(), SegmentState::Attached);
    assert_eq!(guard.store().count().unwrap(), 1);
    drop(guard);

    container.unload().unwrap();
    let stream = handle.open_reserved_stream(1, 0).unwrap();
    assert_eq!(stream.len().unwrap(), 8 + 4);
}

/// Missing and malformed config files are reported.
#[test]
fn test_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(IndexConfig::load(&missing), Err(ConfigError::Io(_))));

    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{\"byte_offset\": -1}").unwrap();
    assert!(matches!(IndexConfig::load(&path), Err(ConfigError::Parse(_))));
}
