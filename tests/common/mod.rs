// tests/common/mod.rs
//! In-memory feed and notifier doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use tempfile::TempDir;

use listing_watcher::feeds::{CounterFeed, FeedListing, MetadataFeed, ValidationLookup};
use listing_watcher::notify::{AlertEvent, Notifier};
use listing_watcher::store::{FileStore, ResourceStore};
use listing_watcher::types::{
    FeedError, ListingMeta, LookupError, ResourceId, ValidatedListing,
};
use listing_watcher::watcher::{Watcher, WatcherCfg};

pub struct StubCounterFeed {
    counts: Mutex<HashMap<ResourceId, u32>>,
    fail: AtomicBool,
}

impl StubCounterFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set(&self, entries: &[(ResourceId, u32)]) {
        *self.counts.lock().unwrap() = entries.iter().copied().collect();
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl CounterFeed for StubCounterFeed {
    async fn fetch_counts(&self) -> Result<HashMap<ResourceId, u32>, FeedError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FeedError::Malformed("stub counter feed down".into()));
        }
        Ok(self.counts.lock().unwrap().clone())
    }

    fn name(&self) -> &'static str {
        "stub-counter"
    }
}

pub struct StubMetadataFeed {
    listings: Mutex<Vec<FeedListing>>,
}

impl StubMetadataFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listings: Mutex::new(Vec::new()),
        })
    }

    pub fn set(&self, listings: Vec<FeedListing>) {
        *self.listings.lock().unwrap() = listings;
    }
}

#[async_trait::async_trait]
impl MetadataFeed for StubMetadataFeed {
    async fn fetch_all(&self) -> Result<Vec<FeedListing>, FeedError> {
        Ok(self.listings.lock().unwrap().clone())
    }

    fn name(&self) -> &'static str {
        "stub-metadata"
    }
}

/// Scripted per-id lookup answers; ids without a script return `NotFound`.
pub struct StubLookup {
    responses: Mutex<HashMap<ResourceId, Result<ValidatedListing, LookupError>>>,
    pub calls: AtomicUsize,
}

impl StubLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn answer_ok(&self, id: ResourceId, units: u32, meta: ListingMeta) {
        self.responses
            .lock()
            .unwrap()
            .insert(id, Ok(ValidatedListing { id, units, meta }));
    }

    pub fn answer_err(&self, id: ResourceId, err: LookupError) {
        self.responses.lock().unwrap().insert(id, Err(err));
    }
}

#[async_trait::async_trait]
impl ValidationLookup for StubLookup {
    async fn lookup(&self, id: ResourceId) -> Result<ValidatedListing, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or(Err(LookupError::NotFound))
    }
}

pub struct RecordingNotifier {
    pub events: Mutex<Vec<AlertEvent>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<AlertEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, ev: &AlertEvent) -> Result<()> {
        self.events.lock().unwrap().push(ev.clone());
        if self.fail.load(Ordering::SeqCst) {
            bail!("recording notifier told to fail");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn meta(name: &str, project_type: &str, bookable: bool) -> ListingMeta {
    ListingMeta {
        name: name.into(),
        project_type: project_type.into(),
        bookable,
        ..Default::default()
    }
}

pub fn listing(id: ResourceId, m: ListingMeta) -> FeedListing {
    FeedListing { id, meta: m }
}

/// Fully wired watcher over stub feeds and a temp-dir file store.
pub struct TestRig {
    pub counter: Arc<StubCounterFeed>,
    pub metadata: Arc<StubMetadataFeed>,
    pub lookup: Arc<StubLookup>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<FileStore>,
    pub watcher: Watcher,
    _tmp: TempDir,
}

pub async fn rig(allowed_project_types: &[&str]) -> TestRig {
    let tmp = tempfile::tempdir().expect("tempdir");
    let counter = StubCounterFeed::new();
    let metadata = StubMetadataFeed::new();
    let lookup = StubLookup::new();
    let notifier = RecordingNotifier::new();
    let store = Arc::new(FileStore::load(tmp.path().join("state.json")).await);

    let watcher = Watcher::new(
        counter.clone(),
        metadata.clone(),
        lookup.clone(),
        store.clone() as Arc<dyn ResourceStore>,
        notifier.clone(),
        WatcherCfg {
            verify_concurrency: 2,
            allowed_project_types: allowed_project_types
                .iter()
                .map(|s| s.to_string())
                .collect(),
        },
    );

    TestRig {
        counter,
        metadata,
        lookup,
        notifier,
        store,
        watcher,
        _tmp: tmp,
    }
}
