//! Integration tests for the location cache.
//!
//! Uses paused tokio time so request delays and timeouts run instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use widgetline_core::location::{load_persisted, persist, persisted_location, LOCATION_SOURCE};
use widgetline_core::{
    Authorization, CachedLocation, KeyValueStore, LocationCache, LocationPolicy, LocationSource,
    ManualClock, MemoryStore, SqliteStore, WidgetError,
};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

const NOW: &str = "2026-01-13T09:00:00Z";

struct ScriptedSource {
    authorization: Authorization,
    cached: Option<CachedLocation>,
    response: Mutex<Result<CachedLocation, WidgetError>>,
    delay: StdDuration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(response: Result<CachedLocation, WidgetError>) -> Self {
        Self {
            authorization: Authorization::Authorized,
            cached: None,
            response: Mutex::new(response),
            delay: StdDuration::from_secs(2),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationSource for ScriptedSource {
    fn authorization(&self) -> Authorization {
        self.authorization
    }

    fn current_cached_fix(&self) -> Option<CachedLocation> {
        self.cached.clone()
    }

    async fn request_fresh_fix(&self) -> Result<CachedLocation, WidgetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.response.lock().unwrap().clone()
    }
}

fn spawn(source: &Arc<ScriptedSource>, store: &Arc<dyn KeyValueStore>) -> LocationCache {
    LocationCache::spawn(
        Arc::clone(source) as Arc<dyn LocationSource>,
        Arc::clone(store),
        Arc::new(ManualClock::new(utc(NOW))),
        LocationPolicy::default(),
    )
}

fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

fn fix_aged(minutes: i64) -> CachedLocation {
    CachedLocation::new(37.77, -122.42, utc(NOW) - Duration::minutes(minutes))
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_request() {
    let source = Arc::new(ScriptedSource::new(Ok(fix_aged(0))));
    let store = memory_store();
    let cache = spawn(&source, &store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_location().await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(source.calls(), 1);
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(load_persisted(store.as_ref()).unwrap(), Some(fix_aged(0)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_failure() {
    let source = Arc::new(ScriptedSource::new(Err(WidgetError::upstream(
        LOCATION_SOURCE,
        "no satellites",
    ))));
    let cache = spawn(&source, &memory_store());

    let (a, b, c) = tokio::join!(cache.get_location(), cache.get_location(), cache.get_location());
    assert_eq!(source.calls(), 1);
    for result in [a, b, c] {
        assert!(matches!(result, Err(WidgetError::UpstreamFailure { .. })));
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_os_fix_is_returned_without_request() {
    let mut scripted = ScriptedSource::new(Ok(fix_aged(0)));
    scripted.cached = Some(fix_aged(25));
    let source = Arc::new(scripted);
    let store = memory_store();
    let cache = spawn(&source, &store);

    let got = cache.get_location().await.unwrap();
    assert_eq!(*got, fix_aged(25));
    assert_eq!(source.calls(), 0);
    // The OS fix is copied into the persisted tier.
    assert_eq!(persisted_location(store.as_ref()).unwrap(), fix_aged(25));
}

#[tokio::test(start_paused = true)]
async fn fresh_persisted_fix_is_returned_without_request() {
    let source = Arc::new(ScriptedSource::new(Ok(fix_aged(0))));
    let store = memory_store();
    persist(store.as_ref(), &fix_aged(25)).unwrap();
    let cache = spawn(&source, &store);

    assert_eq!(*cache.get_location().await.unwrap(), fix_aged(25));
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_fix_triggers_request() {
    let mut scripted = ScriptedSource::new(Ok(fix_aged(0)));
    scripted.cached = Some(fix_aged(31));
    let source = Arc::new(scripted);
    let cache = spawn(&source, &memory_store());

    assert_eq!(*cache.get_location().await.unwrap(), fix_aged(0));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn denied_permission_short_circuits() {
    let mut scripted = ScriptedSource::new(Ok(fix_aged(0)));
    scripted.authorization = Authorization::Denied;
    scripted.cached = Some(fix_aged(1));
    let source = Arc::new(scripted);
    let cache = spawn(&source, &memory_store());

    let err = cache.get_location().await.unwrap_err();
    assert!(matches!(err, WidgetError::PermissionDenied { .. }));
    assert!(err.is_permission());
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn upstream_failure_falls_back_within_five_hours() {
    let mut scripted = ScriptedSource::new(Err(WidgetError::upstream(LOCATION_SOURCE, "offline")));
    scripted.cached = Some(fix_aged(4 * 60));
    let source = Arc::new(scripted);
    let cache = spawn(&source, &memory_store());

    assert_eq!(*cache.get_location().await.unwrap(), fix_aged(4 * 60));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn upstream_failure_uses_persisted_fallback() {
    let source = Arc::new(ScriptedSource::new(Err(WidgetError::upstream(
        LOCATION_SOURCE,
        "offline",
    ))));
    let store = memory_store();
    persist(store.as_ref(), &fix_aged(2 * 60)).unwrap();
    let cache = spawn(&source, &store);

    assert_eq!(*cache.get_location().await.unwrap(), fix_aged(2 * 60));
}

#[tokio::test(start_paused = true)]
async fn fallback_older_than_five_hours_is_rejected() {
    let mut scripted = ScriptedSource::new(Err(WidgetError::upstream(LOCATION_SOURCE, "offline")));
    scripted.cached = Some(fix_aged(6 * 60));
    let source = Arc::new(scripted);
    let cache = spawn(&source, &memory_store());

    assert!(matches!(
        cache.get_location().await,
        Err(WidgetError::UpstreamFailure { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_request_times_out_for_every_waiter() {
    let mut scripted = ScriptedSource::new(Ok(fix_aged(0)));
    scripted.delay = StdDuration::from_secs(60);
    scripted.cached = Some(fix_aged(60));
    let source = Arc::new(scripted);
    let cache = spawn(&source, &memory_store());

    let (a, b) = tokio::join!(cache.get_location(), cache.get_location());
    assert_eq!(source.calls(), 1);
    for result in [a, b] {
        assert!(matches!(
            result,
            Err(WidgetError::UpstreamTimeout { timeout_secs: 10, .. })
        ));
    }
}

#[test]
fn persisted_tier_reports_missing_fallback() {
    let store = memory_store();
    assert!(matches!(
        persisted_location(store.as_ref()),
        Err(WidgetError::NoCachedFallback { .. })
    ));
}

#[test]
fn persisted_tier_survives_sqlite_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("widgetline.db");
    {
        let store = SqliteStore::open_at(&path, "group.widgetline").unwrap();
        persist(&store, &fix_aged(5)).unwrap();
    }
    let store = SqliteStore::open_at(&path, "group.widgetline").unwrap();
    assert_eq!(persisted_location(&store).unwrap(), fix_aged(5));
    assert!(store.get("lastKnownLocation").unwrap().is_some());
}
