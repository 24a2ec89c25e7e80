//! Single-flight location cache.
//!
//! One actor task owns all cache state. Callers talk to it over a channel and
//! receive their answer on a oneshot slot. While a fresh request is in flight
//! (`Requesting`), further callers are queued and every queued slot is drained
//! with the same `Arc` result when the request settles, so the location
//! source sees exactly one request per batch. Store access runs on tokio's
//! blocking pool.

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{load_persisted, persist, CachedLocation, LOCATION_SOURCE};
use crate::error::WidgetError;
use crate::events::Authorization;
use crate::sources::{KeyValueStore, LocationSource};
use crate::storage::LocationConfig;
use crate::time::Clock;

/// What every caller of a batch receives.
pub type LocationResult = Result<Arc<CachedLocation>, WidgetError>;

/// Freshness thresholds and request timeout.
#[derive(Debug, Clone, Copy)]
pub struct LocationPolicy {
    /// A cached fix younger than this is returned without a request.
    pub fresh: Duration,
    /// A cached fix younger than this is used when the request fails.
    pub fallback: Duration,
    pub timeout: std::time::Duration,
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self {
            fresh: Duration::minutes(30),
            fallback: Duration::hours(5),
            timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl From<&LocationConfig> for LocationPolicy {
    fn from(config: &LocationConfig) -> Self {
        Self {
            fresh: Duration::minutes(config.fresh_minutes),
            fallback: Duration::minutes(config.fallback_minutes),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
        }
    }
}

enum Command {
    Get(oneshot::Sender<LocationResult>),
    Settled(Result<CachedLocation, WidgetError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Requesting,
}

/// Handle to the location actor. Cheap to clone.
#[derive(Clone)]
pub struct LocationCache {
    tx: mpsc::UnboundedSender<Command>,
}

impl LocationCache {
    /// Start the actor on the current tokio runtime.
    pub fn spawn(
        source: Arc<dyn LocationSource>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        policy: LocationPolicy,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = LocationActor {
            source,
            store,
            clock,
            policy,
            phase: Phase::Idle,
            waiters: Vec::new(),
            self_tx: tx.downgrade(),
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    /// Resolve the current location through the cache tiers.
    ///
    /// # Errors
    /// Returns a permission error without touching the source when access is
    /// not granted, [`WidgetError::UpstreamTimeout`] when the fresh request
    /// outlives the timeout, and the upstream failure when no fallback fix is
    /// young enough.
    pub async fn get_location(&self) -> LocationResult {
        let (reply, rx) = oneshot::channel();
        let stopped = || WidgetError::upstream(LOCATION_SOURCE, "location cache stopped");
        self.tx.send(Command::Get(reply)).map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }
}

struct LocationActor {
    source: Arc<dyn LocationSource>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    policy: LocationPolicy,
    phase: Phase,
    waiters: Vec<oneshot::Sender<LocationResult>>,
    self_tx: mpsc::WeakUnboundedSender<Command>,
}

impl LocationActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Get(reply) => self.handle_get(reply).await,
                Command::Settled(result) => self.handle_settled(result).await,
            }
        }
        debug!("location cache stopped");
    }

    async fn handle_get(&mut self, reply: oneshot::Sender<LocationResult>) {
        match self.source.authorization() {
            Authorization::Authorized => {}
            Authorization::NotDetermined => {
                let _ = reply.send(Err(WidgetError::undetermined(LOCATION_SOURCE)));
                return;
            }
            Authorization::Denied | Authorization::Restricted => {
                let _ = reply.send(Err(WidgetError::denied(LOCATION_SOURCE)));
                return;
            }
        }

        let now = self.clock.now();
        if let Some(fix) = self.source.current_cached_fix() {
            if fix.is_within(now, self.policy.fresh) {
                debug!("Using OS cached fix ({}s old)", fix.age(now).num_seconds());
                self.store_fix(&fix).await;
                let _ = reply.send(Ok(Arc::new(fix)));
                return;
            }
        }

        if let Some(fix) = self.stored_fix().await {
            if fix.is_within(now, self.policy.fresh) {
                debug!("Using persisted fix ({}s old)", fix.age(now).num_seconds());
                let _ = reply.send(Ok(Arc::new(fix)));
                return;
            }
        }

        self.waiters.push(reply);
        if self.phase == Phase::Requesting {
            debug!("Joining in-flight location request ({} waiting)", self.waiters.len());
            return;
        }
        self.start_request();
    }

    fn start_request(&mut self) {
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        self.phase = Phase::Requesting;
        info!("Requesting fresh location fix");

        let source = Arc::clone(&self.source);
        let timeout = self.policy.timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, source.request_fresh_fix()).await {
                Ok(result) => result,
                Err(_) => Err(WidgetError::UpstreamTimeout {
                    source_name: LOCATION_SOURCE.to_string(),
                    timeout_secs: timeout.as_secs(),
                }),
            };
            let _ = tx.send(Command::Settled(result));
        });
    }

    async fn handle_settled(&mut self, result: Result<CachedLocation, WidgetError>) {
        self.phase = Phase::Idle;
        let resolved = match result {
            Ok(fix) => {
                info!("Location fix received: {}", fix.coordinate_string());
                self.store_fix(&fix).await;
                Ok(Arc::new(fix))
            }
            Err(err @ WidgetError::UpstreamTimeout { .. }) => {
                warn!("Location request timed out: {err}");
                Err(err)
            }
            Err(err) => {
                warn!("Location request failed: {err}");
                self.fallback().await.map(Arc::new).ok_or(err)
            }
        };

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(resolved.clone());
        }
    }

    async fn fallback(&self) -> Option<CachedLocation> {
        let now = self.clock.now();
        if let Some(fix) = self.source.current_cached_fix() {
            if fix.is_within(now, self.policy.fallback) {
                info!("Falling back to OS cached fix");
                return Some(fix);
            }
        }
        let fix = self.stored_fix().await?;
        if fix.is_within(now, self.policy.fallback) {
            info!("Falling back to persisted fix");
            return Some(fix);
        }
        None
    }

    /// Store reads and writes run on the blocking pool; the actor waits for
    /// them so a write is visible to the next command.
    async fn stored_fix(&self) -> Option<CachedLocation> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || load_persisted(store.as_ref())).await {
            Ok(Ok(fix)) => fix,
            Ok(Err(e)) => {
                warn!("Ignoring unreadable persisted location: {e}");
                None
            }
            Err(e) => {
                warn!("Persisted location read did not complete: {e}");
                None
            }
        }
    }

    async fn store_fix(&self, fix: &CachedLocation) {
        let store = Arc::clone(&self.store);
        let fix = fix.clone();
        match tokio::task::spawn_blocking(move || persist(store.as_ref(), &fix)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to persist location: {e}"),
            Err(e) => warn!("Location write did not complete: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::error::StoreError;
    use crate::storage::MemoryStore;
    use crate::time::ManualClock;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    struct FakeSource {
        authorization: Authorization,
        cached: Option<CachedLocation>,
        response: Mutex<Result<CachedLocation, WidgetError>>,
        delay: std::time::Duration,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn answering(response: Result<CachedLocation, WidgetError>) -> Self {
            Self {
                authorization: Authorization::Authorized,
                cached: None,
                response: Mutex::new(response),
                delay: std::time::Duration::from_millis(500),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LocationSource for FakeSource {
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

    fn spawn_cache(source: Arc<FakeSource>, store: Arc<MemoryStore>) -> LocationCache {
        let clock = Arc::new(ManualClock::new(utc("2026-01-13T09:00:00Z")));
        LocationCache::spawn(source, store, clock, LocationPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn success_is_persisted() {
        let fix = CachedLocation::new(48.85, 2.35, utc("2026-01-13T08:59:58Z"));
        let source = Arc::new(FakeSource::answering(Ok(fix.clone())));
        let store = Arc::new(MemoryStore::new());
        let cache = spawn_cache(Arc::clone(&source), Arc::clone(&store));

        let got = cache.get_location().await.unwrap();
        assert_eq!(*got, fix);
        assert_eq!(load_persisted(store.as_ref()).unwrap(), Some(fix));
    }

    struct ThreadRecordingStore {
        inner: MemoryStore,
        threads: Mutex<Vec<std::thread::ThreadId>>,
    }

    impl KeyValueStore for ThreadRecordingStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.inner.set(key, value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn store_access_runs_off_the_runtime_thread() {
        let fix = CachedLocation::new(48.85, 2.35, utc("2026-01-13T08:59:58Z"));
        let source = Arc::new(FakeSource::answering(Ok(fix)));
        let store = Arc::new(ThreadRecordingStore {
            inner: MemoryStore::new(),
            threads: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::new(utc("2026-01-13T09:00:00Z")));
        let cache = LocationCache::spawn(
            source,
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            clock,
            LocationPolicy::default(),
        );

        cache.get_location().await.unwrap();

        // The test runtime is single-threaded, so the actor shares this thread.
        let runtime_thread = std::thread::current().id();
        let threads = store.threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|t| *t != runtime_thread));
    }

    #[tokio::test(start_paused = true)]
    async fn restricted_fails_without_request() {
        let mut fake = FakeSource::answering(Err(WidgetError::upstream(LOCATION_SOURCE, "x")));
        fake.authorization = Authorization::Restricted;
        let source = Arc::new(fake);
        let cache = spawn_cache(Arc::clone(&source), Arc::new(MemoryStore::new()));

        assert!(matches!(
            cache.get_location().await,
            Err(WidgetError::PermissionDenied { .. })
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn undetermined_fails_without_request() {
        let mut fake = FakeSource::answering(Err(WidgetError::upstream(LOCATION_SOURCE, "x")));
        fake.authorization = Authorization::NotDetermined;
        let source = Arc::new(fake);
        let cache = spawn_cache(Arc::clone(&source), Arc::new(MemoryStore::new()));

        assert!(matches!(
            cache.get_location().await,
            Err(WidgetError::PermissionUndetermined { .. })
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_does_not_fall_back() {
        let mut fake = FakeSource::answering(Ok(CachedLocation::new(
            0.0,
            0.0,
            utc("2026-01-13T09:00:00Z"),
        )));
        fake.delay = std::time::Duration::from_secs(60);
        let source = Arc::new(fake);
        let store = Arc::new(MemoryStore::new());
        // An hour-old persisted fix is inside the fallback window but not fresh.
        persist(
            store.as_ref(),
            &CachedLocation::new(1.0, 1.0, utc("2026-01-13T08:00:00Z")),
        )
        .unwrap();
        let cache = spawn_cache(Arc::clone(&source), store);

        let err = cache.get_location().await.unwrap_err();
        assert_eq!(
            err,
            WidgetError::UpstreamTimeout {
                source_name: LOCATION_SOURCE.into(),
                timeout_secs: 10
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_new_batch_starts_after_settling() {
        let source = Arc::new(FakeSource::answering(Err(WidgetError::upstream(
            LOCATION_SOURCE,
            "unknown",
        ))));
        let cache = spawn_cache(Arc::clone(&source), Arc::new(MemoryStore::new()));

        assert!(cache.get_location().await.is_err());
        assert!(cache.get_location().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
