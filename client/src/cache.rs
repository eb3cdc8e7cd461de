//! Server-state cache.
//!
//! Reads are keyed by resource kind plus scope. Concurrent reads of one key
//! share a single backend request: the first reader takes the key's fill
//! lock and fetches, later readers wait on the lock and then find the value
//! already cached. Writes never touch cached values directly; they
//! invalidate keys, and the next read refetches.

use log::debug;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Services,
    Service,
    Incidents,
    PublicStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Services { org_id: String },
    Service { service_id: String },
    Incidents { org_id: String },
    PublicStatus { slug: String },
}

impl QueryKey {
    pub fn kind(&self) -> ResourceKind {
        match self {
            QueryKey::Services { .. } => ResourceKind::Services,
            QueryKey::Service { .. } => ResourceKind::Service,
            QueryKey::Incidents { .. } => ResourceKind::Incidents,
            QueryKey::PublicStatus { .. } => ResourceKind::PublicStatus,
        }
    }

    /// Organization the key is scoped to, when the key carries one.
    pub fn org_id(&self) -> Option<&str> {
        match self {
            QueryKey::Services { org_id } | QueryKey::Incidents { org_id } => Some(org_id.as_str()),
            QueryKey::Service { .. } | QueryKey::PublicStatus { .. } => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Services { org_id } => write!(f, "services:{}", org_id),
            QueryKey::Service { service_id } => write!(f, "service:{}", service_id),
            QueryKey::Incidents { org_id } => write!(f, "incidents:{}", org_id),
            QueryKey::PublicStatus { slug } => write!(f, "public-status:{}", slug),
        }
    }
}

/// Which cached reads a successful write makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub kind: ResourceKind,
    pub org_id: Option<String>,
    pub service_id: Option<String>,
}

impl Invalidation {
    /// Every key of `kind`.
    pub fn all(kind: ResourceKind) -> Self {
        Invalidation { kind, org_id: None, service_id: None }
    }

    /// Keys of `kind` scoped to `org_id`.
    pub fn org(kind: ResourceKind, org_id: &str) -> Self {
        Invalidation { kind, org_id: Some(org_id.to_string()), service_id: None }
    }

    pub fn service(service_id: &str) -> Self {
        Invalidation {
            kind: ResourceKind::Service,
            org_id: None,
            service_id: Some(service_id.to_string()),
        }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        if key.kind() != self.kind {
            return false;
        }
        if let (Some(wanted), Some(scoped)) = (self.org_id.as_deref(), key.org_id()) {
            if wanted != scoped {
                return false;
            }
        }
        match (self.service_id.as_deref(), key) {
            (Some(wanted), QueryKey::Service { service_id }) => wanted == service_id.as_str(),
            _ => true,
        }
    }
}

struct Cached {
    value: Arc<dyn Any + Send + Sync>,
    epoch: u64,
    stored_at: Instant,
}

struct Slot {
    fill: Arc<Mutex<()>>,
    /// Unique per slot and bumped on invalidation; a cached value is fresh
    /// only while its epoch matches.
    epoch: u64,
    cached: Option<Cached>,
}

pub struct QueryCache {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    next_epoch: AtomicU64,
    stale_after: Option<Duration>,
    fetches: AtomicU64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl QueryCache {
    pub fn new(stale_after: Option<Duration>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(1),
            stale_after,
            fetches: AtomicU64::new(0),
        }
    }

    fn bump(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of fetches this cache has issued to its loaders.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Fresh cached value for `key`, if any.
    pub async fn cached<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slots = self.slots.lock().await;
        let slot = slots.get(key)?;
        let cached = slot.cached.as_ref()?;
        if cached.epoch != slot.epoch {
            return None;
        }
        if let Some(limit) = self.stale_after {
            if cached.stored_at.elapsed() >= limit {
                return None;
            }
        }
        cached.value.downcast_ref::<T>().cloned()
    }

    /// Returns the cached value for `key` or runs `load` to fill it. At most
    /// one `load` per key is outstanding at a time. Errors are not cached.
    pub async fn fetch<T, E, F, Fut>(&self, key: QueryKey, load: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.cached::<T>(&key).await {
            debug!("cache hit {}", key);
            return Ok(hit);
        }

        let fill = {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                fill: Arc::new(Mutex::new(())),
                epoch: self.bump(),
                cached: None,
            });
            Arc::clone(&slot.fill)
        };
        let _guard = fill.lock_owned().await;

        // another reader may have filled the slot while we waited
        if let Some(hit) = self.cached::<T>(&key).await {
            debug!("cache hit {} after wait", key);
            return Ok(hit);
        }

        let epoch = match self.slots.lock().await.get(&key) {
            Some(slot) => slot.epoch,
            None => self.bump(),
        };

        debug!("cache miss {}, fetching", key);
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let value = load().await?;

        let mut slots = self.slots.lock().await;
        match slots.get_mut(&key) {
            Some(slot) if slot.epoch == epoch => {
                slot.cached = Some(Cached {
                    value: Arc::new(value.clone()),
                    epoch,
                    stored_at: Instant::now(),
                });
            }
            _ => debug!("{} invalidated during fetch, result not cached", key),
        }
        Ok(value)
    }

    /// Marks every matching key stale. Returns how many keys matched.
    pub async fn invalidate(&self, invalidation: &Invalidation) -> usize {
        let mut slots = self.slots.lock().await;
        let mut matched = 0;
        for (key, slot) in slots.iter_mut() {
            if invalidation.matches(key) {
                slot.epoch = self.bump();
                matched += 1;
                debug!("invalidated {}", key);
            }
        }
        matched
    }

    /// Drops every cached value and pending fill result. Slots stay so a
    /// fill already in flight keeps holding its key's lock.
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        debug!("clearing {} cached queries", slots.len());
        for slot in slots.values_mut() {
            slot.cached = None;
            slot.epoch = self.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn services(org: &str) -> QueryKey {
        QueryKey::Services { org_id: org.to_string() }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = QueryCache::default();
        let calls = &AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<Vec<u32>, ()> = cache
                .fetch(services("org-1"), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await;
            assert_eq!(value, Ok(vec![1, 2, 3]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_request() {
        let cache = QueryCache::default();
        let calls = &AtomicUsize::new(0);
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ()>(7u32)
        };

        let (a, b, c) = tokio::join!(
            cache.fetch(services("org-1"), load),
            cache.fetch(services("org-1"), load),
            cache.fetch(services("org-1"), load),
        );
        assert_eq!((a, b, c), (Ok(7), Ok(7), Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_scopes_do_not_share() {
        let cache = QueryCache::default();
        let a: Result<&str, ()> = cache.fetch(services("org-1"), || async { Ok("one") }).await;
        let b: Result<&str, ()> = cache.fetch(services("org-2"), || async { Ok("two") }).await;
        assert_eq!((a, b), (Ok("one"), Ok("two")));
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let cache = QueryCache::default();
        let _: Result<u32, ()> = cache.fetch(services("org-1"), || async { Ok(1) }).await;

        let matched = cache.invalidate(&Invalidation::org(ResourceKind::Services, "org-1")).await;
        assert_eq!(matched, 1);
        assert_eq!(cache.cached::<u32>(&services("org-1")).await, None);

        let fresh: Result<u32, ()> = cache.fetch(services("org-1"), || async { Ok(2) }).await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn scoped_invalidation_leaves_other_organizations() {
        let cache = QueryCache::default();
        let _: Result<u32, ()> = cache.fetch(services("org-1"), || async { Ok(1) }).await;
        let _: Result<u32, ()> = cache.fetch(services("org-2"), || async { Ok(2) }).await;

        cache.invalidate(&Invalidation::org(ResourceKind::Services, "org-1")).await;
        assert_eq!(cache.cached::<u32>(&services("org-1")).await, None);
        assert_eq!(cache.cached::<u32>(&services("org-2")).await, Some(2));

        cache.invalidate(&Invalidation::all(ResourceKind::Services)).await;
        assert_eq!(cache.cached::<u32>(&services("org-2")).await, None);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = QueryCache::default();
        let failed: Result<u32, &str> = cache.fetch(services("org-1"), || async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));

        let ok: Result<u32, &str> = cache.fetch(services("org-1"), || async { Ok(5) }).await;
        assert_eq!(ok, Ok(5));
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidation_during_fetch_keeps_result_out_of_cache() {
        let cache = Arc::new(QueryCache::default());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let result: Result<u32, ()> = cache
                    .fetch(services("org-1"), || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok(1)
                    })
                    .await;
                result
            })
        };

        started_rx.await.unwrap();
        cache.invalidate(&Invalidation::all(ResourceKind::Services)).await;
        release_tx.send(()).unwrap();

        assert_eq!(reader.await.unwrap(), Ok(1));
        assert_eq!(cache.cached::<u32>(&services("org-1")).await, None);
    }

    #[tokio::test]
    async fn stale_window_expires_entries() {
        let cache = QueryCache::new(Some(Duration::from_millis(20)));
        let _: Result<u32, ()> = cache.fetch(services("org-1"), || async { Ok(1) }).await;
        assert_eq!(cache.cached::<u32>(&services("org-1")).await, Some(1));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.cached::<u32>(&services("org-1")).await, None);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = QueryCache::default();
        let _: Result<u32, ()> = cache.fetch(services("org-1"), || async { Ok(1) }).await;
        cache.clear().await;
        assert_eq!(cache.cached::<u32>(&services("org-1")).await, None);
    }

    #[tokio::test]
    async fn clear_during_fetch_still_allows_one_request_per_key() {
        let cache = QueryCache::default();
        let in_flight = &AtomicUsize::new(0);
        let peak = &AtomicUsize::new(0);
        let load = move || async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(40)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, ()>(1u32)
        };

        let (first, second) = tokio::join!(cache.fetch(services("org-1"), load), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.clear().await;
            cache.fetch(services("org-1"), load).await
        });
        assert_eq!((first, second), (Ok(1), Ok(1)));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        // the first result predates the clear, so the second reader fetched again
        assert_eq!(cache.fetch_count(), 2);
    }

    #[test]
    fn invalidation_matching_rules() {
        let detail = QueryKey::Service { service_id: "svc-1".into() };
        assert!(Invalidation::service("svc-1").matches(&detail));
        assert!(!Invalidation::service("svc-2").matches(&detail));
        assert!(Invalidation::all(ResourceKind::Service).matches(&detail));

        let public = QueryKey::PublicStatus { slug: "acme".into() };
        assert!(Invalidation::all(ResourceKind::PublicStatus).matches(&public));
        assert!(!Invalidation::org(ResourceKind::Services, "org-1").matches(&public));

        let incidents = QueryKey::Incidents { org_id: "org-1".into() };
        assert!(Invalidation::org(ResourceKind::Incidents, "org-1").matches(&incidents));
        assert!(!Invalidation::org(ResourceKind::Incidents, "org-9").matches(&incidents));
    }
}
