use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use common::metrics;
use configs::{KeyStoreConfig, LoadPolicy};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::domain::Service;
use super::repository::KeyStoreRepository;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    pub load_policy: LoadPolicy,
    pub write_timeout: Option<Duration>,
    pub load_timeout: Option<Duration>,
}

impl From<&KeyStoreConfig> for StoreOptions {
    fn from(cfg: &KeyStoreConfig) -> Self {
        Self {
            load_policy: cfg.load_policy,
            write_timeout: cfg.write_timeout_secs.map(Duration::from_secs),
            load_timeout: cfg.load_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Result of the last full table scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded { count: usize },
    /// The scan failed and the cache is not authoritative.
    Degraded { reason: String },
}

impl LoadStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// In-memory view of all services, written through to the backing table.
///
/// Reads are served from an immutable snapshot and never block. Writers run
/// their statement first and only then take `write_lock` to publish a new
/// snapshot, so the lock covers the cache step and nothing else. Concurrent
/// writers are not ordered against each other; the last one to publish wins.
pub struct ServiceKeyStore {
    repo: Arc<dyn KeyStoreRepository>,
    cache: ArcSwap<Vec<Service>>,
    status: ArcSwap<LoadStatus>,
    write_lock: Mutex<()>,
    options: StoreOptions,
}

impl ServiceKeyStore {
    /// Scan the table into a new store.
    ///
    /// Under [`LoadPolicy::FailOpen`] a failed scan still yields a store, with
    /// an empty cache and [`LoadStatus::Degraded`]; under
    /// [`LoadPolicy::FailClosed`] the scan error is returned.
    #[instrument(skip_all, fields(policy = ?options.load_policy))]
    pub async fn open(
        repo: Arc<dyn KeyStoreRepository>,
        options: StoreOptions,
    ) -> Result<(Self, LoadStatus), ServiceError> {
        let store = Self {
            repo,
            cache: ArcSwap::from_pointee(Vec::new()),
            status: ArcSwap::from_pointee(LoadStatus::Loaded { count: 0 }),
            write_lock: Mutex::new(()),
            options,
        };

        let status = match store.scan().await {
            Ok(rows) => {
                let count = rows.len();
                store.cache.store(Arc::new(rows));
                metrics::record_load("loaded", count);
                info!(count, "key store loaded");
                LoadStatus::Loaded { count }
            }
            Err(e) if options.load_policy == LoadPolicy::FailOpen => {
                metrics::record_load("degraded", 0);
                warn!(error = %e, "key store load failed; serving an empty, non-authoritative cache");
                LoadStatus::Degraded { reason: e.to_string() }
            }
            Err(e) => {
                metrics::record_load("failed", 0);
                error!(error = %e, "key store load failed");
                return Err(e);
            }
        };
        store.status.store(Arc::new(status.clone()));
        Ok((store, status))
    }

    async fn scan(&self) -> Result<Vec<Service>, ServiceError> {
        with_deadline(self.options.load_timeout, self.repo.load_all()).await
    }

    /// Re-scan the table and replace the cache. A failed scan keeps the
    /// current cache and status.
    ///
    /// `write_lock` is held across the scan, so a write that commits while
    /// the scan runs publishes after the new snapshot instead of being
    /// overwritten by it. Writers wait for the scan; readers do not.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<usize, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let rows = match self.scan().await {
            Ok(rows) => rows,
            Err(e) => {
                metrics::record_load("failed", self.len());
                warn!(error = %e, "key store reload failed; keeping current cache");
                return Err(e);
            }
        };
        let count = rows.len();
        self.cache.store(Arc::new(rows));
        self.status.store(Arc::new(LoadStatus::Loaded { count }));
        metrics::record_load("loaded", count);
        info!(count, "key store reloaded");
        Ok(count)
    }

    pub fn load_status(&self) -> LoadStatus {
        self.status.load().as_ref().clone()
    }

    pub fn list_all(&self) -> Vec<Service> {
        self.cache.load().as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.cache.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_by_id(&self, service_id: Uuid) -> Option<Service> {
        self.cache.load().iter().find(|s| s.service_id == service_id).cloned()
    }

    pub fn get_by_identifier(&self, identifier: &str) -> Option<Service> {
        self.cache.load().iter().find(|s| s.has_identifier(identifier)).cloned()
    }

    /// Service owning `api_key`. Every cached key is compared in constant
    /// time; the scan does not stop at the first match.
    pub fn find_by_api_key(&self, api_key: &str) -> Option<Service> {
        let snapshot = self.cache.load();
        let presented = api_key.as_bytes();
        let mut found: Option<&Service> = None;
        for service in snapshot.iter() {
            let hit: bool = service.api_key.as_bytes().ct_eq(presented).into();
            if hit && found.is_none() {
                found = Some(service);
            }
        }
        found.cloned()
    }

    /// Insert the row, then cache the service.
    #[instrument(skip_all, fields(service_id = %service.service_id))]
    pub async fn add(&self, service: Service) -> Result<(), ServiceError> {
        let res = with_deadline(self.options.write_timeout, self.repo.insert(&service)).await;
        metrics::record_write("add", res.is_ok());
        res?;

        let service_id = service.service_id;
        self.publish(|cache| {
            cache.retain(|s| s.service_id != service_id);
            cache.push(service);
        })
        .await;
        info!("service added");
        Ok(())
    }

    pub async fn try_add(&self, service: Service) -> bool {
        log_outcome("add", self.add(service).await)
    }

    /// Update the row of an already cached service, then replace the cached
    /// entry. A row missing from the table is reported as not found and the
    /// cache is left alone.
    #[instrument(skip_all, fields(service_id = %service.service_id))]
    pub async fn update(&self, service: Service) -> Result<(), ServiceError> {
        if self.get_by_id(service.service_id).is_none() {
            return Err(ServiceError::not_found("service"));
        }

        let res = with_deadline(self.options.write_timeout, self.repo.update(&service)).await;
        let res = match res {
            Ok(0) => {
                warn!("service row missing from table; cache is stale");
                Err(ServiceError::not_found("service row"))
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        metrics::record_write("update", res.is_ok());
        res?;

        let service_id = service.service_id;
        self.publish(|cache| {
            cache.retain(|s| s.service_id != service_id);
            cache.push(service);
        })
        .await;
        info!("service updated");
        Ok(())
    }

    pub async fn try_update(&self, service: Service) -> bool {
        log_outcome("update", self.update(service).await)
    }

    /// Delete the row of the service matching `identifier`, then evict it.
    /// Returns the evicted service.
    #[instrument(skip(self))]
    pub async fn remove(&self, identifier: &str) -> Result<Service, ServiceError> {
        let target = self
            .get_by_identifier(identifier)
            .ok_or_else(|| ServiceError::not_found("service"))?;

        let res = with_deadline(self.options.write_timeout, self.repo.delete(target.service_id)).await;
        metrics::record_write("remove", res.is_ok());
        if res? == 0 {
            debug!(service_id = %target.service_id, "service row already absent from table");
        }

        let service_id = target.service_id;
        self.publish(|cache| cache.retain(|s| s.service_id != service_id)).await;
        info!(service_id = %service_id, "service removed");
        Ok(target)
    }

    pub async fn try_remove(&self, identifier: &str) -> bool {
        log_outcome("remove", self.remove(identifier).await.map(|_| ()))
    }

    /// Apply `f` to a copy of the cache and publish it, under the write lock.
    async fn publish<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<Service>),
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.cache.load_full().as_ref().clone();
        f(&mut next);
        metrics::record_cached(next.len());
        self.cache.store(Arc::new(next));
    }
}

async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ServiceError::Timeout(format!("statement exceeded {:?}", limit)))?,
        None => fut.await,
    }
}

fn log_outcome(operation: &str, res: Result<(), ServiceError>) -> bool {
    match res {
        Ok(()) => true,
        Err(e) if e.is_not_found() => {
            debug!(operation, error = %e, "key store write skipped");
            false
        }
        Err(e) => {
            warn!(operation, error = %e, "key store write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::repository::mock::MockKeyStoreRepository;

    fn billing() -> Service {
        Service::new(
            Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap(),
            "Billing",
            "JGP-abcdefghijklmnopqrstuvwxyz012345",
        )
    }

    fn service(name: &str) -> Service {
        Service::new(Uuid::new_v4(), name, format!("JGP-{}", Uuid::new_v4().simple()))
    }

    async fn open_with(repo: Arc<MockKeyStoreRepository>) -> ServiceKeyStore {
        let (store, _) = ServiceKeyStore::open(repo, StoreOptions::default()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn open_loads_existing_rows() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing(), service("Reports")]));
        let (store, status) = ServiceKeyStore::open(repo, StoreOptions::default()).await.unwrap();
        assert_eq!(status, LoadStatus::Loaded { count: 2 });
        assert_eq!(store.load_status(), status);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_by_id(billing().service_id), Some(billing()));
    }

    #[tokio::test]
    async fn unreachable_table_fails_open_to_empty_cache() {
        let repo = Arc::new(MockKeyStoreRepository::unreachable());
        let (store, status) = ServiceKeyStore::open(repo, StoreOptions::default()).await.unwrap();
        assert!(store.list_all().is_empty());
        assert!(store.is_empty());
        assert!(status.is_degraded());
        assert!(store.load_status().is_degraded());
    }

    #[tokio::test]
    async fn unreachable_table_fails_closed_when_asked() {
        let repo = Arc::new(MockKeyStoreRepository::unreachable());
        let options = StoreOptions { load_policy: LoadPolicy::FailClosed, ..StoreOptions::default() };
        assert!(ServiceKeyStore::open(repo, options).await.is_err());
    }

    #[tokio::test]
    async fn add_then_get_by_id_returns_same_record() {
        let repo = Arc::new(MockKeyStoreRepository::default());
        let store = open_with(repo.clone()).await;
        for s in [billing(), service("Reports"), service("Audit")] {
            assert!(store.try_add(s.clone()).await);
            assert_eq!(store.get_by_id(s.service_id), Some(s.clone()));
            assert!(repo.rows().await.contains(&s));
        }
    }

    #[tokio::test]
    async fn add_is_found_by_derived_identifier() {
        let store = open_with(Arc::new(MockKeyStoreRepository::default())).await;
        assert!(store.try_add(billing()).await);
        assert_eq!(store.get_by_identifier("Api-Service-Billing"), Some(billing()));
        assert_eq!(store.get_by_identifier("Billing"), None);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let repo = Arc::new(MockKeyStoreRepository::default());
        let store = open_with(repo.clone()).await;
        repo.set_fail_writes(true);
        assert!(!store.try_add(billing()).await);
        assert!(store.list_all().is_empty());
        assert!(matches!(store.add(billing()).await, Err(ServiceError::Db(_))));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_by_table() {
        let store = open_with(Arc::new(MockKeyStoreRepository::default())).await;
        assert!(store.try_add(billing()).await);
        let mut clash = service("Other");
        clash.service_id = billing().service_id;
        assert!(!store.try_add(clash).await);
        assert_eq!(store.list_all(), vec![billing()]);
    }

    #[tokio::test]
    async fn update_replaces_cached_entry() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = open_with(repo.clone()).await;

        let renamed = Service::new(billing().service_id, "Invoicing", "JGP-rotatedrotatedrotatedrotated00");
        assert!(store.try_update(renamed.clone()).await);
        assert_eq!(store.get_by_id(renamed.service_id), Some(renamed.clone()));
        assert_eq!(store.get_by_identifier("Api-Service-Billing"), None);
        assert_eq!(store.get_by_identifier("Api-Service-Invoicing"), Some(renamed.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(repo.rows().await, vec![renamed]);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_false_and_changes_nothing() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = open_with(repo.clone()).await;
        let before = store.list_all();
        assert!(!store.try_update(service("Ghost")).await);
        assert_eq!(store.list_all(), before);
        assert!(store.update(service("Ghost")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_of_row_deleted_elsewhere_keeps_cache() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = open_with(repo.clone()).await;
        repo.delete(billing().service_id).await.unwrap();

        let renamed = Service::new(billing().service_id, "Invoicing", "JGP-x");
        assert!(!store.try_update(renamed).await);
        assert_eq!(store.list_all(), vec![billing()]);
    }

    #[tokio::test]
    async fn remove_evicts_record() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing(), service("Reports")]));
        let store = open_with(repo.clone()).await;

        assert!(store.try_remove(&billing().identifier()).await);
        assert_eq!(store.get_by_id(billing().service_id), None);
        assert!(!store.list_all().contains(&billing()));
        assert_eq!(store.len(), 1);
        assert!(!repo.rows().await.contains(&billing()));
    }

    #[tokio::test]
    async fn remove_of_unknown_identifier_is_false_and_changes_nothing() {
        let store = open_with(Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]))).await;
        let before = store.list_all();
        assert!(!store.try_remove("Api-Service-Ghost").await);
        assert_eq!(store.list_all(), before);
    }

    #[tokio::test]
    async fn remove_with_failed_delete_keeps_entry() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = open_with(repo.clone()).await;
        repo.set_fail_writes(true);
        assert!(!store.try_remove("Api-Service-Billing").await);
        assert_eq!(store.get_by_id(billing().service_id), Some(billing()));
    }

    #[tokio::test]
    async fn slow_write_times_out_as_failure() {
        let repo = Arc::new(MockKeyStoreRepository::default());
        repo.set_write_delay(Duration::from_millis(200));
        let options = StoreOptions { write_timeout: Some(Duration::from_millis(20)), ..StoreOptions::default() };
        let (store, _) = ServiceKeyStore::open(repo, options).await.unwrap();

        assert!(matches!(store.add(billing()).await, Err(ServiceError::Timeout(_))));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_are_all_kept() {
        let store = Arc::new(open_with(Arc::new(MockKeyStoreRepository::default())).await);
        let services: Vec<Service> = (0..64).map(|i| service(&format!("svc-{i}"))).collect();

        let handles: Vec<_> = services
            .iter()
            .cloned()
            .map(|s| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.try_add(s).await })
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap());
        }

        let cached = store.list_all();
        assert_eq!(cached.len(), services.len());
        for s in &services {
            assert!(cached.contains(s));
        }
    }

    #[tokio::test]
    async fn find_by_api_key_matches_exact_key_only() {
        let store = open_with(Arc::new(MockKeyStoreRepository::with_rows(vec![billing(), service("Reports")]))).await;
        assert_eq!(store.find_by_api_key(&billing().api_key), Some(billing()));
        assert_eq!(store.find_by_api_key("JGP-abcdefghijklmnopqrstuvwxyz01234"), None);
        assert_eq!(store.find_by_api_key(""), None);
    }

    #[tokio::test]
    async fn reload_picks_up_rows_written_elsewhere() {
        let repo = Arc::new(MockKeyStoreRepository::unreachable());
        let (store, status) = ServiceKeyStore::open(repo.clone(), StoreOptions::default()).await.unwrap();
        assert!(status.is_degraded());

        assert!(store.reload().await.is_err());
        assert!(store.load_status().is_degraded());

        repo.set_fail_load(false);
        repo.set_fail_writes(false);
        repo.insert(&billing()).await.unwrap();
        assert_eq!(store.reload().await.unwrap(), 1);
        assert_eq!(store.load_status(), LoadStatus::Loaded { count: 1 });
        assert_eq!(store.get_by_id(billing().service_id), Some(billing()));
    }

    #[tokio::test]
    async fn remove_during_reload_scan_stays_removed() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = Arc::new(open_with(repo.clone()).await);
        repo.set_load_delay(Duration::from_millis(200));

        let reloading = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.reload().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.try_remove("Api-Service-Billing").await);
        assert_eq!(reloading.await.unwrap().unwrap(), 1);

        assert!(repo.rows().await.is_empty());
        assert_eq!(store.get_by_id(billing().service_id), None);
        assert_eq!(store.find_by_api_key(&billing().api_key), None);
    }

    #[tokio::test]
    async fn update_during_reload_scan_is_kept() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = Arc::new(open_with(repo.clone()).await);
        repo.set_load_delay(Duration::from_millis(200));

        let reloading = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.reload().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let rotated = Service::new(billing().service_id, "Billing", "JGP-rotatedrotatedrotatedrotated00");
        assert!(store.try_update(rotated.clone()).await);
        reloading.await.unwrap().unwrap();

        assert_eq!(repo.rows().await, vec![rotated.clone()]);
        assert_eq!(store.list_all(), vec![rotated.clone()]);
        assert_eq!(store.find_by_api_key(&billing().api_key), None);
        assert_eq!(store.find_by_api_key(&rotated.api_key), Some(rotated));
    }

    #[tokio::test]
    async fn concurrent_updates_of_one_id_last_writer_wins() {
        let repo = Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]));
        let store = Arc::new(open_with(repo.clone()).await);
        repo.set_write_delay(Duration::from_millis(100));

        let first = Service::new(billing().service_id, "First", "JGP-firstfirstfirstfirstfirstfirst");
        let second = Service::new(billing().service_id, "Second", "JGP-secondsecondsecondsecondsecond");
        let early = {
            let store = Arc::clone(&store);
            let first = first.clone();
            tokio::spawn(async move { store.try_update(first).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let late = {
            let store = Arc::clone(&store);
            let second = second.clone();
            tokio::spawn(async move { store.try_update(second).await })
        };
        assert!(early.await.unwrap());
        assert!(late.await.unwrap());

        assert_eq!(store.list_all(), vec![second.clone()]);
        assert_eq!(repo.rows().await, vec![second]);
        assert_eq!(store.find_by_api_key(&first.api_key), None);
    }

    #[test]
    fn options_follow_config() {
        let cfg = KeyStoreConfig {
            load_policy: LoadPolicy::FailClosed,
            write_timeout_secs: Some(3),
            load_timeout_secs: None,
        };
        let opts = StoreOptions::from(&cfg);
        assert_eq!(opts.load_policy, LoadPolicy::FailClosed);
        assert_eq!(opts.write_timeout, Some(Duration::from_secs(3)));
        assert_eq!(opts.load_timeout, None);
    }
}
