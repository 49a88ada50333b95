use async_trait::async_trait;
use uuid::Uuid;

use super::domain::Service;
use crate::errors::ServiceError;

/// Durable side of the key store. Each call is one statement.
#[async_trait]
pub trait KeyStoreRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Service>, ServiceError>;
    async fn insert(&self, service: &Service) -> Result<(), ServiceError>;
    /// Returns rows affected.
    async fn update(&self, service: &Service) -> Result<u64, ServiceError>;
    /// Returns rows affected.
    async fn delete(&self, service_id: Uuid) -> Result<u64, ServiceError>;
}

/// In-memory repository for tests, demos and running without a database.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Behaves like the `KeyStore` table: primary key on id, unique api key.
    /// Loads and writes can be made to fail or stall.
    #[derive(Default)]
    pub struct MockKeyStoreRepository {
        rows: Mutex<Vec<Service>>,
        fail_load: AtomicBool,
        fail_writes: AtomicBool,
        write_delay_ms: AtomicU64,
        load_delay_ms: AtomicU64,
    }

    impl MockKeyStoreRepository {
        pub fn with_rows(rows: Vec<Service>) -> Self {
            Self { rows: Mutex::new(rows), ..Self::default() }
        }

        /// A repository whose table cannot be reached.
        pub fn unreachable() -> Self {
            let repo = Self::default();
            repo.set_fail_load(true);
            repo.set_fail_writes(true);
            repo
        }

        pub fn set_fail_load(&self, fail: bool) { self.fail_load.store(fail, Ordering::SeqCst); }

        pub fn set_fail_writes(&self, fail: bool) { self.fail_writes.store(fail, Ordering::SeqCst); }

        pub fn set_write_delay(&self, delay: Duration) {
            let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            self.write_delay_ms.store(ms, Ordering::SeqCst);
        }

        /// Stall each scan after it has read the rows.
        pub fn set_load_delay(&self, delay: Duration) {
            let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            self.load_delay_ms.store(ms, Ordering::SeqCst);
        }

        /// Current table contents.
        pub async fn rows(&self) -> Vec<Service> { self.rows.lock().await.clone() }

        async fn before_write(&self) -> Result<(), ServiceError> {
            let delay = self.write_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ServiceError::Db("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KeyStoreRepository for MockKeyStoreRepository {
        async fn load_all(&self) -> Result<Vec<Service>, ServiceError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(ServiceError::Db("connection refused".into()));
            }
            let rows = self.rows.lock().await.clone();
            let delay = self.load_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(rows)
        }

        async fn insert(&self, service: &Service) -> Result<(), ServiceError> {
            self.before_write().await?;
            let mut rows = self.rows.lock().await;
            if rows.iter().any(|r| r.service_id == service.service_id) {
                return Err(ServiceError::Db("duplicate key value violates primary key".into()));
            }
            if rows.iter().any(|r| r.api_key == service.api_key) {
                return Err(ServiceError::Db("duplicate key value violates uniq_keystore_api_key".into()));
            }
            rows.push(service.clone());
            Ok(())
        }

        async fn update(&self, service: &Service) -> Result<u64, ServiceError> {
            self.before_write().await?;
            let mut rows = self.rows.lock().await;
            if rows.iter().any(|r| r.api_key == service.api_key && r.service_id != service.service_id) {
                return Err(ServiceError::Db("duplicate key value violates uniq_keystore_api_key".into()));
            }
            match rows.iter_mut().find(|r| r.service_id == service.service_id) {
                Some(row) => {
                    row.service_name = service.service_name.clone();
                    row.api_key = service.api_key.clone();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete(&self, service_id: Uuid) -> Result<u64, ServiceError> {
            self.before_write().await?;
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|r| r.service_id != service_id);
            Ok((before - rows.len()) as u64)
        }
    }
}
