use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::keystore::domain::Service;
use crate::keystore::repository::KeyStoreRepository;

/// `KeyStore` table through SeaORM.
pub struct SeaOrmKeyStoreRepository {
    pub db: DatabaseConnection,
}

#[async_trait::async_trait]
impl KeyStoreRepository for SeaOrmKeyStoreRepository {
    async fn load_all(&self) -> Result<Vec<Service>, ServiceError> {
        let rows = models::service_key::list_all(&self.db).await?;
        Ok(rows.into_iter().map(Service::from).collect())
    }

    async fn insert(&self, service: &Service) -> Result<(), ServiceError> {
        Ok(models::service_key::insert(&self.db, &service.into()).await?)
    }

    async fn update(&self, service: &Service) -> Result<u64, ServiceError> {
        Ok(models::service_key::update(&self.db, &service.into()).await?)
    }

    async fn delete(&self, service_id: Uuid) -> Result<u64, ServiceError> {
        Ok(models::service_key::delete(&self.db, service_id).await?)
    }
}
