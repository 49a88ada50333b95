use sea_orm_migration::prelude::*;

use crate::m20240601_000001_create_key_store::KeyStore;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // A presented key must resolve to at most one service.
        manager
            .create_index(
                Index::create()
                    .name("uniq_keystore_api_key")
                    .table(KeyStore::Table)
                    .col(KeyStore::ApiKey)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uniq_keystore_api_key").table(KeyStore::Table).to_owned())
            .await
    }
}
