use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(KeyStore::Table)
                    .if_not_exists()
                    .col(uuid(KeyStore::ServiceId).primary_key())
                    .col(text(KeyStore::ServiceName))
                    .col(text(KeyStore::ApiKey))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(KeyStore::Table).to_owned()).await
    }
}

// Column names are kept in PascalCase to match existing KeyStore tables.
#[derive(DeriveIden)]
pub(crate) enum KeyStore {
    #[sea_orm(iden = "KeyStore")]
    Table,
    #[sea_orm(iden = "ServiceId")]
    ServiceId,
    #[sea_orm(iden = "ServiceName")]
    ServiceName,
    #[sea_orm(iden = "ApiKey")]
    ApiKey,
}
