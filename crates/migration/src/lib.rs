//! Migrator for the service key store schema.
//! Indexes are applied last.
pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_key_store;
mod m20240601_000002_add_key_store_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_key_store::Migration),
            // Indexes should always be applied last
            Box::new(m20240601_000002_add_key_store_indexes::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_registered_in_order() {
        let names: Vec<String> = Migrator::migrations().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "m20240601_000001_create_key_store".to_string(),
                "m20240601_000002_add_key_store_indexes".to_string(),
            ]
        );
    }
}
