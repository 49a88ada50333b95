//! Service key store: an in-memory view of every known service and its API
//! key, written through to the `KeyStore` table.
//!
//! Layers follow the rest of the service crate: `domain` types, a
//! `repository` trait with SeaORM and in-memory implementations, and the
//! cache-owning [`ServiceKeyStore`].

pub mod domain;
pub mod repository;
pub mod repo;
pub mod store;

pub use domain::{Service, ServiceView};
pub use repository::KeyStoreRepository;
pub use store::{LoadStatus, ServiceKeyStore, StoreOptions};
