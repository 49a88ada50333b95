//! Service layer for the key store.
//! - `keystore`: write-through cache of services over the `KeyStore` table.
//! - `auth`: API key generation and authentication against that cache.
//! - `validation`: request rules shared by the HTTP handlers.

pub mod auth;
pub mod errors;
pub mod keystore;
pub mod validation;
