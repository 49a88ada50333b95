//! API-key authentication: key generation and resolution of a presented
//! `X-Api-Key` header against the service key store.

pub mod domain;
pub mod errors;
pub mod keygen;
pub mod service;

pub use domain::{AuthenticateResult, ServicePrincipal};
pub use keygen::{ApiKeyGenerator, RandomApiKeyGenerator};
pub use service::ApiKeyAuthenticator;
