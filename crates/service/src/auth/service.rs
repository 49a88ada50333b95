use std::sync::Arc;

use common::metrics;
use tracing::{debug, instrument, warn};

use super::domain::{AuthenticateResult, ServicePrincipal, DEFAULT_SCHEME};
use super::errors::AuthError;
use crate::keystore::{LoadStatus, ServiceKeyStore};

/// Resolves presented API keys against the key store cache.
#[derive(Clone)]
pub struct ApiKeyAuthenticator {
    store: Arc<ServiceKeyStore>,
    scheme: String,
}

impl ApiKeyAuthenticator {
    pub fn new(store: Arc<ServiceKeyStore>) -> Self {
        Self { store, scheme: DEFAULT_SCHEME.to_string() }
    }

    pub fn with_scheme(store: Arc<ServiceKeyStore>, scheme: impl Into<String>) -> Self {
        Self { store, scheme: scheme.into() }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authenticate the value of the `X-Api-Key` header, if any.
    ///
    /// An unknown key is reported as `StoreUnavailable` rather than
    /// `InvalidKey` while the cache is degraded, since it may simply not
    /// have been loaded.
    #[instrument(skip_all, fields(scheme = %self.scheme))]
    pub fn authenticate(&self, header: Option<&str>) -> AuthenticateResult {
        let result = match header {
            None => AuthenticateResult::NoResult,
            Some(key) if key.trim().is_empty() => AuthenticateResult::Fail(AuthError::MissingKey),
            Some(key) => match self.store.find_by_api_key(key.trim()) {
                Some(service) => {
                    AuthenticateResult::Success(ServicePrincipal::from_service(&service, &self.scheme))
                }
                None => match self.store.load_status() {
                    LoadStatus::Degraded { reason } => {
                        AuthenticateResult::Fail(AuthError::StoreUnavailable(reason))
                    }
                    LoadStatus::Loaded { .. } => AuthenticateResult::Fail(AuthError::InvalidKey),
                },
            },
        };

        match &result {
            AuthenticateResult::Success(p) => {
                metrics::record_auth("success");
                debug!(service_id = %p.service_id, identifier = %p.identifier, "api key accepted");
            }
            AuthenticateResult::NoResult => metrics::record_auth("no_result"),
            AuthenticateResult::Fail(e) => {
                metrics::record_auth(e.label());
                warn!(code = e.code(), error = %e, "api key rejected");
            }
        }
        result
    }
}
