use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::AuthError;
use crate::keystore::Service;

/// Header carrying the presented key.
pub const HEADER_NAME: &str = "X-Api-Key";
/// Authentication scheme name.
pub const DEFAULT_SCHEME: &str = "ApiKey";
/// Claim under which the service identifier is recorded.
pub const SERVICE_KEY_IDENTIFIER: &str = "service-key";
pub const SERVICE_ID_CLAIM: &str = "service-id";
pub const SERVICE_NAME_CLAIM: &str = "service-name";

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrincipal {
    pub service_id: Uuid,
    pub service_name: String,
    pub identifier: String,
    pub scheme: String,
}

impl ServicePrincipal {
    pub fn from_service(service: &Service, scheme: &str) -> Self {
        Self {
            service_id: service.service_id,
            service_name: service.service_name.clone(),
            identifier: service.identifier(),
            scheme: scheme.to_string(),
        }
    }

    pub fn claims(&self) -> Vec<(&'static str, String)> {
        vec![
            (SERVICE_ID_CLAIM, self.service_id.to_string()),
            (SERVICE_NAME_CLAIM, self.service_name.clone()),
            (SERVICE_KEY_IDENTIFIER, self.identifier.clone()),
        ]
    }
}

/// Outcome of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticateResult {
    Success(ServicePrincipal),
    /// No key was presented; other schemes may still apply.
    NoResult,
    Fail(AuthError),
}

impl AuthenticateResult {
    pub fn principal(&self) -> Option<&ServicePrincipal> {
        match self {
            Self::Success(p) => Some(p),
            _ => None,
        }
    }
}
