use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::problem::ProblemDetails;
use service::auth::domain::HEADER_NAME;
use service::auth::errors::AuthError;
use service::auth::{ApiKeyAuthenticator, ApiKeyGenerator, AuthenticateResult, ServicePrincipal};
use service::keystore::ServiceKeyStore;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Header carrying the admin credential.
pub const ADMIN_HEADER_NAME: &str = "X-Admin-Key";

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<ServiceKeyStore>,
    pub authenticator: ApiKeyAuthenticator,
    pub keygen: Arc<dyn ApiKeyGenerator>,
    /// `None` disables the admin routes.
    pub admin_key: Option<Arc<str>>,
}

impl ServerState {
    pub fn new(store: Arc<ServiceKeyStore>, keygen: Arc<dyn ApiKeyGenerator>) -> Self {
        let authenticator = ApiKeyAuthenticator::new(Arc::clone(&store));
        Self { store, authenticator, keygen, admin_key: None }
    }

    pub fn with_admin_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.admin_key = Some(key.into());
        self
    }
}

/// Middleware: require `X-Admin-Key` to equal the configured admin key.
pub async fn require_admin_key(State(state): State<ServerState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.admin_key.as_deref() else {
        return ProblemDetails::new(403, Some("Forbidden"), None)
            .with_detail("the admin API is disabled; set auth.admin_key")
            .into_response();
    };
    let accepted: bool = {
        let presented = req
            .headers()
            .get(ADMIN_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        presented.as_bytes().ct_eq(expected.as_bytes()).into()
    };
    if !accepted {
        warn!(path = %req.uri().path(), "admin request rejected");
        return ProblemDetails::new(401, Some("Unauthorized"), None)
            .with_detail(format!("a valid {ADMIN_HEADER_NAME} header is required"))
            .into_response();
    }
    next.run(req).await
}

/// Middleware: resolve `X-Api-Key` to a [`ServicePrincipal`] and attach it to
/// the request, or answer with a problem-details rejection.
pub async fn require_api_key(State(state): State<ServerState>, mut req: Request, next: Next) -> Response {
    let result = {
        // a header that is not visible ASCII counts as blank
        let header = req.headers().get(HEADER_NAME).map(|v| v.to_str().unwrap_or_default());
        state.authenticator.authenticate(header)
    };

    match result {
        AuthenticateResult::Success(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        AuthenticateResult::NoResult => {
            unauthorized(&state, format!("the {HEADER_NAME} header is required"), None)
        }
        AuthenticateResult::Fail(AuthError::StoreUnavailable(_)) => {
            ProblemDetails::new(503, Some("Service Unavailable"), None)
                .with_detail("api keys cannot be verified right now")
                .into_response()
        }
        AuthenticateResult::Fail(e) => unauthorized(&state, e.to_string(), Some(e.code())),
    }
}

fn unauthorized(state: &ServerState, detail: String, code: Option<u16>) -> Response {
    let mut problem = ProblemDetails::new(401, Some("Unauthorized"), None).with_detail(detail);
    if let Some(code) = code {
        problem = problem.add_information("Code", &code.to_string());
    }
    let challenge = state.authenticator.scheme().to_string();
    ([(header::WWW_AUTHENTICATE, challenge)], problem).into_response()
}

/// The authenticated caller.
pub async fn whoami(Extension(principal): Extension<ServicePrincipal>) -> Json<ServicePrincipal> {
    Json(principal)
}
