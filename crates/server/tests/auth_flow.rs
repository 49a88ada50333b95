use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use service::auth::{ApiKeyGenerator, RandomApiKeyGenerator};
use service::keystore::repository::mock::MockKeyStoreRepository;
use service::keystore::{Service, ServiceKeyStore, StoreOptions};
use tower::Service as _;
use uuid::Uuid;

use server::routes::{self, auth::ServerState};

fn billing() -> Service {
    Service::new(Uuid::new_v4(), "Billing", "JGP-abcdefghijklmnopqrstuvwxyz012345")
}

async fn build_app(repo: Arc<MockKeyStoreRepository>) -> anyhow::Result<(Router, Arc<ServiceKeyStore>)> {
    let (store, _) = ServiceKeyStore::open(repo, StoreOptions::default()).await?;
    let store = Arc::new(store);
    let keygen: Arc<dyn ApiKeyGenerator> = Arc::new(RandomApiKeyGenerator::default());
    let state = ServerState::new(Arc::clone(&store), keygen);
    Ok((routes::build_router(state, routes::api_cors()), store))
}

async fn send(app: &Router, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let resp = app.clone().call(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, body))
}

fn whoami(key: Option<&str>) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri("/api/whoami");
    if let Some(key) = key {
        builder = builder.header("X-Api-Key", key);
    }
    Ok(builder.body(Body::empty())?)
}

#[tokio::test]
async fn health_is_public() -> anyhow::Result<()> {
    let (app, _) = build_app(Arc::new(MockKeyStoreRepository::default())).await?;
    let req = Request::builder().uri("/health").body(Body::empty())?;
    let (status, body) = send(&app, req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
    Ok(())
}

#[tokio::test]
async fn known_key_reaches_protected_route() -> anyhow::Result<()> {
    let svc = billing();
    let (app, _) = build_app(Arc::new(MockKeyStoreRepository::with_rows(vec![svc.clone()]))).await?;

    let (status, body) = send(&app, whoami(Some(&svc.api_key))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"], "Api-Service-Billing");
    assert_eq!(body["service_id"], svc.service_id.to_string());
    assert_eq!(body["scheme"], "ApiKey");
    Ok(())
}

#[tokio::test]
async fn missing_or_wrong_key_is_unauthorized() -> anyhow::Result<()> {
    let (app, _) = build_app(Arc::new(MockKeyStoreRepository::with_rows(vec![billing()]))).await?;

    let resp = app.clone().call(whoami(None)?).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["www-authenticate"], "ApiKey");

    let (status, body) = send(&app, whoami(Some("JGP-wrong"))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["title"], "Unauthorized");
    assert_eq!(body["information"][0]["key"], "Code");
    assert_eq!(body["information"][0]["value"], "1004");
    Ok(())
}

#[tokio::test]
async fn degraded_store_answers_service_unavailable() -> anyhow::Result<()> {
    let (app, _) = build_app(Arc::new(MockKeyStoreRepository::unreachable())).await?;
    let (status, body) = send(&app, whoami(Some("JGP-anything"))?).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
    Ok(())
}

#[tokio::test]
async fn metrics_are_exposed() -> anyhow::Result<()> {
    let svc = billing();
    let (app, _) = build_app(Arc::new(MockKeyStoreRepository::with_rows(vec![svc.clone()]))).await?;
    send(&app, whoami(Some(&svc.api_key))?).await?;

    let resp = app.clone().call(Request::builder().uri("/metrics").body(Body::empty())?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let text = String::from_utf8(bytes.to_vec())?;
    assert!(text.contains("api_key_auth_total"));
    Ok(())
}

#[tokio::test]
async fn public_routes_allow_cross_origin_reads() -> anyhow::Result<()> {
    let (app, _) = build_app(Arc::new(MockKeyStoreRepository::default())).await?;
    let req = Request::builder().uri("/health").header("Origin", "https://dashboard.example").body(Body::empty())?;
    let resp = app.clone().call(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert!(resp.headers().get("access-control-allow-credentials").is_none());
    Ok(())
}
