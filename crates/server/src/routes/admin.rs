use axum::{
    extract::{Path, State},
    Json,
};
use common::receipt::{ActionOutcome, ActionReceipt, InfoEntry};
use serde::Deserialize;
use service::keystore::{Service, ServiceView};
use service::validation::{not_null_or_empty, required_if_true, validate_with};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::auth::ServerState;
use crate::errors::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[validate(length(max = 200))]
    pub service_name: String,
    /// Generated when absent.
    #[serde(default)]
    #[validate(length(min = 8, max = 256))]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateServiceRequest {
    #[validate(length(max = 200))]
    pub service_name: String,
    /// Replace the key with `api_key`.
    #[serde(default)]
    pub replace_key: bool,
    #[serde(default)]
    #[validate(length(min = 8, max = 256))]
    pub api_key: Option<String>,
    /// Replace the key with a generated one.
    #[serde(default)]
    pub rotate_key: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoveServicesRequest {
    #[serde(default)]
    pub identifiers: Option<Vec<Option<String>>>,
}

pub async fn list_services(State(state): State<ServerState>) -> Json<Vec<ServiceView>> {
    Json(state.store.list_all().iter().map(Service::view).collect())
}

pub async fn get_service(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceView>, ApiError> {
    state
        .store
        .get_by_id(id)
        .map(|s| Json(s.view()))
        .ok_or_else(|| service::errors::ServiceError::not_found("service").into())
}

pub async fn create_service(
    State(state): State<ServerState>,
    Json(mut input): Json<CreateServiceRequest>,
) -> Result<ActionReceipt, ApiError> {
    input.api_key = normalize_key(input.api_key);
    validate_with(&input, |errors| {
        required_if_true(errors, "service_name", true, Some(input.service_name.as_str()));
        reject_inner_whitespace(errors, input.api_key.as_deref());
    })?;

    let service_id = input.service_id.unwrap_or_else(Uuid::new_v4);
    if state.store.get_by_id(service_id).is_some() {
        return Err(ApiError::field("service_id", format!("A service with id {service_id} already exists.")));
    }
    let api_key = match input.api_key {
        Some(key) => {
            ensure_key_unassigned(&state, &key, None)?;
            key
        }
        None => state.keygen.generate_api_key(),
    };

    let created = Service::new(service_id, input.service_name.trim(), api_key);
    state.store.add(created.clone()).await?;
    info!(service_id = %created.service_id, identifier = %created.identifier(), "service created");

    Ok(ActionReceipt::success(1)
        .with_info(InfoEntry::SERVICE_ID, created.service_id.to_string())
        .with_info(InfoEntry::IDENTIFIER, created.identifier())
        .with_info(InfoEntry::API_KEY, created.api_key))
}

pub async fn update_service(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(mut input): Json<UpdateServiceRequest>,
) -> Result<ActionReceipt, ApiError> {
    input.api_key = normalize_key(input.api_key);
    validate_with(&input, |errors| {
        required_if_true(errors, "service_name", true, Some(input.service_name.as_str()));
        required_if_true(errors, "api_key", input.replace_key, input.api_key.as_deref());
        reject_inner_whitespace(errors, input.api_key.as_deref());
        if input.replace_key && input.rotate_key {
            let mut err = validator::ValidationError::new("exclusive");
            err.message = Some("rotate_key cannot be combined with replace_key.".into());
            errors.add("rotate_key", err);
        }
    })?;

    let current = state
        .store
        .get_by_id(id)
        .ok_or_else(|| service::errors::ServiceError::not_found("service"))?;

    let (api_key, key_changed) = match (input.replace_key, input.rotate_key, input.api_key) {
        (true, _, Some(key)) => {
            ensure_key_unassigned(&state, &key, Some(id))?;
            (key, true)
        }
        (_, true, _) => (state.keygen.generate_api_key(), true),
        _ => (current.api_key.clone(), false),
    };

    let updated = Service::new(id, input.service_name.trim(), api_key);
    state.store.update(updated.clone()).await?;
    info!(service_id = %id, identifier = %updated.identifier(), key_changed, "service updated");

    let receipt = ActionReceipt::success(1)
        .with_info(InfoEntry::SERVICE_ID, id.to_string())
        .with_info(InfoEntry::IDENTIFIER, updated.identifier());
    Ok(if key_changed { receipt.with_info(InfoEntry::API_KEY, updated.api_key) } else { receipt })
}

pub async fn remove_service(
    State(state): State<ServerState>,
    Path(identifier): Path<String>,
) -> Result<ActionReceipt, ApiError> {
    let removed = state.store.remove(&identifier).await?;
    Ok(ActionReceipt::success(1)
        .with_info(InfoEntry::SERVICE_ID, removed.service_id.to_string())
        .with_info(InfoEntry::IDENTIFIER, identifier))
}

/// Remove every listed identifier. Identifiers that match nothing are
/// reported in `errors`; any failed delete turns the receipt into an
/// exception.
pub async fn remove_services(
    State(state): State<ServerState>,
    Json(input): Json<RemoveServicesRequest>,
) -> Result<ActionReceipt, ApiError> {
    let mut errors = ValidationErrors::new();
    not_null_or_empty(&mut errors, "identifiers", input.identifiers.as_deref());
    if !errors.errors().is_empty() {
        return Err(errors.into());
    }

    let mut receipt = ActionReceipt::default();
    let mut removed = 0u64;
    let mut failed = false;
    for identifier in input.identifiers.unwrap_or_default().into_iter().flatten() {
        match state.store.remove(&identifier).await {
            Ok(_) => {
                removed += 1;
                receipt = receipt.with_info(InfoEntry::IDENTIFIER, identifier);
            }
            Err(e) if e.is_not_found() => {
                receipt = receipt.with_error("identifiers", format!("{identifier} was not found."));
            }
            Err(e) => {
                failed = true;
                receipt = receipt.with_error("identifiers", format!("{identifier} could not be removed: {e}"));
            }
        }
    }

    receipt.outcome = match (failed, removed) {
        (true, _) => ActionOutcome::Exception,
        (false, 0) => ActionOutcome::NotFound,
        _ => ActionOutcome::Success,
    };
    Ok(receipt.with_affected_total(removed))
}

pub async fn reload_services(State(state): State<ServerState>) -> Result<ActionReceipt, ApiError> {
    let count = state.store.reload().await?;
    Ok(ActionReceipt::success(count as u64))
}

/// Presented keys are trimmed before lookup, so stored keys are too.
fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string())
}

fn reject_inner_whitespace(errors: &mut ValidationErrors, key: Option<&str>) {
    if key.is_some_and(|k| k.chars().any(char::is_whitespace)) {
        let mut err = validator::ValidationError::new("whitespace");
        err.message = Some("The api_key must not contain whitespace.".into());
        errors.add("api_key", err);
    }
}

fn ensure_key_unassigned(state: &ServerState, key: &str, owner: Option<Uuid>) -> Result<(), ApiError> {
    match state.store.find_by_api_key(key) {
        Some(holder) if Some(holder.service_id) != owner => {
            Err(ApiError::field("api_key", "The api_key is already assigned to another service."))
        }
        _ => Ok(()),
    }
}
