//! Phone number, credential and assistant management
//!
//! Thin proxies over [`PlatformClient`](crate::core::platform::PlatformClient).
//! List routes never fail the view: a platform error yields an empty list
//! with an `error` field.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::platform::{
    CreateCredentialRequest, CreatePhoneNumberRequest, PlatformClient, PlatformResult,
};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Body of every list route
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ListResponse<T> {
    fn from_result(resource: &str, result: AppResult<Vec<T>>) -> Self {
        match result {
            Ok(items) => Self {
                count: items.len(),
                items,
                error: None,
            },
            Err(e) => {
                warn!(resource, error = %e, "List request failed, returning empty list");
                Self {
                    items: Vec::new(),
                    count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

async fn list_or_empty<T, F, Fut>(
    state: &AppState,
    resource: &str,
    fetch: F,
) -> Json<ListResponse<T>>
where
    F: FnOnce(PlatformClient) -> Fut,
    Fut: std::future::Future<Output = PlatformResult<Vec<T>>>,
{
    let result = match state.platform() {
        Ok(client) => fetch(client.clone()).await.map_err(AppError::from),
        Err(e) => Err(e),
    };
    Json(ListResponse::from_result(resource, result))
}

fn deleted(resource: &str, id: &str, result: Value) -> Response {
    info!(resource, id, "Deleted");
    Json(json!({"deleted": true, "id": id, "result": result})).into_response()
}

// ---------------------------------------------------------------------------
// Phone numbers
// ---------------------------------------------------------------------------

pub async fn list_phone_numbers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    list_or_empty(&state, "phone-number", |client| async move {
        client.list_phone_numbers().await
    })
    .await
}

pub async fn create_phone_number(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePhoneNumberRequest>,
) -> AppResult<Response> {
    let created = state.platform()?.create_phone_number(&request).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update_phone_number(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> AppResult<Response> {
    let updated = state.platform()?.update_phone_number(&id, &patch).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_phone_number(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let result = state.platform()?.delete_phone_number(&id).await?;
    Ok(deleted("phone-number", &id, result))
}

// ---------------------------------------------------------------------------
// SIP trunk credentials
// ---------------------------------------------------------------------------

pub async fn list_credentials(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    list_or_empty(&state, "credential", |client| async move {
        client.list_credentials().await
    })
    .await
}

pub async fn get_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let credential = state.platform()?.get_credential(&id).await?;
    Ok(Json(credential).into_response())
}

pub async fn create_credential(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCredentialRequest>,
) -> AppResult<Response> {
    let created = state.platform()?.create_credential(&request).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// The platform rejects in-place edits; the rejection maps to 409.
pub async fn update_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> AppResult<Response> {
    let updated = state.platform()?.update_credential(&id, &patch).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let result = state.platform()?.delete_credential(&id).await?;
    Ok(deleted("credential", &id, result))
}

// ---------------------------------------------------------------------------
// Assistants
// ---------------------------------------------------------------------------

pub async fn list_assistants(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    list_or_empty(&state, "assistant", |client| async move {
        client.list_assistants().await
    })
    .await
}

pub async fn get_assistant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let assistant = state.platform()?.get_assistant(&id).await?;
    Ok(Json(assistant).into_response())
}

pub async fn create_assistant(
    State(state): State<Arc<AppState>>,
    Json(assistant): Json<Value>,
) -> AppResult<Response> {
    if !assistant.is_object() {
        return Err(AppError::BadRequest(
            "assistant must be a JSON object".to_string(),
        ));
    }
    let created = state.platform()?.create_assistant(&assistant).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

pub async fn update_assistant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> AppResult<Response> {
    let updated = state.platform()?.update_assistant(&id, &patch).await?;
    Ok(Json(updated).into_response())
}

/// Turn on listen/control endpoints for the assistant's calls.
pub async fn enable_assistant_monitoring(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let updated = state.platform()?.enable_monitoring(&id).await?;
    Ok(Json(updated).into_response())
}

pub async fn delete_assistant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let result = state.platform()?.delete_assistant(&id).await?;
    Ok(deleted("assistant", &id, result))
}
