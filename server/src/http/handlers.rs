use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared_types::{Command, Entry, TrackingRecord};
use tracing::info;

use super::context::RequestContext;
use super::dto::{KeyQuery, MessageResponse};
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::boxes::BoxError;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health.report())
}

pub async fn entry_upsert(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Json(entries): Json<Vec<Entry>>,
) -> Json<HashMap<String, Option<String>>> {
    info!(user = %context.username, count = entries.len(), "upserting entries");
    Json(state.entries.upsert(entries, &context.username).await)
}

pub async fn entry_get(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Query(query): Query<KeyQuery>,
) -> ApiResult<Json<Entry>> {
    match state.entries.retrieve(&query.v).await {
        Ok(Some(entry)) => Ok(Json(entry)),
        Ok(None) => {
            Err(ApiError::not_found(format!("no entry at '{}'", query.v)).with_context(&context))
        }
        Err(err) => Err(ApiError::bad_request(err.to_string()).with_context(&context)),
    }
}

pub async fn entry_list(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Query(query): Query<KeyQuery>,
) -> ApiResult<Json<Vec<Entry>>> {
    state
        .entries
        .list(&query.v)
        .await
        .map(Json)
        .map_err(|err| ApiError::bad_request(err.to_string()).with_context(&context))
}

pub async fn entry_delete(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Query(query): Query<KeyQuery>,
) -> ApiResult<Json<MessageResponse>> {
    info!(user = %context.username, key = %query.v, "deleting entry");
    state
        .entries
        .delete(&query.v)
        .await
        .map(|()| Json(MessageResponse::new(format!("deleted '{}'", query.v))))
        .map_err(|err| ApiError::bad_request(err.to_string()).with_context(&context))
}

pub async fn entry_tracking(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Query(query): Query<KeyQuery>,
) -> ApiResult<Json<Vec<TrackingRecord>>> {
    state
        .entries
        .tracking(&query.v)
        .await
        .map(Json)
        .map_err(|err| ApiError::bad_request(err.to_string()).with_context(&context))
}

/// Commands arrive as a tagged envelope; anything outside the closed
/// tag set is a client error, not a deserialization quirk.
pub async fn box_upsert(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<Vec<String>>> {
    let command: Command = serde_json::from_value(body)
        .map_err(|err| ApiError::bad_request(err.to_string()).with_context(&context))?;

    match command {
        Command::UpsertTemplate(spec) => {
            info!(user = %context.username, service = %spec.service, "upserting box");
            Ok(Json(state.boxes.upsert_box(&spec).await))
        }
        Command::UpsertVariables(_) => Err(ApiError::bad_request(
            "command 'upsert.variables' is not supported, use the entry endpoints",
        )
        .with_context(&context)),
    }
}

pub async fn box_list(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
) -> ApiResult<Json<Vec<shared_types::BoxSpec>>> {
    state
        .boxes
        .list()
        .await
        .map(Json)
        .map_err(|err| box_error(err, &context))
}

/// Serves both GET and HEAD for a stored template. HEAD answers from
/// the blob metadata without pulling the body.
pub async fn box_retrieve(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    method: Method,
    Path((service, stage, template)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    if method == Method::HEAD {
        let found = state
            .boxes
            .exists(&service, &stage, &template)
            .await
            .map_err(|err| box_error(err, &context))?;
        let status = if found {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        return Ok(status.into_response());
    }

    let body = state
        .boxes
        .retrieve(&service, &stage, &template)
        .await
        .map_err(|err| box_error(err, &context))?;
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

pub async fn box_build(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Path((service, stage, template)): Path<(String, String, String)>,
    Query(args): Query<HashMap<String, String>>,
) -> ApiResult<Json<String>> {
    info!(user = %context.username, %service, %stage, %template, "building box");
    state
        .builder
        .build(&service, &stage, &template, &args)
        .await
        .map(Json)
        .map_err(|err| box_error(err, &context))
}

fn box_error(err: BoxError, context: &RequestContext) -> ApiError {
    let error = match err {
        BoxError::Blob(object_store::Error::NotFound { path, .. }) => {
            ApiError::not_found(format!("no template at '{path}'"))
        }
        BoxError::Decode(_) | BoxError::Body(_) => ApiError::bad_request(err.to_string()),
        _ => ApiError::internal(err.to_string()),
    };
    error.with_context(context)
}
