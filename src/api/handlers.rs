use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logic::{CopyError, CopyOperations, CopyOptions, MoveError};
use crate::model::{generate_id, Id, NewNode, Node, NodeKind};
use crate::store::NodeStore;

/// Shared application state: the store plus the copy engine bound to its
/// session cache.
pub struct AppState<S> {
    pub store: S,
    pub ops: CopyOperations,
}

pub type SharedState<S> = Arc<AppState<S>>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    pub kind: Option<NodeKind>,
}

#[derive(Debug, Deserialize)]
pub struct CopyRequest {
    pub source: Id,
    pub destination: Id,
    /// Generated server-side when absent.
    pub session: Option<String>,
    #[serde(default)]
    pub deactivate_triggers: bool,
}

#[derive(Debug, Serialize)]
pub struct CopyResponse {
    pub session: String,
    pub node: Node,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub source: Id,
    pub destination: Id,
}

type ApiError = (StatusCode, String);

fn copy_error_response(err: CopyError) -> ApiError {
    let status = match &err {
        CopyError::NodeMissing(_) => StatusCode::NOT_FOUND,
        CopyError::DestinationRejects { .. } | CopyError::CannotInstantiate(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CopyError::PropertyCopyFailed { .. }
        | CopyError::UnknownUseCase(_)
        | CopyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn move_error_response(err: MoveError) -> ApiError {
    let status = match &err {
        MoveError::NodeMissing(_) => StatusCode::NOT_FOUND,
        MoveError::DestinationRejects { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MoveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn store_error_response(err: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub async fn create_node<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Json(new_node): Json<NewNode>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let node = state
        .store
        .insert_node(new_node.into_node(String::new()))
        .await
        .map_err(store_error_response)?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn get_node<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
) -> Result<Json<Node>, ApiError> {
    let node = state
        .store
        .get_node(&id)
        .await
        .map_err(store_error_response)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("node '{}' not found", id)))?;
    Ok(Json(node))
}

pub async fn list_nodes<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Query(query): Query<NodeQuery>,
) -> Result<Json<Vec<Node>>, ApiError> {
    let nodes = state
        .store
        .list_nodes(query.kind)
        .await
        .map_err(store_error_response)?;
    Ok(Json(nodes))
}

pub async fn delete_node<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Path(id): Path<Id>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .store
        .delete_node(&id)
        .await
        .map_err(store_error_response)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("node '{}' not found", id)))
    }
}

pub async fn copy_node<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Json(request): Json<CopyRequest>,
) -> Result<(StatusCode, Json<CopyResponse>), ApiError> {
    let session = request.session.unwrap_or_else(generate_id);
    let options = CopyOptions {
        session: session.clone(),
        deactivate_triggers: request.deactivate_triggers,
    };
    let node = state
        .ops
        .copy(&state.store, &request.source, &request.destination, &options)
        .await
        .map_err(copy_error_response)?;
    Ok((StatusCode::CREATED, Json(CopyResponse { session, node })))
}

pub async fn move_node<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Json(request): Json<MoveRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .ops
        .move_node(&state.store, &request.source, &request.destination)
        .await
        .map_err(move_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_copy_session<S: NodeStore>(
    State(state): State<SharedState<S>>,
    Path(session): Path<String>,
) -> StatusCode {
    state.ops.clear_session(&session);
    StatusCode::NO_CONTENT
}
