//! Maintenance endpoints for the reception desk.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;
use visitdesk_core::store::VisitStore;

use crate::{AppState, error::ApiError};

/// `POST /admin/reset-visits`: start a new day. Drops every visit and restarts
/// numbering at 1.
pub async fn reset_visits<S>(State(state): State<AppState<S>>) -> Result<StatusCode, ApiError>
where
  S: VisitStore,
{
  state.store.reset_visits().await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/purge-closed`
pub async fn purge_closed<S>(State(state): State<AppState<S>>) -> Result<Json<Value>, ApiError>
where
  S: VisitStore,
{
  let removed = state.store.purge_closed().await.map_err(ApiError::store)?;
  Ok(Json(json!({ "removed": removed })))
}

/// `DELETE /admin/visits/{id}`: hard delete.
pub async fn delete_visit<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: VisitStore,
{
  if state.store.delete_visit(id).await.map_err(ApiError::store)? {
    tracing::info!(visit_id = %id, "visit deleted");
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("visit {id} not found")))
  }
}
