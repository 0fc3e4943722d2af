//! Handlers for `/users` endpoints.
//!
//! Users are never removed: `DELETE /users/{id}` deactivates, and
//! `POST /users/{id}/reactivate` undoes it. Plain-text passwords in request
//! bodies are hashed with argon2 before they reach the store.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use visitdesk_core::{
  person::{NewUser, User, UserPatch},
  store::{UserQuery, VisitStore},
};

use crate::{
  AppState,
  error::{ApiError, JsonBody, QueryParams},
  session::hash_password,
};

fn user_not_found(id: Uuid) -> ApiError { ApiError::NotFound(format!("user {id} not found")) }

fn hash_opt(password: Option<String>) -> Result<Option<String>, ApiError> {
  password
    .filter(|p| !p.is_empty())
    .as_deref()
    .map(hash_password)
    .transpose()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub profile_id:    Option<i64>,
  pub department_id: Option<i64>,
  pub active:        Option<bool>,
}

/// `GET /users[?profile_id=…][&department_id=…][&active=true|false]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: VisitStore,
{
  let query = UserQuery {
    profile_id:    params.profile_id,
    department_id: params.department_id,
    active:        params.active,
  };
  let users = state.store.list_users(&query).await.map_err(ApiError::store)?;
  Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub national_id:   String,
  pub name:          String,
  pub email:         String,
  pub profile_id:    i64,
  pub department_id: Option<i64>,
  pub supervisor_id: Option<Uuid>,
  pub password:      Option<String>,
}

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VisitStore,
{
  let user = state
    .store
    .add_user(NewUser {
      national_id:   body.national_id,
      name:          body.name,
      email:         body.email,
      profile_id:    body.profile_id,
      department_id: body.department_id,
      supervisor_id: body.supervisor_id,
      password_hash: hash_opt(body.password)?,
    })
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user_id = %user.user_id, "user created");
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: VisitStore,
{
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| user_not_found(id))?;
  Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub profile_id:    Option<i64>,
  pub department_id: Option<i64>,
  pub supervisor_id: Option<Uuid>,
  pub password:      Option<String>,
}

/// `PUT /users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<UpdateBody>,
) -> Result<Json<User>, ApiError>
where
  S: VisitStore,
{
  let patch = UserPatch {
    name:          body.name,
    email:         body.email,
    profile_id:    body.profile_id,
    department_id: body.department_id,
    supervisor_id: body.supervisor_id,
    password_hash: hash_opt(body.password)?,
  };
  let user = state
    .store
    .update_user(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| user_not_found(id))?;
  Ok(Json(user))
}

/// `DELETE /users/{id}`
pub async fn deactivate<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: VisitStore,
{
  let user = state
    .store
    .set_user_active(id, false)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| user_not_found(id))?;
  let revoked = state.sessions.revoke_user(id).await;
  tracing::info!(user_id = %id, revoked, "user deactivated");
  Ok(Json(user))
}

/// `POST /users/{id}/reactivate`
pub async fn reactivate<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError>
where
  S: VisitStore,
{
  let user = state
    .store
    .set_user_active(id, true)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| user_not_found(id))?;
  Ok(Json(user))
}
