//! Lookup tables: profiles (seeded, read-only) and departments.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use visitdesk_core::{
  person::{Department, Profile},
  store::VisitStore,
};

use crate::{
  AppState,
  error::{ApiError, JsonBody},
};

/// `GET /profiles`
pub async fn profiles<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Profile>>, ApiError>
where
  S: VisitStore,
{
  let profiles = state.store.list_profiles().await.map_err(ApiError::store)?;
  Ok(Json(profiles))
}

/// `GET /departments`
pub async fn departments<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Department>>, ApiError>
where
  S: VisitStore,
{
  let departments = state.store.list_departments().await.map_err(ApiError::store)?;
  Ok(Json(departments))
}

#[derive(Debug, Deserialize)]
pub struct DepartmentBody {
  pub name: String,
}

/// `POST /departments`, body: `{"name":"Finance"}`
pub async fn create_department<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<DepartmentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VisitStore,
{
  let department = state
    .store
    .add_department(body.name)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(department)))
}
