//! Handlers for `/visitors` endpoints. Visitors are addressed by national ID.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use visitdesk_core::{
  person::{FrequentVisitor, Visitor},
  store::{VisitStore, VisitorQuery},
  visit::Visit,
};

use crate::{
  AppState,
  error::{ApiError, QueryParams},
};

const DEFAULT_MIN_VISITS: u64 = 3;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub name:    Option<String>,
  pub company: Option<String>,
}

/// `GET /visitors[?name=…][&company=…]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Visitor>>, ApiError>
where
  S: VisitStore,
{
  let query = VisitorQuery { name: params.name, company: params.company };
  let visitors = state.store.list_visitors(&query).await.map_err(ApiError::store)?;
  Ok(Json(visitors))
}

#[derive(Debug, Deserialize)]
pub struct FrequentParams {
  pub min_visits: Option<u64>,
}

/// `GET /visitors/frequent[?min_visits=N]`
pub async fn frequent<S>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<FrequentParams>,
) -> Result<Json<Vec<FrequentVisitor>>, ApiError>
where
  S: VisitStore,
{
  let min = params.min_visits.unwrap_or(DEFAULT_MIN_VISITS);
  let visitors = state.store.frequent_visitors(min).await.map_err(ApiError::store)?;
  Ok(Json(visitors))
}

async fn find<S: VisitStore>(state: &AppState<S>, national_id: &str) -> Result<Visitor, ApiError> {
  state
    .store
    .get_visitor_by_national_id(national_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("visitor {national_id} not found")))
}

/// `GET /visitors/{national_id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(national_id): Path<String>,
) -> Result<Json<Visitor>, ApiError>
where
  S: VisitStore,
{
  Ok(Json(find(&state, &national_id).await?))
}

/// `GET /visitors/{national_id}/visits`
pub async fn history<S>(
  State(state): State<AppState<S>>,
  Path(national_id): Path<String>,
) -> Result<Json<Vec<Visit>>, ApiError>
where
  S: VisitStore,
{
  find(&state, &national_id).await?;
  let visits = state
    .store
    .visitor_history(&national_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(visits))
}
