//! Handlers for `/visits` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/visits` | Register; 201. Queues a confirmation to the visitor |
//! | `GET`    | `/visits` | Filters: `status`, `access`, `visitor`, `company`, `department`, `host`, `host_id`, `visitor_id`, `date`, `limit` |
//! | `GET`    | `/visits/next` | Oldest awaiting visit; 404 if the queue is empty |
//! | `GET`    | `/visits/stats` | Counters |
//! | `GET`    | `/visits/{id}` | 404 if not found |
//! | `PUT`    | `/visits/{id}` | Partial update |
//! | `DELETE` | `/visits/{id}` | Cancel; optional `?reason=`. Queues a notice to the visitor |
//! | `POST`   | `/visits/{id}/check-in` | Queues an arrival notice to the host |
//! | `POST`   | `/visits/{id}/check-out` | |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use visitdesk_core::{
  lifecycle::{AccessStatus, VisitStatus},
  notice,
  person::NewVisitor,
  store::{VisitQuery, VisitStats, VisitStore},
  visit::{NewVisit, Visit, VisitPatch},
};

use crate::{
  AppState,
  error::{ApiError, JsonBody, QueryParams},
};

fn visit_not_found(id: Uuid) -> ApiError { ApiError::NotFound(format!("visit {id} not found")) }

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub visitor:         NewVisitor,
  pub host_id:         Uuid,
  pub reason:          String,
  pub scheduled_start: Option<DateTime<Utc>>,
  pub scheduled_end:   Option<DateTime<Utc>>,
  pub phone:           Option<String>,
  pub location:        Option<String>,
  pub notes:           Option<String>,
  pub registered_by:   Option<Uuid>,
  #[serde(default)]
  pub unexpected:      bool,
}

/// `POST /visits`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VisitStore,
{
  let email = body.visitor.email.clone();
  let visit = state
    .store
    .register_visit(NewVisit {
      visitor:         body.visitor,
      host_id:         body.host_id,
      registered_by:   body.registered_by,
      reason:          body.reason,
      scheduled_start: body.scheduled_start,
      scheduled_end:   body.scheduled_end,
      phone:           body.phone,
      location:        body.location,
      notes:           body.notes,
      unexpected:      body.unexpected,
    })
    .await
    .map_err(ApiError::store)?;

  state
    .notifier
    .send(notice::confirmation(&visit, &email, state.options.attach_badge));
  Ok((StatusCode::CREATED, Json(visit)))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:     Option<String>,
  pub access:     Option<String>,
  pub visitor:    Option<String>,
  pub company:    Option<String>,
  pub department: Option<String>,
  pub host:       Option<String>,
  pub host_id:    Option<Uuid>,
  pub visitor_id: Option<Uuid>,
  pub date:       Option<NaiveDate>,
  pub limit:      Option<usize>,
}

impl ListParams {
  fn into_query(self) -> Result<VisitQuery, ApiError> {
    Ok(VisitQuery {
      status:     self.status.as_deref().map(VisitStatus::parse).transpose()?,
      access:     self.access.as_deref().map(AccessStatus::parse).transpose()?,
      visitor:    self.visitor,
      company:    self.company,
      department: self.department,
      host:       self.host,
      host_id:    self.host_id,
      visitor_id: self.visitor_id,
      date:       self.date,
      limit:      self.limit,
    })
  }
}

/// `GET /visits`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Visit>>, ApiError>
where
  S: VisitStore,
{
  let query = params.into_query()?;
  let visits = state.store.list_visits(&query).await.map_err(ApiError::store)?;
  Ok(Json(visits))
}

/// `GET /visits/next`
pub async fn next<S>(State(state): State<AppState<S>>) -> Result<Json<Visit>, ApiError>
where
  S: VisitStore,
{
  let visit = state
    .store
    .next_awaiting()
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no visits awaiting".into()))?;
  Ok(Json(visit))
}

/// `GET /visits/stats`
pub async fn stats<S>(State(state): State<AppState<S>>) -> Result<Json<VisitStats>, ApiError>
where
  S: VisitStore,
{
  let stats = state.store.stats().await.map_err(ApiError::store)?;
  Ok(Json(stats))
}

// ─── Single visit ────────────────────────────────────────────────────────────

/// `GET /visits/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Visit>, ApiError>
where
  S: VisitStore,
{
  let visit = state
    .store
    .get_visit(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| visit_not_found(id))?;
  Ok(Json(visit))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  pub status:          Option<String>,
  pub access:          Option<String>,
  pub host_id:         Option<Uuid>,
  pub reason:          Option<String>,
  pub scheduled_start: Option<DateTime<Utc>>,
  pub scheduled_end:   Option<DateTime<Utc>>,
  pub phone:           Option<String>,
  pub location:        Option<String>,
  pub notes:           Option<String>,
}

impl UpdateBody {
  fn into_patch(self) -> Result<VisitPatch, ApiError> {
    Ok(VisitPatch {
      status:          self.status.as_deref().map(VisitStatus::parse).transpose()?,
      access:          self.access.as_deref().map(AccessStatus::parse).transpose()?,
      host_id:         self.host_id,
      reason:          self.reason,
      scheduled_start: self.scheduled_start,
      scheduled_end:   self.scheduled_end,
      phone:           self.phone,
      location:        self.location,
      notes:           self.notes,
    })
  }
}

/// `PUT /visits/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<UpdateBody>,
) -> Result<Json<Visit>, ApiError>
where
  S: VisitStore,
{
  let patch = body.into_patch()?;
  let visit = state
    .store
    .update_visit(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| visit_not_found(id))?;
  Ok(Json(visit))
}

#[derive(Debug, Deserialize)]
pub struct CancelParams {
  pub reason: Option<String>,
}

/// `DELETE /visits/{id}[?reason=…]`
pub async fn cancel<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  QueryParams(params): QueryParams<CancelParams>,
) -> Result<Json<Visit>, ApiError>
where
  S: VisitStore,
{
  let reason = params.reason.filter(|r| !r.trim().is_empty());
  let visit = state
    .store
    .cancel_visit(id, reason)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| visit_not_found(id))?;

  match state.store.get_visitor(visit.visitor.visitor_id).await {
    Ok(Some(visitor)) => state.notifier.send(notice::cancellation(&visit, &visitor.email)),
    Ok(None) => {}
    Err(e) => tracing::warn!(error = %e, visit_id = %id, "cancellation notice skipped"),
  }
  Ok(Json(visit))
}

/// `POST /visits/{id}/check-in`
///
/// Only the first check-in of a visit notifies the host.
pub async fn check_in<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Visit>, ApiError>
where
  S: VisitStore,
{
  let checked = state
    .store
    .check_in(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| visit_not_found(id))?;
  let visit = checked.visit;

  if checked.first {
    match state.store.get_user(visit.host.user_id).await {
      Ok(Some(host)) => state.notifier.send(notice::arrival(&visit, &host.email)),
      Ok(None) => {}
      Err(e) => tracing::warn!(error = %e, visit_id = %id, "arrival notice skipped"),
    }
  }
  Ok(Json(visit))
}

/// `POST /visits/{id}/check-out`
pub async fn check_out<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Visit>, ApiError>
where
  S: VisitStore,
{
  let visit = state
    .store
    .check_out(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| visit_not_found(id))?;
  Ok(Json(visit))
}
