//! The `VisitStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (`visitdesk-store-sqlite`,
//! `visitdesk-store-memory`). The HTTP layer depends on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Classify,
  lifecycle::{AccessStatus, VisitStatus},
  person::{
    Department, FrequentVisitor, NewUser, NewVisitor, Profile, User, UserPatch,
    Visitor,
  },
  visit::{CheckIn, NewVisit, Visit, VisitPatch},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`VisitStore::list_visits`]. Text filters are literal,
/// Unicode case-insensitive substring matches.
#[derive(Debug, Clone, Default)]
pub struct VisitQuery {
  pub status:     Option<VisitStatus>,
  pub access:     Option<AccessStatus>,
  /// Visitor name.
  pub visitor:    Option<String>,
  pub company:    Option<String>,
  /// Host department name.
  pub department: Option<String>,
  /// Host name.
  pub host:       Option<String>,
  pub host_id:    Option<Uuid>,
  pub visitor_id: Option<Uuid>,
  /// UTC calendar date of the scheduled start (creation time if unscheduled).
  pub date:       Option<NaiveDate>,
  pub limit:      Option<usize>,
}

/// Parameters for [`VisitStore::list_visitors`].
#[derive(Debug, Clone, Default)]
pub struct VisitorQuery {
  pub name:    Option<String>,
  pub company: Option<String>,
}

/// Parameters for [`VisitStore::list_users`].
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
  pub profile_id:    Option<i64>,
  pub department_id: Option<i64>,
  /// `Some(true)`: active only; `Some(false)`: deactivated only.
  pub active:        Option<bool>,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub awaiting:    u64,
  pub calling:     u64,
  pub in_progress: u64,
  pub finished:    u64,
  pub cancelled:   u64,
}

impl StatusCounts {
  pub fn add(&mut self, status: VisitStatus, n: u64) {
    let slot = match status {
      VisitStatus::Awaiting => &mut self.awaiting,
      VisitStatus::Calling => &mut self.calling,
      VisitStatus::InProgress => &mut self.in_progress,
      VisitStatus::Finished => &mut self.finished,
      VisitStatus::Cancelled => &mut self.cancelled,
    };
    *slot += n;
  }

  pub fn sum(&self) -> u64 {
    self.awaiting + self.calling + self.in_progress + self.finished + self.cancelled
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCounts {
  pub preauthorized: u64,
  pub unexpected:    u64,
  pub on_premises:   u64,
  pub approved:      u64,
  pub rejected:      u64,
  pub departed:      u64,
}

impl AccessCounts {
  pub fn add(&mut self, access: AccessStatus, n: u64) {
    let slot = match access {
      AccessStatus::Preauthorized => &mut self.preauthorized,
      AccessStatus::Unexpected => &mut self.unexpected,
      AccessStatus::OnPremises => &mut self.on_premises,
      AccessStatus::Approved => &mut self.approved,
      AccessStatus::Rejected => &mut self.rejected,
      AccessStatus::Departed => &mut self.departed,
    };
    *slot += n;
  }

  pub fn sum(&self) -> u64 {
    self.preauthorized
      + self.unexpected
      + self.on_premises
      + self.approved
      + self.rejected
      + self.departed
  }
}

/// Summary returned by [`VisitStore::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitStats {
  pub total:          u64,
  pub by_status:      StatusCounts,
  pub by_access:      AccessCounts,
  /// Visits whose reference time falls on the current UTC date.
  pub today:          u64,
  /// Checked in and not yet checked out.
  pub present:        u64,
  pub departed_today: u64,
  /// Highest sequence number handed out so far (0 when none).
  pub last_number:    i64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a visitdesk storage backend.
///
/// Every lookup by identifier returns `Ok(None)` when the record does not
/// exist; errors are reserved for validation, conflicts and I/O.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait VisitStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Visitors ──────────────────────────────────────────────────────────

  /// Insert a visitor, or update name/email/company if the national ID is
  /// already known.
  fn upsert_visitor(
    &self,
    input: NewVisitor,
  ) -> impl Future<Output = Result<Visitor, Self::Error>> + Send + '_;

  fn get_visitor(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Visitor>, Self::Error>> + Send + '_;

  fn get_visitor_by_national_id<'a>(
    &'a self,
    national_id: &'a str,
  ) -> impl Future<Output = Result<Option<Visitor>, Self::Error>> + Send + 'a;

  /// Visitors matching `query`, ordered by name.
  fn list_visitors<'a>(
    &'a self,
    query: &'a VisitorQuery,
  ) -> impl Future<Output = Result<Vec<Visitor>, Self::Error>> + Send + 'a;

  /// All visits of one visitor, newest number first.
  fn visitor_history<'a>(
    &'a self,
    national_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Visit>, Self::Error>> + Send + 'a;

  /// Visitors with at least `min_visits` visits, most frequent first.
  fn frequent_visitors(
    &self,
    min_visits: u64,
  ) -> impl Future<Output = Result<Vec<FrequentVisitor>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user_by_national_id<'a>(
    &'a self,
    national_id: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Users matching `query`, ordered by name.
  fn list_users<'a>(
    &'a self,
    query: &'a UserQuery,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Returns an error if `patch` is empty.
  fn update_user(
    &self,
    id: Uuid,
    patch: UserPatch,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Deactivate (soft delete) or reactivate a user.
  fn set_user_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_profiles(
    &self,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  fn list_departments(
    &self,
  ) -> impl Future<Output = Result<Vec<Department>, Self::Error>> + Send + '_;

  fn add_department(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Department, Self::Error>> + Send + '_;

  // ── Visits ────────────────────────────────────────────────────────────

  /// Upsert the visitor, check the host exists and record a new visit with
  /// the next sequence number.
  fn register_visit(
    &self,
    input: NewVisit,
  ) -> impl Future<Output = Result<Visit, Self::Error>> + Send + '_;

  fn get_visit(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Visit>, Self::Error>> + Send + '_;

  /// Visits matching `query`, highest sequence number first.
  fn list_visits<'a>(
    &'a self,
    query: &'a VisitQuery,
  ) -> impl Future<Output = Result<Vec<Visit>, Self::Error>> + Send + 'a;

  /// The awaiting visit with the lowest sequence number.
  fn next_awaiting(
    &self,
  ) -> impl Future<Output = Result<Option<Visit>, Self::Error>> + Send + '_;

  /// Apply `patch`; status changes stamp their milestone at most once.
  fn update_visit(
    &self,
    id: Uuid,
    patch: VisitPatch,
  ) -> impl Future<Output = Result<Option<Visit>, Self::Error>> + Send + '_;

  /// Soft cancel: status `cancelled` plus an optional reason.
  fn cancel_visit(
    &self,
    id: Uuid,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Option<Visit>, Self::Error>> + Send + '_;

  /// Access `on_premises`; stamps `check_in` once. Reading the old stamp and
  /// writing the new one is atomic, so among concurrent calls exactly one
  /// reports [`CheckIn::first`].
  fn check_in(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<CheckIn>, Self::Error>> + Send + '_;

  /// Access `departed`; stamps `check_out` once.
  fn check_out(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Visit>, Self::Error>> + Send + '_;

  /// Hard delete. Returns `false` if the visit did not exist.
  fn delete_visit(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn stats(
    &self,
  ) -> impl Future<Output = Result<VisitStats, Self::Error>> + Send + '_;

  /// Remove every visit and restart numbering at 1.
  fn reset_visits(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove finished and cancelled visits; returns how many were removed.
  fn purge_closed(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
