//! Visit records, the unit of work at the reception desk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  error::require,
  lifecycle::{AccessStatus, Milestone, VisitStatus},
  person::NewVisitor,
};

// ─── References ──────────────────────────────────────────────────────────────

/// The visitor side of a visit, denormalised from the visitor row at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorRef {
  pub visitor_id:  Uuid,
  pub national_id: String,
  pub name:        String,
  pub company:     Option<String>,
}

/// The host side of a visit, denormalised from the user row at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRef {
  pub user_id:    Uuid,
  pub name:       String,
  pub department: Option<String>,
}

// ─── Visit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
  pub visit_id:        Uuid,
  /// Store-assigned sequence number; unique and increasing.
  pub number:          i64,
  pub visitor:         VisitorRef,
  pub host:            HostRef,
  /// The user who registered the visit, if any.
  pub registered_by:   Option<Uuid>,
  pub reason:          String,
  pub scheduled_start: Option<DateTime<Utc>>,
  pub scheduled_end:   Option<DateTime<Utc>>,
  pub phone:           Option<String>,
  /// Room or office assigned to the visit.
  pub location:        Option<String>,
  pub notes:           Option<String>,
  pub cancel_reason:   Option<String>,
  pub status:          VisitStatus,
  pub access:          AccessStatus,
  pub created_at:      DateTime<Utc>,
  pub called_at:       Option<DateTime<Utc>>,
  pub started_at:      Option<DateTime<Utc>>,
  pub finished_at:     Option<DateTime<Utc>>,
  pub check_in:        Option<DateTime<Utc>>,
  pub check_out:       Option<DateTime<Utc>>,
}

impl Visit {
  /// Stamp the timestamp for `milestone` unless it is already set.
  pub fn stamp(&mut self, milestone: Milestone, now: DateTime<Utc>) {
    let slot = match milestone {
      Milestone::Called => &mut self.called_at,
      Milestone::Started => &mut self.started_at,
      Milestone::Finished => &mut self.finished_at,
      Milestone::CheckedIn => &mut self.check_in,
      Milestone::CheckedOut => &mut self.check_out,
    };
    if slot.is_none() {
      *slot = Some(now);
    }
  }

  pub fn set_status(&mut self, status: VisitStatus, now: DateTime<Utc>) {
    self.status = status;
    if let Some(m) = status.milestone() {
      self.stamp(m, now);
    }
  }

  pub fn set_access(&mut self, access: AccessStatus, now: DateTime<Utc>) {
    self.access = access;
    if let Some(m) = access.milestone() {
      self.stamp(m, now);
    }
  }

  /// Apply every field of `patch` except `host_id`, which the store resolves
  /// into a [`HostRef`] itself.
  pub fn apply(&mut self, patch: &VisitPatch, now: DateTime<Utc>) {
    if let Some(status) = patch.status {
      self.set_status(status, now);
    }
    if let Some(access) = patch.access {
      self.set_access(access, now);
    }
    if let Some(reason) = &patch.reason {
      self.reason = reason.clone();
    }
    if let Some(start) = patch.scheduled_start {
      self.scheduled_start = Some(start);
    }
    if let Some(end) = patch.scheduled_end {
      self.scheduled_end = Some(end);
    }
    if let Some(phone) = &patch.phone {
      self.phone = Some(phone.clone());
    }
    if let Some(location) = &patch.location {
      self.location = Some(location.clone());
    }
    if let Some(notes) = &patch.notes {
      self.notes = Some(notes.clone());
    }
  }

  /// The instant used for date filters and "today" statistics.
  pub fn reference_time(&self) -> DateTime<Utc> {
    self.scheduled_start.unwrap_or(self.created_at)
  }
}

/// Outcome of [`crate::store::VisitStore::check_in`].
#[derive(Debug, Clone)]
pub struct CheckIn {
  pub visit: Visit,
  /// `true` only for the call that stamped `check_in`.
  pub first: bool,
}

// ─── NewVisit ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::VisitStore::register_visit`].
/// Number, status and timestamps are always set by the store.
#[derive(Debug, Clone)]
pub struct NewVisit {
  pub visitor:         NewVisitor,
  pub host_id:         Uuid,
  pub registered_by:   Option<Uuid>,
  pub reason:          String,
  pub scheduled_start: Option<DateTime<Utc>>,
  pub scheduled_end:   Option<DateTime<Utc>>,
  pub phone:           Option<String>,
  pub location:        Option<String>,
  pub notes:           Option<String>,
  /// Walk-in without prior authorisation.
  pub unexpected:      bool,
}

impl NewVisit {
  pub fn validate(&self) -> Result<()> {
    self.visitor.validate()?;
    require("reason", &self.reason)?;
    Ok(())
  }

  pub fn initial_access(&self) -> AccessStatus {
    if self.unexpected {
      AccessStatus::Unexpected
    } else {
      AccessStatus::Preauthorized
    }
  }
}

// ─── VisitPatch ──────────────────────────────────────────────────────────────

/// Partial update for a visit. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct VisitPatch {
  pub status:          Option<VisitStatus>,
  pub access:          Option<AccessStatus>,
  pub host_id:         Option<Uuid>,
  pub reason:          Option<String>,
  pub scheduled_start: Option<DateTime<Utc>>,
  pub scheduled_end:   Option<DateTime<Utc>>,
  pub phone:           Option<String>,
  pub location:        Option<String>,
  pub notes:           Option<String>,
}

impl VisitPatch {
  pub fn is_empty(&self) -> bool {
    self.status.is_none()
      && self.access.is_none()
      && self.host_id.is_none()
      && self.reason.is_none()
      && self.scheduled_start.is_none()
      && self.scheduled_end.is_none()
      && self.phone.is_none()
      && self.location.is_none()
      && self.notes.is_none()
  }

  pub fn status(status: VisitStatus) -> Self {
    Self { status: Some(status), ..Self::default() }
  }
}
