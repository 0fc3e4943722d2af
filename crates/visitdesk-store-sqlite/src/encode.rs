//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings, so the first ten
//! characters are always the UTC calendar date. UUIDs are stored as
//! hyphenated lowercase strings; statuses as their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;
use visitdesk_core::{
  lifecycle::{AccessStatus, Milestone, VisitStatus},
  person::{Department, Profile, User, UserRef, Visitor},
  visit::{HostRef, Visit, VisitorRef},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Statuses ────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<VisitStatus> {
  VisitStatus::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown visit status: {s:?}")))
}

pub fn decode_access(s: &str) -> Result<AccessStatus> {
  AccessStatus::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown access status: {s:?}")))
}

/// The `visitas` column a milestone stamps.
pub fn milestone_column(m: Milestone) -> &'static str {
  match m {
    Milestone::Called => "called_at",
    Milestone::Started => "started_at",
    Milestone::Finished => "finished_at",
    Milestone::CheckedIn => "check_in",
    Milestone::CheckedOut => "check_out",
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawVisit::from_row`].
pub const VISIT_SELECT: &str = "
  SELECT
    v.visit_id, v.number,
    v.visitor_id, vis.national_id, vis.name, vis.company,
    v.host_id, h.name, a.name,
    v.registered_by, v.reason, v.scheduled_start, v.scheduled_end,
    v.phone, v.location, v.notes, v.cancel_reason,
    v.status, v.access,
    v.created_at, v.called_at, v.started_at, v.finished_at,
    v.check_in, v.check_out
  FROM visitas v
  JOIN visitantes vis ON vis.visitor_id = v.visitor_id
  JOIN usuarios   h   ON h.user_id      = v.host_id
  LEFT JOIN areas a   ON a.department_id = h.department_id";

/// Raw strings read directly from a `visitas` row joined with its visitor and
/// host.
pub struct RawVisit {
  pub visit_id:          String,
  pub number:            i64,
  pub visitor_id:        String,
  pub visitor_nid:       String,
  pub visitor_name:      String,
  pub visitor_company:   Option<String>,
  pub host_id:           String,
  pub host_name:         String,
  pub host_department:   Option<String>,
  pub registered_by:     Option<String>,
  pub reason:            String,
  pub scheduled_start:   Option<String>,
  pub scheduled_end:     Option<String>,
  pub phone:             Option<String>,
  pub location:          Option<String>,
  pub notes:             Option<String>,
  pub cancel_reason:     Option<String>,
  pub status:            String,
  pub access:            String,
  pub created_at:        String,
  pub called_at:         Option<String>,
  pub started_at:        Option<String>,
  pub finished_at:       Option<String>,
  pub check_in:          Option<String>,
  pub check_out:         Option<String>,
}

impl RawVisit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visit_id:        row.get(0)?,
      number:          row.get(1)?,
      visitor_id:      row.get(2)?,
      visitor_nid:     row.get(3)?,
      visitor_name:    row.get(4)?,
      visitor_company: row.get(5)?,
      host_id:         row.get(6)?,
      host_name:       row.get(7)?,
      host_department: row.get(8)?,
      registered_by:   row.get(9)?,
      reason:          row.get(10)?,
      scheduled_start: row.get(11)?,
      scheduled_end:   row.get(12)?,
      phone:           row.get(13)?,
      location:        row.get(14)?,
      notes:           row.get(15)?,
      cancel_reason:   row.get(16)?,
      status:          row.get(17)?,
      access:          row.get(18)?,
      created_at:      row.get(19)?,
      called_at:       row.get(20)?,
      started_at:      row.get(21)?,
      finished_at:     row.get(22)?,
      check_in:        row.get(23)?,
      check_out:       row.get(24)?,
    })
  }

  pub fn into_visit(self) -> Result<Visit> {
    Ok(Visit {
      visit_id:        decode_uuid(&self.visit_id)?,
      number:          self.number,
      visitor:         VisitorRef {
        visitor_id:  decode_uuid(&self.visitor_id)?,
        national_id: self.visitor_nid,
        name:        self.visitor_name,
        company:     self.visitor_company,
      },
      host:            HostRef {
        user_id:    decode_uuid(&self.host_id)?,
        name:       self.host_name,
        department: self.host_department,
      },
      registered_by:   decode_opt_uuid(self.registered_by)?,
      reason:          self.reason,
      scheduled_start: decode_opt_dt(self.scheduled_start)?,
      scheduled_end:   decode_opt_dt(self.scheduled_end)?,
      phone:           self.phone,
      location:        self.location,
      notes:           self.notes,
      cancel_reason:   self.cancel_reason,
      status:          decode_status(&self.status)?,
      access:          decode_access(&self.access)?,
      created_at:      decode_dt(&self.created_at)?,
      called_at:       decode_opt_dt(self.called_at)?,
      started_at:      decode_opt_dt(self.started_at)?,
      finished_at:     decode_opt_dt(self.finished_at)?,
      check_in:        decode_opt_dt(self.check_in)?,
      check_out:       decode_opt_dt(self.check_out)?,
    })
  }
}

pub const VISITOR_SELECT: &str = "
  SELECT visitor_id, national_id, name, email, company, created_at, updated_at
  FROM visitantes";

/// Raw strings read directly from a `visitantes` row.
pub struct RawVisitor {
  pub visitor_id:  String,
  pub national_id: String,
  pub name:        String,
  pub email:       String,
  pub company:     Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawVisitor {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visitor_id:  row.get(0)?,
      national_id: row.get(1)?,
      name:        row.get(2)?,
      email:       row.get(3)?,
      company:     row.get(4)?,
      created_at:  row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn into_visitor(self) -> Result<Visitor> {
    Ok(Visitor {
      visitor_id:  decode_uuid(&self.visitor_id)?,
      national_id: self.national_id,
      name:        self.name,
      email:       self.email,
      company:     self.company,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const USER_SELECT: &str = "
  SELECT
    u.user_id, u.national_id, u.name, u.email,
    u.profile_id, p.name,
    u.department_id, a.name,
    u.supervisor_id, s.name,
    u.password_hash, u.deactivated_at, u.created_at
  FROM usuarios u
  JOIN perfiles p      ON p.profile_id    = u.profile_id
  LEFT JOIN areas a    ON a.department_id = u.department_id
  LEFT JOIN usuarios s ON s.user_id       = u.supervisor_id";

/// Raw strings read directly from a `usuarios` row joined with its lookups.
pub struct RawUser {
  pub user_id:         String,
  pub national_id:     String,
  pub name:            String,
  pub email:           String,
  pub profile_id:      i64,
  pub profile_name:    String,
  pub department_id:   Option<i64>,
  pub department_name: Option<String>,
  pub supervisor_id:   Option<String>,
  pub supervisor_name: Option<String>,
  pub password_hash:   Option<String>,
  pub deactivated_at:  Option<String>,
  pub created_at:      String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(0)?,
      national_id:     row.get(1)?,
      name:            row.get(2)?,
      email:           row.get(3)?,
      profile_id:      row.get(4)?,
      profile_name:    row.get(5)?,
      department_id:   row.get(6)?,
      department_name: row.get(7)?,
      supervisor_id:   row.get(8)?,
      supervisor_name: row.get(9)?,
      password_hash:   row.get(10)?,
      deactivated_at:  row.get(11)?,
      created_at:      row.get(12)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    let department = match (self.department_id, self.department_name) {
      (Some(department_id), Some(name)) => Some(Department { department_id, name }),
      _ => None,
    };
    let supervisor = match (self.supervisor_id, self.supervisor_name) {
      (Some(id), Some(name)) => Some(UserRef { user_id: decode_uuid(&id)?, name }),
      _ => None,
    };

    Ok(User {
      user_id: decode_uuid(&self.user_id)?,
      national_id: self.national_id,
      name: self.name,
      email: self.email,
      profile: Profile { profile_id: self.profile_id, name: self.profile_name },
      department,
      supervisor,
      password_hash: self.password_hash,
      deactivated_at: decode_opt_dt(self.deactivated_at)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
