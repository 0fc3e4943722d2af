//! People known to the desk: external visitors and internal users (hosts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, error::require};

// ─── Visitors ────────────────────────────────────────────────────────────────

/// An external person who registers visits. Keyed by national ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
  pub visitor_id:  Uuid,
  pub national_id: String,
  pub name:        String,
  pub email:       String,
  pub company:     Option<String>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::VisitStore::upsert_visitor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVisitor {
  pub national_id: String,
  pub name:        String,
  pub email:       String,
  #[serde(default)]
  pub company:     Option<String>,
}

impl NewVisitor {
  pub fn validate(&self) -> Result<()> {
    require("visitor.national_id", &self.national_id)?;
    require("visitor.name", &self.name)?;
    require("visitor.email", &self.email)?;
    Ok(())
  }
}

/// A visitor together with how many visits they have registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequentVisitor {
  #[serde(flatten)]
  pub visitor:      Visitor,
  pub total_visits: u64,
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// A role a user plays (admin, reception, host, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub profile_id: i64,
  pub name:       String,
}

/// An organisational area a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
  pub department_id: i64,
  pub name:          String,
}

/// Profiles every store starts with.
pub const SEED_PROFILES: &[(i64, &str)] =
  &[(1, "admin"), (2, "reception"), (3, "host")];

// ─── Users ───────────────────────────────────────────────────────────────────

/// Name-only reference to another user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
  pub user_id: Uuid,
  pub name:    String,
}

/// An internal user; hosts are the users being visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:        Uuid,
  pub national_id:    String,
  pub name:           String,
  pub email:          String,
  pub profile:        Profile,
  pub department:     Option<Department>,
  pub supervisor:     Option<UserRef>,
  /// argon2 PHC string; never serialised.
  #[serde(skip)]
  pub password_hash:  Option<String>,
  /// Soft-delete marker.
  pub deactivated_at: Option<DateTime<Utc>>,
  pub created_at:     DateTime<Utc>,
}

impl User {
  pub fn is_active(&self) -> bool { self.deactivated_at.is_none() }
}

/// Input to [`crate::store::VisitStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub national_id:   String,
  pub name:          String,
  pub email:         String,
  pub profile_id:    i64,
  pub department_id: Option<i64>,
  pub supervisor_id: Option<Uuid>,
  pub password_hash: Option<String>,
}

impl NewUser {
  pub fn validate(&self) -> Result<()> {
    require("national_id", &self.national_id)?;
    require("name", &self.name)?;
    require("email", &self.email)?;
    Ok(())
  }
}

/// Partial update for a user. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
  pub name:          Option<String>,
  pub email:         Option<String>,
  pub profile_id:    Option<i64>,
  pub department_id: Option<i64>,
  pub supervisor_id: Option<Uuid>,
  pub password_hash: Option<String>,
}

impl UserPatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.email.is_none()
      && self.profile_id.is_none()
      && self.department_id.is_none()
      && self.supervisor_id.is_none()
      && self.password_hash.is_none()
  }
}
