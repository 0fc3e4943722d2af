//! [`MemoryStore`]: a [`VisitStore`] held entirely in process memory.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use visitdesk_core::{
  Error, Result,
  error::require,
  lifecycle::{AccessStatus, VisitStatus},
  person::{
    Department, FrequentVisitor, NewUser, NewVisitor, Profile, SEED_PROFILES, User,
    UserPatch, UserRef, Visitor,
  },
  store::{UserQuery, VisitQuery, VisitStats, VisitStore, VisitorQuery},
  visit::{CheckIn, HostRef, NewVisit, Visit, VisitPatch, VisitorRef},
};

// ─── State ───────────────────────────────────────────────────────────────────

/// A user as stored: references are kept as keys and resolved on read.
#[derive(Debug, Clone)]
struct UserRow {
  user_id:        Uuid,
  national_id:    String,
  name:           String,
  email:          String,
  profile_id:     i64,
  department_id:  Option<i64>,
  supervisor_id:  Option<Uuid>,
  password_hash:  Option<String>,
  deactivated_at: Option<DateTime<Utc>>,
  created_at:     DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
  /// Keyed by sequence number, so iteration order is registration order.
  visits:           BTreeMap<i64, Visit>,
  visit_numbers:    HashMap<Uuid, i64>,
  last_number:      i64,
  visitors:         HashMap<Uuid, Visitor>,
  by_national_id:   HashMap<String, Uuid>,
  users:            HashMap<Uuid, UserRow>,
  profiles:         BTreeMap<i64, Profile>,
  departments:      BTreeMap<i64, Department>,
  last_department:  i64,
}

impl State {
  fn seeded() -> Self {
    let profiles = SEED_PROFILES
      .iter()
      .map(|&(profile_id, name)| (profile_id, Profile { profile_id, name: name.to_owned() }))
      .collect();
    Self { profiles, ..Self::default() }
  }

  fn upsert_visitor(&mut self, input: NewVisitor, now: DateTime<Utc>) -> Visitor {
    if let Some(id) = self.by_national_id.get(&input.national_id).copied() {
      if let Some(existing) = self.visitors.get_mut(&id) {
        existing.name = input.name;
        existing.email = input.email;
        if input.company.is_some() {
          existing.company = input.company;
        }
        existing.updated_at = now;
        return existing.clone();
      }
    }

    let visitor = Visitor {
      visitor_id:  Uuid::new_v4(),
      national_id: input.national_id,
      name:        input.name,
      email:       input.email,
      company:     input.company,
      created_at:  now,
      updated_at:  now,
    };
    self.by_national_id.insert(visitor.national_id.clone(), visitor.visitor_id);
    self.visitors.insert(visitor.visitor_id, visitor.clone());
    visitor
  }

  fn check_user_refs(
    &self,
    profile_id: Option<i64>,
    department_id: Option<i64>,
    supervisor_id: Option<Uuid>,
  ) -> Result<()> {
    if let Some(p) = profile_id.filter(|p| !self.profiles.contains_key(p)) {
      return Err(unknown("profile", p));
    }
    if let Some(d) = department_id.filter(|d| !self.departments.contains_key(d)) {
      return Err(unknown("department", d));
    }
    if let Some(s) = supervisor_id.filter(|s| !self.users.contains_key(s)) {
      return Err(unknown("supervisor", s));
    }
    Ok(())
  }

  fn user(&self, row: &UserRow) -> User {
    let profile = self.profiles.get(&row.profile_id).cloned().unwrap_or_else(|| Profile {
      profile_id: row.profile_id,
      name:       String::new(),
    });
    User {
      user_id: row.user_id,
      national_id: row.national_id.clone(),
      name: row.name.clone(),
      email: row.email.clone(),
      profile,
      department: row.department_id.and_then(|d| self.departments.get(&d).cloned()),
      supervisor: row
        .supervisor_id
        .and_then(|s| self.users.get(&s))
        .map(|s| UserRef { user_id: s.user_id, name: s.name.clone() }),
      password_hash: row.password_hash.clone(),
      deactivated_at: row.deactivated_at,
      created_at: row.created_at,
    }
  }

  fn host_ref(&self, user_id: Uuid) -> Option<HostRef> {
    let row = self.users.get(&user_id)?;
    Some(HostRef {
      user_id,
      name: row.name.clone(),
      department: row
        .department_id
        .and_then(|d| self.departments.get(&d))
        .map(|d| d.name.clone()),
    })
  }

  /// Refresh the denormalised visitor and host names from their current rows.
  fn hydrate(&self, visit: &Visit) -> Visit {
    let mut v = visit.clone();
    if let Some(visitor) = self.visitors.get(&v.visitor.visitor_id) {
      v.visitor = VisitorRef {
        visitor_id:  visitor.visitor_id,
        national_id: visitor.national_id.clone(),
        name:        visitor.name.clone(),
        company:     visitor.company.clone(),
      };
    }
    if let Some(host) = self.host_ref(v.host.user_id) {
      v.host = host;
    }
    v
  }

  fn visit_mut(&mut self, id: Uuid) -> Option<&mut Visit> {
    let number = self.visit_numbers.get(&id)?;
    self.visits.get_mut(number)
  }

  fn remove_visits(&mut self, keep: impl Fn(&Visit) -> bool) -> u64 {
    let before = self.visits.len();
    self.visits.retain(|_, v| keep(v));
    let visits = &self.visits;
    self.visit_numbers.retain(|_, n| visits.contains_key(n));
    (before - self.visits.len()) as u64
  }
}

fn unknown(kind: &'static str, id: impl ToString) -> Error {
  Error::UnknownReference { kind, id: id.to_string() }
}

fn contains(haystack: Option<&str>, needle: &Option<String>) -> bool {
  match needle {
    None => true,
    Some(n) => haystack
      .map(|h| h.to_lowercase().contains(&n.trim().to_lowercase()))
      .unwrap_or(false),
  }
}

fn day(dt: DateTime<Utc>) -> NaiveDate { dt.date_naive() }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A visitdesk store that keeps everything in memory.
pub struct MemoryStore {
  state: RwLock<State>,
}

impl MemoryStore {
  pub fn new() -> Self { Self { state: RwLock::new(State::seeded()) } }
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl VisitStore for MemoryStore {
  type Error = Error;

  // ── Visitors ──────────────────────────────────────────────────────────────

  async fn upsert_visitor(&self, input: NewVisitor) -> Result<Visitor> {
    input.validate()?;
    let mut state = self.state.write().await;
    Ok(state.upsert_visitor(input, Utc::now()))
  }

  async fn get_visitor(&self, id: Uuid) -> Result<Option<Visitor>> {
    Ok(self.state.read().await.visitors.get(&id).cloned())
  }

  async fn get_visitor_by_national_id(&self, national_id: &str) -> Result<Option<Visitor>> {
    let state = self.state.read().await;
    Ok(
      state
        .by_national_id
        .get(national_id)
        .and_then(|id| state.visitors.get(id))
        .cloned(),
    )
  }

  async fn list_visitors(&self, query: &VisitorQuery) -> Result<Vec<Visitor>> {
    let state = self.state.read().await;
    let mut found: Vec<Visitor> = state
      .visitors
      .values()
      .filter(|v| contains(Some(v.name.as_str()), &query.name))
      .filter(|v| contains(v.company.as_deref(), &query.company))
      .cloned()
      .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
  }

  async fn visitor_history(&self, national_id: &str) -> Result<Vec<Visit>> {
    let state = self.state.read().await;
    let Some(visitor_id) = state.by_national_id.get(national_id).copied() else {
      return Ok(Vec::new());
    };
    Ok(
      state
        .visits
        .values()
        .rev()
        .filter(|v| v.visitor.visitor_id == visitor_id)
        .map(|v| state.hydrate(v))
        .collect(),
    )
  }

  async fn frequent_visitors(&self, min_visits: u64) -> Result<Vec<FrequentVisitor>> {
    let state = self.state.read().await;
    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for v in state.visits.values() {
      *counts.entry(v.visitor.visitor_id).or_default() += 1;
    }

    let mut frequent: Vec<FrequentVisitor> = counts
      .into_iter()
      .filter(|&(_, n)| n >= min_visits)
      .filter_map(|(id, total_visits)| {
        let visitor = state.visitors.get(&id)?.clone();
        Some(FrequentVisitor { visitor, total_visits })
      })
      .collect();
    frequent.sort_by(|a, b| {
      b.total_visits
        .cmp(&a.total_visits)
        .then_with(|| a.visitor.name.cmp(&b.visitor.name))
    });
    Ok(frequent)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    input.validate()?;
    let mut state = self.state.write().await;

    if state.users.values().any(|u| u.national_id == input.national_id) {
      return Err(Error::DuplicateNationalId(input.national_id));
    }
    state.check_user_refs(Some(input.profile_id), input.department_id, input.supervisor_id)?;

    let row = UserRow {
      user_id:        Uuid::new_v4(),
      national_id:    input.national_id,
      name:           input.name,
      email:          input.email,
      profile_id:     input.profile_id,
      department_id:  input.department_id,
      supervisor_id:  input.supervisor_id,
      password_hash:  input.password_hash,
      deactivated_at: None,
      created_at:     Utc::now(),
    };
    let user = state.user(&row);
    state.users.insert(row.user_id, row);
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let state = self.state.read().await;
    Ok(state.users.get(&id).map(|row| state.user(row)))
  }

  async fn get_user_by_national_id(&self, national_id: &str) -> Result<Option<User>> {
    let state = self.state.read().await;
    Ok(
      state
        .users
        .values()
        .find(|u| u.national_id == national_id)
        .map(|row| state.user(row)),
    )
  }

  async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>> {
    let state = self.state.read().await;
    let mut users: Vec<User> = state
      .users
      .values()
      .filter(|u| query.profile_id.is_none_or(|p| u.profile_id == p))
      .filter(|u| query.department_id.is_none_or(|d| u.department_id == Some(d)))
      .filter(|u| query.active.is_none_or(|a| u.deactivated_at.is_none() == a))
      .map(|row| state.user(row))
      .collect();
    users.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(users)
  }

  async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>> {
    if patch.is_empty() {
      return Err(Error::EmptyPatch);
    }
    if let Some(name) = &patch.name {
      require("name", name)?;
    }
    if let Some(email) = &patch.email {
      require("email", email)?;
    }

    let mut state = self.state.write().await;
    if !state.users.contains_key(&id) {
      return Ok(None);
    }
    state.check_user_refs(patch.profile_id, patch.department_id, patch.supervisor_id)?;

    let Some(row) = state.users.get_mut(&id) else {
      return Ok(None);
    };
    if let Some(name) = patch.name {
      row.name = name;
    }
    if let Some(email) = patch.email {
      row.email = email;
    }
    if let Some(p) = patch.profile_id {
      row.profile_id = p;
    }
    if let Some(d) = patch.department_id {
      row.department_id = Some(d);
    }
    if let Some(s) = patch.supervisor_id {
      row.supervisor_id = Some(s);
    }
    if let Some(hash) = patch.password_hash {
      row.password_hash = Some(hash);
    }

    let row = row.clone();
    Ok(Some(state.user(&row)))
  }

  async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>> {
    let mut state = self.state.write().await;
    let Some(row) = state.users.get_mut(&id) else {
      return Ok(None);
    };
    if active {
      row.deactivated_at = None;
    } else if row.deactivated_at.is_none() {
      row.deactivated_at = Some(Utc::now());
    }
    let row = row.clone();
    Ok(Some(state.user(&row)))
  }

  async fn list_profiles(&self) -> Result<Vec<Profile>> {
    Ok(self.state.read().await.profiles.values().cloned().collect())
  }

  async fn list_departments(&self) -> Result<Vec<Department>> {
    let mut departments: Vec<Department> =
      self.state.read().await.departments.values().cloned().collect();
    departments.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(departments)
  }

  async fn add_department(&self, name: String) -> Result<Department> {
    require("name", &name)?;
    let name = name.trim().to_owned();
    let mut state = self.state.write().await;

    if state.departments.values().any(|d| d.name == name) {
      return Err(Error::DuplicateDepartment(name));
    }
    state.last_department += 1;
    let department = Department { department_id: state.last_department, name };
    state.departments.insert(department.department_id, department.clone());
    Ok(department)
  }

  // ── Visits ────────────────────────────────────────────────────────────────

  async fn register_visit(&self, input: NewVisit) -> Result<Visit> {
    input.validate()?;
    let mut state = self.state.write().await;

    let host = state.host_ref(input.host_id).ok_or(Error::HostNotFound(input.host_id))?;
    if let Some(by) = input.registered_by.filter(|by| !state.users.contains_key(by)) {
      return Err(unknown("user", by));
    }

    let access = input.initial_access();
    let now = Utc::now();
    let visitor = state.upsert_visitor(input.visitor, now);

    state.last_number += 1;
    let visit = Visit {
      visit_id:        Uuid::new_v4(),
      number:          state.last_number,
      visitor:         VisitorRef {
        visitor_id:  visitor.visitor_id,
        national_id: visitor.national_id,
        name:        visitor.name,
        company:     visitor.company,
      },
      host,
      registered_by:   input.registered_by,
      reason:          input.reason,
      scheduled_start: input.scheduled_start,
      scheduled_end:   input.scheduled_end,
      phone:           input.phone,
      location:        input.location,
      notes:           input.notes,
      cancel_reason:   None,
      status:          VisitStatus::Awaiting,
      access,
      created_at:      now,
      called_at:       None,
      started_at:      None,
      finished_at:     None,
      check_in:        None,
      check_out:       None,
    };

    state.visit_numbers.insert(visit.visit_id, visit.number);
    state.visits.insert(visit.number, visit.clone());
    tracing::debug!(number = visit.number, visit_id = %visit.visit_id, "visit registered");
    Ok(visit)
  }

  async fn get_visit(&self, id: Uuid) -> Result<Option<Visit>> {
    let state = self.state.read().await;
    Ok(
      state
        .visit_numbers
        .get(&id)
        .and_then(|n| state.visits.get(n))
        .map(|v| state.hydrate(v)),
    )
  }

  async fn list_visits(&self, query: &VisitQuery) -> Result<Vec<Visit>> {
    let state = self.state.read().await;
    let limit = query.limit.unwrap_or(usize::MAX);

    Ok(
      state
        .visits
        .values()
        .rev()
        .map(|v| state.hydrate(v))
        .filter(|v| query.status.is_none_or(|s| v.status == s))
        .filter(|v| query.access.is_none_or(|a| v.access == a))
        .filter(|v| query.host_id.is_none_or(|h| v.host.user_id == h))
        .filter(|v| query.visitor_id.is_none_or(|id| v.visitor.visitor_id == id))
        .filter(|v| query.date.is_none_or(|d| day(v.reference_time()) == d))
        .filter(|v| contains(Some(v.visitor.name.as_str()), &query.visitor))
        .filter(|v| contains(v.visitor.company.as_deref(), &query.company))
        .filter(|v| contains(v.host.department.as_deref(), &query.department))
        .filter(|v| contains(Some(v.host.name.as_str()), &query.host))
        .take(limit)
        .collect(),
    )
  }

  async fn next_awaiting(&self) -> Result<Option<Visit>> {
    let state = self.state.read().await;
    Ok(
      state
        .visits
        .values()
        .find(|v| v.status == VisitStatus::Awaiting)
        .map(|v| state.hydrate(v)),
    )
  }

  async fn update_visit(&self, id: Uuid, patch: VisitPatch) -> Result<Option<Visit>> {
    if patch.is_empty() {
      return Err(Error::EmptyPatch);
    }
    if let Some(reason) = &patch.reason {
      require("reason", reason)?;
    }

    let mut state = self.state.write().await;
    if !state.visit_numbers.contains_key(&id) {
      return Ok(None);
    }
    let host = match patch.host_id {
      Some(h) => Some(state.host_ref(h).ok_or(Error::HostNotFound(h))?),
      None => None,
    };

    let Some(visit) = state.visit_mut(id) else {
      return Ok(None);
    };
    visit.apply(&patch, Utc::now());
    if let Some(host) = host {
      visit.host = host;
    }
    let visit = visit.clone();
    Ok(Some(state.hydrate(&visit)))
  }

  async fn cancel_visit(&self, id: Uuid, reason: Option<String>) -> Result<Option<Visit>> {
    let mut state = self.state.write().await;
    let Some(visit) = state.visit_mut(id) else {
      return Ok(None);
    };
    visit.set_status(VisitStatus::Cancelled, Utc::now());
    if reason.is_some() {
      visit.cancel_reason = reason;
    }
    let visit = visit.clone();
    Ok(Some(state.hydrate(&visit)))
  }

  async fn check_in(&self, id: Uuid) -> Result<Option<CheckIn>> {
    let mut state = self.state.write().await;
    let Some(visit) = state.visit_mut(id) else {
      return Ok(None);
    };
    let first = visit.check_in.is_none();
    visit.set_access(AccessStatus::OnPremises, Utc::now());
    let visit = visit.clone();
    Ok(Some(CheckIn { visit: state.hydrate(&visit), first }))
  }

  async fn check_out(&self, id: Uuid) -> Result<Option<Visit>> {
    self.set_access(id, AccessStatus::Departed).await
  }

  async fn delete_visit(&self, id: Uuid) -> Result<bool> {
    let mut state = self.state.write().await;
    let Some(number) = state.visit_numbers.remove(&id) else {
      return Ok(false);
    };
    Ok(state.visits.remove(&number).is_some())
  }

  async fn stats(&self) -> Result<VisitStats> {
    let state = self.state.read().await;
    let today = day(Utc::now());

    let mut stats = VisitStats { last_number: state.last_number, ..VisitStats::default() };
    for v in state.visits.values() {
      stats.by_status.add(v.status, 1);
      stats.by_access.add(v.access, 1);
      if day(v.reference_time()) == today {
        stats.today += 1;
      }
      if v.check_in.is_some() && v.check_out.is_none() {
        stats.present += 1;
      }
      if v.check_out.is_some_and(|t| day(t) == today) {
        stats.departed_today += 1;
      }
    }
    stats.total = state.visits.len() as u64;
    Ok(stats)
  }

  async fn reset_visits(&self) -> Result<()> {
    let mut state = self.state.write().await;
    let removed = state.remove_visits(|_| false);
    state.last_number = 0;
    tracing::info!(removed, "visit table reset");
    Ok(())
  }

  async fn purge_closed(&self) -> Result<u64> {
    let mut state = self.state.write().await;
    let removed = state.remove_visits(|v| !v.status.is_closed());
    tracing::info!(removed, "closed visits purged");
    Ok(removed)
  }
}

impl MemoryStore {
  async fn set_access(&self, id: Uuid, access: AccessStatus) -> Result<Option<Visit>> {
    let mut state = self.state.write().await;
    let Some(visit) = state.visit_mut(id) else {
      return Ok(None);
    };
    visit.set_access(access, Utc::now());
    let visit = visit.clone();
    Ok(Some(state.hydrate(&visit)))
  }
}
