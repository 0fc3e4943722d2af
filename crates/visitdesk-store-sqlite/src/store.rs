//! [`SqliteStore`]: the SQLite implementation of [`VisitStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{
  Connection, OptionalExtension as _, params, params_from_iter, types::Value,
};
use uuid::Uuid;
use visitdesk_core::{
  lifecycle::{AccessStatus, VisitStatus},
  person::{
    Department, FrequentVisitor, NewUser, NewVisitor, Profile, User, UserPatch,
    Visitor,
  },
  store::{
    AccessCounts, StatusCounts, UserQuery, VisitQuery, VisitStats, VisitStore,
    VisitorQuery,
  },
  visit::{CheckIn, NewVisit, Visit, VisitPatch},
};

use crate::{
  Result,
  encode::{
    RawUser, RawVisit, RawVisitor, USER_SELECT, VISIT_SELECT, VISITOR_SELECT,
    decode_access, decode_status, encode_dt, encode_uuid, milestone_column,
  },
  schema::{SCHEMA, register_functions},
};

/// Outcome of a closure that can reject its input after looking at the
/// database. The outer `Result` carries I/O failures, the inner one domain
/// rejections.
type Checked<T> = std::result::Result<T, visitdesk_core::Error>;

/// SQL expression for the UTC date a visit is filed under.
const VISIT_DAY: &str = "substr(COALESCE(v.scheduled_start, v.created_at), 1, 10)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A visitdesk store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening sqlite store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        register_functions(conn)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Apply `sets` to one visit row and read it back. The visit and the new
  /// host (if any) are checked inside the same transaction.
  async fn patch_visit(
    &self,
    id: Uuid,
    host_id: Option<Uuid>,
    sets: Vec<(String, Value)>,
  ) -> Result<Option<Visit>> {
    let id_str = encode_uuid(id);

    let raw: Checked<Option<RawVisit>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(&tx, "SELECT 1 FROM visitas WHERE visit_id = ?1", &id_str)? {
          return Ok(Ok(None));
        }
        if let Some(host) = host_id {
          if !exists(&tx, "SELECT 1 FROM usuarios WHERE user_id = ?1", &encode_uuid(host))? {
            return Ok(Err(visitdesk_core::Error::HostNotFound(host)));
          }
        }

        let (columns, mut values): (Vec<String>, Vec<Value>) = sets.into_iter().unzip();
        values.push(Value::Text(id_str.clone()));
        tx.execute(
          &format!("UPDATE visitas SET {} WHERE visit_id = ?", columns.join(", ")),
          params_from_iter(values),
        )?;

        let raw = visit_row(&tx, &id_str)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    raw?.map(RawVisit::into_visit).transpose()
  }

  async fn fetch_visits(&self, tail: String, values: Vec<Value>) -> Result<Vec<Visit>> {
    let raws = self
      .conn
      .call(move |conn| Ok(visit_rows(conn, &tail, values)?))
      .await?;
    raws.into_iter().map(RawVisit::into_visit).collect()
  }

  async fn fetch_users(&self, tail: String, values: Vec<Value>) -> Result<Vec<User>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!("{USER_SELECT} {tail}"))?;
        let rows = stmt
          .query_map(params_from_iter(values), RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn fetch_visitors(&self, tail: String, values: Vec<Value>) -> Result<Vec<Visitor>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!("{VISITOR_SELECT} {tail}"))?;
        let rows = stmt
          .query_map(params_from_iter(values), RawVisitor::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawVisitor::into_visitor).collect()
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn exists(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, params![key], |_| Ok(())).optional()?.is_some())
}

fn visit_row(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawVisit>> {
  conn
    .query_row(
      &format!("{VISIT_SELECT} WHERE v.visit_id = ?1"),
      params![id],
      RawVisit::from_row,
    )
    .optional()
}

fn visit_rows(
  conn: &Connection,
  tail: &str,
  values: Vec<Value>,
) -> rusqlite::Result<Vec<RawVisit>> {
  let mut stmt = conn.prepare(&format!("{VISIT_SELECT} {tail}"))?;
  let rows = stmt
    .query_map(params_from_iter(values), RawVisit::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn user_row(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("{USER_SELECT} WHERE u.user_id = ?1"),
      params![id],
      RawUser::from_row,
    )
    .optional()
}

fn visitor_row(conn: &Connection, national_id: &str) -> rusqlite::Result<Option<RawVisitor>> {
  conn
    .query_row(
      &format!("{VISITOR_SELECT} WHERE national_id = ?1"),
      params![national_id],
      RawVisitor::from_row,
    )
    .optional()
}

/// Insert or refresh a visitor keyed by national ID; returns its `visitor_id`.
fn upsert_visitor_row(
  conn: &Connection,
  input: &NewVisitor,
  now: &str,
) -> rusqlite::Result<String> {
  conn.execute(
    "INSERT INTO visitantes
       (visitor_id, national_id, name, email, company, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
     ON CONFLICT(national_id) DO UPDATE SET
       name       = excluded.name,
       email      = excluded.email,
       company    = COALESCE(excluded.company, visitantes.company),
       updated_at = excluded.updated_at",
    params![
      encode_uuid(Uuid::new_v4()),
      input.national_id,
      input.name,
      input.email,
      input.company,
      now,
    ],
  )?;
  conn.query_row(
    "SELECT visitor_id FROM visitantes WHERE national_id = ?1",
    params![input.national_id],
    |r| r.get(0),
  )
}

/// Check the optional foreign keys of a user write.
fn check_user_refs(
  conn: &Connection,
  profile_id: Option<i64>,
  department_id: Option<i64>,
  supervisor_id: Option<Uuid>,
) -> rusqlite::Result<Checked<()>> {
  if let Some(p) = profile_id {
    let found = conn
      .query_row("SELECT 1 FROM perfiles WHERE profile_id = ?1", params![p], |_| Ok(()))
      .optional()?;
    if found.is_none() {
      return Ok(Err(unknown("profile", p)));
    }
  }
  if let Some(d) = department_id {
    let found = conn
      .query_row("SELECT 1 FROM areas WHERE department_id = ?1", params![d], |_| Ok(()))
      .optional()?;
    if found.is_none() {
      return Ok(Err(unknown("department", d)));
    }
  }
  if let Some(s) = supervisor_id {
    if !exists(conn, "SELECT 1 FROM usuarios WHERE user_id = ?1", &encode_uuid(s))? {
      return Ok(Err(unknown("supervisor", s)));
    }
  }
  Ok(Ok(()))
}

fn unknown(kind: &'static str, id: impl ToString) -> visitdesk_core::Error {
  visitdesk_core::Error::UnknownReference { kind, id: id.to_string() }
}

/// Case-folded needle for a [`contains`] filter.
fn needle(s: &str) -> Value { Value::Text(s.trim().to_lowercase()) }

/// Literal, case-insensitive substring match of `col` against a [`needle`].
/// `fold` is registered on the connection by [`crate::schema::register_functions`].
fn contains(col: &str) -> String { format!("instr(fold({col}), ?) > 0") }

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

/// `SET` fragments for every field of `patch`. Milestone columns are only
/// written while still NULL.
fn visit_assignments(patch: &VisitPatch, now: &str) -> Vec<(String, Value)> {
  let mut sets: Vec<(String, Value)> = Vec::new();

  if let Some(status) = patch.status {
    sets.push(("status = ?".into(), text(status.to_string())));
    if let Some(m) = status.milestone() {
      let col = milestone_column(m);
      sets.push((format!("{col} = COALESCE({col}, ?)"), text(now)));
    }
  }
  if let Some(access) = patch.access {
    sets.push(("access = ?".into(), text(access.to_string())));
    if let Some(m) = access.milestone() {
      let col = milestone_column(m);
      sets.push((format!("{col} = COALESCE({col}, ?)"), text(now)));
    }
  }
  if let Some(host) = patch.host_id {
    sets.push(("host_id = ?".into(), text(encode_uuid(host))));
  }
  if let Some(reason) = &patch.reason {
    sets.push(("reason = ?".into(), text(reason.as_str())));
  }
  if let Some(start) = patch.scheduled_start {
    sets.push(("scheduled_start = ?".into(), text(encode_dt(start))));
  }
  if let Some(end) = patch.scheduled_end {
    sets.push(("scheduled_end = ?".into(), text(encode_dt(end))));
  }
  if let Some(phone) = &patch.phone {
    sets.push(("phone = ?".into(), text(phone.as_str())));
  }
  if let Some(location) = &patch.location {
    sets.push(("location = ?".into(), text(location.as_str())));
  }
  if let Some(notes) = &patch.notes {
    sets.push(("notes = ?".into(), text(notes.as_str())));
  }

  sets
}

fn where_clause(conds: &[&str]) -> String {
  if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  }
}

// ─── VisitStore impl ─────────────────────────────────────────────────────────

impl VisitStore for SqliteStore {
  type Error = crate::Error;

  // ── Visitors ──────────────────────────────────────────────────────────────

  async fn upsert_visitor(&self, input: NewVisitor) -> Result<Visitor> {
    input.validate()?;
    let now = encode_dt(Utc::now());

    let raw: RawVisitor = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        upsert_visitor_row(&tx, &input, &now)?;
        let raw = visitor_row(&tx, &input.national_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_visitor()
  }

  async fn get_visitor(&self, id: Uuid) -> Result<Option<Visitor>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{VISITOR_SELECT} WHERE visitor_id = ?1"),
              params![id_str],
              RawVisitor::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawVisitor::into_visitor).transpose()
  }

  async fn get_visitor_by_national_id(&self, national_id: &str) -> Result<Option<Visitor>> {
    let national_id = national_id.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(visitor_row(conn, &national_id)?))
      .await?;
    raw.map(RawVisitor::into_visitor).transpose()
  }

  async fn list_visitors(&self, query: &VisitorQuery) -> Result<Vec<Visitor>> {
    let mut conds: Vec<String> = Vec::new();
    let mut values = Vec::new();
    if let Some(name) = &query.name {
      conds.push(contains("name"));
      values.push(needle(name));
    }
    if let Some(company) = &query.company {
      conds.push(contains("company"));
      values.push(needle(company));
    }

    let conds: Vec<&str> = conds.iter().map(String::as_str).collect();
    let tail = format!("{} ORDER BY name", where_clause(&conds));
    self.fetch_visitors(tail, values).await
  }

  async fn visitor_history(&self, national_id: &str) -> Result<Vec<Visit>> {
    self
      .fetch_visits(
        "WHERE vis.national_id = ? ORDER BY v.number DESC".into(),
        vec![text(national_id)],
      )
      .await
  }

  async fn frequent_visitors(&self, min_visits: u64) -> Result<Vec<FrequentVisitor>> {
    let min = i64::try_from(min_visits).unwrap_or(i64::MAX);

    let rows: Vec<(RawVisitor, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT vis.visitor_id, vis.national_id, vis.name, vis.email, vis.company,
                  vis.created_at, vis.updated_at, COUNT(v.number) AS total
           FROM visitantes vis
           JOIN visitas v ON v.visitor_id = vis.visitor_id
           GROUP BY vis.visitor_id
           HAVING COUNT(v.number) >= ?1
           ORDER BY total DESC, vis.name",
        )?;
        let rows = stmt
          .query_map(params![min], |row| Ok((RawVisitor::from_row(row)?, row.get(7)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(raw, total)| {
        Ok(FrequentVisitor { visitor: raw.into_visitor()?, total_visits: total as u64 })
      })
      .collect()
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    input.validate()?;
    let user_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let raw: Checked<RawUser> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if exists(&tx, "SELECT 1 FROM usuarios WHERE national_id = ?1", &input.national_id)? {
          return Ok(Err(visitdesk_core::Error::DuplicateNationalId(input.national_id)));
        }
        if let Err(e) = check_user_refs(
          &tx,
          Some(input.profile_id),
          input.department_id,
          input.supervisor_id,
        )? {
          return Ok(Err(e));
        }

        tx.execute(
          "INSERT INTO usuarios (
             user_id, national_id, name, email, profile_id, department_id,
             supervisor_id, password_hash, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![
            user_id,
            input.national_id,
            input.name,
            input.email,
            input.profile_id,
            input.department_id,
            input.supervisor_id.map(encode_uuid),
            input.password_hash,
            now,
          ],
        )?;

        let raw = user_row(&tx, &user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    raw?.into_user()
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(user_row(conn, &id_str)?)).await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user_by_national_id(&self, national_id: &str) -> Result<Option<User>> {
    let users = self
      .fetch_users("WHERE u.national_id = ?".into(), vec![text(national_id)])
      .await?;
    Ok(users.into_iter().next())
  }

  async fn list_users(&self, query: &UserQuery) -> Result<Vec<User>> {
    let mut conds = Vec::new();
    let mut values = Vec::new();
    if let Some(p) = query.profile_id {
      conds.push("u.profile_id = ?");
      values.push(Value::Integer(p));
    }
    if let Some(d) = query.department_id {
      conds.push("u.department_id = ?");
      values.push(Value::Integer(d));
    }
    match query.active {
      Some(true) => conds.push("u.deactivated_at IS NULL"),
      Some(false) => conds.push("u.deactivated_at IS NOT NULL"),
      None => {}
    }

    let tail = format!("{} ORDER BY u.name", where_clause(&conds));
    self.fetch_users(tail, values).await
  }

  async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>> {
    if patch.is_empty() {
      return Err(visitdesk_core::Error::EmptyPatch.into());
    }
    if let Some(name) = &patch.name {
      visitdesk_core::error::require("name", name)?;
    }
    if let Some(email) = &patch.email {
      visitdesk_core::error::require("email", email)?;
    }

    let id_str = encode_uuid(id);

    let raw: Checked<Option<RawUser>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(&tx, "SELECT 1 FROM usuarios WHERE user_id = ?1", &id_str)? {
          return Ok(Ok(None));
        }
        if let Err(e) =
          check_user_refs(&tx, patch.profile_id, patch.department_id, patch.supervisor_id)?
        {
          return Ok(Err(e));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(name) = patch.name {
          sets.push("name = ?");
          values.push(text(name));
        }
        if let Some(email) = patch.email {
          sets.push("email = ?");
          values.push(text(email));
        }
        if let Some(p) = patch.profile_id {
          sets.push("profile_id = ?");
          values.push(Value::Integer(p));
        }
        if let Some(d) = patch.department_id {
          sets.push("department_id = ?");
          values.push(Value::Integer(d));
        }
        if let Some(s) = patch.supervisor_id {
          sets.push("supervisor_id = ?");
          values.push(text(encode_uuid(s)));
        }
        if let Some(hash) = patch.password_hash {
          sets.push("password_hash = ?");
          values.push(text(hash));
        }
        values.push(text(id_str.as_str()));

        tx.execute(
          &format!("UPDATE usuarios SET {} WHERE user_id = ?", sets.join(", ")),
          params_from_iter(values),
        )?;

        let raw = user_row(&tx, &id_str)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    raw?.map(RawUser::into_user).transpose()
  }

  async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let changed = if active {
          conn.execute(
            "UPDATE usuarios SET deactivated_at = NULL WHERE user_id = ?1",
            params![id_str],
          )?
        } else {
          conn.execute(
            "UPDATE usuarios SET deactivated_at = COALESCE(deactivated_at, ?2)
             WHERE user_id = ?1",
            params![id_str, now],
          )?
        };
        if changed == 0 {
          return Ok(None);
        }
        Ok(user_row(conn, &id_str)?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn list_profiles(&self) -> Result<Vec<Profile>> {
    let profiles = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT profile_id, name FROM perfiles ORDER BY profile_id")?;
        let rows = stmt
          .query_map([], |row| Ok(Profile { profile_id: row.get(0)?, name: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(profiles)
  }

  async fn list_departments(&self) -> Result<Vec<Department>> {
    let departments = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT department_id, name FROM areas ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Department { department_id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(departments)
  }

  async fn add_department(&self, name: String) -> Result<Department> {
    visitdesk_core::error::require("name", &name)?;
    let name = name.trim().to_owned();

    let department: Checked<Department> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if exists(&tx, "SELECT 1 FROM areas WHERE name = ?1", &name)? {
          return Ok(Err(visitdesk_core::Error::DuplicateDepartment(name)));
        }
        tx.execute("INSERT INTO areas (name) VALUES (?1)", params![name])?;
        let department_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Ok(Department { department_id, name }))
      })
      .await?;

    Ok(department?)
  }

  // ── Visits ────────────────────────────────────────────────────────────────

  async fn register_visit(&self, input: NewVisit) -> Result<Visit> {
    input.validate()?;
    let visit_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());
    let access = input.initial_access().to_string();

    let raw: Checked<RawVisit> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(&tx, "SELECT 1 FROM usuarios WHERE user_id = ?1", &encode_uuid(input.host_id))? {
          return Ok(Err(visitdesk_core::Error::HostNotFound(input.host_id)));
        }
        if let Some(by) = input.registered_by {
          if !exists(&tx, "SELECT 1 FROM usuarios WHERE user_id = ?1", &encode_uuid(by))? {
            return Ok(Err(unknown("user", by)));
          }
        }

        let visitor_id = upsert_visitor_row(&tx, &input.visitor, &now)?;
        tx.execute(
          "INSERT INTO visitas (
             visit_id, visitor_id, host_id, registered_by, reason,
             scheduled_start, scheduled_end, phone, location, notes,
             status, access, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          params![
            visit_id,
            visitor_id,
            encode_uuid(input.host_id),
            input.registered_by.map(encode_uuid),
            input.reason,
            input.scheduled_start.map(encode_dt),
            input.scheduled_end.map(encode_dt),
            input.phone,
            input.location,
            input.notes,
            VisitStatus::Awaiting.to_string(),
            access,
            now,
          ],
        )?;

        let raw = visit_row(&tx, &visit_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    let visit = raw?.into_visit()?;
    tracing::debug!(number = visit.number, visit_id = %visit.visit_id, "visit registered");
    Ok(visit)
  }

  async fn get_visit(&self, id: Uuid) -> Result<Option<Visit>> {
    let id_str = encode_uuid(id);
    let raw = self.conn.call(move |conn| Ok(visit_row(conn, &id_str)?)).await?;
    raw.map(RawVisit::into_visit).transpose()
  }

  async fn list_visits(&self, query: &VisitQuery) -> Result<Vec<Visit>> {
    let mut conds: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = query.status {
      conds.push("v.status = ?".into());
      values.push(text(status.to_string()));
    }
    if let Some(access) = query.access {
      conds.push("v.access = ?".into());
      values.push(text(access.to_string()));
    }
    if let Some(name) = &query.visitor {
      conds.push(contains("vis.name"));
      values.push(needle(name));
    }
    if let Some(company) = &query.company {
      conds.push(contains("vis.company"));
      values.push(needle(company));
    }
    if let Some(department) = &query.department {
      conds.push(contains("a.name"));
      values.push(needle(department));
    }
    if let Some(host) = &query.host {
      conds.push(contains("h.name"));
      values.push(needle(host));
    }
    if let Some(host_id) = query.host_id {
      conds.push("v.host_id = ?".into());
      values.push(text(encode_uuid(host_id)));
    }
    if let Some(visitor_id) = query.visitor_id {
      conds.push("v.visitor_id = ?".into());
      values.push(text(encode_uuid(visitor_id)));
    }
    if let Some(date) = query.date {
      conds.push(format!("{VISIT_DAY} = ?"));
      values.push(text(date.format("%Y-%m-%d").to_string()));
    }

    let conds: Vec<&str> = conds.iter().map(String::as_str).collect();
    let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
    values.push(Value::Integer(limit));

    let tail = format!("{} ORDER BY v.number DESC LIMIT ?", where_clause(&conds));
    self.fetch_visits(tail, values).await
  }

  async fn next_awaiting(&self) -> Result<Option<Visit>> {
    let visits = self
      .fetch_visits(
        "WHERE v.status = ? ORDER BY v.number ASC LIMIT 1".into(),
        vec![text(VisitStatus::Awaiting.to_string())],
      )
      .await?;
    Ok(visits.into_iter().next())
  }

  async fn update_visit(&self, id: Uuid, patch: VisitPatch) -> Result<Option<Visit>> {
    if patch.is_empty() {
      return Err(visitdesk_core::Error::EmptyPatch.into());
    }
    if let Some(reason) = &patch.reason {
      visitdesk_core::error::require("reason", reason)?;
    }

    let sets = visit_assignments(&patch, &encode_dt(Utc::now()));
    self.patch_visit(id, patch.host_id, sets).await
  }

  async fn cancel_visit(&self, id: Uuid, reason: Option<String>) -> Result<Option<Visit>> {
    let patch = VisitPatch::status(VisitStatus::Cancelled);
    let mut sets = visit_assignments(&patch, &encode_dt(Utc::now()));
    if let Some(reason) = reason {
      sets.push(("cancel_reason = ?".into(), text(reason)));
    }
    self.patch_visit(id, None, sets).await
  }

  async fn check_in(&self, id: Uuid) -> Result<Option<CheckIn>> {
    let id_str = encode_uuid(id);
    let now = encode_dt(Utc::now());
    let access = AccessStatus::OnPremises.to_string();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let prior: Option<Option<String>> = tx
          .query_row(
            "SELECT check_in FROM visitas WHERE visit_id = ?1",
            params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(prior) = prior else {
          return Ok(None);
        };

        tx.execute(
          "UPDATE visitas SET access = ?1, check_in = COALESCE(check_in, ?2)
           WHERE visit_id = ?3",
          params![access, now, id_str],
        )?;
        let raw = visit_row(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.map(|r| (r, prior.is_none())))
      })
      .await?;

    raw
      .map(|(r, first)| r.into_visit().map(|visit| CheckIn { visit, first }))
      .transpose()
  }

  async fn check_out(&self, id: Uuid) -> Result<Option<Visit>> {
    let patch = VisitPatch { access: Some(AccessStatus::Departed), ..Default::default() };
    let sets = visit_assignments(&patch, &encode_dt(Utc::now()));
    self.patch_visit(id, None, sets).await
  }

  async fn delete_visit(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM visitas WHERE visit_id = ?1", params![id_str])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn stats(&self) -> Result<VisitStats> {
    let today = Utc::now().format("%Y-%m-%d").to_string();

    type Grouped = Vec<(String, i64)>;
    let (total, statuses, accesses, day, present, departed, last): (
      i64,
      Grouped,
      Grouped,
      i64,
      i64,
      i64,
      i64,
    ) = self
      .conn
      .call(move |conn| {
        let group = |col: &str| -> rusqlite::Result<Grouped> {
          let mut stmt =
            conn.prepare(&format!("SELECT {col}, COUNT(*) FROM visitas GROUP BY {col}"))?;
          let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        };
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM visitas", [], |r| r.get(0))?;
        let statuses = group("status")?;
        let accesses = group("access")?;

        let day: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM visitas v WHERE {VISIT_DAY} = ?1"),
          params![today],
          |r| r.get(0),
        )?;
        let present: i64 = conn.query_row(
          "SELECT COUNT(*) FROM visitas WHERE check_in IS NOT NULL AND check_out IS NULL",
          [],
          |r| r.get(0),
        )?;
        let departed: i64 = conn.query_row(
          "SELECT COUNT(*) FROM visitas WHERE substr(check_out, 1, 10) = ?1",
          params![today],
          |r| r.get(0),
        )?;
        let last: i64 = conn
          .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = 'visitas'",
            [],
            |r| r.get(0),
          )
          .optional()?
          .unwrap_or(0);

        Ok((total, statuses, accesses, day, present, departed, last))
      })
      .await?;

    let mut by_status = StatusCounts::default();
    for (status, n) in statuses {
      by_status.add(decode_status(&status)?, n as u64);
    }
    let mut by_access = AccessCounts::default();
    for (access, n) in accesses {
      by_access.add(decode_access(&access)?, n as u64);
    }

    Ok(VisitStats {
      total: total as u64,
      by_status,
      by_access,
      today: day as u64,
      present: present as u64,
      departed_today: departed as u64,
      last_number: last,
    })
  }

  async fn reset_visits(&self) -> Result<()> {
    let removed = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM visitas", [])?;
        tx.execute("DELETE FROM sqlite_sequence WHERE name = 'visitas'", [])?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    tracing::info!(removed, "visit table reset");
    Ok(())
  }

  async fn purge_closed(&self) -> Result<u64> {
    let removed = self
      .conn
      .call(|conn| {
        Ok(conn.execute(
          "DELETE FROM visitas WHERE status IN (?1, ?2)",
          params![VisitStatus::Finished.to_string(), VisitStatus::Cancelled.to_string()],
        )?)
      })
      .await?;
    tracing::info!(removed, "closed visits purged");
    Ok(removed as u64)
  }
}
