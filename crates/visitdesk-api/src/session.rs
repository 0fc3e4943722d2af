//! Login sessions backed by opaque bearer tokens.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/login` | Body: `{"national_id":"…","password":"…"}` |
//! | `GET`  | `/session` | `Authorization: Bearer <token>` |
//! | `POST` | `/logout` | `Authorization: Bearer <token>`; 204 |

use std::{
  collections::HashMap,
  sync::Arc,
  time::{Duration, Instant},
};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{StatusCode, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use visitdesk_core::{person::User, store::VisitStore};

use crate::{
  AppState,
  error::{ApiError, JsonBody},
};

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

fn verify_password(hash: &str, password: &str) -> bool {
  PasswordHash::new(hash)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// How long a token stays valid after login.
pub const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct Entry {
  user_id: Uuid,
  issued:  Instant,
}

/// In-process token → user map. Cheap to clone.
///
/// Tokens expire [`SESSION_TTL`] after they are issued; expired entries are
/// dropped on lookup and whenever a new token is issued.
#[derive(Clone)]
pub struct SessionRegistry {
  tokens: Arc<RwLock<HashMap<String, Entry>>>,
  ttl:    Duration,
}

impl Default for SessionRegistry {
  fn default() -> Self { Self::with_ttl(SESSION_TTL) }
}

impl SessionRegistry {
  pub fn with_ttl(ttl: Duration) -> Self {
    Self { tokens: Arc::default(), ttl }
  }

  pub async fn issue(&self, user_id: Uuid) -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    let mut tokens = self.tokens.write().await;
    tokens.retain(|_, e| e.issued.elapsed() < self.ttl);
    tokens.insert(token.clone(), Entry { user_id, issued: Instant::now() });
    token
  }

  pub async fn lookup(&self, token: &str) -> Option<Uuid> {
    let mut tokens = self.tokens.write().await;
    let entry = tokens.get(token)?;
    if entry.issued.elapsed() < self.ttl {
      return Some(entry.user_id);
    }
    tokens.remove(token);
    None
  }

  pub async fn revoke(&self, token: &str) -> bool {
    self.tokens.write().await.remove(token).is_some()
  }

  /// Drop every token of `user_id`; returns how many were removed.
  pub async fn revoke_user(&self, user_id: Uuid) -> usize {
    let mut tokens = self.tokens.write().await;
    let before = tokens.len();
    tokens.retain(|_, e| e.user_id != user_id);
    before - tokens.len()
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// A request carrying a valid bearer token.
pub struct Session {
  pub token:   String,
  pub user_id: Uuid,
}

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: VisitStore,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?
      .to_owned();

    let user_id = state
      .sessions
      .lookup(&token)
      .await
      .ok_or_else(|| ApiError::Unauthorized("unknown or expired session".into()))?;

    Ok(Session { token, user_id })
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  #[serde(default)]
  pub national_id: Option<String>,
  #[serde(default)]
  pub password:    Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token: String,
  pub user:  User,
}

fn invalid_credentials() -> ApiError { ApiError::Unauthorized("invalid credentials".into()) }

/// `POST /login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: VisitStore,
{
  let national_id = body
    .national_id
    .filter(|s| !s.trim().is_empty())
    .ok_or(visitdesk_core::Error::MissingField("national_id"))?;
  let password = body
    .password
    .filter(|s| !s.is_empty())
    .ok_or(visitdesk_core::Error::MissingField("password"))?;

  let user = state
    .store
    .get_user_by_national_id(national_id.trim())
    .await
    .map_err(ApiError::store)?
    .filter(User::is_active)
    .ok_or_else(invalid_credentials)?;

  let hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
  if !verify_password(hash, &password) {
    tracing::info!(user_id = %user.user_id, "login rejected");
    return Err(invalid_credentials());
  }

  let token = state.sessions.issue(user.user_id).await;
  tracing::info!(user_id = %user.user_id, "session opened");
  Ok(Json(LoginResponse { token, user }))
}

/// `GET /session`
pub async fn current<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> Result<Json<User>, ApiError>
where
  S: VisitStore,
{
  let user = state
    .store
    .get_user(session.user_id)
    .await
    .map_err(ApiError::store)?
    .filter(User::is_active)
    .ok_or_else(|| ApiError::Unauthorized("user is no longer active".into()))?;
  Ok(Json(user))
}

/// `POST /logout`
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  session: Session,
) -> StatusCode
where
  S: VisitStore,
{
  state.sessions.revoke(&session.token).await;
  StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_round_trip() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(&hash, "hunter2"));
    assert!(!verify_password(&hash, "hunter3"));
    assert!(!verify_password("not-a-phc-string", "hunter2"));
  }

  #[tokio::test]
  async fn tokens_are_unique_and_revocable() {
    let registry = SessionRegistry::default();
    let user = Uuid::new_v4();
    let a = registry.issue(user).await;
    let b = registry.issue(user).await;
    assert_ne!(a, b);
    assert_eq!(a.len(), 43);

    assert_eq!(registry.lookup(&a).await, Some(user));
    assert!(registry.revoke(&a).await);
    assert!(registry.lookup(&a).await.is_none());
    assert!(!registry.revoke(&a).await);
    assert_eq!(registry.lookup(&b).await, Some(user));
  }

  #[tokio::test]
  async fn expired_tokens_are_rejected() {
    let registry = SessionRegistry::with_ttl(Duration::ZERO);
    let token = registry.issue(Uuid::new_v4()).await;
    assert!(registry.lookup(&token).await.is_none());
    assert!(!registry.revoke(&token).await);
  }

  #[tokio::test]
  async fn revoke_user_drops_all_their_tokens() {
    let registry = SessionRegistry::default();
    let (ana, luis) = (Uuid::new_v4(), Uuid::new_v4());
    let a1 = registry.issue(ana).await;
    let a2 = registry.issue(ana).await;
    let l1 = registry.issue(luis).await;

    assert_eq!(registry.revoke_user(ana).await, 2);
    assert!(registry.lookup(&a1).await.is_none());
    assert!(registry.lookup(&a2).await.is_none());
    assert_eq!(registry.lookup(&l1).await, Some(luis));
  }
}
