//! HTTP front for visitdesk: configuration, the outer router and mail
//! transports. The binary in `main.rs` wires these to a concrete store.

pub mod mailer;

use std::{path::PathBuf, time::Instant};

use axum::{Json, Router, routing::get};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use visitdesk_api::{ApiError, AppState};
use visitdesk_core::store::VisitStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and
/// `VISITDESK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:  String,
  #[serde(default = "default_port")]
  pub port:  u16,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub mail:  MailConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  #[default]
  Sqlite,
  Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
  #[serde(default)]
  pub backend: Backend,
  /// SQLite database file; `~` is expanded. Ignored by the memory backend.
  #[serde(default = "default_store_path")]
  pub path:    PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
  #[serde(default = "default_from")]
  pub from:         String,
  /// HTTP relay receiving outgoing messages as JSON. Without one, messages
  /// are only logged.
  #[serde(default)]
  pub relay_url:    Option<String>,
  #[serde(default)]
  pub attach_badge: bool,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("visitdesk.db") }
fn default_from() -> String { "reception@localhost".into() }

impl Default for StoreConfig {
  fn default() -> Self {
    Self { backend: Backend::default(), path: default_store_path() }
  }
}

impl Default for MailConfig {
  fn default() -> Self {
    Self { from: default_from(), relay_url: None, attach_badge: false }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete service: the REST API under `/api`, a service
/// descriptor at `/`, `/api/health`, and a JSON 404 for everything else.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: VisitStore + 'static,
{
  let started = Instant::now();
  let api = visitdesk_api::api_router(state)
    .route("/health", get(move || health(started)));

  Router::new()
    .route("/", get(info))
    .nest("/api", api)
    .fallback(not_found)
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
}

async fn info() -> Json<Value> {
  Json(json!({
    "name":    "visitdesk",
    "version": env!("CARGO_PKG_VERSION"),
    "api":     "/api",
  }))
}

async fn health(started: Instant) -> Json<Value> {
  Json(json!({
    "status":      "ok",
    "uptime_secs": started.elapsed().as_secs(),
  }))
}

async fn not_found() -> ApiError { ApiError::NotFound("route not found".into()) }

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use config::{Config, File, FileFormat};
  use tower::ServiceExt as _;
  use visitdesk_api::Notifier;
  use visitdesk_store_memory::MemoryStore;

  use super::*;

  fn service() -> Router {
    app(AppState::new(Arc::new(MemoryStore::new()), Notifier::disabled()))
  }

  async fn get_json(uri: &str) -> (StatusCode, Value) {
    let resp = service()
      .oneshot(Request::get(uri).body(Body::empty()).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn root_describes_service() {
    let (status, body) = get_json("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "visitdesk");
    assert_eq!(body["api"], "/api");
  }

  #[tokio::test]
  async fn health_reports_ok() {
    let (status, body) = get_json("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_secs"].is_u64());
  }

  #[tokio::test]
  async fn unknown_routes_are_json_404() {
    for uri in ["/nope", "/api/nope"] {
      let (status, body) = get_json(uri).await;
      assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
      assert_eq!(body["error"], "route not found");
    }
  }

  #[tokio::test]
  async fn api_is_mounted() {
    let (status, body) = get_json("/api/profiles").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.as_array().unwrap().is_empty());
  }

  #[test]
  fn config_defaults_fill_gaps() {
    let cfg: ServerConfig = Config::builder()
      .add_source(File::from_str("port = 9000\n[mail]\nattach_badge = true\n", FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store.backend, Backend::Sqlite);
    assert_eq!(cfg.store.path, PathBuf::from("visitdesk.db"));
    assert!(cfg.mail.attach_badge);
    assert!(cfg.mail.relay_url.is_none());
  }

  #[test]
  fn config_selects_memory_backend() {
    let cfg: ServerConfig = Config::builder()
      .add_source(File::from_str("[store]\nbackend = \"memory\"\n", FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.store.backend, Backend::Memory);
  }
}
