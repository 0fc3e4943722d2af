//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt as _;
use visitdesk_core::{
  notice::{Message, NoticeKind},
  person::{NewUser, User},
  store::VisitStore,
};
use visitdesk_store_memory::MemoryStore;
use visitdesk_store_sqlite::SqliteStore;

use crate::{ApiOptions, AppState, Notifier, api_router, session::hash_password};

struct Harness {
  router: Router,
  store:  Arc<SqliteStore>,
  inbox:  UnboundedReceiver<Message>,
  host:   User,
}

impl Harness {
  async fn new() -> Self {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let host = store
      .add_user(NewUser {
        national_id:   "10000001".into(),
        name:          "Ana Paz".into(),
        email:         "ana@example.com".into(),
        profile_id:    3,
        department_id: None,
        supervisor_id: None,
        password_hash: Some(hash_password("s3cret").unwrap()),
      })
      .await
      .unwrap();

    let (notifier, inbox) = Notifier::channel();
    let state = AppState::new(Arc::clone(&store), notifier)
      .with_options(ApiOptions { attach_badge: true });
    Self { router: api_router(state), store, inbox, host }
  }

  async fn call(
    &self,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
      Some(b) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(b.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = self.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn register(&self, national_id: &str, name: &str) -> Value {
    let body = json!({
      "visitor": {
        "national_id": national_id,
        "name": name,
        "email": format!("{national_id}@visitors.example"),
        "company": "Acme",
      },
      "host_id": self.host.user_id,
      "reason": "quarterly review",
    });
    let (status, visit) = self.call("POST", "/visits", Some(body), None).await;
    assert_eq!(status, StatusCode::CREATED, "{visit}");
    visit
  }

  fn drain(&mut self) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(m) = self.inbox.try_recv() {
      out.push(m);
    }
    out
  }
}

// ─── Visits ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_upserts_visitor_and_queues_confirmation() {
  let mut h = Harness::new().await;

  let visit = h.register("30111222", "Luis Vega").await;
  assert_eq!(visit["number"], 1);
  assert_eq!(visit["status"], "awaiting");
  assert_eq!(visit["access"], "preauthorized");
  assert_eq!(visit["host"]["name"], "Ana Paz");

  h.register("30111222", "Luis A. Vega").await;
  let (_, visitors) = h.call("GET", "/visitors", None, None).await;
  let visitors = visitors.as_array().unwrap();
  assert_eq!(visitors.len(), 1);
  assert_eq!(visitors[0]["name"], "Luis A. Vega");

  let sent = h.drain();
  assert_eq!(sent.len(), 2);
  assert!(sent.iter().all(|m| m.kind == NoticeKind::Confirmation));
  assert_eq!(sent[0].to, "30111222@visitors.example");
  assert!(sent[0].badge.is_some());
}

#[tokio::test]
async fn register_with_missing_fields_is_bad_request() {
  let h = Harness::new().await;
  let body = json!({ "visitor": { "national_id": "1", "name": "X", "email": "x@y" } });
  let (status, err) = h.call("POST", "/visits", Some(body), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].is_string());

  let body = json!({
    "visitor": { "national_id": "1", "name": "X", "email": "x@y" },
    "host_id": uuid::Uuid::new_v4(),
    "reason": "r",
  });
  let (status, err) = h.call("POST", "/visits", Some(body), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].as_str().unwrap().contains("host not found"));
}

#[tokio::test]
async fn list_by_status_is_newest_first() {
  let h = Harness::new().await;
  let a = h.register("1", "A").await;
  let b = h.register("2", "B").await;
  h.register("3", "C").await;

  let uri = format!("/visits/{}", b["visit_id"].as_str().unwrap());
  let (status, _) = h.call("PUT", &uri, Some(json!({ "status": "calling" })), None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, list) = h.call("GET", "/visits?status=awaiting", None, None).await;
  assert_eq!(status, StatusCode::OK);
  let numbers: Vec<_> = list.as_array().unwrap().iter().map(|v| v["number"].clone()).collect();
  assert_eq!(numbers, [json!(3), a["number"].clone()]);

  let (status, err) = h.call("GET", "/visits?status=nope", None, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].as_str().unwrap().contains("expected one of"));
}

#[tokio::test]
async fn next_awaiting_is_fifo() {
  let h = Harness::new().await;
  let (status, _) = h.call("GET", "/visits/next", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let a = h.register("1", "A").await;
  h.register("2", "B").await;
  let (status, next) = h.call("GET", "/visits/next", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(next["visit_id"], a["visit_id"]);
}

#[tokio::test]
async fn finished_timestamp_is_set_once() {
  let h = Harness::new().await;
  let v = h.register("1", "A").await;
  let uri = format!("/visits/{}", v["visit_id"].as_str().unwrap());

  let (_, first) = h.call("PUT", &uri, Some(json!({ "status": "finished" })), None).await;
  assert!(first["finished_at"].is_string());
  let (_, second) = h.call("PUT", &uri, Some(json!({ "status": "finished" })), None).await;
  assert_eq!(first["finished_at"], second["finished_at"]);
}

#[tokio::test]
async fn bogus_status_is_rejected_and_visit_unchanged() {
  let h = Harness::new().await;
  let v = h.register("1", "A").await;
  let uri = format!("/visits/{}", v["visit_id"].as_str().unwrap());

  let (status, err) = h
    .call("PUT", &uri, Some(json!({ "status": "bogus", "notes": "x" })), None)
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    err["error"],
    "invalid status \"bogus\"; expected one of: awaiting, calling, in_progress, finished, cancelled"
  );

  let (_, after) = h.call("GET", &uri, None, None).await;
  assert_eq!(after["status"], "awaiting");
  assert!(after["notes"].is_null());
}

#[tokio::test]
async fn empty_update_is_bad_request() {
  let h = Harness::new().await;
  let v = h.register("1", "A").await;
  let uri = format!("/visits/{}", v["visit_id"].as_str().unwrap());
  let (status, err) = h.call("PUT", &uri, Some(json!({})), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(err["error"], "no fields to update");
}

#[tokio::test]
async fn unknown_visit_is_not_found() {
  let h = Harness::new().await;
  let uri = format!("/visits/{}", uuid::Uuid::new_v4());
  let (status, err) = h.call("GET", &uri, None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(err["error"].as_str().unwrap().contains("not found"));

  let (status, _) = h.call("POST", &format!("{uri}/check-in"), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_counts_sum_to_total() {
  let h = Harness::new().await;
  let a = h.register("1", "A").await;
  h.register("2", "B").await;
  h.register("3", "C").await;
  let uri = format!("/visits/{}", a["visit_id"].as_str().unwrap());
  h.call("DELETE", &uri, None, None).await;

  let (status, stats) = h.call("GET", "/visits/stats", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["total"], 3);
  let sum: u64 = stats["by_status"]
    .as_object()
    .unwrap()
    .values()
    .map(|n| n.as_u64().unwrap())
    .sum();
  assert_eq!(sum, 3);
  assert_eq!(stats["by_status"]["cancelled"], 1);
  assert_eq!(stats["last_number"], 3);
}

#[tokio::test]
async fn check_in_notifies_host_exactly_once() {
  let mut h = Harness::new().await;
  let v = h.register("1", "A").await;
  h.drain();

  let uri = format!("/visits/{}/check-in", v["visit_id"].as_str().unwrap());
  let (status, first) = h.call("POST", &uri, None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["access"], "on_premises");

  let (_, second) = h.call("POST", &uri, None, None).await;
  assert_eq!(first["check_in"], second["check_in"]);

  let sent = h.drain();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].kind, NoticeKind::Arrival);
  assert_eq!(sent[0].to, "ana@example.com");

  let uri = format!("/visits/{}/check-out", v["visit_id"].as_str().unwrap());
  let (_, out) = h.call("POST", &uri, None, None).await;
  assert_eq!(out["access"], "departed");
  assert!(out["check_out"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_check_ins_send_one_arrival() {
  let mut h = Harness::new().await;
  for round in 0..20 {
    let v = h.register(&format!("4{round:07}"), "Eva Ros").await;
    h.drain();

    let uri = format!("/visits/{}/check-in", v["visit_id"].as_str().unwrap());
    let ((a, _), (b, _)) = tokio::join!(
      h.call("POST", &uri, None, None),
      h.call("POST", &uri, None, None),
    );
    assert_eq!((a, b), (StatusCode::OK, StatusCode::OK));

    let arrivals = h.drain().into_iter().filter(|m| m.kind == NoticeKind::Arrival).count();
    assert_eq!(arrivals, 1, "round {round}");
  }
}

#[tokio::test]
async fn cancel_records_reason_and_notifies_visitor() {
  let mut h = Harness::new().await;
  let v = h.register("1", "A").await;
  h.drain();

  let uri = format!("/visits/{}?reason=host%20travelling", v["visit_id"].as_str().unwrap());
  let (status, cancelled) = h.call("DELETE", &uri, None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(cancelled["status"], "cancelled");
  assert_eq!(cancelled["cancel_reason"], "host travelling");

  let sent = h.drain();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].kind, NoticeKind::Cancellation);
  assert!(sent[0].body.contains("host travelling"));
}

// ─── Visitors ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn visitor_lookup_history_and_frequency() {
  let h = Harness::new().await;
  h.register("555", "Rita").await;
  h.register("555", "Rita").await;
  h.register("777", "Omar").await;

  let (status, rita) = h.call("GET", "/visitors/555", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(rita["name"], "Rita");

  let (_, history) = h.call("GET", "/visitors/555/visits", None, None).await;
  assert_eq!(history.as_array().unwrap().len(), 2);

  let (_, frequent) = h.call("GET", "/visitors/frequent?min_visits=2", None, None).await;
  let frequent = frequent.as_array().unwrap();
  assert_eq!(frequent.len(), 1);
  assert_eq!(frequent[0]["national_id"], "555");
  assert_eq!(frequent[0]["total_visits"], 2);

  let (status, _) = h.call("GET", "/visitors/000", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Users & directory ───────────────────────────────────────────────────────

#[tokio::test]
async fn user_lifecycle() {
  let h = Harness::new().await;
  let (status, dept) = h.call("POST", "/departments", Some(json!({ "name": "IT" })), None).await;
  assert_eq!(status, StatusCode::CREATED);
  let (status, _) = h.call("POST", "/departments", Some(json!({ "name": "IT" })), None).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let body = json!({
    "national_id": "20000002",
    "name": "Bruno Diaz",
    "email": "bruno@example.com",
    "profile_id": 2,
    "department_id": dept["department_id"],
    "password": "pw",
  });
  let (status, user) = h.call("POST", "/users", Some(body.clone()), None).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(user["profile"]["name"], "reception");
  assert_eq!(user["department"]["name"], "IT");
  assert!(user.get("password_hash").is_none());

  let (status, _) = h.call("POST", "/users", Some(body), None).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let uri = format!("/users/{}", user["user_id"].as_str().unwrap());
  let (_, off) = h.call("DELETE", &uri, None, None).await;
  assert!(off["deactivated_at"].is_string());
  let (_, active) = h.call("GET", "/users?active=true", None, None).await;
  assert_eq!(active.as_array().unwrap().len(), 1);

  let (_, on) = h.call("POST", &format!("{uri}/reactivate"), None, None).await;
  assert!(on["deactivated_at"].is_null());

  let (_, renamed) = h.call("PUT", &uri, Some(json!({ "name": "Bruno D." })), None).await;
  assert_eq!(renamed["name"], "Bruno D.");

  let (_, profiles) = h.call("GET", "/profiles", None, None).await;
  assert_eq!(profiles.as_array().unwrap().len(), 3);
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_session_logout() {
  let h = Harness::new().await;

  let wrong = json!({ "national_id": "10000001", "password": "nope" });
  let (status, err) = h.call("POST", "/login", Some(wrong), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(err["error"], "invalid credentials");

  let right = json!({ "national_id": "10000001", "password": "s3cret" });
  let (status, login) = h.call("POST", "/login", Some(right), None).await;
  assert_eq!(status, StatusCode::OK);
  let token = login["token"].as_str().unwrap().to_owned();
  assert_eq!(login["user"]["name"], "Ana Paz");

  let (status, me) = h.call("GET", "/session", None, Some(&token)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["user_id"], json!(h.host.user_id));

  let (status, _) = h.call("POST", "/logout", None, Some(&token)).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = h.call("GET", "/session", None, Some(&token)).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_requires_both_fields_and_an_active_user() {
  let h = Harness::new().await;
  let (status, err) = h.call("POST", "/login", Some(json!({ "national_id": "10000001" })), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(err["error"], "missing required field: password");

  let (status, _) = h.call("GET", "/session", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  h.store.set_user_active(h.host.user_id, false).await.unwrap();
  let right = json!({ "national_id": "10000001", "password": "s3cret" });
  let (status, _) = h.call("POST", "/login", Some(right), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivating_a_user_ends_their_sessions() {
  let h = Harness::new().await;
  let right = json!({ "national_id": "10000001", "password": "s3cret" });
  let (_, login) = h.call("POST", "/login", Some(right), None).await;
  let token = login["token"].as_str().unwrap().to_owned();

  let uri = format!("/users/{}", h.host.user_id);
  let (status, _) = h.call("DELETE", &uri, None, None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = h.call("POST", &format!("{uri}/reactivate"), None, None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, err) = h.call("GET", "/session", None, Some(&token)).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(err["error"], "unknown or expired session");
}

// ─── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn purge_reset_and_hard_delete() {
  let h = Harness::new().await;
  let a = h.register("1", "A").await;
  let b = h.register("2", "B").await;
  h.register("3", "C").await;
  h.call("DELETE", &format!("/visits/{}", a["visit_id"].as_str().unwrap()), None, None)
    .await;

  let (status, purged) = h.call("POST", "/admin/purge-closed", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(purged["removed"], 1);

  let uri = format!("/admin/visits/{}", b["visit_id"].as_str().unwrap());
  let (status, _) = h.call("DELETE", &uri, None, None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = h.call("DELETE", &uri, None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = h.call("POST", "/admin/reset-visits", None, None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let again = h.register("4", "D").await;
  assert_eq!(again["number"], 1);
}

// ─── Backends ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn memory_backend_serves_the_same_router() {
  let store = Arc::new(MemoryStore::new());
  let host = store
    .add_user(NewUser {
      national_id:   "1".into(),
      name:          "Host".into(),
      email:         "host@example.com".into(),
      profile_id:    3,
      department_id: None,
      supervisor_id: None,
      password_hash: None,
    })
    .await
    .unwrap();
  let router = api_router(AppState::new(store, Notifier::disabled()));

  let body = json!({
    "visitor": { "national_id": "9", "name": "V", "email": "v@example.com" },
    "host_id": host.user_id,
    "reason": "delivery",
    "unexpected": true,
  });
  let req = Request::builder()
    .method("POST")
    .uri("/visits")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  let resp = router.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::CREATED);

  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let visit: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(visit["access"], "unexpected");
}
