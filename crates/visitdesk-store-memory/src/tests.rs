use uuid::Uuid;
use visitdesk_core::{
  Classify, Error, Fault,
  lifecycle::{AccessStatus, VisitStatus},
  person::{NewUser, NewVisitor, User},
  store::{UserQuery, VisitQuery, VisitStore},
  visit::{NewVisit, VisitPatch},
};

use crate::MemoryStore;

fn new_user(national_id: &str, name: &str) -> NewUser {
  NewUser {
    national_id:   national_id.into(),
    name:          name.into(),
    email:         "host@example.com".into(),
    profile_id:    3,
    department_id: None,
    supervisor_id: None,
    password_hash: None,
  }
}

async fn host(s: &MemoryStore) -> User {
  s.add_user(new_user("10000001", "Ana Paz")).await.unwrap()
}

fn new_visit(host_id: Uuid, national_id: &str, name: &str) -> NewVisit {
  NewVisit {
    visitor: NewVisitor {
      national_id: national_id.into(),
      name:        name.into(),
      email:       "visitor@example.com".into(),
      company:     None,
    },
    host_id,
    registered_by: None,
    reason: "meeting".into(),
    scheduled_start: None,
    scheduled_end: None,
    phone: None,
    location: None,
    notes: None,
    unexpected: false,
  }
}

#[tokio::test]
async fn starts_with_seed_profiles() {
  let s = MemoryStore::new();
  let profiles = s.list_profiles().await.unwrap();
  assert_eq!(profiles.len(), 3);
  assert_eq!(profiles[0].name, "admin");
}

#[tokio::test]
async fn text_filters_are_literal_and_fold_unicode_case() {
  let s = MemoryStore::new();
  let h = host(&s).await;
  s.register_visit(new_visit(h.user_id, "1", "Álvarez Núñez")).await.unwrap();
  s.register_visit(new_visit(h.user_id, "2", "Bob")).await.unwrap();

  let by_visitor = |name: &str| VisitQuery { visitor: Some(name.into()), ..Default::default() };
  assert!(s.list_visits(&by_visitor("%")).await.unwrap().is_empty());
  assert!(s.list_visits(&by_visitor("_")).await.unwrap().is_empty());
  assert_eq!(s.list_visits(&by_visitor("álvarez")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn register_numbers_and_dedupes_visitors() {
  let s = MemoryStore::new();
  let h = host(&s).await;

  let a = s.register_visit(new_visit(h.user_id, "1", "Rita")).await.unwrap();
  let b = s.register_visit(new_visit(h.user_id, "1", "Rita R.")).await.unwrap();

  assert_eq!((a.number, b.number), (1, 2));
  assert_eq!(a.visitor.visitor_id, b.visitor.visitor_id);

  // Reads reflect the latest visitor name.
  let a = s.get_visit(a.visit_id).await.unwrap().unwrap();
  assert_eq!(a.visitor.name, "Rita R.");
  assert_eq!(s.frequent_visitors(2).await.unwrap()[0].total_visits, 2);
}

#[tokio::test]
async fn unknown_host_is_rejected() {
  let s = MemoryStore::new();
  let err = s.register_visit(new_visit(Uuid::new_v4(), "1", "X")).await.unwrap_err();
  assert!(matches!(err, Error::HostNotFound(_)));
  assert_eq!(err.fault(), Fault::Invalid);
}

#[tokio::test]
async fn queue_order_and_status_filter() {
  let s = MemoryStore::new();
  let h = host(&s).await;
  let a = s.register_visit(new_visit(h.user_id, "1", "A")).await.unwrap();
  let b = s.register_visit(new_visit(h.user_id, "2", "B")).await.unwrap();
  s.register_visit(new_visit(h.user_id, "3", "C")).await.unwrap();

  assert_eq!(s.next_awaiting().await.unwrap().unwrap().visit_id, a.visit_id);
  s.update_visit(a.visit_id, VisitPatch::status(VisitStatus::InProgress))
    .await
    .unwrap();
  assert_eq!(s.next_awaiting().await.unwrap().unwrap().visit_id, b.visit_id);

  let q = VisitQuery { status: Some(VisitStatus::Awaiting), ..Default::default() };
  let numbers: Vec<_> = s.list_visits(&q).await.unwrap().iter().map(|v| v.number).collect();
  assert_eq!(numbers, [3, 2]);

  let q = VisitQuery { visitor: Some("b".into()), ..Default::default() };
  assert_eq!(s.list_visits(&q).await.unwrap().len(), 1);
}

#[tokio::test]
async fn milestones_are_stamped_once() {
  let s = MemoryStore::new();
  let h = host(&s).await;
  let v = s.register_visit(new_visit(h.user_id, "1", "A")).await.unwrap();

  let done = s
    .update_visit(v.visit_id, VisitPatch::status(VisitStatus::Finished))
    .await
    .unwrap()
    .unwrap();
  let again = s.cancel_visit(v.visit_id, Some("duplicate".into())).await.unwrap().unwrap();
  assert_eq!(again.finished_at, done.finished_at);
  assert_eq!(again.status, VisitStatus::Cancelled);
  assert_eq!(again.cancel_reason.as_deref(), Some("duplicate"));

  let inside = s.check_in(v.visit_id).await.unwrap().unwrap();
  let inside_again = s.check_in(v.visit_id).await.unwrap().unwrap();
  assert!(inside.first);
  assert!(!inside_again.first);
  assert_eq!(inside.visit.check_in, inside_again.visit.check_in);
  assert_eq!(inside.visit.access, AccessStatus::OnPremises);
}

#[tokio::test]
async fn concurrent_check_ins_report_one_first() {
  let s = MemoryStore::new();
  let h = host(&s).await;
  let v = s.register_visit(new_visit(h.user_id, "1", "A")).await.unwrap();

  let (a, b) = tokio::join!(s.check_in(v.visit_id), s.check_in(v.visit_id));
  let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
  assert!(a.first != b.first);
  assert_eq!(a.visit.check_in, b.visit.check_in);
}

#[tokio::test]
async fn empty_patch_is_invalid() {
  let s = MemoryStore::new();
  let h = host(&s).await;
  let v = s.register_visit(new_visit(h.user_id, "1", "A")).await.unwrap();
  let err = s.update_visit(v.visit_id, VisitPatch::default()).await.unwrap_err();
  assert!(matches!(err, Error::EmptyPatch));
}

#[tokio::test]
async fn stats_reset_and_purge() {
  let s = MemoryStore::new();
  let h = host(&s).await;
  let a = s.register_visit(new_visit(h.user_id, "1", "A")).await.unwrap();
  let b = s.register_visit(new_visit(h.user_id, "2", "B")).await.unwrap();
  s.register_visit(new_visit(h.user_id, "3", "C")).await.unwrap();
  s.cancel_visit(a.visit_id, None).await.unwrap();
  s.check_in(b.visit_id).await.unwrap();

  let stats = s.stats().await.unwrap();
  assert_eq!(stats.total, 3);
  assert_eq!(stats.by_access.sum(), 3);
  assert_eq!(stats.by_status.cancelled, 1);
  assert_eq!(stats.present, 1);
  assert_eq!(stats.today, 3);

  assert_eq!(s.purge_closed().await.unwrap(), 1);
  assert!(s.get_visit(a.visit_id).await.unwrap().is_none());
  assert_eq!(s.stats().await.unwrap().last_number, 3);

  s.reset_visits().await.unwrap();
  let v = s.register_visit(new_visit(h.user_id, "4", "D")).await.unwrap();
  assert_eq!(v.number, 1);
}

#[tokio::test]
async fn users_soft_delete_and_conflicts() {
  let s = MemoryStore::new();
  let h = host(&s).await;

  let dup = s.add_user(new_user("10000001", "Clone")).await.unwrap_err();
  assert_eq!(dup.fault(), Fault::Conflict);

  s.set_user_active(h.user_id, false).await.unwrap();
  let inactive = UserQuery { active: Some(false), ..Default::default() };
  assert_eq!(s.list_users(&inactive).await.unwrap().len(), 1);

  let dept = s.add_department("Finance".into()).await.unwrap();
  assert_eq!(dept.department_id, 1);
  let err = s.add_department(" Finance ".into()).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateDepartment(_)));
}
