//! Outbound notices and the `Mailer` transport trait.
//!
//! Notices are composed here from domain types; delivering them is the job of
//! a [`Mailer`]. Delivery is never allowed to fail the operation that
//! triggered it.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::visit::Visit;

// ─── Badge ───────────────────────────────────────────────────────────────────

/// Identification badge attached to a visit confirmation.
///
/// `payload` is the string a QR encoder turns into the badge image; `code` is
/// the human-readable form printed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
  pub code:    String,
  pub payload: String,
}

impl Badge {
  pub fn for_visit(visit: &Visit) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(visit.visit_id.as_bytes());
    hasher.update(visit.visitor.national_id.as_bytes());
    let digest = hasher.finalize();
    let code = hex::encode_upper(&digest[..5]);
    let payload = format!("VISIT:{}:{}:{}", visit.number, visit.visit_id, code);
    Self { code, payload }
  }
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
  Confirmation,
  Arrival,
  Cancellation,
}

/// A plain-text message ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub kind:    NoticeKind,
  pub to:      String,
  pub subject: String,
  pub body:    String,
  pub badge:   Option<Badge>,
}

fn when(dt: Option<DateTime<Utc>>) -> String {
  dt.map(|d| d.format("%A %d %B %Y, %H:%M UTC").to_string())
    .unwrap_or_else(|| "to be confirmed".to_string())
}

/// Confirmation sent to the visitor when a visit is registered.
pub fn confirmation(visit: &Visit, visitor_email: &str, with_badge: bool) -> Message {
  let badge = with_badge.then(|| Badge::for_visit(visit));
  let mut body = format!(
    "Hello {visitor},\n\n\
     Your visit has been registered (number {number}).\n\n\
     Start:  {start}\n\
     End:    {end}\n\
     Host:   {host}\n\
     Reason: {reason}\n\n\
     Please come to reception at the indicated time with your identity \
     document. Security will register your arrival and let your host know.\n",
    visitor = visit.visitor.name,
    number = visit.number,
    start = when(visit.scheduled_start),
    end = when(visit.scheduled_end),
    host = visit.host.name,
    reason = visit.reason,
  );
  if let Some(b) = &badge {
    body.push_str(&format!("\nBadge code: {}\n", b.code));
  }

  Message {
    kind: NoticeKind::Confirmation,
    to: visitor_email.to_owned(),
    subject: "Visit confirmed".to_owned(),
    body,
    badge,
  }
}

/// Sent to the host when their visitor checks in.
pub fn arrival(visit: &Visit, host_email: &str) -> Message {
  let body = format!(
    "Hello {host},\n\n\
     Your visitor {visitor}{company} has arrived at {at} and is waiting at \
     reception.\n",
    host = visit.host.name,
    visitor = visit.visitor.name,
    company = visit
      .visitor
      .company
      .as_deref()
      .map(|c| format!(" ({c})"))
      .unwrap_or_default(),
    at = when(visit.check_in),
  );

  Message {
    kind: NoticeKind::Arrival,
    to: host_email.to_owned(),
    subject: "Your visitor has arrived".to_owned(),
    body,
    badge: None,
  }
}

/// Sent to the visitor when a visit is cancelled.
pub fn cancellation(visit: &Visit, visitor_email: &str) -> Message {
  let body = format!(
    "Hello {visitor},\n\n\
     Your visit scheduled for {start} has been cancelled.\n\
     Reason: {reason}\n",
    visitor = visit.visitor.name,
    start = when(visit.scheduled_start),
    reason = visit.cancel_reason.as_deref().unwrap_or("not specified"),
  );

  Message {
    kind: NoticeKind::Cancellation,
    to: visitor_email.to_owned(),
    subject: "Visit cancelled".to_owned(),
    body,
    badge: None,
  }
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// A message transport (SMTP relay, webhook, log sink, ...).
pub trait Mailer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn deliver<'a>(
    &'a self,
    message: &'a Message,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::{
    lifecycle::{AccessStatus, VisitStatus},
    visit::{HostRef, VisitorRef},
  };

  fn visit() -> Visit {
    Visit {
      visit_id:        Uuid::new_v4(),
      number:          7,
      visitor:         VisitorRef {
        visitor_id:  Uuid::new_v4(),
        national_id: "28999000".into(),
        name:        "Pablo Ruiz".into(),
        company:     Some("Initech".into()),
      },
      host:            HostRef {
        user_id:    Uuid::new_v4(),
        name:       "Ana Paz".into(),
        department: None,
      },
      registered_by:   None,
      reason:          "contract review".into(),
      scheduled_start: None,
      scheduled_end:   None,
      phone:           None,
      location:        None,
      notes:           None,
      cancel_reason:   None,
      status:          VisitStatus::Awaiting,
      access:          AccessStatus::Preauthorized,
      created_at:      Utc::now(),
      called_at:       None,
      started_at:      None,
      finished_at:     None,
      check_in:        Some(Utc::now()),
      check_out:       None,
    }
  }

  #[test]
  fn badge_is_stable_for_a_visit() {
    let v = visit();
    let a = Badge::for_visit(&v);
    let b = Badge::for_visit(&v);
    assert_eq!(a, b);
    assert_eq!(a.code.len(), 10);
    assert!(a.payload.starts_with("VISIT:7:"));
    assert!(a.payload.ends_with(&a.code));
  }

  #[test]
  fn confirmation_carries_badge_only_when_asked() {
    let v = visit();
    let with = confirmation(&v, "pablo@example.com", true);
    let without = confirmation(&v, "pablo@example.com", false);

    assert_eq!(with.to, "pablo@example.com");
    assert!(with.badge.is_some());
    assert!(with.body.contains("Badge code"));
    assert!(without.badge.is_none());
    assert!(without.body.contains("Ana Paz"));
    assert!(without.body.contains("to be confirmed"));
  }

  #[test]
  fn arrival_goes_to_the_host() {
    let v = visit();
    let msg = arrival(&v, "ana@example.com");
    assert_eq!(msg.kind, NoticeKind::Arrival);
    assert_eq!(msg.to, "ana@example.com");
    assert!(msg.body.contains("Pablo Ruiz (Initech)"));
  }

  #[test]
  fn cancellation_defaults_the_reason() {
    let v = visit();
    let msg = cancellation(&v, "pablo@example.com");
    assert!(msg.body.contains("Reason: not specified"));
  }
}
