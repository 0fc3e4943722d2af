//! [`Mailer`] implementations selectable from configuration.

use std::{convert::Infallible, time::Duration};

use serde_json::json;
use thiserror::Error;
use visitdesk_core::notice::{Mailer, Message};

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Writes every message to the log instead of sending it.
pub struct LogMailer {
  pub from: String,
}

impl Mailer for LogMailer {
  type Error = Infallible;

  async fn deliver(&self, message: &Message) -> Result<(), Infallible> {
    tracing::info!(
      from = %self.from,
      to = %message.to,
      subject = %message.subject,
      badge = message.badge.as_ref().map(|b| b.code.as_str()),
      "mail (log only)\n{}",
      message.body,
    );
    Ok(())
  }
}

// ─── HTTP relay ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RelayError {
  #[error("relay request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("relay answered {0}")]
  Status(reqwest::StatusCode),
}

/// POSTs each message as JSON to an HTTP mail relay, which owns SMTP and
/// badge rendering.
pub struct RelayMailer {
  client: reqwest::Client,
  url:    String,
  from:   String,
}

impl RelayMailer {
  pub fn new(url: impl Into<String>, from: impl Into<String>) -> Result<Self, RelayError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, url: url.into(), from: from.into() })
  }
}

impl Mailer for RelayMailer {
  type Error = RelayError;

  async fn deliver(&self, message: &Message) -> Result<(), RelayError> {
    let payload = json!({
      "from":    self.from,
      "to":      message.to,
      "kind":    message.kind,
      "subject": message.subject,
      "body":    message.body,
      "badge":   message.badge,
    });

    let resp = self.client.post(&self.url).json(&payload).send().await?;
    if !resp.status().is_success() {
      return Err(RelayError::Status(resp.status()));
    }
    Ok(())
  }
}
