//! Fire-and-forget delivery of [`Message`]s.
//!
//! Handlers push onto an unbounded channel and return immediately; a
//! background task drains the channel through a [`Mailer`]. A failed delivery
//! is logged and otherwise ignored.

use tokio::sync::mpsc;
use visitdesk_core::notice::{Mailer, Message};

/// Sending half of the notice queue. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
  tx: mpsc::UnboundedSender<Message>,
}

impl Notifier {
  /// A notifier plus the receiving end of its queue, for callers that drain
  /// it themselves.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  /// Start a background task delivering every queued message with `mailer`.
  /// Must be called from within a tokio runtime.
  pub fn spawn<M>(mailer: M) -> Self
  where
    M: Mailer + 'static,
  {
    let (notifier, rx) = Self::channel();
    tokio::spawn(drain(mailer, rx));
    notifier
  }

  /// A notifier that drops everything.
  pub fn disabled() -> Self { Self::channel().0 }

  pub fn send(&self, message: Message) {
    if self.tx.send(message).is_err() {
      tracing::debug!("notice queue closed; message dropped");
    }
  }
}

async fn drain<M: Mailer>(mailer: M, mut rx: mpsc::UnboundedReceiver<Message>) {
  while let Some(message) = rx.recv().await {
    match mailer.deliver(&message).await {
      Ok(()) => tracing::info!(kind = ?message.kind, to = %message.to, "notice delivered"),
      Err(e) => tracing::warn!(
        kind = ?message.kind,
        to = %message.to,
        error = %e,
        "notice delivery failed"
      ),
    }
  }
}
