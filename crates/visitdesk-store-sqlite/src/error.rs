//! Error type for `visitdesk-store-sqlite`.

use thiserror::Error;
use visitdesk_core::{Classify, Fault};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] visitdesk_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A column held a value the domain types cannot represent.
  #[error("decode error: {0}")]
  Decode(String),
}

impl Classify for Error {
  fn fault(&self) -> Fault {
    match self {
      Error::Core(e) => e.fault(),
      _ => Fault::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
