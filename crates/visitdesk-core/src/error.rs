//! Error types for `visitdesk-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid status {given:?}; expected one of: {allowed}")]
  InvalidStatus { given: String, allowed: String },

  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("no fields to update")]
  EmptyPatch,

  #[error("host not found: {0}")]
  HostNotFound(Uuid),

  #[error("unknown {kind}: {id}")]
  UnknownReference { kind: &'static str, id: String },

  #[error("national id {0:?} is already registered")]
  DuplicateNationalId(String),

  #[error("department {0:?} already exists")]
  DuplicateDepartment(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse category of a failure, used by the HTTP layer to pick a status code
/// without knowing which backend produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  NotFound,
  Invalid,
  Conflict,
  Internal,
}

/// Implemented by every store error type.
pub trait Classify {
  fn fault(&self) -> Fault;
}

impl Classify for Error {
  fn fault(&self) -> Fault {
    match self {
      Error::InvalidStatus { .. }
      | Error::MissingField(_)
      | Error::EmptyPatch
      | Error::HostNotFound(_)
      | Error::UnknownReference { .. } => Fault::Invalid,
      Error::DuplicateNationalId(_) | Error::DuplicateDepartment(_) => {
        Fault::Conflict
      }
    }
  }
}

/// Reject blank required text fields.
pub fn require(field: &'static str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    Err(Error::MissingField(field))
  } else {
    Ok(())
  }
}
