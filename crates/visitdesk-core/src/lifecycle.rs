//! Visit lifecycle: the desk queue status and the access-control status.
//!
//! Any known status may be set from any other; what a transition *does* is
//! captured by its [`Milestone`]. The first entry into a milestone-bearing
//! status stamps the matching timestamp, and re-entering never overwrites it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{Error, Result};

// ─── Milestones ──────────────────────────────────────────────────────────────

/// A set-once timestamp on a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
  Called,
  Started,
  Finished,
  CheckedIn,
  CheckedOut,
}

// ─── Queue status ────────────────────────────────────────────────────────────

/// Position of a visit in the reception queue.
///
/// `awaiting → calling → in_progress → {finished | cancelled}`
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VisitStatus {
  #[default]
  Awaiting,
  Calling,
  InProgress,
  Finished,
  Cancelled,
}

impl VisitStatus {
  pub fn milestone(self) -> Option<Milestone> {
    match self {
      Self::Awaiting => None,
      Self::Calling => Some(Milestone::Called),
      Self::InProgress => Some(Milestone::Started),
      Self::Finished | Self::Cancelled => Some(Milestone::Finished),
    }
  }

  /// `finished` and `cancelled` end the queue lifecycle.
  pub fn is_closed(self) -> bool {
    matches!(self, Self::Finished | Self::Cancelled)
  }

  /// Parse a client-supplied status, naming the allowed set on failure.
  pub fn parse(s: &str) -> Result<Self> { parse_status(s) }
}

// ─── Access status ───────────────────────────────────────────────────────────

/// Security-desk state of a visit.
///
/// `preauthorized → {unexpected | on_premises} → {approved | rejected} →
/// departed`
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccessStatus {
  #[default]
  Preauthorized,
  Unexpected,
  OnPremises,
  Approved,
  Rejected,
  Departed,
}

impl AccessStatus {
  pub fn milestone(self) -> Option<Milestone> {
    match self {
      Self::OnPremises => Some(Milestone::CheckedIn),
      Self::Departed => Some(Milestone::CheckedOut),
      _ => None,
    }
  }

  pub fn parse(s: &str) -> Result<Self> { parse_status(s) }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Comma-separated list of every value of a status enum.
pub fn allowed<T>() -> String
where
  T: IntoEnumIterator + std::fmt::Display,
{
  T::iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
}

fn parse_status<T>(s: &str) -> Result<T>
where
  T: IntoEnumIterator + std::fmt::Display + FromStr,
{
  T::from_str(s.trim()).map_err(|_| Error::InvalidStatus {
    given:   s.to_owned(),
    allowed: allowed::<T>(),
  })
}
