//! Error types for `tessera-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("invalid fiscal code: {0}")]
  InvalidFiscalCode(#[from] tessera_fiscal::Error),

  /// The derived ticket policy walked back `scan_days` days without finding
  /// any assigned ticket.
  #[error("no ticket assigned in the last {scan_days} days")]
  NoTicketHistory { scan_days: u32 },

  #[error("registrant not found: {0}")]
  RegistrantNotFound(i64),

  #[error("group not found: {0}")]
  GroupNotFound(i64),

  #[error("fiscal code already registered: {0}")]
  DuplicateFiscalCode(String),

  #[error("registrant {0} cannot be their own guardian")]
  SelfGuardianship(i64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse error classes a transport layer maps to its own responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed or missing input; never retried.
  Validation,
  NotFound,
  Conflict,
  /// Sequence-search exhaustion in the derived ticket policy.
  NoTicketHistory,
  /// Storage failure; any multi-row write it interrupted was rolled back.
  Persistence,
}

/// Implemented by every error type a [`crate::store::RegistryStore`] returns.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Validation(_) | Error::InvalidFiscalCode(_) | Error::SelfGuardianship(_) => {
        ErrorKind::Validation
      }
      Error::NoTicketHistory { .. } => ErrorKind::NoTicketHistory,
      Error::RegistrantNotFound(_) | Error::GroupNotFound(_) => ErrorKind::NotFound,
      Error::DuplicateFiscalCode(_) => ErrorKind::Conflict,
      Error::Serialization(_) => ErrorKind::Persistence,
    }
  }
}
