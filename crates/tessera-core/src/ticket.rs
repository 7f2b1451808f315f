//! Ticket numbering for assignment groups.
//!
//! Ticket numbers cycle through `0..=MAX_TICKET`. Two policies produce them:
//!
//! - [`TicketPolicy::Supplied`]: the caller proposes a number, which is
//!   reduced modulo [`TICKET_MODULUS`] only when it exceeds [`MAX_TICKET`].
//! - [`TicketPolicy::Derived`]: the number follows the highest ticket of the
//!   most recent day that has any, walking back from today at most
//!   `scan_days` days.
//!
//! Derivation reads shared state; callers must run it and the insert that
//! uses its result under one write lock (see the SQLite store).

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::Error;

pub const MAX_TICKET: u32 = 100;

pub const TICKET_MODULUS: u32 = MAX_TICKET + 1;

/// Default bound on the backward day scan of the derived policy.
pub const DEFAULT_SCAN_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketPolicy {
  Supplied(u32),
  Derived { scan_days: u32 },
}

impl TicketPolicy {
  /// Resolve the ticket number for a group created on `today`.
  ///
  /// `max_on` returns the highest ticket assigned on a given date; it is only
  /// consulted by the derived policy.
  pub fn resolve<E>(
    self,
    today: NaiveDate,
    max_on: impl FnMut(NaiveDate) -> Result<Option<u32>, E>,
  ) -> Result<u32, E>
  where
    E: From<Error>,
  {
    match self {
      Self::Supplied(candidate) => Ok(cap_ticket(candidate)),
      Self::Derived { scan_days } => derive_ticket(today, scan_days, max_on),
    }
  }
}

/// Identity up to [`MAX_TICKET`], modulo [`TICKET_MODULUS`] above it.
pub fn cap_ticket(candidate: u32) -> u32 {
  if candidate > MAX_TICKET { candidate % TICKET_MODULUS } else { candidate }
}

/// The ticket following `previous`, wrapping from [`MAX_TICKET`] to zero.
pub fn next_ticket(previous: u32) -> u32 { (previous % TICKET_MODULUS + 1) % TICKET_MODULUS }

/// Walk back from `today` (inclusive) up to `scan_days` days and return the
/// successor of the first maximum found.
///
/// Fails with [`Error::NoTicketHistory`] when no day in the window has a
/// ticket.
pub fn derive_ticket<E>(
  today: NaiveDate,
  scan_days: u32,
  mut max_on: impl FnMut(NaiveDate) -> Result<Option<u32>, E>,
) -> Result<u32, E>
where
  E: From<Error>,
{
  for days_behind in 0..=scan_days {
    let Some(day) = today.checked_sub_days(Days::new(u64::from(days_behind))) else {
      break;
    };
    if let Some(max) = max_on(day)? {
      let ticket = next_ticket(max);
      debug!(%day, days_behind, max, ticket, "derived ticket from history");
      return Ok(ticket);
    }
  }
  Err(Error::NoTicketHistory { scan_days }.into())
}
