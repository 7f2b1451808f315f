//! The configured local time zone and the source of "now".
//!
//! Every date the registry reasons about (today's tickets, registration
//! dates, ages) is derived from a single [`Calendar`]. The zone is an explicit
//! value rather than the process's local zone, so tests can pin both the zone
//! and the instant.

use std::{fmt, sync::Arc};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::{Error, Result};

/// Source of the current instant.
pub trait Clock: Send + Sync + 'static {
  fn now_utc(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_utc(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
  fn now_utc(&self) -> DateTime<Utc> { self.0 }
}

/// A time zone paired with a clock. Cloning is cheap.
#[derive(Clone)]
pub struct Calendar {
  zone:  FixedOffset,
  clock: Arc<dyn Clock>,
}

impl Calendar {
  pub fn new(zone: FixedOffset, clock: Arc<dyn Clock>) -> Self { Self { zone, clock } }

  /// A calendar reading the wall clock.
  pub fn system(zone: FixedOffset) -> Self { Self::new(zone, Arc::new(SystemClock)) }

  /// Build a zone from a UTC offset in minutes (e.g. `60` for CET).
  pub fn zone_from_minutes(minutes: i32) -> Result<FixedOffset> {
    minutes
      .checked_mul(60)
      .and_then(FixedOffset::east_opt)
      .ok_or_else(|| Error::Validation(format!("UTC offset out of range: {minutes} minutes")))
  }

  pub fn zone(&self) -> FixedOffset { self.zone }

  /// The current instant in the configured zone.
  pub fn now(&self) -> DateTime<FixedOffset> { self.clock.now_utc().with_timezone(&self.zone) }

  /// The current calendar date in the configured zone.
  pub fn today(&self) -> NaiveDate { self.now().date_naive() }
}

impl fmt::Debug for Calendar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Calendar").field("zone", &self.zone).finish_non_exhaustive()
  }
}
