//! Renewal eligibility: does a returning registrant have to fill in the
//! registration form again?
//!
//! Two independent triggers are reported separately so a caller can explain
//! which one fired:
//!
//! - **expired**: more than [`REGISTRATION_VALIDITY_DAYS`] days have passed
//!   since the last registration (exactly 365 days is still valid);
//! - **matured**: the registrant was a minor at the last registration and is
//!   an adult today.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const AGE_OF_MAJORITY: i32 = 18;

/// A registration stays valid for this many days.
pub const REGISTRATION_VALIDITY_DAYS: i64 = 365;

/// Age in whole years at `as_of`.
///
/// The year difference is decremented when `as_of`'s month is earlier than
/// the birth month *or* `as_of`'s day is earlier than the birth day. The two
/// fields are compared independently, not as a (month, day) pair, so a date
/// later in the year but earlier in its month still counts as "before the
/// birthday" (born 10 March, on 5 April the year is not yet counted).
pub fn age_in_years(birth_date: NaiveDate, as_of: NaiveDate) -> i32 {
  let years = as_of.year() - birth_date.year();
  if as_of.month() < birth_date.month() || as_of.day() < birth_date.day() {
    years - 1
  } else {
    years
  }
}

pub fn is_minor(birth_date: NaiveDate, as_of: NaiveDate) -> bool {
  age_in_years(birth_date, as_of) < AGE_OF_MAJORITY
}

/// More than [`REGISTRATION_VALIDITY_DAYS`] days since `last_registration`.
pub fn registration_expired(last_registration: NaiveDate, today: NaiveDate) -> bool {
  (today - last_registration).num_days() > REGISTRATION_VALIDITY_DAYS
}

/// A minor at `last_registration` who is an adult at `today`.
pub fn crossed_majority(
  birth_date: NaiveDate,
  last_registration: NaiveDate,
  today: NaiveDate,
) -> bool {
  is_minor(birth_date, last_registration) && !is_minor(birth_date, today)
}

/// The two independent renewal triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenewalStatus {
  pub needs_renewal_expired: bool,
  pub needs_renewal_matured: bool,
}

impl RenewalStatus {
  pub fn evaluate(last_registration: NaiveDate, birth_date: NaiveDate, today: NaiveDate) -> Self {
    Self {
      needs_renewal_expired: registration_expired(last_registration, today),
      needs_renewal_matured: crossed_majority(birth_date, last_registration, today),
    }
  }

  /// Either trigger fired.
  pub fn needs_renewal(&self) -> bool { self.needs_renewal_expired || self.needs_renewal_matured }
}
