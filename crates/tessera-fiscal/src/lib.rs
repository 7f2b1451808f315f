//! Italian fiscal code (codice fiscale) codec for tessera.
//!
//! Validates the structure and check character of a 16-character code,
//! resolves omocodia substitutions, decodes the birth date and gender, and
//! encodes the identity prefix (the first 11 characters) from a person's
//! name and birth date. Pure synchronous; no HTTP or database dependencies.
//!
//! The birthplace segment (characters 12 to 15) is checked for shape only;
//! no municipality registry is consulted.
//!
//! # Quick start
//!
//! ```no_run
//! use tessera_fiscal::FiscalCode;
//!
//! let code: FiscalCode = "rssmra85t10a562s".parse().unwrap();
//! assert_eq!(code.as_str(), "RSSMRA85T10A562S");
//! assert!(code.matches_identity(
//!   "Rossi",
//!   "Mario",
//!   chrono::NaiveDate::from_ymd_opt(1985, 12, 10).unwrap(),
//! ));
//! ```

mod encode;
pub mod error;
mod parse;

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use encode::{check_character, identity_prefix};
pub use error::{Error, Result};

/// Length of a complete fiscal code.
pub const CODE_LEN: usize = 16;

/// Length of the segment derived from name, surname and birth date.
pub const IDENTITY_PREFIX_LEN: usize = 11;

// ─── Gender ──────────────────────────────────────────────────────────────────

/// Gender as encoded in the day-of-birth field (females add 40).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
}

// ─── FiscalCode ──────────────────────────────────────────────────────────────

/// A structurally valid fiscal code, stored upper-case and as written
/// (omocodia letters are preserved; see [`FiscalCode::canonical`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalCode(String);

impl FiscalCode {
  /// Normalise and validate `raw`.
  pub fn parse(raw: &str) -> Result<Self> { parse::parse_code(&normalize(raw)) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The code with every omocodia letter replaced by the digit it stands
  /// for. The check character is left untouched.
  pub fn canonical(&self) -> String { parse::strip_omocodia(&self.0) }

  /// The first [`IDENTITY_PREFIX_LEN`] characters of [`Self::canonical`].
  pub fn identity_prefix(&self) -> String {
    self.canonical()[..IDENTITY_PREFIX_LEN].to_owned()
  }

  pub fn gender(&self) -> Gender {
    if parse::day_field(&self.canonical()) > 40 {
      Gender::Female
    } else {
      Gender::Male
    }
  }

  /// Decode the birth date. The two-digit year is resolved to the latest
  /// century that does not place it after `reference_year`.
  pub fn birth_date(&self, reference_year: i32) -> Result<NaiveDate> {
    parse::birth_date(&self.canonical(), reference_year)
  }

  /// True when the identity prefix matches `family`, `given` and
  /// `birth_date` for either gender.
  pub fn matches_identity(
    &self,
    family: &str,
    given: &str,
    birth_date: NaiveDate,
  ) -> bool {
    let prefix = self.identity_prefix();
    [Gender::Male, Gender::Female]
      .into_iter()
      .any(|g| identity_prefix(family, given, birth_date, g) == prefix)
  }
}

impl fmt::Display for FiscalCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for FiscalCode {
  fn as_ref(&self) -> &str { &self.0 }
}

impl FromStr for FiscalCode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for FiscalCode {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<FiscalCode> for String {
  fn from(code: FiscalCode) -> Self { code.0 }
}

/// Strip all whitespace and upper-case the remaining characters.
pub fn normalize(raw: &str) -> String {
  raw
    .chars()
    .filter(|c| !c.is_whitespace())
    .flat_map(char::to_uppercase)
    .collect()
}
