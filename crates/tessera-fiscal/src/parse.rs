//! Structural validation and decoding of fiscal codes.
//!
//! Layout (0-based positions):
//!
//! ```text
//!  0..6   surname + name letters
//!  6..8   year            (digits, omocodia allowed)
//!  8      month letter
//!  9..11  day (+40 female) (digits, omocodia allowed)
//! 11      birthplace letter
//! 12..15  birthplace digits (omocodia allowed)
//! 15      check character
//! ```

use chrono::NaiveDate;

use crate::{
  CODE_LEN, FiscalCode,
  encode::check_character,
  error::{Error, Result},
};

pub(crate) const MONTH_LETTERS: [char; 12] =
  ['A', 'B', 'C', 'D', 'E', 'H', 'L', 'M', 'P', 'R', 'S', 'T'];

/// Letters substituted for digits 0..9 when two people share a code.
const OMOCODIA_LETTERS: [char; 10] =
  ['L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V'];

const DIGIT_POSITIONS: [usize; 7] = [6, 7, 9, 10, 12, 13, 14];

const LETTER_POSITIONS: [usize; 9] = [0, 1, 2, 3, 4, 5, 8, 11, 15];

/// Validate an already-normalised code.
pub(crate) fn parse_code(code: &str) -> Result<FiscalCode> {
  let chars: Vec<char> = code.chars().collect();
  if chars.len() != CODE_LEN {
    return Err(Error::Length(chars.len()));
  }

  for &position in &LETTER_POSITIONS {
    let found = chars[position];
    if !found.is_ascii_uppercase() {
      return Err(Error::Character { position, found });
    }
  }
  for &position in &DIGIT_POSITIONS {
    let found = chars[position];
    if !found.is_ascii_digit() && !OMOCODIA_LETTERS.contains(&found) {
      return Err(Error::Character { position, found });
    }
  }

  if !MONTH_LETTERS.contains(&chars[8]) {
    return Err(Error::Month(chars[8]));
  }

  let canonical = strip_omocodia(code);
  let day = day_field(&canonical);
  if !(1..=31).contains(&day) && !(41..=71).contains(&day) {
    return Err(Error::Day(day));
  }

  let expected = check_character(&code[..CODE_LEN - 1])?;
  if expected != chars[CODE_LEN - 1] {
    return Err(Error::CheckCharacter { expected, found: chars[CODE_LEN - 1] });
  }

  Ok(FiscalCode(code.to_owned()))
}

/// Replace omocodia letters in the digit positions with their digits.
pub(crate) fn strip_omocodia(code: &str) -> String {
  code
    .chars()
    .enumerate()
    .map(|(i, c)| {
      if !DIGIT_POSITIONS.contains(&i) {
        return c;
      }
      OMOCODIA_LETTERS
        .iter()
        .position(|&l| l == c)
        .and_then(|d| char::from_digit(d as u32, 10))
        .unwrap_or(c)
    })
    .collect()
}

/// Two-digit numeric field starting at `start` of a canonical code.
fn numeric_field(canonical: &str, start: usize) -> u32 {
  canonical[start..start + 2].parse().unwrap_or(0)
}

pub(crate) fn day_field(canonical: &str) -> u32 { numeric_field(canonical, 9) }

pub(crate) fn birth_date(canonical: &str, reference_year: i32) -> Result<NaiveDate> {
  let short_year = numeric_field(canonical, 6) as i32;
  let century = reference_year - reference_year.rem_euclid(100);
  let mut year = century + short_year;
  if year > reference_year {
    year -= 100;
  }

  let month_letter = canonical[8..].chars().next().unwrap_or(' ');
  let month = MONTH_LETTERS
    .iter()
    .position(|&m| m == month_letter)
    .ok_or(Error::Month(month_letter))? as u32
    + 1;

  let raw_day = day_field(canonical);
  let day = if raw_day > 40 { raw_day - 40 } else { raw_day };

  NaiveDate::from_ymd_opt(year, month, day)
    .ok_or(Error::ImpossibleDate { year, month, day })
}
