//! Encoding of the identity prefix and the check character.

use chrono::{Datelike, NaiveDate};

use crate::{
  Gender,
  error::{Error, Result},
  parse::MONTH_LETTERS,
};

/// Values contributed by characters in odd (1-based) positions, indexed by
/// `0..=9` for digits then `10..=35` for `A..=Z`.
const ODD_VALUES: [u32; 36] = [
  1, 0, 5, 7, 9, 13, 15, 17, 19, 21, // 0-9
  1, 0, 5, 7, 9, 13, 15, 17, 19, 21, // A-J
  2, 4, 18, 20, 11, 3, 6, 8, 12, 14, // K-T
  16, 10, 22, 25, 24, 23, // U-Z
];

/// Compute the check character for the first 15 characters of a code.
pub fn check_character(first15: &str) -> Result<char> {
  let mut sum = 0;
  for (position, c) in first15.chars().enumerate() {
    let (odd_index, even_value) = match c {
      '0'..='9' => (c as u32 - '0' as u32, c as u32 - '0' as u32),
      'A'..='Z' => (10 + c as u32 - 'A' as u32, c as u32 - 'A' as u32),
      found => return Err(Error::Character { position, found }),
    };
    sum += if position % 2 == 0 {
      ODD_VALUES[odd_index as usize]
    } else {
      even_value
    };
  }
  Ok((b'A' + (sum % 26) as u8) as char)
}

/// Encode the first 11 characters of a code: surname, name, year, month and
/// day (+40 for females).
pub fn identity_prefix(
  family: &str,
  given: &str,
  birth_date: NaiveDate,
  gender: Gender,
) -> String {
  let day = match gender {
    Gender::Male => birth_date.day(),
    Gender::Female => birth_date.day() + 40,
  };
  format!(
    "{}{}{:02}{}{:02}",
    surname_triple(family),
    name_triple(given),
    birth_date.year().rem_euclid(100),
    MONTH_LETTERS[birth_date.month0() as usize],
    day,
  )
}

fn surname_triple(family: &str) -> String {
  let (consonants, vowels) = split_letters(family);
  pad_triple(consonants.into_iter().chain(vowels))
}

fn name_triple(given: &str) -> String {
  let (consonants, vowels) = split_letters(given);
  if consonants.len() >= 4 {
    return [consonants[0], consonants[2], consonants[3]].iter().collect();
  }
  pad_triple(consonants.into_iter().chain(vowels))
}

fn pad_triple(letters: impl Iterator<Item = char>) -> String {
  letters.chain(std::iter::repeat('X')).take(3).collect()
}

/// Upper-case ASCII letters of `s` split into consonants and vowels, in
/// order. Accented vowels are folded; anything else is dropped.
fn split_letters(s: &str) -> (Vec<char>, Vec<char>) {
  let mut consonants = Vec::new();
  let mut vowels = Vec::new();
  for c in s.chars().map(fold_accent) {
    let c = c.to_ascii_uppercase();
    match c {
      'A' | 'E' | 'I' | 'O' | 'U' => vowels.push(c),
      'A'..='Z' => consonants.push(c),
      _ => {}
    }
  }
  (consonants, vowels)
}

fn fold_accent(c: char) -> char {
  match c {
    'à' | 'á' | 'â' | 'ä' | 'À' | 'Á' => 'A',
    'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' => 'E',
    'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' => 'I',
    'ò' | 'ó' | 'ô' | 'ö' | 'Ò' | 'Ó' => 'O',
    'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' => 'U',
    other => other,
  }
}
