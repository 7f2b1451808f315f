//! Error types for the tessera-fiscal codec.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("fiscal code must be 16 characters, got {0}")]
  Length(usize),

  #[error("unexpected character {found:?} at position {position}")]
  Character { position: usize, found: char },

  #[error("invalid month letter {0:?}")]
  Month(char),

  #[error("invalid day of birth field: {0}")]
  Day(u32),

  #[error("no such calendar date: {year:04}-{month:02}-{day:02}")]
  ImpossibleDate { year: i32, month: u32, day: u32 },

  #[error("check character mismatch: expected {expected}, found {found}")]
  CheckCharacter { expected: char, found: char },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
