//! Registrants, the people in the registry, and the guardianship links between them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tessera_fiscal::FiscalCode;

use crate::{
  Error, Result,
  renewal::{RenewalStatus, is_minor},
};

pub type RegistrantId = i64;

/// Kind of membership held by a registrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
  #[default]
  Member,
  Cardholder,
}

// ─── Registrant ──────────────────────────────────────────────────────────────

/// A stored person record, adult or dependent minor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
  pub registrant_id:    RegistrantId,
  /// Unique across the registry.
  pub fiscal_code:      FiscalCode,
  pub given_name:       String,
  pub family_name:      String,
  pub birth_date:       NaiveDate,
  pub birth_place:      String,
  pub residence_place:  String,
  pub residence_street: String,
  pub phone:            String,
  /// Date of the last successful registration or renewal; never in the
  /// future.
  pub registered_on:    NaiveDate,
  pub user_type:        UserType,
  pub activity:         String,
}

impl Registrant {
  /// Which renewal triggers apply on `today`.
  pub fn renewal_status(&self, today: NaiveDate) -> RenewalStatus {
    RenewalStatus::evaluate(self.registered_on, self.birth_date, today)
  }

  /// Hex SHA-256 over the record's JSON form; handed to the registrant as
  /// proof of registration.
  pub fn receipt_digest(&self) -> Result<String> {
    let bytes = serde_json::to_vec(self)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
  }
}

// ─── NewRegistrant ───────────────────────────────────────────────────────────

/// Input to [`crate::store::RegistryStore::add_registrant`] and friends.
/// `registrant_id` and `registered_on` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistrant {
  pub fiscal_code:      FiscalCode,
  pub given_name:       String,
  pub family_name:      String,
  pub birth_date:       NaiveDate,
  #[serde(default)]
  pub birth_place:      String,
  #[serde(default)]
  pub residence_place:  String,
  #[serde(default)]
  pub residence_street: String,
  #[serde(default)]
  pub phone:            String,
  #[serde(default)]
  pub user_type:        UserType,
  #[serde(default)]
  pub activity:         String,
}

impl NewRegistrant {
  /// Title-case names and places, trim the phone number and the activity.
  pub fn normalized(self) -> Self {
    Self {
      given_name: title_case(&self.given_name),
      family_name: title_case(&self.family_name),
      birth_place: title_case(&self.birth_place),
      residence_place: title_case(&self.residence_place),
      residence_street: title_case(&self.residence_street),
      phone: self.phone.trim().to_owned(),
      activity: self.activity.trim().to_owned(),
      ..self
    }
  }

  /// Checks for a registrant signing up on their own behalf.
  pub fn validate_adult(&self, today: NaiveDate) -> Result<()> {
    self.validate_identity(today)?;
    require("birth_place", &self.birth_place)?;
    require("residence_place", &self.residence_place)?;
    require("residence_street", &self.residence_street)?;
    if is_minor(self.birth_date, today) {
      return Err(Error::Validation(
        "registrant is a minor and must be registered by a guardian".into(),
      ));
    }
    Ok(())
  }

  /// Checks for a minor registered alongside a guardian.
  pub fn validate_dependent(&self, today: NaiveDate) -> Result<()> {
    self.validate_identity(today)?;
    if !is_minor(self.birth_date, today) {
      return Err(Error::Validation(format!(
        "dependent {} is not a minor",
        self.fiscal_code
      )));
    }
    Ok(())
  }

  fn validate_identity(&self, today: NaiveDate) -> Result<()> {
    require("given_name", &self.given_name)?;
    require("family_name", &self.family_name)?;
    if self.birth_date > today {
      return Err(Error::Validation("birth_date is in the future".into()));
    }
    if !self
      .fiscal_code
      .matches_identity(&self.family_name, &self.given_name, self.birth_date)
    {
      return Err(Error::Validation(format!(
        "fiscal code {} does not match name, surname and birth date",
        self.fiscal_code
      )));
    }
    Ok(())
  }

  /// Attach the store-assigned fields.
  pub fn into_registrant(self, registrant_id: RegistrantId, registered_on: NaiveDate) -> Registrant {
    Registrant {
      registrant_id,
      fiscal_code: self.fiscal_code,
      given_name: self.given_name,
      family_name: self.family_name,
      birth_date: self.birth_date,
      birth_place: self.birth_place,
      residence_place: self.residence_place,
      residence_street: self.residence_street,
      phone: self.phone,
      registered_on,
      user_type: self.user_type,
      activity: self.activity,
    }
  }
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    Err(Error::Validation(format!("{field} is required")))
  } else {
    Ok(())
  }
}

/// Collapse runs of whitespace and capitalise each word:
/// `"  mario  de rossi"` becomes `"Mario De Rossi"`.
///
/// A word typed in a single case is lower-cased after its first letter; a
/// mixed-case word keeps its inner capitals (`"dell'Orso"`, `"D'Angelo"`).
pub fn title_case(s: &str) -> String {
  s.split_whitespace().map(capitalize_word).collect::<Vec<_>>().join(" ")
}

fn capitalize_word(word: &str) -> String {
  let mixed = word.chars().any(char::is_lowercase) && word.chars().any(char::is_uppercase);
  let mut chars = word.chars();
  let Some(first) = chars.next() else {
    return String::new();
  };
  let mut out: String = first.to_uppercase().collect();
  if mixed {
    out.extend(chars);
  } else {
    out.extend(chars.flat_map(char::to_lowercase));
  }
  out
}

// ─── Guardianship ────────────────────────────────────────────────────────────

/// A guardian is responsible for a dependent. A dependent may have several
/// guardians; nobody is their own guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardianship {
  pub guardian_id:  RegistrantId,
  pub dependent_id: RegistrantId,
}

impl Guardianship {
  pub fn new(guardian_id: RegistrantId, dependent_id: RegistrantId) -> Result<Self> {
    if guardian_id == dependent_id {
      return Err(Error::SelfGuardianship(guardian_id));
    }
    Ok(Self { guardian_id, dependent_id })
  }
}
