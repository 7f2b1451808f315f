//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD`; instants as RFC 3339 strings
//! carrying the offset they were stamped with.

use chrono::{DateTime, FixedOffset, NaiveDate};
use tessera_core::{
  FiscalCode,
  group::{Group, GroupMembership},
  registrant::{Registrant, UserType},
};

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── DateTime<FixedOffset> ───────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<FixedOffset>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<FixedOffset>> {
  DateTime::parse_from_rfc3339(s).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── UserType ────────────────────────────────────────────────────────────────

pub fn encode_user_type(t: UserType) -> &'static str {
  match t {
    UserType::Member => "member",
    UserType::Cardholder => "cardholder",
  }
}

pub fn decode_user_type(s: &str) -> Result<UserType> {
  match s {
    "member" => Ok(UserType::Member),
    "cardholder" => Ok(UserType::Cardholder),
    other => Err(Error::Corrupt { column: "user_type", value: other.to_owned() }),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// Registrant columns, for tables aliased as `r`.
pub const REGISTRANT_COLUMNS: &str = "r.registrant_id, r.fiscal_code, r.given_name, \
  r.family_name, r.birth_date, r.birth_place, r.residence_place, \
  r.residence_street, r.phone, r.registered_on, r.user_type, r.activity";

/// A registrant row as read from SQLite, before decoding.
pub struct RawRegistrant {
  pub registrant_id:    i64,
  pub fiscal_code:      String,
  pub given_name:       String,
  pub family_name:      String,
  pub birth_date:       String,
  pub birth_place:      String,
  pub residence_place:  String,
  pub residence_street: String,
  pub phone:            String,
  pub registered_on:    String,
  pub user_type:        String,
  pub activity:         String,
}

impl RawRegistrant {
  /// Row mapper matching [`REGISTRANT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      registrant_id:    row.get(0)?,
      fiscal_code:      row.get(1)?,
      given_name:       row.get(2)?,
      family_name:      row.get(3)?,
      birth_date:       row.get(4)?,
      birth_place:      row.get(5)?,
      residence_place:  row.get(6)?,
      residence_street: row.get(7)?,
      phone:            row.get(8)?,
      registered_on:    row.get(9)?,
      user_type:        row.get(10)?,
      activity:         row.get(11)?,
    })
  }

  pub fn into_registrant(self) -> Result<Registrant> {
    let fiscal_code = FiscalCode::parse(&self.fiscal_code)
      .map_err(|_| Error::Corrupt { column: "fiscal_code", value: self.fiscal_code.clone() })?;
    Ok(Registrant {
      registrant_id: self.registrant_id,
      fiscal_code,
      given_name: self.given_name,
      family_name: self.family_name,
      birth_date: decode_date(&self.birth_date)?,
      birth_place: self.birth_place,
      residence_place: self.residence_place,
      residence_street: self.residence_street,
      phone: self.phone,
      registered_on: decode_date(&self.registered_on)?,
      user_type: decode_user_type(&self.user_type)?,
      activity: self.activity,
    })
  }
}

pub const GROUP_COLUMNS: &str = "group_id, ticket, name, assigned_at";

pub struct RawGroup {
  pub group_id:    i64,
  pub ticket:      u32,
  pub name:        String,
  pub assigned_at: String,
}

impl RawGroup {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_id:    row.get(0)?,
      ticket:      row.get(1)?,
      name:        row.get(2)?,
      assigned_at: row.get(3)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:    self.group_id,
      ticket:      self.ticket,
      name:        self.name,
      assigned_at: decode_dt(&self.assigned_at)?,
    })
  }
}

pub struct RawMembership {
  pub group_id:      i64,
  pub registrant_id: i64,
  pub assigned_at:   String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<GroupMembership> {
    Ok(GroupMembership {
      group_id:      self.group_id,
      registrant_id: self.registrant_id,
      assigned_at:   decode_dt(&self.assigned_at)?,
    })
  }
}
