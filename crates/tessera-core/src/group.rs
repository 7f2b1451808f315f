//! Assignment groups: a batch of registrants under one ticket number.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, registrant::RegistrantId, ticket::TicketPolicy};

pub type GroupId = i64;

/// A stored assignment ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:    GroupId,
  /// Always in `0..=MAX_TICKET`.
  pub ticket:      u32,
  pub name:        String,
  pub assigned_at: DateTime<FixedOffset>,
}

impl Group {
  /// The calendar day the group belongs to, in the zone it was stamped in.
  pub fn assigned_on(&self) -> NaiveDate { self.assigned_at.date_naive() }
}

/// Membership of one registrant in a group; `assigned_at` equals the
/// group's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
  pub group_id:      GroupId,
  pub registrant_id: RegistrantId,
  pub assigned_at:   DateTime<FixedOffset>,
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// A caller's request to form a group. Without `ticket_id` the ticket number
/// is derived from history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRequest {
  pub registrant_ids: Vec<RegistrantId>,
  pub name:           String,
  #[serde(default)]
  pub ticket_id:      Option<u32>,
}

impl GroupRequest {
  /// Validate and stamp the request.
  pub fn into_new_group(
    self,
    assigned_at: DateTime<FixedOffset>,
    scan_days: u32,
  ) -> Result<NewGroup> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("group name is required".into()));
    }
    if self.registrant_ids.is_empty() {
      return Err(Error::Validation("a group needs at least one registrant".into()));
    }
    let mut seen = HashSet::with_capacity(self.registrant_ids.len());
    if let Some(dup) = self.registrant_ids.iter().find(|id| !seen.insert(**id)) {
      return Err(Error::Validation(format!("registrant {dup} listed twice")));
    }

    let ticket = match self.ticket_id {
      Some(candidate) => TicketPolicy::Supplied(candidate),
      None => TicketPolicy::Derived { scan_days },
    };

    Ok(NewGroup { name, ticket, registrant_ids: self.registrant_ids, assigned_at })
  }
}

/// Input to [`crate::store::RegistryStore::create_group`]. The store resolves
/// `ticket` and writes the group with all its memberships atomically.
#[derive(Debug, Clone)]
pub struct NewGroup {
  pub name:           String,
  pub ticket:         TicketPolicy,
  pub registrant_ids: Vec<RegistrantId>,
  pub assigned_at:    DateTime<FixedOffset>,
}

impl NewGroup {
  pub fn assigned_on(&self) -> NaiveDate { self.assigned_at.date_naive() }
}
