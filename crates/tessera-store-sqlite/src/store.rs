//! [`SqliteStore`], the SQLite implementation of [`RegistryStore`].

use std::{path::Path, time::Duration};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use tessera_core::{
  FiscalCode,
  group::{Group, GroupId, GroupMembership, NewGroup},
  registrant::{Guardianship, NewRegistrant, Registrant, RegistrantId},
  store::RegistryStore,
};

use crate::{
  Error, Result,
  encode::{
    GROUP_COLUMNS, REGISTRANT_COLUMNS, RawGroup, RawMembership, RawRegistrant, encode_date,
    encode_dt, encode_user_type,
  },
  schema::SCHEMA,
};

/// How long a writer waits for another connection's write lock before
/// failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tessera registry backed by a single SQLite file.
///
/// Clones share the same background connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query returning registrant rows and decode them.
  async fn query_registrants(
    &self,
    sql: String,
    params: Vec<i64>,
  ) -> Result<Vec<Registrant>> {
    let raws: Vec<RawRegistrant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRegistrant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRegistrant::into_registrant).collect()
  }
}

// ─── Synchronous helpers (run on the connection thread) ─────────────────────

fn constraint_violated(err: &rusqlite::Error, extended_code: i32) -> bool {
  matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code)
}

/// Fail with [`tessera_core::Error::RegistrantNotFound`] unless `id` exists.
fn ensure_registrant(conn: &Connection, id: RegistrantId) -> Result<()> {
  let exists = conn
    .query_row(
      "SELECT 1 FROM registrants WHERE registrant_id = ?1",
      rusqlite::params![id],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if exists {
    Ok(())
  } else {
    Err(tessera_core::Error::RegistrantNotFound(id).into())
  }
}

fn insert_registrant(
  conn: &Connection,
  input: &NewRegistrant,
  registered_on: NaiveDate,
) -> Result<RegistrantId> {
  conn
    .execute(
      "INSERT INTO registrants (
         fiscal_code, given_name, family_name, birth_date, birth_place,
         residence_place, residence_street, phone, registered_on,
         user_type, activity
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
      rusqlite::params![
        input.fiscal_code.as_str(),
        input.given_name,
        input.family_name,
        encode_date(input.birth_date),
        input.birth_place,
        input.residence_place,
        input.residence_street,
        input.phone,
        encode_date(registered_on),
        encode_user_type(input.user_type),
        input.activity,
      ],
    )
    .map_err(|e| {
      if constraint_violated(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
        tessera_core::Error::DuplicateFiscalCode(input.fiscal_code.to_string()).into()
      } else {
        Error::from(e)
      }
    })?;
  Ok(conn.last_insert_rowid())
}

fn insert_guardianship(conn: &Connection, link: Guardianship) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO guardianships (guardian_id, dependent_id) VALUES (?1, ?2)",
    rusqlite::params![link.guardian_id, link.dependent_id],
  )?;
  Ok(())
}

fn link_guardian_tx(conn: &mut Connection, link: Guardianship) -> Result<()> {
  let tx = conn.transaction()?;
  ensure_registrant(&tx, link.guardian_id)?;
  ensure_registrant(&tx, link.dependent_id)?;
  insert_guardianship(&tx, link)?;
  tx.commit()?;
  Ok(())
}

fn max_ticket(conn: &Connection, day: NaiveDate) -> Result<Option<u32>> {
  Ok(conn.query_row(
    "SELECT MAX(ticket) FROM ticket_groups WHERE assigned_on = ?1",
    rusqlite::params![encode_date(day)],
    |row| row.get(0),
  )?)
}

fn add_dependents_tx(
  conn: &mut Connection,
  guardian_id: RegistrantId,
  dependents: Vec<NewRegistrant>,
  registered_on: NaiveDate,
) -> Result<Vec<Registrant>> {
  let tx = conn.transaction()?;
  ensure_registrant(&tx, guardian_id)?;

  let mut added = Vec::with_capacity(dependents.len());
  for dependent in dependents {
    let dependent_id = insert_registrant(&tx, &dependent, registered_on)?;
    insert_guardianship(&tx, Guardianship::new(guardian_id, dependent_id)?)?;
    added.push(dependent.into_registrant(dependent_id, registered_on));
  }

  tx.commit()?;
  Ok(added)
}

/// Resolve the ticket and insert the group with its memberships.
///
/// `BEGIN IMMEDIATE` takes the write lock before the ticket history is read,
/// so derivation and insertion are serialised across connections.
fn create_group_tx(conn: &mut Connection, input: NewGroup) -> Result<Group> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let assigned_on = input.assigned_on();
  let ticket = input.ticket.resolve(assigned_on, |day| max_ticket(&tx, day))?;
  let assigned_at = encode_dt(input.assigned_at);

  tx.execute(
    "INSERT INTO ticket_groups (ticket, name, assigned_at, assigned_on)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![ticket, input.name, assigned_at, encode_date(assigned_on)],
  )?;
  let group_id = tx.last_insert_rowid();

  for &registrant_id in &input.registrant_ids {
    ensure_registrant(&tx, registrant_id)?;
    tx.execute(
      "INSERT INTO group_members (group_id, registrant_id, assigned_at) VALUES (?1, ?2, ?3)",
      rusqlite::params![group_id, registrant_id, assigned_at],
    )?;
  }

  tx.commit()?;
  Ok(Group { group_id, ticket, name: input.name, assigned_at: input.assigned_at })
}

// ─── RegistryStore impl ──────────────────────────────────────────────────────

impl RegistryStore for SqliteStore {
  type Error = Error;

  // ── Registrants ───────────────────────────────────────────────────────────

  async fn add_registrant(
    &self,
    input: NewRegistrant,
    registered_on: NaiveDate,
  ) -> Result<Registrant> {
    self
      .conn
      .call(move |conn| {
        Ok(
          insert_registrant(conn, &input, registered_on)
            .map(|id| input.into_registrant(id, registered_on)),
        )
      })
      .await?
  }

  async fn get_registrant(&self, id: RegistrantId) -> Result<Option<Registrant>> {
    let raw: Option<RawRegistrant> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {REGISTRANT_COLUMNS} FROM registrants r WHERE r.registrant_id = ?1"),
            rusqlite::params![id],
            RawRegistrant::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRegistrant::into_registrant).transpose()
  }

  async fn find_by_fiscal_code(&self, code: &FiscalCode) -> Result<Option<Registrant>> {
    let code_str = code.as_str().to_owned();

    let raw: Option<RawRegistrant> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {REGISTRANT_COLUMNS} FROM registrants r WHERE r.fiscal_code = ?1"),
            rusqlite::params![code_str],
            RawRegistrant::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRegistrant::into_registrant).transpose()
  }

  async fn list_registrants(&self, skip: usize, limit: usize) -> Result<Vec<Registrant>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(skip).unwrap_or(i64::MAX);
    self
      .query_registrants(
        format!(
          "SELECT {REGISTRANT_COLUMNS} FROM registrants r
           ORDER BY r.registrant_id LIMIT ?1 OFFSET ?2"
        ),
        vec![limit_val, offset_val],
      )
      .await
  }

  async fn renew_registrant(
    &self,
    input: NewRegistrant,
    registered_on: NaiveDate,
  ) -> Result<Option<Registrant>> {
    let raw: Option<RawRegistrant> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE registrants SET
             given_name = ?2, family_name = ?3, birth_date = ?4, birth_place = ?5,
             residence_place = ?6, residence_street = ?7, phone = ?8,
             registered_on = ?9, user_type = ?10, activity = ?11
           WHERE fiscal_code = ?1",
          rusqlite::params![
            input.fiscal_code.as_str(),
            input.given_name,
            input.family_name,
            encode_date(input.birth_date),
            input.birth_place,
            input.residence_place,
            input.residence_street,
            input.phone,
            encode_date(registered_on),
            encode_user_type(input.user_type),
            input.activity,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(conn
          .query_row(
            &format!("SELECT {REGISTRANT_COLUMNS} FROM registrants r WHERE r.fiscal_code = ?1"),
            rusqlite::params![input.fiscal_code.as_str()],
            RawRegistrant::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRegistrant::into_registrant).transpose()
  }

  // ── Guardianship ──────────────────────────────────────────────────────────

  async fn add_dependents(
    &self,
    guardian_id: RegistrantId,
    dependents: Vec<NewRegistrant>,
    registered_on: NaiveDate,
  ) -> Result<Vec<Registrant>> {
    self
      .conn
      .call(move |conn| Ok(add_dependents_tx(conn, guardian_id, dependents, registered_on)))
      .await?
  }

  async fn link_guardian(
    &self,
    guardian_id: RegistrantId,
    dependent_id: RegistrantId,
  ) -> Result<Guardianship> {
    let link = Guardianship::new(guardian_id, dependent_id)?;

    self.conn.call(move |conn| Ok(link_guardian_tx(conn, link))).await??;

    Ok(link)
  }

  async fn dependents_of(&self, guardian_id: RegistrantId) -> Result<Vec<Registrant>> {
    self
      .query_registrants(
        format!(
          "SELECT {REGISTRANT_COLUMNS} FROM registrants r
           JOIN guardianships g ON g.dependent_id = r.registrant_id
           WHERE g.guardian_id = ?1
           ORDER BY r.registrant_id"
        ),
        vec![guardian_id],
      )
      .await
  }

  async fn guardians_of(&self, dependent_id: RegistrantId) -> Result<Vec<Registrant>> {
    self
      .query_registrants(
        format!(
          "SELECT {REGISTRANT_COLUMNS} FROM registrants r
           JOIN guardianships g ON g.guardian_id = r.registrant_id
           WHERE g.dependent_id = ?1
           ORDER BY r.registrant_id"
        ),
        vec![dependent_id],
      )
      .await
  }

  async fn remove_registrants(&self, ids: Vec<RegistrantId>) -> Result<usize> {
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        for id in ids {
          removed += tx.execute(
            "DELETE FROM registrants WHERE registrant_id = ?1",
            rusqlite::params![id],
          )?;
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    Ok(removed)
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn create_group(&self, input: NewGroup) -> Result<Group> {
    self.conn.call(move |conn| Ok(create_group_tx(conn, input))).await?
  }

  async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM ticket_groups WHERE group_id = ?1"),
            rusqlite::params![id],
            RawGroup::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn group_members(&self, id: GroupId) -> Result<Vec<GroupMembership>> {
    let raws: Vec<RawMembership> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT group_id, registrant_id, assigned_at FROM group_members
           WHERE group_id = ?1 ORDER BY registrant_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawMembership {
              group_id:      row.get(0)?,
              registrant_id: row.get(1)?,
              assigned_at:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMembership::into_membership).collect()
  }

  async fn groups_on(&self, date: NaiveDate) -> Result<Vec<Group>> {
    let day = encode_date(date);

    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {GROUP_COLUMNS} FROM ticket_groups WHERE assigned_on = ?1 ORDER BY group_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![day], RawGroup::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn max_ticket_on(&self, date: NaiveDate) -> Result<Option<u32>> {
    self.conn.call(move |conn| Ok(max_ticket(conn, date))).await?
  }
}
