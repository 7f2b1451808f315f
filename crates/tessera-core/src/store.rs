//! The `RegistryStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `tessera-store-sqlite`).
//! Higher layers (`tessera-api`, `tessera-server`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  Classify, FiscalCode,
  group::{Group, GroupId, GroupMembership, NewGroup},
  registrant::{Guardianship, NewRegistrant, Registrant, RegistrantId},
};

/// Abstraction over a registry backend.
///
/// Every operation that writes more than one row is all-or-nothing: on error
/// nothing it wrote is visible to later reads.
///
/// Dates are supplied by the caller from its [`crate::calendar::Calendar`];
/// the store never reads a clock.
pub trait RegistryStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Registrants ───────────────────────────────────────────────────────

  /// Persist a new registrant registered on `registered_on`.
  ///
  /// Fails with a conflict if the fiscal code is already registered.
  fn add_registrant(
    &self,
    input: NewRegistrant,
    registered_on: NaiveDate,
  ) -> impl Future<Output = Result<Registrant, Self::Error>> + Send + '_;

  fn get_registrant(
    &self,
    id: RegistrantId,
  ) -> impl Future<Output = Result<Option<Registrant>, Self::Error>> + Send + '_;

  fn find_by_fiscal_code<'a>(
    &'a self,
    code: &'a FiscalCode,
  ) -> impl Future<Output = Result<Option<Registrant>, Self::Error>> + Send + 'a;

  /// Registrants ordered by id.
  fn list_registrants(
    &self,
    skip: usize,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Registrant>, Self::Error>> + Send + '_;

  /// Replace the data of the registrant holding `input.fiscal_code` and set
  /// its registration date to `registered_on`. Returns `None` if nobody holds
  /// that code.
  fn renew_registrant(
    &self,
    input: NewRegistrant,
    registered_on: NaiveDate,
  ) -> impl Future<Output = Result<Option<Registrant>, Self::Error>> + Send + '_;

  // ── Guardianship ──────────────────────────────────────────────────────

  /// Register `dependents` and link each to `guardian_id`, all in one
  /// transaction.
  fn add_dependents(
    &self,
    guardian_id: RegistrantId,
    dependents: Vec<NewRegistrant>,
    registered_on: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Registrant>, Self::Error>> + Send + '_;

  /// Link two existing registrants. Rejects self links and unknown ids.
  fn link_guardian(
    &self,
    guardian_id: RegistrantId,
    dependent_id: RegistrantId,
  ) -> impl Future<Output = Result<Guardianship, Self::Error>> + Send + '_;

  fn dependents_of(
    &self,
    guardian_id: RegistrantId,
  ) -> impl Future<Output = Result<Vec<Registrant>, Self::Error>> + Send + '_;

  fn guardians_of(
    &self,
    dependent_id: RegistrantId,
  ) -> impl Future<Output = Result<Vec<Registrant>, Self::Error>> + Send + '_;

  /// Delete registrants together with their guardianship links and group
  /// memberships. Unknown ids are ignored; returns how many were deleted.
  fn remove_registrants(
    &self,
    ids: Vec<RegistrantId>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────────

  /// Resolve the ticket number and write the group and one membership per
  /// registrant, stamped with `input.assigned_at`.
  ///
  /// Ticket derivation and the inserts happen under one write lock, so
  /// concurrent callers never derive the same number from the same history.
  fn create_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn get_group(
    &self,
    id: GroupId,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  fn group_members(
    &self,
    id: GroupId,
  ) -> impl Future<Output = Result<Vec<GroupMembership>, Self::Error>> + Send + '_;

  /// Groups assigned on `date`, ordered by id.
  fn groups_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  /// Highest ticket number assigned on `date`, if any.
  fn max_ticket_on(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<u32>, Self::Error>> + Send + '_;
}
