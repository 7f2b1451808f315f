//! Handlers for registration and the registrant directory.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/signup` | Adult registrant plus optional dependents, 201 |
//! | `POST` | `/renew` | 404 if the fiscal code is unknown |
//! | `GET`  | `/registrants/lookup` | `?fiscal_code=`; record and renewal triggers |
//! | `POST` | `/renewal-check` | Body: `{"last_registration_date":…,"birth_date":…}` |
//! | `GET`  | `/registrants` | `?skip=&limit=` |
//! | `GET`  | `/registrants/{id}` | 404 if not found |
//! | `POST` | `/registrants/remove` | Body: `[id, …]` |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tessera_core::{
  FiscalCode,
  registrant::{NewRegistrant, Registrant, RegistrantId},
  renewal::{RenewalStatus, is_minor},
  store::RegistryStore,
};
use tracing::{error, info, warn};

use crate::{ApiState, error::ApiError};

/// Page size used when `limit` is omitted.
pub const DEFAULT_PAGE_SIZE: usize = 100;

// ─── Bodies ──────────────────────────────────────────────────────────────────

/// The registration form: the registrant's own data, the two mandatory
/// acceptances and any minors registered alongside.
#[derive(Debug, Deserialize)]
pub struct RegistrationForm {
  #[serde(flatten)]
  pub registrant:    NewRegistrant,
  #[serde(default)]
  pub accept_policy: bool,
  #[serde(default)]
  pub accept_rules:  bool,
  #[serde(default)]
  pub dependents:    Vec<NewRegistrant>,
}

impl RegistrationForm {
  fn check_acceptances(&self) -> Result<(), ApiError> {
    if !self.accept_policy {
      return Err(ApiError::BadRequest("the privacy policy must be accepted".into()));
    }
    if !self.accept_rules {
      return Err(ApiError::BadRequest("the association rules must be accepted".into()));
    }
    Ok(())
  }
}

/// Returned after a signup or renewal.
#[derive(Debug, Serialize)]
pub struct Receipt {
  pub registrant: Registrant,
  pub dependents: Vec<Registrant>,
  /// Hex SHA-256 of the stored record.
  pub receipt:    String,
}

// ─── Signup ──────────────────────────────────────────────────────────────────

/// `POST /signup`
///
/// Dependents are written in one transaction after the registrant. If that
/// fails the registrant is removed again, so a rejected form leaves nothing
/// behind.
pub async fn signup<S>(
  State(state): State<ApiState<S>>,
  form: Result<Json<RegistrationForm>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let Json(form) = form?;
  form.check_acceptances()?;

  let today = state.calendar.today();
  let applicant = form.registrant.normalized();
  applicant.validate_adult(today)?;

  let dependents: Vec<NewRegistrant> =
    form.dependents.into_iter().map(NewRegistrant::normalized).collect();
  for dependent in &dependents {
    dependent.validate_dependent(today)?;
  }

  let registrant = state
    .store
    .add_registrant(applicant, today)
    .await
    .map_err(ApiError::from_store)?;

  let dependents = if dependents.is_empty() {
    Vec::new()
  } else {
    match state.store.add_dependents(registrant.registrant_id, dependents, today).await {
      Ok(added) => added,
      Err(err) => {
        warn!(
          registrant_id = registrant.registrant_id,
          error = %err,
          "dependent registration failed, removing registrant"
        );
        if let Err(remove_err) =
          state.store.remove_registrants(vec![registrant.registrant_id]).await
        {
          error!(
            registrant_id = registrant.registrant_id,
            error = %remove_err,
            "could not remove registrant after dependent failure"
          );
        }
        return Err(ApiError::from_store(err));
      }
    }
  };

  info!(
    registrant_id = registrant.registrant_id,
    dependents = dependents.len(),
    "registrant signed up"
  );

  let receipt = registrant.receipt_digest()?;
  Ok((StatusCode::CREATED, Json(Receipt { registrant, dependents, receipt })))
}

// ─── Renew ───────────────────────────────────────────────────────────────────

/// `POST /renew`: resubmit the form for an existing fiscal code.
///
/// Minors renew under the dependent rules, everyone else under the adult ones.
/// Dependents in the body are ignored.
pub async fn renew<S>(
  State(state): State<ApiState<S>>,
  form: Result<Json<RegistrationForm>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError>
where
  S: RegistryStore,
{
  let Json(form) = form?;
  form.check_acceptances()?;

  let today = state.calendar.today();
  let input = form.registrant.normalized();
  if is_minor(input.birth_date, today) {
    input.validate_dependent(today)?;
  } else {
    input.validate_adult(today)?;
  }

  let code = input.fiscal_code.clone();
  let registrant = state
    .store
    .renew_registrant(input, today)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("fiscal code {code} is not registered")))?;

  info!(registrant_id = registrant.registrant_id, "registration renewed");

  let receipt = registrant.receipt_digest()?;
  Ok(Json(Receipt { registrant, dependents: Vec::new(), receipt }))
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LookupParams {
  pub fiscal_code: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResult {
  pub registrant: Registrant,
  pub renewal:    RenewalStatus,
}

/// `GET /registrants/lookup?fiscal_code=<code>`
pub async fn lookup<S>(
  State(state): State<ApiState<S>>,
  params: Result<Query<LookupParams>, QueryRejection>,
) -> Result<Json<LookupResult>, ApiError>
where
  S: RegistryStore,
{
  let Query(params) = params?;
  let code = FiscalCode::parse(&params.fiscal_code)
    .map_err(|e| ApiError::BadRequest(format!("invalid fiscal code: {e}")))?;

  let registrant = state
    .store
    .find_by_fiscal_code(&code)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("fiscal code {code} is not registered")))?;

  let renewal = registrant.renewal_status(state.calendar.today());
  Ok(Json(LookupResult { registrant, renewal }))
}

// ─── Renewal check ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RenewalCheckBody {
  pub last_registration_date: String,
  pub birth_date:             String,
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
  NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
    .map_err(|e| ApiError::BadRequest(format!("{field}: {e}")))
}

/// `POST /renewal-check`: evaluate both renewal triggers for today.
pub async fn renewal_check<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<RenewalCheckBody>, JsonRejection>,
) -> Result<Json<RenewalStatus>, ApiError>
where
  S: RegistryStore,
{
  let Json(body) = body?;
  let last = parse_date("last_registration_date", &body.last_registration_date)?;
  let birth = parse_date("birth_date", &body.birth_date)?;

  Ok(Json(RenewalStatus::evaluate(last, birth, state.calendar.today())))
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub skip:  Option<usize>,
  pub limit: Option<usize>,
}

/// `GET /registrants[?skip=<n>][&limit=<n>]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Registrant>>, ApiError>
where
  S: RegistryStore,
{
  let Query(params) = params?;
  let registrants = state
    .store
    .list_registrants(params.skip.unwrap_or(0), params.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(registrants))
}

/// `GET /registrants/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<RegistrantId>,
) -> Result<Json<Registrant>, ApiError>
where
  S: RegistryStore,
{
  let registrant = state
    .store
    .get_registrant(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("registrant {id} not found")))?;
  Ok(Json(registrant))
}

/// `POST /registrants/remove`, body: `[id, …]`. Unknown ids are skipped.
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  ids: Result<Json<Vec<RegistrantId>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let Json(ids) = ids?;
  let removed = state
    .store
    .remove_registrants(ids)
    .await
    .map_err(ApiError::from_store)?;

  info!(removed, "registrants removed");
  Ok(Json(json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use chrono::{DateTime, NaiveDate, Utc};
  use serde_json::json;
  use tessera_core::{
    Classify, ErrorKind,
    calendar::{Calendar, FixedClock},
    group::{Group, GroupId, GroupMembership, NewGroup},
    registrant::Guardianship,
  };

  use super::*;

  #[derive(Debug, thiserror::Error)]
  enum StubError {
    #[error("fiscal code already registered")]
    Duplicate,
    #[error("disk I/O error")]
    Disk,
  }

  impl Classify for StubError {
    fn kind(&self) -> ErrorKind {
      match self {
        StubError::Duplicate => ErrorKind::Conflict,
        StubError::Disk => ErrorKind::Persistence,
      }
    }
  }

  /// Accepts the registrant, rejects every dependent batch and cannot delete.
  #[derive(Default)]
  struct BrokenStore {
    removals: AtomicUsize,
  }

  impl RegistryStore for BrokenStore {
    type Error = StubError;

    async fn add_registrant(&self, input: NewRegistrant, on: NaiveDate) -> Result<Registrant, StubError> { Ok(input.into_registrant(1, on)) }
    async fn get_registrant(&self, _: RegistrantId) -> Result<Option<Registrant>, StubError> { unimplemented!() }
    async fn find_by_fiscal_code(&self, _: &FiscalCode) -> Result<Option<Registrant>, StubError> { unimplemented!() }
    async fn list_registrants(&self, _: usize, _: usize) -> Result<Vec<Registrant>, StubError> { unimplemented!() }
    async fn renew_registrant(&self, _: NewRegistrant, _: NaiveDate) -> Result<Option<Registrant>, StubError> { unimplemented!() }
    async fn add_dependents(&self, _: RegistrantId, _: Vec<NewRegistrant>, _: NaiveDate) -> Result<Vec<Registrant>, StubError> { Err(StubError::Duplicate) }
    async fn link_guardian(&self, _: RegistrantId, _: RegistrantId) -> Result<Guardianship, StubError> { unimplemented!() }
    async fn dependents_of(&self, _: RegistrantId) -> Result<Vec<Registrant>, StubError> { unimplemented!() }
    async fn guardians_of(&self, _: RegistrantId) -> Result<Vec<Registrant>, StubError> { unimplemented!() }
    async fn remove_registrants(&self, _: Vec<RegistrantId>) -> Result<usize, StubError> {
      self.removals.fetch_add(1, Ordering::SeqCst);
      Err(StubError::Disk)
    }
    async fn create_group(&self, _: NewGroup) -> Result<Group, StubError> { unimplemented!() }
    async fn get_group(&self, _: GroupId) -> Result<Option<Group>, StubError> { unimplemented!() }
    async fn group_members(&self, _: GroupId) -> Result<Vec<GroupMembership>, StubError> { unimplemented!() }
    async fn groups_on(&self, _: NaiveDate) -> Result<Vec<Group>, StubError> { unimplemented!() }
    async fn max_ticket_on(&self, _: NaiveDate) -> Result<Option<u32>, StubError> { unimplemented!() }
  }

  fn form() -> RegistrationForm {
    serde_json::from_value(json!({
      "fiscal_code": "BNCMRA90C65H501Z",
      "given_name": "Maria",
      "family_name": "Bianchi",
      "birth_date": "1990-03-25",
      "birth_place": "Roma",
      "residence_place": "Roma",
      "residence_street": "Via Appia 1",
      "accept_policy": true,
      "accept_rules": true,
      "dependents": [{
        "fiscal_code": "BNCGLI08L44L219W",
        "given_name": "Giulia",
        "family_name": "Bianchi",
        "birth_date": "2008-07-04",
      }],
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn failed_compensation_still_reports_the_dependent_error() {
    let store = Arc::new(BrokenStore::default());
    let now: DateTime<Utc> = "2024-05-10T08:00:00Z".parse().unwrap();
    let calendar = Calendar::new(Calendar::zone_from_minutes(60).unwrap(), Arc::new(FixedClock(now)));
    let state = ApiState::new(Arc::clone(&store), calendar);

    match signup(State(state), Ok(Json(form()))).await {
      Err(ApiError::Conflict(message)) => assert!(message.contains("already registered")),
      Err(other) => panic!("expected the dependent conflict, got {other:?}"),
      Ok(_) => panic!("signup should fail"),
    }
    assert_eq!(store.removals.load(Ordering::SeqCst), 1);
  }
}
