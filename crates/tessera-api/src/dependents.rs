//! Handlers for guardianship links.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/registrants/{id}/dependents` | 404 if the guardian is unknown |
//! | `POST` | `/registrants/{id}/dependents` | Body: `[NewRegistrant, …]`, all or nothing |
//! | `GET`  | `/registrants/{id}/guardians` | 404 if the dependent is unknown |
//! | `POST` | `/registrants/{id}/guardians` | Body: `{"guardian_id":…}` |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tessera_core::{
  registrant::{NewRegistrant, Registrant, RegistrantId},
  store::RegistryStore,
};
use tracing::info;

use crate::{ApiState, error::ApiError};

async fn require_registrant<S>(state: &ApiState<S>, id: RegistrantId) -> Result<(), ApiError>
where
  S: RegistryStore,
{
  state
    .store
    .get_registrant(id)
    .await
    .map_err(ApiError::from_store)?
    .map(|_| ())
    .ok_or_else(|| ApiError::NotFound(format!("registrant {id} not found")))
}

/// `GET /registrants/{id}/dependents`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<RegistrantId>,
) -> Result<Json<Vec<Registrant>>, ApiError>
where
  S: RegistryStore,
{
  require_registrant(&state, id).await?;
  let dependents = state.store.dependents_of(id).await.map_err(ApiError::from_store)?;
  Ok(Json(dependents))
}

/// `POST /registrants/{id}/dependents`
pub async fn add<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<RegistrantId>,
  body: Result<Json<Vec<NewRegistrant>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let Json(body) = body?;
  if body.is_empty() {
    return Err(ApiError::BadRequest("no dependents supplied".into()));
  }

  let today = state.calendar.today();
  let dependents: Vec<NewRegistrant> = body.into_iter().map(NewRegistrant::normalized).collect();
  for dependent in &dependents {
    dependent.validate_dependent(today)?;
  }

  let added = state
    .store
    .add_dependents(id, dependents, today)
    .await
    .map_err(ApiError::from_store)?;

  info!(guardian_id = id, added = added.len(), "dependents registered");
  Ok((StatusCode::CREATED, Json(added)))
}

/// `GET /registrants/{id}/guardians`
pub async fn guardians<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<RegistrantId>,
) -> Result<Json<Vec<Registrant>>, ApiError>
where
  S: RegistryStore,
{
  require_registrant(&state, id).await?;
  let guardians = state.store.guardians_of(id).await.map_err(ApiError::from_store)?;
  Ok(Json(guardians))
}

#[derive(Debug, Deserialize)]
pub struct LinkBody {
  pub guardian_id: RegistrantId,
}

/// `POST /registrants/{id}/guardians`: make `guardian_id` a guardian of `id`.
pub async fn link<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<RegistrantId>,
  body: Result<Json<LinkBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let Json(body) = body?;
  let link = state
    .store
    .link_guardian(body.guardian_id, id)
    .await
    .map_err(ApiError::from_store)?;

  info!(guardian_id = link.guardian_id, dependent_id = link.dependent_id, "guardian linked");
  Ok((StatusCode::CREATED, Json(link)))
}
