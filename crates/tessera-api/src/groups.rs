//! Handlers for ticket groups.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/groups` | Body: [`GroupRequest`]; without `ticket_id` the ticket is derived |
//! | `GET`  | `/groups` | `?date=YYYY-MM-DD`, defaults to today |
//! | `GET`  | `/groups/{id}` | Group with its memberships |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tessera_core::{
  group::{Group, GroupId, GroupMembership, GroupRequest},
  store::RegistryStore,
};
use tracing::info;

use crate::{ApiState, error::ApiError};

/// `POST /groups`
///
/// The group and every membership are stamped with the same instant.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<GroupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let Json(request) = body?;
  let new_group = request.into_new_group(state.calendar.now(), state.ticket_scan_days)?;
  let members = new_group.registrant_ids.len();

  let group = state
    .store
    .create_group(new_group)
    .await
    .map_err(ApiError::from_store)?;

  info!(group_id = group.group_id, ticket = group.ticket, members, "group created");
  Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub date: Option<NaiveDate>,
}

/// `GET /groups[?date=YYYY-MM-DD]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Group>>, ApiError>
where
  S: RegistryStore,
{
  let Query(params) = params?;
  let date = params.date.unwrap_or_else(|| state.calendar.today());
  let groups = state.store.groups_on(date).await.map_err(ApiError::from_store)?;
  Ok(Json(groups))
}

#[derive(Debug, Serialize)]
pub struct GroupDetail {
  pub group:   Group,
  pub members: Vec<GroupMembership>,
}

/// `GET /groups/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<GroupId>,
) -> Result<Json<GroupDetail>, ApiError>
where
  S: RegistryStore,
{
  let group = state
    .store
    .get_group(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::from(tessera_core::Error::GroupNotFound(id)))?;
  let members = state.store.group_members(id).await.map_err(ApiError::from_store)?;
  Ok(Json(GroupDetail { group, members }))
}
