//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tessera_core::{Classify, ErrorKind};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// No ticket could be derived from recent history; the caller should supply
  /// one explicitly.
  #[error("no ticket history: {0}")]
  NoTicketHistory(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a domain or store error onto a response class by its [`ErrorKind`].
  pub fn from_store<E>(err: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    match err.kind() {
      ErrorKind::Validation => ApiError::BadRequest(err.to_string()),
      ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
      ErrorKind::Conflict => ApiError::Conflict(err.to_string()),
      ErrorKind::NoTicketHistory => ApiError::NoTicketHistory(err.to_string()),
      ErrorKind::Persistence => ApiError::Store(Box::new(err)),
    }
  }

  /// Short machine-readable tag sent alongside the message.
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::BadRequest(_) => "bad_request",
      ApiError::NotFound(_) => "not_found",
      ApiError::Conflict(_) => "conflict",
      ApiError::NoTicketHistory(_) => "no_ticket_history",
      ApiError::Store(_) => "internal",
    }
  }
}

impl From<tessera_core::Error> for ApiError {
  fn from(err: tessera_core::Error) -> Self { ApiError::from_store(err) }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) | ApiError::NoTicketHistory(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message, "code": self.code() }))).into_response()
  }
}
