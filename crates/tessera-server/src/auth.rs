//! HTTP Basic authentication for the staff routes.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rand_core::OsRng;
use thiserror::Error;
use tracing::warn;

/// Credentials accepted for staff access.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Why a request was refused. Every variant answers 401; the distinction is
/// only logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
  #[error("missing Authorization header")]
  MissingHeader,
  #[error("malformed Basic credentials")]
  Malformed,
  #[error("unknown user")]
  UnknownUser,
  #[error("wrong password")]
  WrongPassword,
  #[error("configured password hash is not a PHC string")]
  BadHash,
}

impl IntoResponse for AuthError {
  fn into_response(self) -> Response {
    let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Basic realm=\"tessera\""),
    );
    res
  }
}

/// Hash `password` into a PHC string suitable for `staff_password_hash`.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Check the `Authorization` header in `headers` against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), AuthError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .ok_or(AuthError::MissingHeader)?
    .to_str()
    .map_err(|_| AuthError::Malformed)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(AuthError::Malformed)?;
  let decoded = B64.decode(encoded).map_err(|_| AuthError::Malformed)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| AuthError::Malformed)?;
  let (username, password) = creds.split_once(':').ok_or(AuthError::Malformed)?;

  if username != config.username {
    return Err(AuthError::UnknownUser);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash).map_err(|_| AuthError::BadHash)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| AuthError::WrongPassword)
}

/// Middleware guarding the staff router.
pub async fn require_staff(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, AuthError> {
  if let Err(err) = verify_auth(req.headers(), &config) {
    warn!(path = %req.uri().path(), reason = %err, "staff authentication failed");
    return Err(err);
  }
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(password: &str) -> AuthConfig {
    AuthConfig { username: "staff".into(), password_hash: hash_password(password).unwrap() }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    map
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn correct_credentials() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&headers(&basic("staff", "secret")), &cfg), Ok(()));
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    assert_eq!(
      verify_auth(&headers(&basic("staff", "nope")), &cfg),
      Err(AuthError::WrongPassword)
    );
  }

  #[test]
  fn wrong_user() {
    let cfg = config("secret");
    assert_eq!(
      verify_auth(&headers(&basic("mallory", "secret")), &cfg),
      Err(AuthError::UnknownUser)
    );
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&HeaderMap::new(), &cfg), Err(AuthError::MissingHeader));
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    assert_eq!(
      verify_auth(&headers("Basic !!!not-base64!!!"), &cfg),
      Err(AuthError::Malformed)
    );
  }

  #[test]
  fn unparseable_hash_never_authenticates() {
    let cfg = AuthConfig { username: "staff".into(), password_hash: "plain".into() };
    assert_eq!(
      verify_auth(&headers(&basic("staff", "plain")), &cfg),
      Err(AuthError::BadHash)
    );
  }

  #[test]
  fn rejection_carries_challenge() {
    let res = AuthError::MissingHeader.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
