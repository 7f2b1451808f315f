//! HTTP server for the tessera registry.
//!
//! Assembles the public and staff API routers under `/api`, guards the staff
//! routes with HTTP Basic authentication and wraps everything in request
//! tracing.

pub mod auth;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use serde::Deserialize;
use tessera_api::ApiState;
use tessera_core::{calendar::Calendar, store::RegistryStore};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_staff};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `tessera.toml` and
/// `TESSERA_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Offset of the association's local time from UTC. Every "today" in the
  /// registry is a date in this zone.
  pub utc_offset_minutes:  i32,
  /// How far back the derived ticket policy looks for history.
  pub ticket_scan_days:    u32,
  pub staff_username:      String,
  pub staff_password_hash: String,
}

impl ServerConfig {
  /// A calendar on the system clock in the configured zone.
  pub fn calendar(&self) -> tessera_core::Result<Calendar> {
    Ok(Calendar::system(Calendar::zone_from_minutes(self.utc_offset_minutes)?))
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.staff_username.clone(),
      password_hash: self.staff_password_hash.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the complete application router.
pub fn router<S>(state: ApiState<S>, auth: Arc<AuthConfig>) -> Router
where
  S: RegistryStore + 'static,
{
  let staff = tessera_api::staff_router(state.clone())
    .route_layer(middleware::from_fn_with_state(auth, require_staff));
  let api = tessera_api::registration_router(state).merge(staff);

  Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::OnceLock;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use chrono::{DateTime, Utc};
  use serde_json::{Value, json};
  use tessera_core::calendar::FixedClock;
  use tessera_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  /// Hashing is slow; every test shares one hash of "secret".
  fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| auth::hash_password("secret").unwrap()).clone()
  }

  fn calendar_at(now: &str) -> Calendar {
    let now: DateTime<Utc> = now.parse().unwrap();
    Calendar::new(Calendar::zone_from_minutes(60).unwrap(), Arc::new(FixedClock(now)))
  }

  async fn make_state() -> ApiState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    ApiState::new(Arc::new(store), calendar_at("2024-05-10T08:00:00Z"))
  }

  /// The same store seen from another instant.
  fn at(state: &ApiState<SqliteStore>, now: &str) -> ApiState<SqliteStore> {
    ApiState { calendar: calendar_at(now), ..state.clone() }
  }

  fn auth() -> Arc<AuthConfig> {
    Arc::new(AuthConfig { username: "staff".into(), password_hash: password_hash() })
  }

  fn staff_header() -> String { format!("Basic {}", B64.encode("staff:secret")) }

  async fn send(
    state: ApiState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
    staff: bool,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if staff {
      builder = builder.header(header::AUTHORIZATION, staff_header());
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = router(state, auth()).oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  fn maria() -> Value {
    json!({
      "fiscal_code": "bncmra90c65h501z",
      "given_name": "maria",
      "family_name": "bianchi",
      "birth_date": "1990-03-25",
      "birth_place": "roma",
      "residence_place": "roma",
      "residence_street": "via appia 1",
      "phone": " 333 1234567 ",
      "activity": "kart",
    })
  }

  fn mario() -> Value {
    json!({
      "fiscal_code": "RSSMRA85T10A562S",
      "given_name": "Mario",
      "family_name": "Rossi",
      "birth_date": "1985-12-10",
      "birth_place": "San Giorgio",
      "residence_place": "Roma",
      "residence_street": "Via Cassia 20",
    })
  }

  fn giulia() -> Value {
    json!({
      "fiscal_code": "BNCGLI08L44L219W",
      "given_name": "Giulia",
      "family_name": "Bianchi",
      "birth_date": "2008-07-04",
    })
  }

  fn luca() -> Value {
    json!({
      "fiscal_code": "FRRLCU10S03F205M",
      "given_name": "Luca",
      "family_name": "Ferrari",
      "birth_date": "2010-11-03",
    })
  }

  fn form(person: Value, dependents: Vec<Value>) -> Value {
    let mut body = person;
    body["accept_policy"] = json!(true);
    body["accept_rules"] = json!(true);
    body["dependents"] = json!(dependents);
    body
  }

  async fn signup(state: &ApiState<SqliteStore>, person: Value) -> i64 {
    let (status, body) =
      send(state.clone(), "POST", "/api/signup", Some(form(person, vec![])), false).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["registrant"]["registrant_id"].as_i64().unwrap()
  }

  // ── Signup ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn signup_with_dependents_returns_receipt() {
    let state = make_state().await;
    let (status, body) = send(
      state,
      "POST",
      "/api/signup",
      Some(form(maria(), vec![giulia(), luca()])),
      false,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["registrant"]["given_name"], "Maria");
    assert_eq!(body["registrant"]["fiscal_code"], "BNCMRA90C65H501Z");
    assert_eq!(body["registrant"]["residence_street"], "Via Appia 1");
    assert_eq!(body["registrant"]["phone"], "333 1234567");
    assert_eq!(body["registrant"]["registered_on"], "2024-05-10");
    assert_eq!(body["dependents"].as_array().unwrap().len(), 2);
    let receipt = body["receipt"].as_str().unwrap();
    assert_eq!(receipt.len(), 64);
    assert!(receipt.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[tokio::test]
  async fn signup_requires_both_acceptances() {
    let state = make_state().await;
    let mut body = form(mario(), vec![]);
    body["accept_rules"] = json!(false);

    let (status, resp) = send(state, "POST", "/api/signup", Some(body), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"].as_str().unwrap().contains("rules"));
  }

  #[tokio::test]
  async fn signup_rejects_a_code_that_does_not_match_the_person() {
    let state = make_state().await;
    let mut person = mario();
    person["birth_date"] = json!("1985-12-11");

    let (status, _) = send(state, "POST", "/api/signup", Some(form(person, vec![])), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn signup_rejects_malformed_fiscal_code() {
    let state = make_state().await;
    let mut person = mario();
    person["fiscal_code"] = json!("RSSMRA85T10A562X");

    let (status, body) =
      send(state, "POST", "/api/signup", Some(form(person, vec![])), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
  }

  #[tokio::test]
  async fn minors_cannot_sign_up_alone() {
    let state = make_state().await;
    let (status, _) =
      send(state, "POST", "/api/signup", Some(form(giulia(), vec![])), false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn duplicate_signup_is_a_conflict() {
    let state = make_state().await;
    signup(&state, mario()).await;

    let (status, _) =
      send(state, "POST", "/api/signup", Some(form(mario(), vec![])), false).await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn failed_dependents_remove_the_new_registrant() {
    let state = make_state().await;
    // Giulia is already registered under another guardian.
    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/signup",
      Some(form(mario(), vec![giulia()])),
      false,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/signup",
      Some(form(maria(), vec![luca(), giulia()])),
      false,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
      state.clone(),
      "GET",
      "/api/registrants/lookup?fiscal_code=BNCMRA90C65H501Z",
      None,
      false,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
      state,
      "GET",
      "/api/registrants/lookup?fiscal_code=FRRLCU10S03F205M",
      None,
      false,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Renewal ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn lookup_reports_expiry_after_a_year_and_a_day() {
    let state = make_state().await;
    signup(&state, mario()).await;

    let uri = "/api/registrants/lookup?fiscal_code=RSSMRA85T10A562S";

    let later = at(&state, "2025-05-10T08:00:00Z");
    let (status, body) = send(later, "GET", uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["renewal"]["needs_renewal_expired"], false);

    let later = at(&state, "2025-05-11T08:00:00Z");
    let (_, body) = send(later, "GET", uri, None, false).await;
    assert_eq!(body["renewal"]["needs_renewal_expired"], true);
    assert_eq!(body["renewal"]["needs_renewal_matured"], false);
  }

  #[tokio::test]
  async fn lookup_uses_the_local_day() {
    let state = make_state().await;
    signup(&state, mario()).await;

    // 23:30 UTC on 10 May 2025 is already 11 May at +01:00.
    let later = at(&state, "2025-05-10T23:30:00Z");
    let (_, body) = send(
      later,
      "GET",
      "/api/registrants/lookup?fiscal_code=RSSMRA85T10A562S",
      None,
      false,
    )
    .await;
    assert_eq!(body["renewal"]["needs_renewal_expired"], true);
  }

  #[tokio::test]
  async fn renew_moves_the_registration_date() {
    let state = make_state().await;
    signup(&state, mario()).await;

    let later = at(&state, "2025-06-01T08:00:00Z");
    let mut person = mario();
    person["residence_street"] = json!("via flaminia 3");
    let (status, body) = send(later, "POST", "/api/renew", Some(form(person, vec![])), false).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["registrant"]["registered_on"], "2025-06-01");
    assert_eq!(body["registrant"]["residence_street"], "Via Flaminia 3");
    assert_eq!(body["receipt"].as_str().unwrap().len(), 64);
  }

  #[tokio::test]
  async fn renew_unknown_is_404() {
    let state = make_state().await;
    let (status, _) = send(state, "POST", "/api/renew", Some(form(mario(), vec![])), false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn renewal_check_evaluates_both_triggers() {
    let state = make_state().await;

    // Registered at 17 years and 11 months, now 18.
    let (status, body) = send(
      state.clone(),
      "POST",
      "/api/renewal-check",
      Some(json!({ "last_registration_date": "2024-04-08", "birth_date": "2006-05-08" })),
      false,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "needs_renewal_expired": false, "needs_renewal_matured": true }));

    let (_, body) = send(
      state,
      "POST",
      "/api/renewal-check",
      Some(json!({ "last_registration_date": "2023-05-09", "birth_date": "1985-12-10" })),
      false,
    )
    .await;
    assert_eq!(body, json!({ "needs_renewal_expired": true, "needs_renewal_matured": false }));
  }

  #[tokio::test]
  async fn renewal_check_rejects_bad_dates() {
    let state = make_state().await;
    let (status, body) = send(
      state,
      "POST",
      "/api/renewal-check",
      Some(json!({ "last_registration_date": "10/05/2024", "birth_date": "1985-12-10" })),
      false,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("last_registration_date"));
  }

  // ── Staff ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn staff_routes_require_credentials() {
    let state = make_state().await;
    let (status, _) = send(state.clone(), "GET", "/api/registrants", None, false).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(state, "GET", "/api/registrants", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
  }

  #[tokio::test]
  async fn staff_manage_guardianship() {
    let state = make_state().await;
    let mother = signup(&state, maria()).await;
    let father = signup(&state, mario()).await;

    let (status, kids) = send(
      state.clone(),
      "POST",
      &format!("/api/registrants/{mother}/dependents"),
      Some(json!([giulia()])),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{kids}");
    let kid = kids[0]["registrant_id"].as_i64().unwrap();

    let (status, _) = send(
      state.clone(),
      "POST",
      &format!("/api/registrants/{kid}/guardians"),
      Some(json!({ "guardian_id": father })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, guardians) =
      send(state.clone(), "GET", &format!("/api/registrants/{kid}/guardians"), None, true).await;
    assert_eq!(guardians.as_array().unwrap().len(), 2);

    let (status, _) = send(
      state.clone(),
      "POST",
      &format!("/api/registrants/{kid}/guardians"),
      Some(json!({ "guardian_id": kid })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
      state.clone(),
      "POST",
      "/api/registrants/remove",
      Some(json!([kid, 9999])),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, dependents) =
      send(state, "GET", &format!("/api/registrants/{mother}/dependents"), None, true).await;
    assert_eq!(dependents, json!([]));
  }

  #[tokio::test]
  async fn adults_cannot_be_added_as_dependents() {
    let state = make_state().await;
    let mother = signup(&state, maria()).await;

    let (status, _) = send(
      state,
      "POST",
      &format!("/api/registrants/{mother}/dependents"),
      Some(json!([mario()])),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_registrant_is_404() {
    let state = make_state().await;
    let (status, body) = send(state, "GET", "/api/registrants/77", None, true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
  }

  // ── Groups ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn group_with_supplied_ticket() {
    let state = make_state().await;
    let a = signup(&state, mario()).await;
    let b = signup(&state, maria()).await;

    let (status, group) = send(
      state.clone(),
      "POST",
      "/api/groups",
      Some(json!({ "registrant_ids": [a, b], "name": "Morning", "ticket_id": 250 })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{group}");
    assert_eq!(group["ticket"], 48);
    assert_eq!(group["assigned_at"], "2024-05-10T09:00:00+01:00");

    let id = group["group_id"].as_i64().unwrap();
    let (_, detail) = send(state.clone(), "GET", &format!("/api/groups/{id}"), None, true).await;
    let members = detail["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m["assigned_at"] == group["assigned_at"]));

    let (_, today) = send(state.clone(), "GET", "/api/groups", None, true).await;
    assert_eq!(today.as_array().unwrap().len(), 1);

    let (_, other_day) = send(state, "GET", "/api/groups?date=2024-05-09", None, true).await;
    assert_eq!(other_day, json!([]));
  }

  #[tokio::test]
  async fn derived_ticket_needs_history() {
    let state = make_state().await;
    let a = signup(&state, mario()).await;

    let (status, body) = send(
      state.clone(),
      "POST",
      "/api/groups",
      Some(json!({ "registrant_ids": [a], "name": "Morning" })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "no_ticket_history");

    send(
      state.clone(),
      "POST",
      "/api/groups",
      Some(json!({ "registrant_ids": [a], "name": "Morning", "ticket_id": 100 })),
      true,
    )
    .await;

    // Three days later the sequence carries over and wraps.
    let later = at(&state, "2024-05-13T08:00:00Z");
    let (status, group) = send(
      later,
      "POST",
      "/api/groups",
      Some(json!({ "registrant_ids": [a], "name": "Afternoon" })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(group["ticket"], 0);
  }

  #[tokio::test]
  async fn group_with_unknown_member_is_not_created() {
    let state = make_state().await;
    let a = signup(&state, mario()).await;

    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/groups",
      Some(json!({ "registrant_ids": [a, 4242], "name": "Morning", "ticket_id": 3 })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, today) = send(state, "GET", "/api/groups", None, true).await;
    assert_eq!(today, json!([]));
  }

  #[tokio::test]
  async fn group_request_validation() {
    let state = make_state().await;
    let (status, _) = send(
      state,
      "POST",
      "/api/groups",
      Some(json!({ "registrant_ids": [], "name": "Morning", "ticket_id": 1 })),
      true,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}
