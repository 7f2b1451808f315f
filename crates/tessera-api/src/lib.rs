//! JSON REST API for the tessera registry.
//!
//! Exposes two axum [`Router`]s backed by any [`RegistryStore`]: the public
//! registration surface and the staff surface. Authentication, TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let api = tessera_api::registration_router(state.clone())
//!   .merge(tessera_api::staff_router(state).route_layer(auth_layer));
//! Router::new().nest("/api", api)
//! ```

pub mod dependents;
pub mod error;
pub mod groups;
pub mod registrants;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tessera_core::{calendar::Calendar, store::RegistryStore, ticket::DEFAULT_SCAN_DAYS};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through every handler.
pub struct ApiState<S> {
  pub store:            Arc<S>,
  /// Source of "now" and "today" in the configured zone.
  pub calendar:         Calendar,
  /// Backward-scan cap for groups created without an explicit ticket.
  pub ticket_scan_days: u32,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, calendar: Calendar) -> Self {
    Self { store, calendar, ticket_scan_days: DEFAULT_SCAN_DAYS }
  }

  pub fn with_ticket_scan_days(mut self, days: u32) -> Self {
    self.ticket_scan_days = days;
    self
  }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:            Arc::clone(&self.store),
      calendar:         self.calendar.clone(),
      ticket_scan_days: self.ticket_scan_days,
    }
  }
}

// ─── Routers ─────────────────────────────────────────────────────────────────

/// Routes open to the public: signup, renewal and eligibility checks.
pub fn registration_router<S>(state: ApiState<S>) -> Router<()>
where
  S: RegistryStore + 'static,
{
  Router::new()
    .route("/signup", post(registrants::signup::<S>))
    .route("/renew", post(registrants::renew::<S>))
    .route("/registrants/lookup", get(registrants::lookup::<S>))
    .route("/renewal-check", post(registrants::renewal_check::<S>))
    .with_state(state)
}

/// Routes reserved for association staff. The caller is expected to put an
/// authentication layer in front of them.
pub fn staff_router<S>(state: ApiState<S>) -> Router<()>
where
  S: RegistryStore + 'static,
{
  Router::new()
    // Registrants
    .route("/registrants", get(registrants::list::<S>))
    .route("/registrants/remove", post(registrants::remove::<S>))
    .route("/registrants/{id}", get(registrants::get_one::<S>))
    // Guardianship
    .route(
      "/registrants/{id}/dependents",
      get(dependents::list::<S>).post(dependents::add::<S>),
    )
    .route(
      "/registrants/{id}/guardians",
      get(dependents::guardians::<S>).post(dependents::link::<S>),
    )
    // Groups
    .route("/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route("/groups/{id}", get(groups::get_one::<S>))
    .with_state(state)
}
