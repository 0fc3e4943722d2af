//! JSON REST API for visitdesk.
//!
//! Exposes an axum [`Router`] backed by any [`visitdesk_core::store::VisitStore`].
//! TLS, CORS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState::new(Arc::new(store), Notifier::spawn(mailer));
//! .nest("/api", visitdesk_api::api_router(state))
//! ```

pub mod admin;
pub mod directory;
pub mod error;
pub mod notify;
pub mod session;
pub mod users;
pub mod visitors;
pub mod visits;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use visitdesk_core::store::VisitStore;

pub use error::ApiError;
pub use notify::Notifier;
pub use session::SessionRegistry;

// ─── Application state ───────────────────────────────────────────────────────

/// Behaviour switches for the handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiOptions {
  /// Attach an identification badge to visit confirmations.
  pub attach_badge: bool,
}

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub notifier: Notifier,
  pub sessions: SessionRegistry,
  pub options:  ApiOptions,
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
    Self {
      store,
      notifier,
      sessions: SessionRegistry::default(),
      options: ApiOptions::default(),
    }
  }

  pub fn with_options(mut self, options: ApiOptions) -> Self {
    self.options = options;
    self
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: self.notifier.clone(),
      sessions: self.sessions.clone(),
      options:  self.options,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: VisitStore + 'static,
{
  Router::new()
    // Visits
    .route("/visits", get(visits::list::<S>).post(visits::create::<S>))
    .route("/visits/next", get(visits::next::<S>))
    .route("/visits/stats", get(visits::stats::<S>))
    .route(
      "/visits/{id}",
      get(visits::get_one::<S>)
        .put(visits::update::<S>)
        .delete(visits::cancel::<S>),
    )
    .route("/visits/{id}/check-in", post(visits::check_in::<S>))
    .route("/visits/{id}/check-out", post(visits::check_out::<S>))
    // Visitors
    .route("/visitors", get(visitors::list::<S>))
    .route("/visitors/frequent", get(visitors::frequent::<S>))
    .route("/visitors/{national_id}", get(visitors::get_one::<S>))
    .route("/visitors/{national_id}/visits", get(visitors::history::<S>))
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>)
        .put(users::update::<S>)
        .delete(users::deactivate::<S>),
    )
    .route("/users/{id}/reactivate", post(users::reactivate::<S>))
    // Directory
    .route("/profiles", get(directory::profiles::<S>))
    .route(
      "/departments",
      get(directory::departments::<S>).post(directory::create_department::<S>),
    )
    // Sessions
    .route("/login", post(session::login::<S>))
    .route("/session", get(session::current::<S>))
    .route("/logout", post(session::logout::<S>))
    // Admin
    .route("/admin/reset-visits", post(admin::reset_visits::<S>))
    .route("/admin/purge-closed", post(admin::purge_closed::<S>))
    .route("/admin/visits/{id}", delete(admin::delete_visit::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
