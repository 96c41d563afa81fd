//! Router assembly.

pub mod blog;
pub mod common;

pub use blog::blog_routes;
pub use common::common_routes;

use crate::error::RouteError;
use crate::middleware::auth;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, Router};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

/// Request bodies above this are rejected.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// The complete application: blog routes, operational routes and `/static`,
/// behind session resolution, request tracing and a body size limit.
pub fn app(state: AppState, static_dir: &str) -> Result<Router, RouteError> {
    let router = blog_routes()?
        .into_router()
        .merge(common_routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn_with_state(state.clone(), auth))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    Ok(router)
}
