//! Awesome blog: a small blog engine over a declarative active-record layer and a
//! keyword-binding route table on axum.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod orm;
pub mod routes;
pub mod session;
pub mod state;
pub mod templates;
pub mod web;

pub use config::{AppConfig, DbConfig};
pub use error::{ApiError, AppError, RouteError, SchemaError};
pub use migration::{default_indexes, ensure_tables};
pub use models::{register_all, Blog, Comment, User};
pub use orm::{Model, Pool};
pub use routes::app;
pub use state::AppState;
pub use templates::{TemplateRenderer, Templates};
