//! Shared application state for all routes.

use crate::orm::Pool;
use crate::session::SessionCodec;
use crate::templates::TemplateRenderer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub templates: Arc<dyn TemplateRenderer>,
    pub sessions: SessionCodec,
}

impl AppState {
    pub fn new(pool: Pool, templates: Arc<dyn TemplateRenderer>, secret: &str) -> Self {
        AppState {
            pool,
            templates,
            sessions: SessionCodec::new(secret),
        }
    }
}
