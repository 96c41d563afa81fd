//! Request middleware: session resolution and the admin gate for management pages.

use crate::extractors::CurrentUser;
use crate::models::User;
use crate::orm::Model;
use crate::session::{cookie2user, cookie_from_header, COOKIE_NAME};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

pub const MANAGE_PREFIX: &str = "/manage/";
pub const SIGNIN_PATH: &str = "/signin";

/// Resolve the session cookie into a [`CurrentUser`] extension. Non-admin requests
/// for management pages are redirected to the sign-in page.
pub async fn auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    tracing::info!(method = %req.method(), path = %req.uri().path(), "request");
    let cookie = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| cookie_from_header(h, COOKIE_NAME))
        .map(str::to_string);

    let user = match cookie {
        Some(cookie) => {
            let pool = state.pool.clone();
            let now = chrono::Utc::now().timestamp();
            cookie2user(&state.sessions, &cookie, now, move |id| async move {
                User::find(&pool, Value::String(id)).await
            })
            .await
        }
        None => None,
    };
    if let Some(u) = &user {
        tracing::info!(email = %u.email(), "set current user");
    }

    if req.uri().path().starts_with(MANAGE_PREFIX) && !user.as_ref().is_some_and(User::admin) {
        return (StatusCode::FOUND, [(header::LOCATION, SIGNIN_PATH)]).into_response();
    }
    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::error::AppError;
    use crate::orm::Pool;
    use crate::templates::TemplateRenderer;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoTemplates;

    impl TemplateRenderer for NoTemplates {
        fn render(&self, name: &str, _context: &Value) -> Result<String, AppError> {
            Ok(name.to_string())
        }
    }

    async fn who(CurrentUser(user): CurrentUser) -> String {
        user.map(|u| u.id().to_string()).unwrap_or_else(|| "anonymous".into())
    }

    fn app() -> Router {
        let state = AppState::new(Pool::lazy(&DbConfig::default()), Arc::new(NoTemplates), "secret");
        Router::new()
            .route("/", get(who))
            .route("/manage/blogs", get(who))
            .layer(from_fn_with_state(state.clone(), auth))
            .with_state(state)
    }

    #[tokio::test]
    async fn manage_pages_redirect_without_admin() {
        let req = Request::builder().uri("/manage/blogs").body(Body::empty()).unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/signin");
    }

    #[tokio::test]
    async fn malformed_cookie_means_anonymous() {
        let req = Request::builder()
            .uri("/")
            .header(header::COOKIE, "awesession=garbage")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"anonymous");
    }
}
