//! Signed-in user resolved by the session middleware.

use crate::models::User;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Current user, if the request carried a valid session cookie.
/// Populated as a request extension by [`crate::middleware::auth`].
#[derive(Clone, Debug, Default)]
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}
