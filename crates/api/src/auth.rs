//! Bearer-token authentication middleware.
//!
//! The middleware resolves the `Authorization: Bearer` header to an active
//! user and stashes it as a request extension; handlers pull it back out
//! through the `CurrentUser` extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use simsvc_domain::{ServiceError, User};

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ServiceError::Unauthenticated("missing bearer token".into()))?;

    let user = state.users.verify_token(bearer.token()).await?;
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                ApiError::Service(ServiceError::Unauthenticated(
                    "request not authenticated".into(),
                ))
            })
    }
}
