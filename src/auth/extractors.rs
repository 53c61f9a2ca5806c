use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{
    auth::{
        claims::Identity,
        jwt::JwtKeys,
        repo_types::Role,
        services::{authenticate, require_role},
    },
    error::{AppError, WebError},
};

/// Authenticated API caller; rejects with a 401 JSON envelope.
pub struct AuthUser(pub Identity);

/// API caller with the admin role; 401 or 403.
pub struct AdminUser(pub Identity);

/// Authenticated browser visitor; anonymous visitors are sent to `/login`.
pub struct WebUser(pub Identity);

/// Backoffice visitor; non-admins are sent to `/`.
pub struct WebAdmin(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authenticate(&parts.headers, &keys).map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let who = authenticate(&parts.headers, &keys)?;
        require_role(who, Role::Admin).map(AdminUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for WebUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(WebUser(authenticate(&parts.headers, &keys)?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for WebAdmin
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let who = authenticate(&parts.headers, &keys)?;
        Ok(WebAdmin(require_role(who, Role::Admin)?))
    }
}
