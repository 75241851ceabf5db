//! Bearer token extractors.
//!
//! Extractors run before the body is read, so a request with the wrong role
//! is rejected with `403` before its payload is validated.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use super::AuthError;
use crate::domain::value_objects::Role;
use crate::error::AppError;
use crate::state::AppState;

/// Any signed-in user, with or without a role.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Option<Role>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool { self.role == Some(Role::Admin) }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        let claims = state.tokens.verify(token)?;
        Ok(Self { user_id: claims.sub, role: claims.role })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

async fn require_role<S>(parts: &mut Parts, state: &S, role: Role) -> Result<Uuid, AppError>
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    let user = AuthUser::from_request_parts(parts, state).await?;
    if user.role == Some(role) { Ok(user.user_id) } else { Err(AuthError::RoleRequired(role).into()) }
}

/// Signed-in buyer; the id is both the user id and the buyer id.
#[derive(Debug, Clone, Copy)]
pub struct BuyerUser(pub Uuid);

/// Signed-in seller; the id is both the user id and the seller id.
#[derive(Debug, Clone, Copy)]
pub struct SellerUser(pub Uuid);

#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for BuyerUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Buyer).await.map(Self)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SellerUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Seller).await.map(Self)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).await.map(Self)
    }
}
