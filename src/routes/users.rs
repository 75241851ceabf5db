//! Accounts: registration, login, role assignment and password management.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use super::validate_phone;
use crate::auth::codes::{self, OtpCheck, RESET_TOKEN_TTL_MINUTES};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, AuthUser, IssuedToken};
use crate::db::users::{self, BuyerProfile, SellerProfile, User};
use crate::db::{otps, password_resets};
use crate::domain::value_objects::Role;
use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(me))
        .route("/users/role/otp", post(request_role_otp))
        .route("/users/role/verify", post(verify_role_otp))
        .route("/users/password/forgot", post(forgot_password))
        .route("/users/password/reset", post(reset_password))
        .route("/users/password/change", post(change_password))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleOtpRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRoleRequest {
    #[validate(length(equal = 6))]
    pub code: String,
    pub role: Role,
    #[validate(length(min = 2, max = 100))]
    pub store_name: Option<String>,
    #[validate(length(max = 50))]
    pub tax_id: Option<String>,
    #[validate(length(min = 7, max = 20), custom = "validate_phone")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: IssuedToken,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<SellerProfile>,
}

async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let email = req.email.trim().to_lowercase();
    let role = state.config.is_admin_email(&email).then_some(Role::Admin);
    let password_hash = hash_password(&req.password)?;
    let user = users::insert(&state.db, req.name.trim(), &email, &password_hash, role).await?;
    let token = state.tokens.issue(user.id, user.role)?;

    tracing::info!(user_id = %user.id, admin = role.is_some(), "User registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

async fn login(State(state): State<AppState>, ValidatedJson(req): ValidatedJson<LoginRequest>) -> Result<Json<AuthResponse>> {
    let user = users::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&req.password, &user.password_hash)?;
    let token = state.tokens.issue(user.id, user.role)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { user, token }))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>> {
    let user = users::find_by_id(&state.db, auth.user_id).await?.ok_or_else(|| AppError::not_found("User"))?;
    let (buyer, seller) = match user.role {
        Some(Role::Buyer) => (users::find_buyer(&state.db, user.id).await?, None),
        Some(Role::Seller) => (None, users::find_seller(&state.db, user.id).await?),
        _ => (None, None),
    };
    Ok(Json(MeResponse { user, buyer, seller }))
}

async fn request_role_otp(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<RoleOtpRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    if !req.role.is_self_assignable() {
        return Err(AuthError::RoleNotAssignable(req.role).into());
    }
    let user = users::find_by_id(&state.db, auth.user_id).await?.ok_or_else(|| AppError::not_found("User"))?;
    if user.role.is_some() {
        return Err(AuthError::RoleAlreadyAssigned.into());
    }

    let ttl = state.config.otp_ttl_minutes;
    let code = codes::generate_otp();
    otps::replace(&state.db, user.id, &codes::hash_otp(user.id, &code), req.role, Utc::now() + Duration::minutes(ttl)).await?;
    state.email.role_otp(&user.email, &code, req.role, ttl);

    tracing::info!(user_id = %user.id, role = %req.role, "Role verification code sent");
    Ok((StatusCode::ACCEPTED, Json(json!({ "message": "Verification code sent", "expires_in_minutes": ttl }))))
}

async fn verify_role_otp(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<VerifyRoleRequest>,
) -> Result<Json<AuthResponse>> {
    let mut tx = state.db.begin().await?;
    let user = users::find_by_id(&mut *tx, auth.user_id).await?.ok_or_else(|| AppError::not_found("User"))?;
    if user.role.is_some() {
        return Err(AuthError::RoleAlreadyAssigned.into());
    }
    let pending = otps::find(&mut *tx, user.id).await?.ok_or(AuthError::NoPendingOtp)?;

    match pending.check(&req.code, req.role, Utc::now()) {
        OtpCheck::Valid => {}
        OtpCheck::Mismatch { remaining } => {
            otps::record_failure(&mut *tx, user.id).await?;
            tx.commit().await?;
            return Err(AuthError::IncorrectOtp { remaining }.into());
        }
        OtpCheck::Spent => {
            otps::delete(&mut *tx, user.id).await?;
            tx.commit().await?;
            return Err(AuthError::OtpSpent.into());
        }
        OtpCheck::WrongRole => return Err(AuthError::OtpRoleMismatch.into()),
    }

    match req.role {
        Role::Buyer => {
            users::insert_buyer(&mut tx, user.id, req.phone.as_deref()).await?;
        }
        Role::Seller => {
            let store_name = req
                .store_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::BadRequest("store_name is required for sellers".into()))?;
            users::insert_seller(&mut tx, user.id, store_name, req.tax_id.as_deref(), req.phone.as_deref()).await?;
        }
        Role::Admin => return Err(AuthError::RoleNotAssignable(Role::Admin).into()),
    }
    let user = users::set_role(&mut tx, user.id, req.role).await?;
    otps::delete(&mut *tx, user.id).await?;
    tx.commit().await?;

    let token = state.tokens.issue(user.id, user.role)?;
    tracing::info!(user_id = %user.id, role = %req.role, "Role assigned");
    Ok(Json(AuthResponse { user, token }))
}

async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    if let Some(user) = users::find_by_email(&state.db, req.email.trim()).await? {
        let token = codes::generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        password_resets::insert(&state.db, user.id, &codes::hash_reset_token(&token), expires_at).await?;
        state.email.password_reset(&user.email, &token);
        tracing::info!(user_id = %user.id, "Password reset requested");
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "If the account exists, a password reset email has been sent" })),
    ))
}

async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    let mut tx = state.db.begin().await?;
    let user_id = password_resets::claim(&mut tx, &codes::hash_reset_token(&req.token))
        .await?
        .ok_or(AuthError::InvalidResetToken)?;
    let password_hash = hash_password(&req.new_password)?;
    users::set_password(&mut *tx, user_id, &password_hash).await?;
    password_resets::consume_all(&mut tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(%user_id, "Password reset");
    Ok(Json(json!({ "message": "Password updated" })))
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    let user = users::find_by_id(&state.db, auth.user_id).await?.ok_or_else(|| AppError::not_found("User"))?;
    verify_password(&req.current_password, &user.password_hash)?;
    let password_hash = hash_password(&req.new_password)?;
    users::set_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(Json(json!({ "message": "Password updated" })))
}
