//! Authentication error types.

use thiserror::Error;

use crate::domain::value_objects::Role;
use crate::error::AppError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("requires the {0} role")]
    RoleRequired(Role),

    #[error("account already has a role")]
    RoleAlreadyAssigned,

    #[error("role {0} cannot be requested")]
    RoleNotAssignable(Role),

    #[error("no pending verification code")]
    NoPendingOtp,

    #[error("verification code is incorrect, {remaining} attempt(s) left")]
    IncorrectOtp { remaining: i32 },

    #[error("verification code expired, request a new one")]
    OtpSpent,

    #[error("verification code was issued for a different role")]
    OtpRoleMismatch,

    #[error("reset token is invalid or expired")]
    InvalidResetToken,

    #[error("password hashing error")]
    PasswordHash,

    #[error("token creation error")]
    TokenCreation,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                AppError::Unauthorized(e.to_string())
            }
            AuthError::RoleRequired(_) => AppError::Forbidden(e.to_string()),
            AuthError::RoleAlreadyAssigned => AppError::conflict(e.to_string()),
            AuthError::RoleNotAssignable(_)
            | AuthError::NoPendingOtp
            | AuthError::IncorrectOtp { .. }
            | AuthError::OtpSpent
            | AuthError::OtpRoleMismatch
            | AuthError::InvalidResetToken => AppError::BadRequest(e.to_string()),
            AuthError::PasswordHash | AuthError::TokenCreation => AppError::Internal(e.to_string()),
        }
    }
}
