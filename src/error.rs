//! Unified error handling.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"error": {"code", "message", "details"}}` with a matching status code;
//! server-side failures are logged and their details withheld from clients.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use validator::ValidationErrors;

use crate::domain::aggregates::{CartError, OrderError, ProductError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { message: String, details: Option<Value> },

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{what} not found")) }
    pub fn conflict(message: impl Into<String>) -> Self { Self::Conflict { message: message.into(), details: None } }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }
}

/// Maps Postgres constraint violations to client errors.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return Self::NotFound("Resource not found".into());
        }
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.code().as_deref() {
                Some("23505") => return Self::conflict(unique_violation_message(db_err.constraint())),
                Some("23503") => return Self::NotFound("Referenced resource does not exist".into()),
                Some("23514") => return Self::BadRequest("Value violates a constraint".into()),
                _ => {}
            }
        }
        Self::Database(e)
    }
}

fn unique_violation_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "An account with this email already exists",
        Some("sellers_store_name_key") => "Store name is already taken",
        Some("reviews_product_id_buyer_id_key") => "You have already reviewed this product",
        Some("wishlist_items_pkey") => "Product is already in your wishlist",
        Some("product_variants_sku_key") => "Variant SKU already exists",
        Some("addresses_one_default_per_buyer") => "Only one default address is allowed",
        _ => "Resource already exists",
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Empty | CartError::QuantityLimit => Self::BadRequest(e.to_string()),
            CartError::InsufficientStock { available } => Self::Conflict {
                message: e.to_string(),
                details: Some(json!({ "available": available })),
            },
            CartError::Unavailable(ref problems) => Self::Conflict {
                message: e.to_string(),
                details: Some(json!({ "items": problems })),
            },
        }
    }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self { Self::BadRequest(e.to_string()) }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => Self::BadRequest(e.to_string()),
            OrderError::InvalidTransition { .. } => Self::conflict(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        }

        // Don't expose internal error details to clients
        let (message, details) = match self {
            Self::Database(_) | Self::Internal(_) => ("Internal server error".to_string(), None),
            Self::Validation(ref errors) => ("Request validation failed".to_string(), serde_json::to_value(errors).ok()),
            Self::Conflict { message, details } => (message, details),
            Self::BadRequest(ref m) | Self::Unauthorized(ref m) | Self::Forbidden(ref m) | Self::NotFound(ref m) => (m.clone(), None),
        };

        let body = json!({ "error": { "code": code, "message": message, "details": details } });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
