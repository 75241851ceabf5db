//! Request extractors that reject with `AppError`'s JSON envelope.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// Path parameters; parse failures become `400`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Query string; parse failures become `400`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// JSON body that is deserialized and then run through `validator`.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// JSON body that may be left out entirely.
///
/// An empty body yields `None`; anything else must parse as `T` or the
/// request is rejected with `400`.
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| AppError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }
        let axum::Json(value) = axum::Json::<T>::from_bytes(&bytes)?;
        Ok(Self(Some(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct Target {
        address_id: Option<Uuid>,
    }

    async fn extract(body: &'static str) -> Result<OptionalJson<Target>, AppError> {
        OptionalJson::from_request(Request::new(Body::from(body)), &()).await
    }

    #[tokio::test]
    async fn test_optional_json_empty_body() {
        assert!(matches!(extract("").await, Ok(OptionalJson(None))));
        assert!(matches!(extract(" \n").await, Ok(OptionalJson(None))));
    }

    #[tokio::test]
    async fn test_optional_json_parses_body() {
        let id = "0190a5c4-6f1e-7c3a-9b2d-3e4f5a6b7c8d";
        let OptionalJson(parsed) = extract(r#"{"address_id":"0190a5c4-6f1e-7c3a-9b2d-3e4f5a6b7c8d"}"#).await.unwrap();
        assert_eq!(parsed.and_then(|t| t.address_id).map(|u| u.to_string()).as_deref(), Some(id));
    }

    #[tokio::test]
    async fn test_optional_json_rejects_malformed() {
        assert!(matches!(extract(r#"{"address_id":"oops"}"#).await, Err(AppError::BadRequest(_))));
        assert!(matches!(extract(r#"{"address_id":"#).await, Err(AppError::BadRequest(_))));
    }
}
